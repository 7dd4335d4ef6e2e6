//! Configuration file handling.
//!
//! The configuration file is stored at `$RECEIPTS_HOME/config.json` and contains the default
//! school details printed on receipts, the output directory and the Gemini model settings.

use crate::model::SchoolInfo;
use crate::{utils, Result};
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

const APP_NAME: &str = "receipts";
const CONFIG_VERSION: u8 = 1;
const CONFIG_JSON: &str = "config.json";
const OUTPUT_DIR: &str = "output";
const TEXT_MODEL: &str = "gemini-2.5-flash";
const IMAGE_MODEL: &str = "imagen-3.0-generate-002";
const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const SCHOOL_ADDRESS: &str = "123 Education Lane, Knowledge City, New Delhi, 110001, India";
const SCHOOL_PHONE: &str = "+91 98765 43210";

/// The `Config` object represents the configuration of the app. You instantiate it by providing
/// the path to `$RECEIPTS_HOME` and from there it loads `$RECEIPTS_HOME/config.json`. It provides
/// the resolved output directory and the settings stored in the file.
#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
    config_path: PathBuf,
    output_dir: PathBuf,
    api_base: Url,
    config_file: ConfigFile,
}

/// Values for `Config::create`. Anything left as `None` takes its default.
#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    pub school_address: Option<String>,
    pub school_phone: Option<String>,
    pub output_dir: Option<PathBuf>,
}

impl Config {
    /// Creates the home directory, an initial `config.json` and the output directory.
    ///
    /// # Errors
    /// - Returns an error if `config.json` already exists or if any file operations fail.
    pub async fn create(dir: impl Into<PathBuf>, options: InitOptions) -> Result<Self> {
        let maybe_relative = dir.into();
        utils::make_dir(&maybe_relative)
            .await
            .context("Unable to create the receipts home directory")?;
        let root = utils::canonicalize(&maybe_relative).await?;

        let config_path = root.join(CONFIG_JSON);
        if config_path.exists() {
            bail!("The config file already exists '{}'", config_path.display())
        }

        let config_file = ConfigFile {
            school_address: options
                .school_address
                .unwrap_or_else(|| SCHOOL_ADDRESS.to_string()),
            school_phone: options
                .school_phone
                .unwrap_or_else(|| SCHOOL_PHONE.to_string()),
            output_dir: options.output_dir,
            ..ConfigFile::default()
        };
        config_file.save(&config_path).await?;

        let config = Self::from_file(root, config_path, config_file)?;
        utils::make_dir(config.output_dir())
            .await
            .context("Unable to create the output directory")?;
        Ok(config)
    }

    /// This will
    /// - validate that `receipts_home` exists and that the config file exists
    /// - load and validate the config file
    /// - create the output directory if it is missing
    /// - return the loaded configuration object
    pub async fn load(receipts_home: impl Into<PathBuf>) -> Result<Self> {
        let maybe_relative = receipts_home.into();
        let root = utils::canonicalize(&maybe_relative)
            .await
            .context("Receipts home is missing, run 'receipts init' first")?;

        let config_path = root.join(CONFIG_JSON);
        if !config_path.is_file() {
            bail!("The config file is missing '{}'", config_path.display())
        }
        let config_file = ConfigFile::load(&config_path).await?;
        let config = Self::from_file(root, config_path, config_file)?;
        utils::make_dir(config.output_dir())
            .await
            .context("Unable to create the output directory")?;
        Ok(config)
    }

    fn from_file(root: PathBuf, config_path: PathBuf, config_file: ConfigFile) -> Result<Self> {
        let output_dir = match &config_file.output_dir {
            Some(p) if p.is_absolute() => p.clone(),
            Some(p) => root.join(p),
            None => root.join(OUTPUT_DIR),
        };
        let api_base = Url::parse(config_file.api_base())
            .with_context(|| format!("Invalid api_base '{}'", config_file.api_base()))?;
        Ok(Self {
            root,
            config_path,
            output_dir,
            api_base,
            config_file,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Where exported PNG and zip files are written.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// The default school details for new receipts.
    pub fn school(&self) -> SchoolInfo {
        SchoolInfo::new(
            &self.config_file.school_address,
            &self.config_file.school_phone,
        )
    }

    pub fn text_model(&self) -> &str {
        self.config_file
            .text_model
            .as_deref()
            .unwrap_or(TEXT_MODEL)
    }

    pub fn image_model(&self) -> &str {
        self.config_file
            .image_model
            .as_deref()
            .unwrap_or(IMAGE_MODEL)
    }

    pub fn api_base(&self) -> &Url {
        &self.api_base
    }
}

/// Represents the serialization and deserialization format of the configuration file.
///
/// Example configuration:
/// ```json
/// {
///   "app_name": "receipts",
///   "config_version": 1,
///   "school_address": "Greenwood High School, 123 Education Lane, Bangalore",
///   "school_phone": "+91 80 1234 5678",
///   "output_dir": "output",
///   "text_model": "gemini-2.5-flash"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
struct ConfigFile {
    /// Application name, should always be "receipts"
    app_name: String,

    /// Configuration file version
    config_version: u8,

    /// Printed at the top of every new receipt
    school_address: String,

    /// Printed below the address
    school_phone: String,

    /// Where exports are written (optional, relative to the home directory or absolute).
    /// Defaults to $RECEIPTS_HOME/output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    output_dir: Option<PathBuf>,

    /// The Gemini model used for student details
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text_model: Option<String>,

    /// The Imagen model used for signatures
    #[serde(default, skip_serializing_if = "Option::is_none")]
    image_model: Option<String>,

    /// The base URL of the Generative Language API
    #[serde(default, skip_serializing_if = "Option::is_none")]
    api_base: Option<String>,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            config_version: CONFIG_VERSION,
            school_address: SCHOOL_ADDRESS.to_string(),
            school_phone: SCHOOL_PHONE.to_string(),
            output_dir: None,
            text_model: None,
            image_model: None,
            api_base: None,
        }
    }
}

impl ConfigFile {
    /// Loads a ConfigFile asynchronously from the specified path.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, or if `app_name` is wrong
    async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config: ConfigFile = utils::deserialize(path)
            .await
            .context("Unable to load the config file")?;

        anyhow::ensure!(
            config.app_name == APP_NAME,
            "Invalid app_name in config file: expected '{}', got '{}'",
            APP_NAME,
            config.app_name
        );

        Ok(config)
    }

    /// Saves the ConfigFile to the specified path.
    async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let p = path.as_ref();
        let data = serde_json::to_string_pretty(self).context("Unable to serialize config")?;
        utils::write(p, data)
            .await
            .context("Unable to write config file")
    }

    fn api_base(&self) -> &str {
        self.api_base.as_deref().unwrap_or(API_BASE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_config_create() {
        let dir = TempDir::new().unwrap();
        let home_dir = dir.path().join("receipts_home");
        let options = InitOptions {
            school_address: Some("7 Lake Road, Pune".to_string()),
            school_phone: Some("+91 20 0000 0000".to_string()),
            output_dir: None,
        };

        let config = Config::create(&home_dir, options).await.unwrap();

        assert_eq!(config.school().address, "7 Lake Road, Pune");
        assert_eq!(config.school().phone, "+91 20 0000 0000");
        assert!(config.config_path().is_file());
        assert!(config.output_dir().is_dir());
        assert!(config.output_dir().ends_with(OUTPUT_DIR));
        assert_eq!(config.text_model(), TEXT_MODEL);
        assert_eq!(config.image_model(), IMAGE_MODEL);
        assert_eq!(config.api_base().as_str(), format!("{API_BASE}"));
    }

    #[tokio::test]
    async fn test_config_create_twice_fails() {
        let dir = TempDir::new().unwrap();
        Config::create(dir.path(), InitOptions::default())
            .await
            .unwrap();
        assert!(Config::create(dir.path(), InitOptions::default())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_config_load() {
        let dir = TempDir::new().unwrap();
        let created = Config::create(dir.path(), InitOptions::default())
            .await
            .unwrap();
        let loaded = Config::load(dir.path()).await.unwrap();
        assert_eq!(created.config_file, loaded.config_file);
        assert_eq!(created.output_dir(), loaded.output_dir());
        assert_eq!(loaded.school().phone, SCHOOL_PHONE);
    }

    #[tokio::test]
    async fn test_config_load_missing_home() {
        let dir = TempDir::new().unwrap();
        assert!(Config::load(dir.path().join("nope")).await.is_err());
        assert!(Config::load(dir.path()).await.is_err());
    }

    #[tokio::test]
    async fn test_config_file_load_with_minimal_config() {
        let temp_dir = TempDir::new().unwrap();
        let elsewhere = temp_dir.path().join("elsewhere");
        let json = format!(
            r#"{{
            "app_name": "receipts",
            "config_version": 1,
            "school_address": "Somewhere",
            "school_phone": "123",
            "output_dir": "{}",
            "api_base": "http://localhost:9999/v1beta"
        }}"#,
            elsewhere.display()
        );
        utils::write(&temp_dir.path().join(CONFIG_JSON), json)
            .await
            .unwrap();

        let config = Config::load(temp_dir.path()).await.unwrap();
        assert_eq!(config.output_dir(), elsewhere.as_path());
        assert!(elsewhere.is_dir());
        assert_eq!(config.api_base().as_str(), "http://localhost:9999/v1beta");
        assert_eq!(config.text_model(), TEXT_MODEL);
    }

    #[tokio::test]
    async fn test_config_file_load_invalid_app_name() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join(CONFIG_JSON);
        let json = r#"{
            "app_name": "wrong_app",
            "config_version": 1,
            "school_address": "Somewhere",
            "school_phone": "123"
        }"#;
        utils::write(&config_path, json).await.unwrap();

        let result = ConfigFile::load(&config_path).await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Invalid app_name"));
    }

    #[tokio::test]
    async fn test_config_invalid_api_base() {
        let temp_dir = TempDir::new().unwrap();
        let json = r#"{
            "app_name": "receipts",
            "config_version": 1,
            "school_address": "Somewhere",
            "school_phone": "123",
            "api_base": "not a url"
        }"#;
        utils::write(&temp_dir.path().join(CONFIG_JSON), json)
            .await
            .unwrap();
        assert!(Config::load(temp_dir.path()).await.is_err());
    }

    #[test]
    fn test_config_file_serialization_omits_none_fields() {
        let json = serde_json::to_string(&ConfigFile::default()).unwrap();
        assert!(!json.contains("output_dir"));
        assert!(!json.contains("text_model"));
        assert!(!json.contains("api_base"));
    }
}
