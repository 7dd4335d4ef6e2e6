use crate::args::InitArgs;
use crate::commands::Out;
use crate::{Config, InitOptions, Result};
use anyhow::Context;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Where `init` put things.
#[derive(Debug, Clone, Serialize)]
pub struct InitSummary {
    pub config_path: PathBuf,
    pub output_dir: PathBuf,
}

/// Creates the data directory, the initial `config.json` and the output directory.
///
/// # Arguments
/// - `receipts_home` - The directory that will be the root of data directory, e.g.
///   `$HOME/receipts`
/// - `args` - Optional school details and output directory. Defaults are used for anything not
///   given.
///
/// # Errors
/// - Returns an error if the config file already exists or if any file operations fail.
pub async fn init(receipts_home: &Path, args: &InitArgs) -> Result<Out<InitSummary>> {
    let options = InitOptions {
        school_address: args.school_address().map(String::from),
        school_phone: args.school_phone().map(String::from),
        output_dir: args.output_dir().map(Path::to_path_buf),
    };
    let config = Config::create(receipts_home, options)
        .await
        .context("Unable to create the data directory and config")?;
    Ok(Out::new(
        "Successfully created the receipts directory and config",
        InitSummary {
            config_path: config.config_path().to_path_buf(),
            output_dir: config.output_dir().to_path_buf(),
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_init() {
        let dir = TempDir::new().unwrap();
        let home = dir.path().join("receipts");
        let args = InitArgs::new(Some("9 Hill Road".to_string()), None, Some("out".into()));

        let out = init(&home, &args).await.unwrap();

        let summary = out.structure().unwrap();
        assert!(summary.config_path.is_file());
        assert!(summary.output_dir.ends_with("out"));
        let config = Config::load(&home).await.unwrap();
        assert_eq!(config.school().address, "9 Hill Road");

        assert!(init(&home, &args).await.is_err());
    }
}
