//! These structs provide the CLI interface for the receipts CLI.

use crate::model::ReceiptField;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::error;
use tracing_subscriber::filter::LevelFilter;

/// receipts: A command-line tool for generating tuition fee receipts.
///
/// The program fills in tuition receipts, optionally asking Google Gemini to synthesize student
/// details from a list of names and Imagen to draw a principal's signature, and exports the
/// receipts as PNG images or as a zip archive of PNG images.
///
/// You will need a Gemini API key in GEMINI_API_KEY for the AI features.
///
/// There is also a mode in which an AI agent, like Claude, can drive the receipt editor through
/// the mcp subcommand.
#[derive(Debug, Parser, Clone)]
pub struct Args {
    #[clap(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    pub fn new(common: Common, command: Command) -> Self {
        Self { common, command }
    }

    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the data directory and initialize the configuration file.
    ///
    /// This is the first command you should run. The school address and phone number you pass
    /// here are printed on every new receipt. By default, the data directory is $HOME/receipts
    /// and exports are written to $HOME/receipts/output.
    Init(InitArgs),
    /// Generate one receipt per student name with AI and export them all as a zip archive.
    Batch(BatchArgs),
    /// Export the default receipt, with any edits, as a single PNG image.
    Single(SingleArgs),
    /// Generate a signature image with AI and save it as a PNG.
    Signature(SignatureArgs),
    /// Run the MCP server over stdio.
    Mcp(McpArgs),
}

/// Arguments common to all subcommands.
#[derive(Debug, Parser, Clone)]
pub struct Common {
    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// This can be overridden by RUST_LOG.
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,

    /// The directory where receipts configuration is held. Defaults to ~/receipts
    #[arg(long, env = "RECEIPTS_HOME", default_value_t = default_receipts_home())]
    receipts_home: DisplayPath,
}

impl Common {
    pub fn new(log_level: LevelFilter, receipts_home: PathBuf) -> Self {
        Self {
            log_level,
            receipts_home: receipts_home.into(),
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn receipts_home(&self) -> &DisplayPath {
        &self.receipts_home
    }
}

/// (Not shown): Args for the `receipts init` command.
#[derive(Debug, Parser, Clone, Default)]
pub struct InitArgs {
    /// The school address printed at the top of each receipt.
    #[arg(long)]
    school_address: Option<String>,

    /// The school phone number printed below the address.
    #[arg(long)]
    school_phone: Option<String>,

    /// Where exported receipts are written. Relative paths are resolved against the data
    /// directory.
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

impl InitArgs {
    pub fn new(
        school_address: Option<String>,
        school_phone: Option<String>,
        output_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            school_address,
            school_phone,
            output_dir,
        }
    }

    pub fn school_address(&self) -> Option<&str> {
        self.school_address.as_deref()
    }

    pub fn school_phone(&self) -> Option<&str> {
        self.school_phone.as_deref()
    }

    pub fn output_dir(&self) -> Option<&Path> {
        self.output_dir.as_deref()
    }
}

/// (Not shown): Args for the `receipts batch` command.
#[derive(Debug, Parser, Clone, Default)]
pub struct BatchArgs {
    /// A file with one student name per line. Blank lines are ignored.
    #[arg(long, conflicts_with = "name")]
    names_file: Option<PathBuf>,

    /// A student name. Repeat for more students.
    #[arg(long)]
    name: Vec<String>,

    /// An image file to print as the school logo.
    #[arg(long)]
    logo: Option<PathBuf>,

    /// Do not generate a signature; the receipts show a placeholder instead.
    #[arg(long)]
    no_signature: bool,
}

impl BatchArgs {
    pub fn new(
        names_file: Option<PathBuf>,
        name: Vec<String>,
        logo: Option<PathBuf>,
        no_signature: bool,
    ) -> Self {
        Self {
            names_file,
            name,
            logo,
            no_signature,
        }
    }

    pub fn names_file(&self) -> Option<&Path> {
        self.names_file.as_deref()
    }

    pub fn names(&self) -> &[String] {
        &self.name
    }

    pub fn logo(&self) -> Option<&Path> {
        self.logo.as_deref()
    }

    pub fn no_signature(&self) -> bool {
        self.no_signature
    }
}

/// (Not shown): Args for the `receipts single` command.
#[derive(Debug, Parser, Clone, Default)]
pub struct SingleArgs {
    /// Set a field of the receipt, e.g. --set studentName="Ananya Rao" --set amount=25000.
    /// Repeat for more fields.
    #[arg(long = "set", value_name = "FIELD=VALUE")]
    sets: Vec<FieldValue>,

    /// An image file to print as the school logo.
    #[arg(long)]
    logo: Option<PathBuf>,

    /// Do not generate a signature; the receipt shows a placeholder instead.
    #[arg(long)]
    no_signature: bool,
}

impl SingleArgs {
    pub fn new(sets: Vec<FieldValue>, logo: Option<PathBuf>, no_signature: bool) -> Self {
        Self {
            sets,
            logo,
            no_signature,
        }
    }

    pub fn sets(&self) -> &[FieldValue] {
        &self.sets
    }

    pub fn logo(&self) -> Option<&Path> {
        self.logo.as_deref()
    }

    pub fn no_signature(&self) -> bool {
        self.no_signature
    }
}

/// (Not shown): Args for the `receipts signature` command.
#[derive(Debug, Parser, Clone, Default)]
pub struct SignatureArgs {
    /// Where to save the signature. Defaults to signature.png in the output directory.
    #[arg(long)]
    out: Option<PathBuf>,
}

impl SignatureArgs {
    pub fn new(out: Option<PathBuf>) -> Self {
        Self { out }
    }

    pub fn out(&self) -> Option<&Path> {
        self.out.as_deref()
    }
}

/// (Not shown): Args for the `receipts mcp` command.
#[derive(Debug, Parser, Clone, Default)]
pub struct McpArgs {}

/// A `field=value` pair for editing a receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldValue {
    field: ReceiptField,
    value: String,
}

impl FieldValue {
    pub fn new(field: ReceiptField, value: impl Into<String>) -> Self {
        Self {
            field,
            value: value.into(),
        }
    }

    pub fn field(&self) -> ReceiptField {
        self.field
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl FromStr for FieldValue {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (field, value) = s
            .split_once('=')
            .ok_or_else(|| format!("Expected FIELD=VALUE, got '{s}'"))?;
        let field = ReceiptField::from_str(field.trim())
            .map_err(|_| format!("Unknown receipt field '{}'", field.trim()))?;
        Ok(Self::new(field, value))
    }
}

fn default_receipts_home() -> DisplayPath {
    DisplayPath(match dirs::home_dir() {
        Some(home) => home.join("receipts"),
        None => {
            error!(
                "There was an error when trying to get your home directory. You can get around \
                this by providing --receipts-home or RECEIPTS_HOME instead of relying on the \
                default receipts home directory. If you continue using the program right now, you \
                may have problems!",
            );
            PathBuf::from("receipts")
        }
    })
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DisplayPath(PathBuf);

impl From<PathBuf> for DisplayPath {
    fn from(value: PathBuf) -> Self {
        DisplayPath(value)
    }
}

impl Deref for DisplayPath {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<Path> for DisplayPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Display for DisplayPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_string_lossy())
    }
}

impl FromStr for DisplayPath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(PathBuf::from(s)))
    }
}

impl DisplayPath {
    pub fn new(path: PathBuf) -> Self {
        Self(path)
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}
