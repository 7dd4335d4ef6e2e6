//! Generates tuition fee receipts. Receipts can be edited field by field or generated in batches
//! from a list of student names with Gemini, rendered to SVG and exported as PNG images or as a
//! zip archive of PNG images. The same controller backs the CLI and the MCP server.

pub mod ai;
pub mod args;
pub mod commands;
mod config;
pub mod dashboard;
mod error;
pub mod export;
mod mcp;
pub mod model;
pub mod render;
pub mod store;
mod utils;


pub use config::{Config, InitOptions};
pub use error::{Error, ReceiptError, Result};
pub use utils::parse_names;

/// The environment variable that selects `Mode::Testing` when set and non-empty.
pub const TEST_MODE_ENV: &str = "RECEIPTS_IN_TEST_MODE";

/// Selects which generative AI backend is used.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Talk to the Gemini REST API.
    #[default]
    Gemini,
    /// Use the deterministic in-memory client, without the network.
    Testing,
}

impl Mode {
    /// Returns `Mode::Testing` when `RECEIPTS_IN_TEST_MODE` is set and non-empty, otherwise
    /// `Mode::Gemini`.
    pub fn from_env() -> Self {
        match std::env::var(TEST_MODE_ENV) {
            Ok(value) if !value.is_empty() => Mode::Testing,
            _ => Mode::Gemini,
        }
    }
}
