//! CLI command implementations.

pub mod rewrite;
pub mod submit;

use clap::ValueEnum;
use serde_json::Value;
use thiserror::Error;

/// Output format for JSON documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Format {
    /// Indented JSON.
    #[default]
    Pretty,
    /// Single-line JSON.
    Compact,
}

impl Format {
    /// Renders `value` in this format.
    pub fn render(self, value: &Value) -> Result<String, serde_json::Error> {
        match self {
            Format::Pretty => serde_json::to_string_pretty(value),
            Format::Compact => serde_json::to_string(value),
        }
    }
}

/// Errors reported by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// The input file could not be read.
    #[error("cannot read {path}: {source}")]
    Read {
        /// Path that was read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A command-line argument is malformed.
    #[error("invalid argument: {0}")]
    Argument(String),

    /// The bundle was processed and failed; the OperationOutcome has
    /// already been printed.
    #[error("bundle failed with status {status}")]
    BundleFailed {
        /// HTTP status of the failure.
        status: u16,
    },

    /// JSON parsing or rendering failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub(crate) fn read_file(path: &std::path::Path) -> Result<String, CliError> {
    std::fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.display().to_string(),
        source,
    })
}
