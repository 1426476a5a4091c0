//! Error types for seobatch.
//!
//! Library crates use [`SeoBatchError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all seobatch operations.
#[derive(Debug, thiserror::Error)]
pub enum SeoBatchError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// The URL list file does not exist.
    #[error("input file not found: {}", path.display())]
    MissingInputFile { path: PathBuf },

    /// The URL list is readable but lacks the expected structure.
    #[error("schema error: {message}")]
    Schema { message: String },

    /// CSV or spreadsheet parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Workbook assembly or save error.
    #[error("workbook error: {0}")]
    Workbook(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, SeoBatchError>;

impl SeoBatchError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a schema error from any displayable message.
    pub fn schema(msg: impl Into<String>) -> Self {
        Self::Schema {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
