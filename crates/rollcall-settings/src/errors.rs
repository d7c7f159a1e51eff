//! Settings error types.

use std::path::PathBuf;

use thiserror::Error;

/// Why settings could not be loaded.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file exists but could not be read.
    #[error("cannot read {}: {source}", .path.display())]
    Read {
        /// File that was being read.
        path: PathBuf,
        /// Underlying IO failure.
        source: std::io::Error,
    },

    /// The settings file is not JSON.
    #[error("{} is not valid JSON: {source}", .path.display())]
    Parse {
        /// File that was being parsed.
        path: PathBuf,
        /// Parser failure, with line and column.
        source: serde_json::Error,
    },

    /// The merged document does not fit [`crate::RollcallSettings`]
    /// (for example a string where a port number belongs).
    #[error("settings have the wrong shape: {0}")]
    Shape(#[from] serde_json::Error),

    /// A value parsed but cannot work at runtime.
    #[error("{key} {reason}")]
    Invalid {
        /// Dotted camelCase key, as written in the file.
        key: &'static str,
        /// What is wrong with it.
        reason: &'static str,
    },
}

/// Result type for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;
