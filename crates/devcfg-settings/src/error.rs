//! Error types for the settings store.

use std::path::PathBuf;

use thiserror::Error;

/// Errors reported by a settings backend.
///
/// Validation failures never show up here; the store reports those as a
/// `0`/`false` return. These errors mean the persistence layer itself
/// misbehaved.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// I/O error reading or writing the backing file.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File being accessed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The backing file does not hold a valid namespace document.
    #[error("corrupt settings namespace {path}: {source}")]
    Corrupt {
        /// File being parsed.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },

    /// Serializing the namespace failed.
    #[error("failed to encode settings: {0}")]
    Encode(#[from] serde_json::Error),

    /// The backend refused the write.
    #[error("backend rejected write of key '{0}'")]
    WriteRejected(String),

    /// Slot count of zero was configured.
    #[error("slot count must be between 1 and {max}, got {actual}")]
    InvalidSlotCount { max: u8, actual: u8 },
}

/// Result type alias for settings operations.
pub type SettingsResult<T> = Result<T, SettingsError>;
