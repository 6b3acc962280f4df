//! Error types for the runner.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that stop the runner from starting or keep a listener down.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// Socket or file I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file could not be read.
    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        /// Config file path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid YAML for this service.
    #[error("invalid config {path}: {source}")]
    Config {
        /// Config file path.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: serde_yaml::Error,
    },

    /// The configuration is well-formed but unusable.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// The settings store could not be opened.
    #[error("settings error: {0}")]
    Settings(#[from] devcfg_settings::SettingsError),

    /// The serial port could not be opened.
    #[error("serial port {path}: {source}")]
    Serial {
        /// Device path.
        path: String,
        /// Underlying error.
        #[source]
        source: serialport::Error,
    },
}

/// Result type alias for runner operations.
pub type RunnerResult<T> = Result<T, RunnerError>;
