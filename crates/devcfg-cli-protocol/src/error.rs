//! Error types for the console protocol.

use thiserror::Error;

/// Errors raised while building a command table.
///
/// Running commands never fails with a `CliError`; bad input is answered
/// with a diagnostic on the console instead.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CliError {
    /// A leaf command appears before any root command.
    #[error("leaf command '{0}' has no root command")]
    OrphanLeaf(String),

    /// An entry with empty command text.
    #[error("command table entry {0} has empty text")]
    EmptyCommand(usize),

    /// A shorter entry is listed before a longer one sharing its prefix
    /// and would swallow its invocations.
    #[error("command '{shadowed}' is unreachable behind earlier '{earlier}'")]
    ShadowedCommand { earlier: String, shadowed: String },
}

/// Result type alias for console protocol operations.
pub type CliResult<T> = Result<T, CliError>;
