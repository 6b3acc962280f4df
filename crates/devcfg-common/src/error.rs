//! Error types shared across devcfg crates.

use thiserror::Error;

/// Errors produced while parsing common device types.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommonError {
    /// Hardware address text could not be parsed.
    #[error("invalid hardware address: {0}")]
    InvalidMac(String),

    /// Boot mode text was neither `AP` nor `STA`.
    #[error("invalid boot mode: {0}")]
    InvalidBootMode(String),
}
