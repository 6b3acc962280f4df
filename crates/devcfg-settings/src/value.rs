//! Stored value type.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A value held in the settings namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    /// Boolean value.
    Bool(bool),
    /// Unsigned integer value.
    UInt(u32),
    /// UTF-8 string value.
    String(String),
}

impl SettingValue {
    /// Borrow as a string if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            SettingValue::String(v) => Some(v),
            _ => None,
        }
    }

    /// Convert to bool if this is a bool value.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SettingValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Convert to u32 if this is an integer value.
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            SettingValue::UInt(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingValue::Bool(v) => write!(f, "{}", v),
            SettingValue::UInt(v) => write!(f, "{}", v),
            SettingValue::String(v) => write!(f, "{}", v),
        }
    }
}

impl From<&str> for SettingValue {
    fn from(v: &str) -> Self {
        SettingValue::String(v.to_string())
    }
}

impl From<bool> for SettingValue {
    fn from(v: bool) -> Self {
        SettingValue::Bool(v)
    }
}

impl From<u32> for SettingValue {
    fn from(v: u32) -> Self {
        SettingValue::UInt(v)
    }
}
