//! Credential slot definitions.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Default number of credential slots.
pub const DEFAULT_SLOT_COUNT: u8 = 8;

/// Largest slot count a namespace may be configured with.
pub const MAX_SLOT_COUNT: u8 = 32;

/// Maximum identifier (ssid) length in bytes.
pub const MAX_SSID_LEN: usize = 31;

/// Maximum secret (pass) length in bytes.
pub const MAX_PASS_LEN: usize = 63;

/// Separator joining ssid and pass in a ring record.
const RECORD_SEPARATOR: char = '\t';

/// One field of a credential slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotField {
    /// Network identifier.
    Ssid,
    /// Network secret.
    Pass,
}

impl SlotField {
    /// Protocol/key name of the field.
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotField::Ssid => "ssid",
            SlotField::Pass => "pass",
        }
    }

    /// Maximum length of the field in bytes.
    pub fn max_len(&self) -> usize {
        match self {
            SlotField::Ssid => MAX_SSID_LEN,
            SlotField::Pass => MAX_PASS_LEN,
        }
    }
}

impl fmt::Display for SlotField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How credential slots are laid out in the namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotLayout {
    /// `ssid<i>` and `pass<i>` stored as independent keys.
    #[default]
    Fields,
    /// `wifi<i>` holding `ssid<TAB>pass`, written at a rolling cursor.
    Ring,
}

/// Key holding the rolling write cursor.
pub(crate) const CURSOR_KEY: &str = "index";

pub(crate) fn field_key(field: SlotField, index: u8) -> String {
    format!("{}{}", field.as_str(), index)
}

pub(crate) fn record_key(index: u8) -> String {
    format!("wifi{}", index)
}

/// Split a ring record into (ssid, pass).
pub(crate) fn split_record(record: &str) -> (&str, &str) {
    record.split_once(RECORD_SEPARATOR).unwrap_or((record, ""))
}

pub(crate) fn join_record(ssid: &str, pass: &str) -> String {
    format!("{}{}{}", ssid, RECORD_SEPARATOR, pass)
}

pub(crate) fn contains_separator(value: &str) -> bool {
    value.contains(RECORD_SEPARATOR)
}
