//! Device identity types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CommonError;

// ============================================================================
// Hardware Address
// ============================================================================

/// A 48-bit hardware (MAC) address.
///
/// Displayed in the usual colon-separated upper-case form
/// (`24:6F:28:A1:B2:C3`). Serialized as that same string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    /// Create an address from raw bytes.
    pub const fn new(bytes: [u8; 6]) -> Self {
        MacAddress(bytes)
    }

    /// Raw address bytes.
    pub fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// Upper-case hex of the last `count` bytes with no separators.
    ///
    /// Used to build device-unique default names, e.g. `A1B2C3` for the
    /// last three bytes.
    pub fn suffix(&self, count: usize) -> String {
        let count = count.min(self.0.len());
        hex::encode_upper(&self.0[self.0.len() - count..])
    }
}

impl Default for MacAddress {
    fn default() -> Self {
        // Locally administered, unicast.
        MacAddress([0x02, 0x00, 0x00, 0x00, 0x00, 0x01])
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

impl FromStr for MacAddress {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits: String = s
            .chars()
            .filter(|c| !matches!(c, ':' | '-' | '.'))
            .collect();
        let bytes = hex::decode(&digits).map_err(|_| CommonError::InvalidMac(s.to_string()))?;
        let bytes: [u8; 6] = bytes
            .try_into()
            .map_err(|_| CommonError::InvalidMac(s.to_string()))?;
        Ok(MacAddress(bytes))
    }
}

impl TryFrom<String> for MacAddress {
    type Error = CommonError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MacAddress> for String {
    fn from(mac: MacAddress) -> Self {
        mac.to_string()
    }
}

// ============================================================================
// Boot Mode
// ============================================================================

/// Network mode the device brings up on the next boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BootMode {
    /// Join a stored network as a station.
    #[default]
    #[serde(rename = "STA")]
    Station,
    /// Run a local access point.
    #[serde(rename = "AP")]
    AccessPoint,
}

impl BootMode {
    /// Protocol text for this mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            BootMode::Station => "STA",
            BootMode::AccessPoint => "AP",
        }
    }

    /// Persisted representation (`true` = access point).
    pub fn as_flag(&self) -> bool {
        matches!(self, BootMode::AccessPoint)
    }

    /// Inverse of [`BootMode::as_flag`].
    pub fn from_flag(ap: bool) -> Self {
        if ap {
            BootMode::AccessPoint
        } else {
            BootMode::Station
        }
    }
}

impl fmt::Display for BootMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BootMode {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AP" => Ok(BootMode::AccessPoint),
            "STA" => Ok(BootMode::Station),
            _ => Err(CommonError::InvalidBootMode(s.to_string())),
        }
    }
}
