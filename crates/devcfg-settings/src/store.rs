//! The settings store.

use devcfg_common::{BootMode, MacAddress};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::backend::{KvBackend, KvWrite};
use crate::error::{SettingsError, SettingsResult};
use crate::slots::{
    contains_separator, field_key, join_record, record_key, split_record, SlotField, SlotLayout,
    CURSOR_KEY, DEFAULT_SLOT_COUNT, MAX_SLOT_COUNT,
};
use crate::value::SettingValue;

/// Maximum key length accepted by the backend.
pub const MAX_KEY_LEN: usize = 15;

/// Maximum string value length accepted by the backend.
pub const MAX_STRING_LEN: usize = 4000;

/// Maximum hostname / access-point name length.
pub const MAX_NAME_LEN: usize = 32;

/// Default bridge baud rate.
pub const DEFAULT_UART_BAUD: u32 = 230_400;

/// Accepted bridge baud rates.
pub const UART_BAUD_RANGE: std::ops::RangeInclusive<u32> = 300..=5_000_000;

const KEY_HOSTNAME: &str = "hostname";
const KEY_AP_NAME: &str = "APname";
const KEY_BOOT: &str = "boot";
const KEY_BAUD: &str = "baud";

/// Hardware address bytes used for derived names.
const NAME_SUFFIX_BYTES: usize = 3;

/// Static configuration of a settings namespace.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsConfig {
    /// Number of credential slots.
    pub slot_count: u8,
    /// Slot storage layout.
    pub layout: SlotLayout,
    /// Prefix of the derived default hostname.
    pub hostname_prefix: String,
    /// Prefix of the derived default access-point name.
    pub ap_name_prefix: String,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        SettingsConfig {
            slot_count: DEFAULT_SLOT_COUNT,
            layout: SlotLayout::Fields,
            hostname_prefix: "esp32-".to_string(),
            ap_name_prefix: "ESP32-AP-".to_string(),
        }
    }
}

/// Bounded, persistent settings over a [`KvBackend`].
///
/// Opened once at startup and lent to whoever needs it; nothing else holds
/// a handle to the namespace.
pub struct Settings {
    backend: Box<dyn KvBackend>,
    config: SettingsConfig,
    mac: MacAddress,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("config", &self.config)
            .field("mac", &self.mac)
            .field("keys", &self.backend.keys().len())
            .finish()
    }
}

impl Settings {
    /// Open the store over `backend`.
    ///
    /// `mac` is the hardware identity used to derive default names.
    pub fn open(
        backend: Box<dyn KvBackend>,
        config: SettingsConfig,
        mac: MacAddress,
    ) -> SettingsResult<Self> {
        if config.slot_count == 0 || config.slot_count > MAX_SLOT_COUNT {
            return Err(SettingsError::InvalidSlotCount {
                max: MAX_SLOT_COUNT,
                actual: config.slot_count,
            });
        }
        debug!(
            slots = config.slot_count,
            layout = ?config.layout,
            keys = backend.keys().len(),
            "settings opened"
        );
        Ok(Settings {
            backend,
            config,
            mac,
        })
    }

    /// Namespace configuration.
    pub fn config(&self) -> &SettingsConfig {
        &self.config
    }

    /// Keys currently stored.
    pub fn keys(&self) -> Vec<String> {
        self.backend.keys()
    }

    // ========================================================================
    // Typed Accessors
    // ========================================================================

    /// Stored string, or `default` if absent or not a string.
    pub fn get_string(&self, key: &str, default: &str) -> String {
        self.backend
            .get(key)
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| default.to_string())
    }

    /// Store a string. Returns bytes written including the stored
    /// terminator, or 0 if nothing was written.
    pub fn set_string(&mut self, key: &str, value: &str) -> usize {
        if !valid_key(key) || value.len() > MAX_STRING_LEN {
            debug!(key, len = value.len(), "rejected string write");
            return 0;
        }
        if self.put(key, SettingValue::from(value)) {
            value.len() + 1
        } else {
            0
        }
    }

    /// Stored bool, or `default`.
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.backend
            .get(key)
            .and_then(|v| v.as_bool())
            .unwrap_or(default)
    }

    /// Store a bool.
    pub fn set_bool(&mut self, key: &str, value: bool) -> bool {
        valid_key(key) && self.put(key, SettingValue::Bool(value))
    }

    /// Stored unsigned integer, or `default`.
    pub fn get_uint(&self, key: &str, default: u32) -> u32 {
        self.backend
            .get(key)
            .and_then(|v| v.as_u32())
            .unwrap_or(default)
    }

    /// Store an unsigned integer.
    pub fn set_uint(&mut self, key: &str, value: u32) -> bool {
        valid_key(key) && self.put(key, SettingValue::UInt(value))
    }

    /// Remove one key. Returns false only on backend failure.
    pub fn remove(&mut self, key: &str) -> bool {
        match self.backend.remove(key) {
            Ok(()) => true,
            Err(e) => {
                warn!(key, error = %e, "settings remove failed");
                false
            }
        }
    }

    /// Wipe the entire namespace: every setting and every slot.
    pub fn erase_all(&mut self) -> bool {
        match self.backend.clear() {
            Ok(()) => {
                debug!("settings namespace erased");
                true
            }
            Err(e) => {
                warn!(error = %e, "settings erase failed");
                false
            }
        }
    }

    fn batch(&mut self, writes: Vec<KvWrite>) -> bool {
        match self.backend.write_batch(writes) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "settings batch write failed");
                false
            }
        }
    }

    fn put(&mut self, key: &str, value: SettingValue) -> bool {
        match self.backend.put(key, value) {
            Ok(()) => true,
            Err(e) => {
                warn!(key, error = %e, "settings write failed");
                false
            }
        }
    }

    // ========================================================================
    // Credential Slots
    // ========================================================================

    /// Number of credential slots.
    pub fn slot_count(&self) -> u8 {
        self.config.slot_count
    }

    /// Read one field of a slot. Empty if unset or `index` is out of range.
    pub fn get_slot_field(&self, index: u8, field: SlotField) -> String {
        if index >= self.slot_count() {
            return String::new();
        }
        match self.config.layout {
            SlotLayout::Fields => self.get_string(&field_key(field, index), ""),
            SlotLayout::Ring => {
                let record = self.get_string(&record_key(index), "");
                let (ssid, pass) = split_record(&record);
                match field {
                    SlotField::Ssid => ssid.to_string(),
                    SlotField::Pass => pass.to_string(),
                }
            }
        }
    }

    /// Write one field of a slot.
    ///
    /// Returns 0 and leaves the slot untouched if `index` is out of range
    /// or `value` is longer than the field allows.
    pub fn set_slot_field(&mut self, index: u8, field: SlotField, value: &str) -> usize {
        if index >= self.slot_count() || value.len() > field.max_len() {
            return 0;
        }
        match self.config.layout {
            SlotLayout::Fields => self.set_string(&field_key(field, index), value),
            SlotLayout::Ring => {
                if contains_separator(value) {
                    return 0;
                }
                let (ssid, pass) = match field {
                    SlotField::Ssid => (value.to_string(), self.get_slot_field(index, SlotField::Pass)),
                    SlotField::Pass => (self.get_slot_field(index, SlotField::Ssid), value.to_string()),
                };
                self.set_string(&record_key(index), &join_record(&ssid, &pass))
            }
        }
    }

    /// Clear both fields of a slot.
    pub fn clear_slot(&mut self, index: u8) -> bool {
        if index >= self.slot_count() {
            return false;
        }
        match self.config.layout {
            SlotLayout::Fields => self.batch(vec![
                KvWrite::Remove(field_key(SlotField::Ssid, index)),
                KvWrite::Remove(field_key(SlotField::Pass, index)),
            ]),
            SlotLayout::Ring => self.remove(&record_key(index)),
        }
    }

    /// Slot the next [`Settings::push_slot`] will write.
    pub fn slot_cursor(&self) -> u8 {
        let cursor = self.get_uint(CURSOR_KEY, 0) % u32::from(self.slot_count());
        cursor as u8
    }

    /// Write a full credential pair at the rolling cursor and advance it,
    /// wrapping to 0 after the last slot. Once every slot is used this
    /// overwrites the oldest entry.
    ///
    /// The pair and the cursor are written together. Returns 0 if either
    /// field is too long or the write fails; then nothing changes.
    pub fn push_slot(&mut self, ssid: &str, pass: &str) -> usize {
        if ssid.len() > SlotField::Ssid.max_len() || pass.len() > SlotField::Pass.max_len() {
            return 0;
        }
        let index = self.slot_cursor();
        let next = (u32::from(index) + 1) % u32::from(self.slot_count());
        let (mut writes, written) = match self.config.layout {
            SlotLayout::Fields => (
                vec![
                    KvWrite::Put(field_key(SlotField::Ssid, index), SettingValue::from(ssid)),
                    KvWrite::Put(field_key(SlotField::Pass, index), SettingValue::from(pass)),
                ],
                ssid.len() + 1 + pass.len() + 1,
            ),
            SlotLayout::Ring => {
                if contains_separator(ssid) || contains_separator(pass) {
                    return 0;
                }
                let record = join_record(ssid, pass);
                let written = record.len() + 1;
                (vec![KvWrite::Put(record_key(index), SettingValue::from(record.as_str()))], written)
            }
        };
        writes.push(KvWrite::Put(CURSOR_KEY.to_string(), SettingValue::UInt(next)));
        if self.batch(writes) {
            written
        } else {
            0
        }
    }

    // ========================================================================
    // Derived Settings
    // ========================================================================

    /// Next-boot network mode.
    pub fn boot_mode(&self) -> BootMode {
        BootMode::from_flag(self.get_bool(KEY_BOOT, BootMode::Station.as_flag()))
    }

    /// Store the next-boot network mode.
    pub fn set_boot_mode(&mut self, mode: BootMode) -> bool {
        self.set_bool(KEY_BOOT, mode.as_flag())
    }

    /// Hostname explicitly stored, if any.
    pub fn stored_hostname(&self) -> Option<String> {
        self.stored_name(KEY_HOSTNAME)
    }

    /// Hostname to use: the stored one, or `<prefix><mac suffix>`.
    pub fn hostname(&self) -> String {
        self.stored_hostname()
            .unwrap_or_else(|| self.derived_name(&self.config.hostname_prefix))
    }

    /// Store a hostname (at most 32 bytes).
    pub fn set_hostname(&mut self, name: &str) -> usize {
        if name.len() > MAX_NAME_LEN {
            return 0;
        }
        self.set_string(KEY_HOSTNAME, name)
    }

    /// Access-point name explicitly stored, if any.
    pub fn stored_ap_name(&self) -> Option<String> {
        self.stored_name(KEY_AP_NAME)
    }

    /// Access-point name to use: the stored one, or `<prefix><mac suffix>`.
    pub fn ap_name(&self) -> String {
        self.stored_ap_name()
            .unwrap_or_else(|| self.derived_name(&self.config.ap_name_prefix))
    }

    /// Store an access-point name (at most 32 bytes).
    pub fn set_ap_name(&mut self, name: &str) -> usize {
        if name.len() > MAX_NAME_LEN {
            return 0;
        }
        self.set_string(KEY_AP_NAME, name)
    }

    /// Bridge baud rate.
    pub fn uart_baud(&self) -> u32 {
        self.get_uint(KEY_BAUD, DEFAULT_UART_BAUD)
    }

    /// Store the bridge baud rate. Rates outside
    /// [`UART_BAUD_RANGE`] are rejected.
    pub fn set_uart_baud(&mut self, baud: u32) -> bool {
        UART_BAUD_RANGE.contains(&baud) && self.set_uint(KEY_BAUD, baud)
    }

    fn stored_name(&self, key: &str) -> Option<String> {
        let name = self.get_string(key, "");
        (!name.is_empty()).then_some(name)
    }

    fn derived_name(&self, prefix: &str) -> String {
        format!("{}{}", prefix, self.mac.suffix(NAME_SUFFIX_BYTES))
    }
}

fn valid_key(key: &str) -> bool {
    !key.is_empty() && key.len() <= MAX_KEY_LEN
}
