//! Persistent settings store for devcfg.
//!
//! Settings live in a single flat namespace of a preferences-style
//! key-value backend. On top of plain typed get/set this crate owns:
//!
//! - **Defaulting**: absent keys resolve to a caller-supplied default, and
//!   the hostname / access-point name fall back to a name derived from the
//!   hardware address.
//! - **Credential slots**: a fixed number of (ssid, pass) pairs addressed by
//!   index, with length limits enforced before anything is written.
//! - **Erase-all**: wiping the whole namespace in one call.
//!
//! Setters are best-effort: they return `0`/`false` when nothing was
//! written and never panic on bad input.
//!
//! # Example
//!
//! ```rust
//! use devcfg_common::MacAddress;
//! use devcfg_settings::{MemoryBackend, Settings, SettingsConfig, SlotField};
//!
//! let mut settings = Settings::open(
//!     Box::new(MemoryBackend::new()),
//!     SettingsConfig::default(),
//!     MacAddress::default(),
//! ).unwrap();
//!
//! assert!(settings.set_slot_field(2, SlotField::Ssid, "home") > 0);
//! assert_eq!(settings.get_slot_field(2, SlotField::Ssid), "home");
//! assert_eq!(settings.get_slot_field(8, SlotField::Ssid), "");
//! ```

mod backend;
mod error;
mod slots;
mod store;
mod value;

pub use backend::*;
pub use error::*;
pub use slots::*;
pub use store::*;
pub use value::*;
