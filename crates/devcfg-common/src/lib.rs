//! Common types for the devcfg configuration service.
//!
//! This crate holds the pieces shared by every other devcfg crate:
//!
//! - [`MacAddress`] and [`BootMode`] - device identity and boot selection
//! - [`NetworkStack`] - the live network stack the console talks to
//! - [`SystemControl`] - the irreversible restart primitive
//! - [`ServerStatus`] - a snapshot of one listener, shown by `net status`

mod device;
mod error;
mod network;
mod status;
mod system;

pub use device::*;
pub use error::*;
pub use network::*;
pub use status::*;
pub use system::*;
