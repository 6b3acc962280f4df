//! devcfg console protocol
//!
//! This crate turns lines of text typed into the device console into calls
//! on the settings store. The protocol is plain text:
//!
//! - **Commands** (client → device): text lines terminated by CR and/or LF
//! - **Responses** (device → client): free-form text lines; setters print
//!   nothing on success
//!
//! # Command Structure
//!
//! Commands have two levels, a root and a sub-command:
//!
//! - `sys boot`, `sys boot=AP`, `sys reboot`, `sys erase all`
//! - `wifi list`, `wifi add 0 ssid=home`, `wifi erase 0`
//! - `net hostname=bench`, `net APname`, `net mac`, `net info`, `net status`
//! - `uart baud`, `uart baud=115200`
//! - `bye`, `help`, `?`
//!
//! # Example
//!
//! ```rust,ignore
//! use devcfg_cli_protocol::{Commander, CommandContext, Disposition};
//!
//! let commander = Commander::new();
//! let mut out = Vec::new();
//! let disposition = commander.process(&mut out, &mut ctx, "wifi list")?;
//! assert_eq!(disposition, Disposition::Continue);
//! ```

mod codec;
mod commander;
mod commands;
mod error;
mod handlers;
mod responses;
mod table;

pub use codec::*;
pub use commander::*;
pub use commands::*;
pub use error::*;
pub use responses::*;
pub use table::*;
