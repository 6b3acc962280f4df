//! devcfg runner
//!
//! Hosts the device configuration console: a settings store, a command
//! interpreter and a set of single-client TCP listeners, all driven from
//! one cooperative polling loop.
//!
//! Three listener kinds are available:
//!
//! - **console**: interactive line-based command shell (telnet)
//! - **bridge**: raw pass-through to a serial port
//! - **http**: one command per request, `GET /'wifi list'`

pub mod bridge;
pub mod config;
pub mod device;
pub mod error;
pub mod http;
pub mod interactive;
pub mod runner;
pub mod server;

pub use config::{Cli, DeviceConfig, ListenerConfig};
pub use device::{Device, ProcessRestart};
pub use error::{RunnerError, RunnerResult};
pub use runner::{Listener, Runner};
pub use server::{Connection, ConnectionHandler, ConnectionManager, HandlerAction, LifecycleEvent};
