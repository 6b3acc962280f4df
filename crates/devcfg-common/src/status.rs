//! Listener status snapshots.

use std::fmt;
use std::net::SocketAddr;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// What a listener serves to its client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerKind {
    /// Interactive command console.
    Console,
    /// Raw pass-through to a serial port.
    Bridge,
    /// One-shot HTTP command gateway.
    Http,
}

impl ServerKind {
    /// Short label used in logs and status tables.
    pub fn as_str(&self) -> &'static str {
        match self {
            ServerKind::Console => "console",
            ServerKind::Bridge => "bridge",
            ServerKind::Http => "http",
        }
    }
}

impl fmt::Display for ServerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Not listening.
    Stopped,
    /// Listening, no client.
    Idle,
    /// Listening with one active client.
    Connected,
}

impl ServerState {
    /// Short label used in status tables.
    pub fn as_str(&self) -> &'static str {
        match self {
            ServerState::Stopped => "stopped",
            ServerState::Idle => "idle",
            ServerState::Connected => "connected",
        }
    }
}

/// Snapshot of one listener.
#[derive(Debug, Clone)]
pub struct ServerStatus {
    /// Configured listener name.
    pub name: String,
    /// Handler kind.
    pub kind: ServerKind,
    /// Listening port.
    pub port: u16,
    /// Current state.
    pub state: ServerState,
    /// Remote address of the active client.
    pub remote: Option<SocketAddr>,
    /// When the active client connected.
    pub connected_since: Option<DateTime<Local>>,
}
