//! Runner configuration.
//!
//! Configuration is a YAML document; every field has a default so an empty
//! file (or no file at all) yields a working console on port 2300.
//!
//! ```yaml
//! bind: 0.0.0.0
//! mac: "24:6F:28:A1:B2:C3"
//! storage:
//!   dir: ./devcfg-data
//!   namespace: settings
//! settings:
//!   slot_count: 8
//!   layout: fields
//! listeners:
//!   - { name: telnet, port: 2300, kind: console }
//!   - { name: uart, port: 2323, kind: bridge }
//!   - { name: web, port: 8080, kind: http }
//! serial:
//!   path: /dev/ttyUSB0
//! reboot_delay_secs: 5
//! help_policy: full
//! ```

use std::collections::HashSet;
use std::fs;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use devcfg_cli_protocol::{CommanderConfig, HelpPolicy};
use devcfg_common::{MacAddress, ServerKind};
use devcfg_settings::SettingsConfig;
use serde::{Deserialize, Serialize};

use crate::error::{RunnerError, RunnerResult};

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "devcfg", version, about = "Device configuration console")]
pub struct Cli {
    /// YAML configuration file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory holding the settings namespace (overrides the config file).
    #[arg(long)]
    pub settings: Option<PathBuf>,

    /// Address to bind listeners on (overrides the config file).
    #[arg(long)]
    pub bind: Option<IpAddr>,

    /// Serial device for the bridge (overrides the config file).
    #[arg(long)]
    pub serial: Option<String>,

    /// Log filter, e.g. `info` or `devcfg_runner=debug`.
    #[arg(long, default_value = "info")]
    pub log: String,

    /// Address for the Prometheus exporter.
    #[cfg(feature = "prometheus")]
    #[arg(long)]
    pub metrics: Option<std::net::SocketAddr>,
}

/// Where the settings namespace lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory of the namespace document.
    pub dir: PathBuf,
    /// Namespace name; the document is `<dir>/<namespace>.json`.
    pub namespace: String,
    /// Keep settings in memory only.
    pub volatile: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            dir: PathBuf::from("devcfg-data"),
            namespace: "settings".to_string(),
            volatile: false,
        }
    }
}

/// One TCP listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenerConfig {
    /// Name used in logs and `net status`.
    pub name: String,
    /// TCP port; 0 picks an ephemeral port.
    pub port: u16,
    /// What the listener serves.
    pub kind: ServerKind,
}

impl ListenerConfig {
    /// Create a listener entry.
    pub fn new(name: impl Into<String>, port: u16, kind: ServerKind) -> Self {
        ListenerConfig {
            name: name.into(),
            port,
            kind,
        }
    }
}

/// Serial port behind the bridge listener.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Device path.
    pub path: String,
}

impl Default for SerialConfig {
    fn default() -> Self {
        SerialConfig {
            path: if cfg!(windows) { "COM1" } else { "/dev/ttyUSB0" }.to_string(),
        }
    }
}

/// Full runner configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Address listeners bind to.
    pub bind: IpAddr,
    /// Hardware address reported by `net mac` and used for default names.
    pub mac: MacAddress,
    /// Address reported by `net info`.
    pub local_ip: IpAddr,
    /// Settings namespace location.
    pub storage: StorageConfig,
    /// Settings namespace shape.
    pub settings: SettingsConfig,
    /// Listeners to run.
    pub listeners: Vec<ListenerConfig>,
    /// Serial port for bridge listeners.
    pub serial: SerialConfig,
    /// Delay between announcing a reboot and performing it.
    pub reboot_delay_secs: u64,
    /// Help listing scope for rejected commands.
    pub help_policy: HelpPolicy,
    /// Main loop period.
    pub poll_interval_ms: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            mac: MacAddress::default(),
            local_ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
            storage: StorageConfig::default(),
            settings: SettingsConfig::default(),
            listeners: vec![
                ListenerConfig::new("telnet", 2300, ServerKind::Console),
                ListenerConfig::new("uart", 2323, ServerKind::Bridge),
                ListenerConfig::new("web", 8080, ServerKind::Http),
            ],
            serial: SerialConfig::default(),
            reboot_delay_secs: 5,
            help_policy: HelpPolicy::Full,
            poll_interval_ms: 10,
        }
    }
}

impl DeviceConfig {
    /// Load configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> RunnerResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| RunnerError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text).map_err(|source| RunnerError::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse configuration from YAML text. Empty text yields the defaults.
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        if text.trim().is_empty() {
            return Ok(DeviceConfig::default());
        }
        serde_yaml::from_str(text)
    }

    /// Apply command-line overrides.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(dir) = &cli.settings {
            self.storage.dir = dir.clone();
        }
        if let Some(bind) = cli.bind {
            self.bind = bind;
        }
        if let Some(serial) = &cli.serial {
            self.serial.path = serial.clone();
        }
    }

    /// Check the configuration for conflicts.
    pub fn validate(&self) -> RunnerResult<()> {
        let mut names = HashSet::new();
        let mut ports = HashSet::new();
        for listener in &self.listeners {
            if !names.insert(listener.name.as_str()) {
                return Err(RunnerError::InvalidConfig(format!(
                    "duplicate listener name '{}'",
                    listener.name
                )));
            }
            if listener.port != 0 && !ports.insert(listener.port) {
                return Err(RunnerError::InvalidConfig(format!(
                    "port {} used by more than one listener",
                    listener.port
                )));
            }
        }
        if self.poll_interval_ms == 0 {
            return Err(RunnerError::InvalidConfig(
                "poll_interval_ms must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Command interpreter settings.
    pub fn commander_config(&self) -> CommanderConfig {
        CommanderConfig {
            help_policy: self.help_policy,
            reboot_delay: Duration::from_secs(self.reboot_delay_secs),
        }
    }

    /// Main loop period.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
