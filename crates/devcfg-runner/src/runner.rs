//! Top-level service: the device plus its listeners.

use std::net::SocketAddr;

use devcfg_cli_protocol::Commander;
use devcfg_common::{HostNetwork, ServerKind, ServerStatus};
use devcfg_settings::{FileBackend, KvBackend, MemoryBackend, Settings};
use tracing::{info, warn};

use crate::bridge::{BridgeHandler, SerialPortOpener};
use crate::config::DeviceConfig;
use crate::device::{Device, ProcessRestart};
use crate::error::RunnerResult;
use crate::http::HttpCommandHandler;
use crate::interactive::InteractiveHandler;
use crate::server::{ConnectionHandler, ConnectionManager};

/// A listener with its handler erased.
pub type Listener = ConnectionManager<Box<dyn ConnectionHandler>>;

/// Owns the device services and drives every listener.
pub struct Runner {
    device: Device,
    listeners: Vec<Listener>,
}

impl Runner {
    /// Runner over an existing device with no listeners.
    pub fn new(device: Device) -> Self {
        Runner {
            device,
            listeners: Vec::new(),
        }
    }

    /// Build the device and listeners described by `config`.
    pub fn from_config(config: &DeviceConfig) -> RunnerResult<Self> {
        config.validate()?;

        let backend: Box<dyn KvBackend> = if config.storage.volatile {
            Box::new(MemoryBackend::new())
        } else {
            let backend = FileBackend::open(&config.storage.dir, &config.storage.namespace)?;
            info!(path = %backend.path().display(), "settings namespace");
            Box::new(backend)
        };
        let settings = Settings::open(backend, config.settings.clone(), config.mac)?;
        let network = HostNetwork::new(settings.hostname(), config.mac, config.local_ip);
        info!(
            hostname = %settings.hostname(),
            ap_name = %settings.ap_name(),
            boot = %settings.boot_mode(),
            "device identity"
        );
        let device = Device::new(settings, Box::new(network), Box::new(ProcessRestart));

        let mut runner = Runner::new(device);
        for listener in &config.listeners {
            let commander = Commander::with_config(config.commander_config());
            let handler: Box<dyn ConnectionHandler> = match listener.kind {
                ServerKind::Console => Box::new(InteractiveHandler::new(&listener.name, commander)),
                ServerKind::Bridge => Box::new(BridgeHandler::new(
                    &listener.name,
                    SerialPortOpener::new(config.serial.path.clone()),
                )),
                ServerKind::Http => Box::new(HttpCommandHandler::new(commander)),
            };
            let addr = SocketAddr::new(config.bind, listener.port);
            runner.add_listener(ConnectionManager::new(listener.name.clone(), addr, handler));
        }
        Ok(runner)
    }

    /// Add a listener. It is started by the next [`Runner::start`].
    pub fn add_listener(&mut self, listener: Listener) {
        self.listeners.push(listener);
    }

    /// The device services.
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Mutable access to the device services.
    pub fn device_mut(&mut self) -> &mut Device {
        &mut self.device
    }

    /// The listeners, in configuration order.
    pub fn listeners(&self) -> &[Listener] {
        &self.listeners
    }

    /// Start every listener. A listener that fails to bind is logged and
    /// left stopped; the error is returned only if none could start.
    pub fn start(&mut self) -> RunnerResult<()> {
        let mut last_error = None;
        let mut started = 0;
        for listener in &mut self.listeners {
            match listener.start() {
                Ok(()) => started += 1,
                Err(e) => {
                    warn!(server = %listener.name(), error = %e, "listener failed to start");
                    last_error = Some(e);
                }
            }
        }
        match last_error {
            Some(e) if started == 0 => Err(e.into()),
            _ => {
                self.refresh_status();
                Ok(())
            }
        }
    }

    /// Service every listener once.
    ///
    /// The status snapshot lent to commands is rebuilt once per call, and
    /// only while some listener has a client to run commands for.
    pub fn poll(&mut self) {
        if self.listeners.iter().any(Listener::is_connected) {
            self.refresh_status();
        }
        for listener in &mut self.listeners {
            listener.poll(&mut self.device);
        }
    }

    /// Stop every listener, ending active sessions.
    pub fn stop(&mut self) {
        for listener in &mut self.listeners {
            listener.stop(&mut self.device);
        }
        self.refresh_status();
    }

    /// Status of every listener.
    pub fn statuses(&self) -> Vec<ServerStatus> {
        self.listeners.iter().map(Listener::status).collect()
    }

    fn refresh_status(&mut self) {
        self.device.servers = self.statuses();
    }

    /// Print the listener table to stderr.
    pub fn print_server_table(&self) {
        eprintln!();
        eprintln!("┌{}┬{}┬{}┐", "─".repeat(20), "─".repeat(10), "─".repeat(8));
        eprintln!("│ {:^18} │ {:^8} │ {:^6} │", "Listener", "Kind", "Port");
        eprintln!("├{}┼{}┼{}┤", "─".repeat(20), "─".repeat(10), "─".repeat(8));
        for status in self.statuses() {
            eprintln!(
                "│ {:18} │ {:8} │ {:6} │",
                status.name,
                status.kind.as_str(),
                status.port
            );
        }
        eprintln!("└{}┴{}┴{}┘", "─".repeat(20), "─".repeat(10), "─".repeat(8));
        eprintln!();
    }
}
