//! Long-lived device services shared by every listener.

use std::env;
use std::process::{self, Command};

use devcfg_cli_protocol::CommandContext;
use devcfg_common::{NetworkStack, ServerStatus, SystemControl};
use devcfg_settings::Settings;
use tracing::{error, info};

/// Services owned by the main loop and lent to a listener on each poll.
pub struct Device {
    /// The settings store, opened once at startup.
    pub settings: Settings,
    /// The live network stack.
    pub network: Box<dyn NetworkStack>,
    /// Restart primitive.
    pub system: Box<dyn SystemControl>,
    /// Status of every listener, refreshed by the main loop.
    pub servers: Vec<ServerStatus>,
}

impl Device {
    /// Bundle the services.
    pub fn new(
        settings: Settings,
        network: Box<dyn NetworkStack>,
        system: Box<dyn SystemControl>,
    ) -> Self {
        Device {
            settings,
            network,
            system,
            servers: Vec::new(),
        }
    }

    /// Borrow the services as a command context.
    pub fn command_context(&mut self) -> CommandContext<'_> {
        CommandContext {
            settings: &mut self.settings,
            network: self.network.as_mut(),
            system: self.system.as_mut(),
            servers: &self.servers,
        }
    }
}

/// Restarts the host process by re-executing the current binary.
///
/// On Unix the process image is replaced in place, which also closes every
/// listening socket. Elsewhere a fresh process is spawned and this one
/// exits.
#[derive(Debug, Default)]
pub struct ProcessRestart;

impl SystemControl for ProcessRestart {
    fn restart(&mut self) {
        let exe = match env::current_exe() {
            Ok(exe) => exe,
            Err(e) => {
                error!(error = %e, "cannot locate current executable, exiting");
                process::exit(1);
            }
        };
        let args: Vec<String> = env::args().skip(1).collect();
        info!(exe = %exe.display(), "restarting");
        let mut command = Command::new(&exe);
        command.args(&args);

        #[cfg(unix)]
        let result = {
            use std::os::unix::process::CommandExt;
            Err::<(), _>(command.exec())
        };
        #[cfg(not(unix))]
        let result = command.spawn().map(|_| ());

        match result {
            Ok(()) => process::exit(0),
            Err(e) => {
                error!(error = %e, "restart failed, exiting");
                process::exit(1);
            }
        }
    }
}
