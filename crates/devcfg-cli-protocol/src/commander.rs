//! Command dispatch.

use std::io::{self, Write};
use std::time::Duration;

use devcfg_common::{NetworkStack, ServerStatus, SystemControl};
use devcfg_metrics::{metric_defs, metrics};
use devcfg_settings::Settings;
use tracing::{debug, trace};

use crate::commands::default_table;
use crate::handlers::{self, Handled};
use crate::responses::{write_help, Diagnostic, HelpPolicy};
use crate::table::{match_line, CommandTable, LineMatch};

/// Default wait between announcing a reboot and performing it.
pub const DEFAULT_REBOOT_DELAY: Duration = Duration::from_secs(5);

/// Tunables for a [`Commander`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommanderConfig {
    /// Scope of the help listing printed for rejected lines.
    pub help_policy: HelpPolicy,
    /// Wait between `rebooting in N seconds...` and the restart.
    pub reboot_delay: Duration,
}

impl Default for CommanderConfig {
    fn default() -> Self {
        CommanderConfig {
            help_policy: HelpPolicy::default(),
            reboot_delay: DEFAULT_REBOOT_DELAY,
        }
    }
}

/// What a command handler may touch.
///
/// Built fresh for every line from the long-lived services owned by the
/// main loop.
pub struct CommandContext<'a> {
    /// The settings store.
    pub settings: &'a mut Settings,
    /// The live network stack.
    pub network: &'a mut dyn NetworkStack,
    /// Restart primitive.
    pub system: &'a mut dyn SystemControl,
    /// Status of every listener, for `net status`.
    pub servers: &'a [ServerStatus],
}

/// What the caller should do with the session after a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Keep the session open.
    Continue,
    /// The client asked to end the session.
    Disconnect,
}

/// Runs command lines against a [`CommandTable`].
#[derive(Debug, Clone)]
pub struct Commander {
    table: CommandTable,
    config: CommanderConfig,
}

impl Default for Commander {
    fn default() -> Self {
        Commander::new()
    }
}

impl Commander {
    /// Commander over the stock table with default settings.
    pub fn new() -> Self {
        Commander::with_config(CommanderConfig::default())
    }

    /// Commander over the stock table.
    pub fn with_config(config: CommanderConfig) -> Self {
        Commander::with_table(default_table(), config)
    }

    /// Commander over a custom table.
    pub fn with_table(table: CommandTable, config: CommanderConfig) -> Self {
        Commander { table, config }
    }

    /// The command table.
    pub fn table(&self) -> &CommandTable {
        &self.table
    }

    /// The active configuration.
    pub fn config(&self) -> &CommanderConfig {
        &self.config
    }

    /// Run one command line, writing all output to `out`.
    ///
    /// Errors are only ever I/O errors from `out`; command failures are
    /// reported to the client as text.
    pub fn process(
        &self,
        out: &mut dyn Write,
        ctx: &mut CommandContext<'_>,
        line: &str,
    ) -> io::Result<Disposition> {
        trace!(line, "processing command line");
        match match_line(&self.table, line) {
            LineMatch::Disconnect => {
                debug!("client requested disconnect");
                return Ok(Disposition::Disconnect);
            }
            LineMatch::Unknown => {
                metrics::counter!(metric_defs::COMMANDS_UNKNOWN.name).increment(1);
                Diagnostic::UnknownCommand.write_to(out)?;
            }
            LineMatch::Incomplete { root } | LineMatch::NoSubcommand { root } => {
                write_help(out, &self.table, self.config.help_policy, Some(root))?;
            }
            LineMatch::Leaf { root, entry, args } => {
                let Some(id) = entry.action else {
                    return Ok(Disposition::Continue);
                };
                debug!(command = %id, args, "dispatching command");
                metrics::counter!(metric_defs::COMMANDS_DISPATCHED.name, "command" => id.as_str())
                    .increment(1);
                match handlers::run(id, out, ctx, args, &self.config)? {
                    Handled::Done => {}
                    Handled::ShowHelp => {
                        write_help(out, &self.table, self.config.help_policy, Some(root))?;
                    }
                    Handled::Unknown => Diagnostic::UnknownCommand.write_to(out)?,
                }
            }
        }
        Ok(Disposition::Continue)
    }

    /// Run a command if `raw` holds a complete line.
    ///
    /// Returns `None` while no CR or LF is present. Once one is found, the
    /// text before it is processed and the caller may discard the buffer.
    pub fn process_raw(
        &self,
        out: &mut dyn Write,
        ctx: &mut CommandContext<'_>,
        raw: &[u8],
    ) -> io::Result<Option<Disposition>> {
        let Some(end) = raw.iter().position(|&b| b == b'\r' || b == b'\n') else {
            return Ok(None);
        };
        let line = String::from_utf8_lossy(&raw[..end]);
        self.process(out, ctx, &line).map(Some)
    }
}
