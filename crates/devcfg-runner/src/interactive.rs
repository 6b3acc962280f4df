//! Interactive command console.
//!
//! Output is queued on the connection and sent as the client reads it. While
//! more than [`MAX_PENDING_OUTPUT`] bytes are queued the console stops
//! running commands and stops reading, so a client that never reads only
//! fills its own socket buffers.

use std::collections::VecDeque;
use std::io::{self, Write};

use devcfg_cli_protocol::{Commander, Diagnostic, Disposition, LineBuffer, LineEvent};
use devcfg_common::ServerKind;
use devcfg_metrics::{metric_defs, MetricLabels};
use tracing::{debug, trace};

use crate::device::Device;
use crate::server::{Connection, ConnectionHandler, HandlerAction, LifecycleEvent};

/// Bytes read from the client per `Check`.
pub const READ_CHUNK: usize = 128;

/// Queued output above which no further command runs.
///
/// One command can add its whole response on top of this, so the outbox
/// stays below this plus the longest single response.
pub const MAX_PENDING_OUTPUT: usize = 4096;

/// Printed when a session starts.
pub const DEFAULT_GREETING: &str = "devcfg console, type 'help' for commands, 'bye' to leave";

/// Printed before every command line.
pub const DEFAULT_PROMPT: &str = "> ";

/// Line-oriented console feeding the command interpreter.
#[derive(Debug)]
pub struct InteractiveHandler {
    commander: Commander,
    line: LineBuffer,
    backlog: VecDeque<LineEvent>,
    greeting: String,
    prompt: String,
    labels: MetricLabels,
}

impl InteractiveHandler {
    /// Console for the listener named `server`.
    pub fn new(server: &str, commander: Commander) -> Self {
        InteractiveHandler {
            commander,
            line: LineBuffer::new(),
            backlog: VecDeque::new(),
            greeting: DEFAULT_GREETING.to_string(),
            prompt: DEFAULT_PROMPT.to_string(),
            labels: MetricLabels::new(server, ServerKind::Console.as_str()),
        }
    }

    /// Replace the greeting.
    pub fn with_greeting(mut self, greeting: impl Into<String>) -> Self {
        self.greeting = greeting.into();
        self
    }

    /// Replace the prompt.
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    fn check(&mut self, conn: &mut Connection, device: &mut Device) -> io::Result<HandlerAction> {
        if self.backlog.is_empty() && conn.pending_output() < MAX_PENDING_OUTPUT {
            let mut buf = [0u8; READ_CHUNK];
            let n = conn.read_available(&mut buf)?;
            if n > 0 {
                trace!(bytes = n, "console input");
                self.backlog.extend(self.line.extend(&buf[..n]));
            }
        }

        while conn.pending_output() < MAX_PENDING_OUTPUT {
            let Some(event) = self.backlog.pop_front() else {
                break;
            };
            if self.handle(event, conn, device)? == HandlerAction::Close {
                return Ok(HandlerAction::Close);
            }
        }
        if !self.backlog.is_empty() {
            trace!(
                queued = self.backlog.len(),
                pending = conn.pending_output(),
                "console output backed up"
            );
        }
        Ok(HandlerAction::Continue)
    }

    fn handle(
        &mut self,
        event: LineEvent,
        conn: &mut Connection,
        device: &mut Device,
    ) -> io::Result<HandlerAction> {
        match event {
            LineEvent::Line(line) => {
                if !line.is_empty() {
                    let mut ctx = device.command_context();
                    if self.commander.process(conn, &mut ctx, &line)? == Disposition::Disconnect {
                        return Ok(HandlerAction::Close);
                    }
                }
                write!(conn, "{}", self.prompt)?;
            }
            LineEvent::Overflow => {
                debug!(server = %self.labels.server, "line too long, discarded");
                metrics::counter!(metric_defs::LINES_OVERLENGTH.name, &self.labels.to_labels())
                    .increment(1);
                Diagnostic::LineTooLong.write_to(conn)?;
            }
            LineEvent::Discarded => trace!("partial line discarded"),
            LineEvent::Pending => {}
        }
        Ok(HandlerAction::Continue)
    }
}

impl ConnectionHandler for InteractiveHandler {
    fn kind(&self) -> ServerKind {
        ServerKind::Console
    }

    fn on_event(
        &mut self,
        event: LifecycleEvent,
        conn: &mut Connection,
        device: &mut Device,
    ) -> io::Result<HandlerAction> {
        match event {
            LifecycleEvent::Start => {
                self.line.clear();
                self.backlog.clear();
                writeln!(conn, "{}", self.greeting)?;
                write!(conn, "{}", self.prompt)?;
                Ok(HandlerAction::Continue)
            }
            LifecycleEvent::Check => self.check(conn, device),
            LifecycleEvent::Stop => {
                self.line.clear();
                self.backlog.clear();
                Ok(HandlerAction::Continue)
            }
        }
    }
}
