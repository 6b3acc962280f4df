//! One-shot HTTP command gateway.
//!
//! `GET /'wifi list'` runs `wifi list` and returns its output as
//! `text/plain`. Any other path runs `help` and appends usage hints. The
//! connection is closed after the response, or after
//! [`DEFAULT_REQUEST_TIMEOUT`] if no complete request arrives.

use std::io::{self, Write};
use std::time::Duration;

use chrono::Local;

use devcfg_cli_protocol::Commander;
use devcfg_common::ServerKind;
use tracing::{debug, info};

use crate::device::Device;
use crate::server::{Connection, ConnectionHandler, HandlerAction, LifecycleEvent};

/// Largest request head accepted before the connection is dropped.
pub const MAX_REQUEST_LEN: usize = 2048;

/// Time a client gets to send a complete request head.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

const HTTP_OK: &str = "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nConnection: close\r\n\r\n";
const HTTP_NOT_FOUND: &str = "HTTP/1.1 404 Not Found\r\nConnection: close\r\n\r\n";

/// What a request asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpRequest {
    /// Run a command line.
    Command(String),
    /// Show help and usage hints.
    Help,
    /// Browser icon request.
    Favicon,
}

impl HttpRequest {
    /// Interpret a request line such as `GET /'net%20mac' HTTP/1.1`.
    pub fn parse(request_line: &str) -> HttpRequest {
        let Some(target) = request_line
            .strip_prefix("GET ")
            .and_then(|rest| rest.split(' ').next())
        else {
            return HttpRequest::Help;
        };
        if target.starts_with("/favicon.ico") {
            return HttpRequest::Favicon;
        }
        let decoded = percent_decode(target);
        let Some(quoted) = decoded.strip_prefix("/'") else {
            return HttpRequest::Help;
        };
        match quoted.split_once('\'') {
            Some((command, _)) if !command.trim().is_empty() => {
                HttpRequest::Command(command.trim().to_string())
            }
            _ => HttpRequest::Help,
        }
    }
}

/// Decode the escapes a browser puts into a quoted command path.
fn percent_decode(target: &str) -> String {
    target.replace("%20", " ").replace("%27", "'")
}

/// Serves one command per HTTP connection.
#[derive(Debug)]
pub struct HttpCommandHandler {
    commander: Commander,
    request: Vec<u8>,
    request_timeout: Duration,
}

impl HttpCommandHandler {
    /// Gateway running commands through `commander`.
    pub fn new(commander: Commander) -> Self {
        HttpCommandHandler {
            commander,
            request: Vec::new(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Replace the request deadline.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    fn timed_out(&self, conn: &Connection) -> bool {
        let waited = (Local::now() - conn.connected_since())
            .to_std()
            .unwrap_or_default();
        waited >= self.request_timeout
    }

    /// The request head, once a blank line has been received.
    fn request_line(&self) -> Option<String> {
        let text = String::from_utf8_lossy(&self.request);
        let normalized = text.replace('\r', "");
        if !normalized.contains("\n\n") {
            return None;
        }
        Some(normalized.lines().next().unwrap_or_default().to_string())
    }

    fn respond(
        &mut self,
        request: HttpRequest,
        conn: &mut Connection,
        device: &mut Device,
    ) -> io::Result<()> {
        let command = match request {
            HttpRequest::Favicon => {
                conn.write_all(HTTP_NOT_FOUND.as_bytes())?;
                return Ok(());
            }
            HttpRequest::Help => "help".to_string(),
            HttpRequest::Command(command) => command,
        };
        info!(command = %command, remote = %conn.remote(), "web command");

        conn.write_all(HTTP_OK.as_bytes())?;
        let mut ctx = device.command_context();
        self.commander.process(conn, &mut ctx, &command)?;
        if command == "help" {
            self.write_hints(conn, device)?;
        }
        writeln!(conn)?;
        Ok(())
    }

    fn write_hints(&self, conn: &mut Connection, device: &Device) -> io::Result<()> {
        let ip = device.network.local_ip();
        let port = conn.local_addr().map_or(80, |a| a.port());
        writeln!(conn, "\n\nappend command to address in single quotes-")?;
        writeln!(conn, "http://{}:{}/'wifi list'", ip, port)?;
        if let Some(console) = device
            .servers
            .iter()
            .find(|s| s.kind == ServerKind::Console)
        {
            writeln!(conn, "\n(or use telnet command interface via port {})", console.port)?;
        }
        Ok(())
    }
}

impl ConnectionHandler for HttpCommandHandler {
    fn kind(&self) -> ServerKind {
        ServerKind::Http
    }

    fn on_event(
        &mut self,
        event: LifecycleEvent,
        conn: &mut Connection,
        device: &mut Device,
    ) -> io::Result<HandlerAction> {
        match event {
            LifecycleEvent::Start | LifecycleEvent::Stop => {
                self.request.clear();
                Ok(HandlerAction::Continue)
            }
            LifecycleEvent::Check => {
                let mut buf = [0u8; 512];
                let n = conn.read_available(&mut buf)?;
                self.request.extend_from_slice(&buf[..n]);

                if let Some(line) = self.request_line() {
                    debug!(request = %line, "http request");
                    self.respond(HttpRequest::parse(&line), conn, device)?;
                    return Ok(HandlerAction::Close);
                }
                if self.request.len() > MAX_REQUEST_LEN {
                    debug!(len = self.request.len(), "http request too large");
                    return Ok(HandlerAction::Close);
                }
                if self.timed_out(conn) {
                    debug!(
                        remote = %conn.remote(),
                        received = self.request.len(),
                        "http request timed out"
                    );
                    return Ok(HandlerAction::Close);
                }
                Ok(HandlerAction::Continue)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command() {
        assert_eq!(
            HttpRequest::parse("GET /'wifi%20list' HTTP/1.1"),
            HttpRequest::Command("wifi list".to_string())
        );
        assert_eq!(
            HttpRequest::parse("GET /%27net%20mac%27 HTTP/1.1"),
            HttpRequest::Command("net mac".to_string())
        );
    }

    #[test]
    fn test_parse_help_and_favicon() {
        assert_eq!(HttpRequest::parse("GET / HTTP/1.1"), HttpRequest::Help);
        assert_eq!(HttpRequest::parse("GET /status HTTP/1.1"), HttpRequest::Help);
        assert_eq!(HttpRequest::parse("GET /'' HTTP/1.1"), HttpRequest::Help);
        assert_eq!(HttpRequest::parse("POST /'sys reboot' HTTP/1.1"), HttpRequest::Help);
        assert_eq!(HttpRequest::parse("GET /favicon.ico HTTP/1.1"), HttpRequest::Favicon);
    }
}
