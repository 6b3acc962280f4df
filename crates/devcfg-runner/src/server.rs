//! Single-client TCP listeners.
//!
//! A [`ConnectionManager`] owns one listening socket and at most one client.
//! It is driven by [`ConnectionManager::poll`] from the main loop; nothing
//! here blocks except [`Connection::flush`]. The attached
//! [`ConnectionHandler`] sees the session as three events:
//!
//! - [`LifecycleEvent::Start`] once, right after the client is accepted
//! - [`LifecycleEvent::Check`] on every poll while the client is reachable
//! - [`LifecycleEvent::Stop`] once, when the session ends for any reason
//!
//! A second client arriving while one is active is accepted and closed
//! straight away; the active session never notices.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::time::Duration;

use chrono::{DateTime, Local};
use devcfg_common::{ServerKind, ServerState, ServerStatus};
use devcfg_metrics::{metric_defs, MetricLabels};
use tracing::{debug, info, trace, warn};

use crate::device::Device;

/// Upper bound on a blocking [`Connection::flush`].
pub const FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

// ============================================================================
// Types
// ============================================================================

/// Session events delivered to a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// A client was accepted.
    Start,
    /// Periodic service of a connected client.
    Check,
    /// The session ended.
    Stop,
}

impl LifecycleEvent {
    /// Lowercase name for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleEvent::Start => "start",
            LifecycleEvent::Check => "check",
            LifecycleEvent::Stop => "stop",
        }
    }
}

/// What the manager should do after a handler returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerAction {
    /// Keep the session.
    Continue,
    /// End the session; the handler will then receive [`LifecycleEvent::Stop`].
    Close,
}

/// Behavior attached to a listener.
///
/// An `Err` from any event is treated as client loss.
pub trait ConnectionHandler {
    /// Kind reported in status snapshots.
    fn kind(&self) -> ServerKind;

    /// Handle one session event.
    fn on_event(
        &mut self,
        event: LifecycleEvent,
        conn: &mut Connection,
        device: &mut Device,
    ) -> io::Result<HandlerAction>;
}

impl<H: ConnectionHandler + ?Sized> ConnectionHandler for Box<H> {
    fn kind(&self) -> ServerKind {
        (**self).kind()
    }

    fn on_event(
        &mut self,
        event: LifecycleEvent,
        conn: &mut Connection,
        device: &mut Device,
    ) -> io::Result<HandlerAction> {
        (**self).on_event(event, conn, device)
    }
}

// ============================================================================
// Connection
// ============================================================================

/// The active client of a listener.
///
/// Writes go to an outbox that the manager drains without blocking after
/// every event. [`Write::flush`] drains it completely, blocking for at most
/// [`FLUSH_TIMEOUT`].
#[derive(Debug)]
pub struct Connection {
    stream: TcpStream,
    remote: SocketAddr,
    connected_since: DateTime<Local>,
    outbox: Vec<u8>,
}

impl Connection {
    fn new(stream: TcpStream, remote: SocketAddr) -> io::Result<Self> {
        stream.set_nonblocking(true)?;
        stream.set_nodelay(true)?;
        stream.set_write_timeout(Some(FLUSH_TIMEOUT))?;
        Ok(Connection {
            stream,
            remote,
            connected_since: Local::now(),
            outbox: Vec::new(),
        })
    }

    /// Remote address of the client.
    pub fn remote(&self) -> SocketAddr {
        self.remote
    }

    /// Local address the client connected to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.stream.local_addr()
    }

    /// When the client was accepted.
    pub fn connected_since(&self) -> DateTime<Local> {
        self.connected_since
    }

    /// Read whatever the client has sent, without blocking.
    ///
    /// Returns `Ok(0)` when nothing is waiting. A closed connection is
    /// reported as [`io::ErrorKind::UnexpectedEof`].
    pub fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        match self.stream.read(buf) {
            Ok(0) => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "client closed the connection",
            )),
            Ok(n) => Ok(n),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(0),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(0),
            Err(e) => Err(e),
        }
    }

    /// Bytes queued for the client but not yet sent.
    pub fn pending_output(&self) -> usize {
        self.outbox.len()
    }

    /// Send as much of the outbox as the socket takes right now.
    pub fn drain(&mut self) -> io::Result<()> {
        while !self.outbox.is_empty() {
            match self.stream.write(&self.outbox) {
                Ok(0) => {
                    return Err(io::Error::new(io::ErrorKind::WriteZero, "client stopped reading"))
                }
                Ok(n) => {
                    self.outbox.drain(..n);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Whether the peer is still there, checked with a non-blocking peek.
    fn is_alive(&self) -> bool {
        let mut peeked = [0u8; 1];
        match self.stream.peek(&mut peeked) {
            Ok(0) => false,
            Ok(_) => true,
            Err(e) => matches!(
                e.kind(),
                io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
            ),
        }
    }

    fn shutdown(mut self) {
        if !self.outbox.is_empty() {
            if let Err(e) = self.flush() {
                debug!(remote = %self.remote, error = %e, "unsent output dropped");
            }
        }
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}

impl Write for Connection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.outbox.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.outbox.is_empty() {
            return Ok(());
        }
        self.stream.set_nonblocking(false)?;
        let result = self.stream.write_all(&self.outbox);
        self.outbox.clear();
        self.stream.set_nonblocking(true)?;
        result
    }
}

// ============================================================================
// Connection Manager
// ============================================================================

/// One listening socket with at most one active client.
pub struct ConnectionManager<H> {
    name: String,
    addr: SocketAddr,
    listener: Option<TcpListener>,
    client: Option<Connection>,
    handler: H,
    labels: MetricLabels,
}

impl<H: ConnectionHandler> ConnectionManager<H> {
    /// Create a stopped listener for `addr`. Port 0 binds an ephemeral port.
    pub fn new(name: impl Into<String>, addr: SocketAddr, handler: H) -> Self {
        let name = name.into();
        let labels = MetricLabels::new(name.clone(), handler.kind().as_str());
        ConnectionManager {
            name,
            addr,
            listener: None,
            client: None,
            handler,
            labels,
        }
    }

    /// Listener name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Address actually bound, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().and_then(|l| l.local_addr().ok())
    }

    /// The attached handler.
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Whether a client session is active.
    pub fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    /// Bind and start listening.
    pub fn start(&mut self) -> io::Result<()> {
        if self.listener.is_some() {
            return Ok(());
        }
        let listener = TcpListener::bind(self.addr)?;
        listener.set_nonblocking(true)?;
        let local = listener.local_addr()?;
        info!(
            server = %self.name,
            kind = %self.handler.kind(),
            addr = %local.ip(),
            port = local.port(),
            "starting"
        );
        self.listener = Some(listener);
        Ok(())
    }

    /// End any active session and stop listening.
    pub fn stop(&mut self, device: &mut Device) {
        if self.listener.is_none() {
            return;
        }
        info!(server = %self.name, "stopping");
        self.close_active_client(device);
        self.listener = None;
    }

    /// Service the listener once: accept or reject one pending client, then
    /// give the active client one `Check`.
    pub fn poll(&mut self, device: &mut Device) {
        if self.listener.is_none() {
            return;
        }
        self.accept_pending(device);

        let Some(conn) = self.client.as_ref() else {
            return;
        };
        if !conn.is_alive() {
            debug!(server = %self.name, remote = %conn.remote(), "client gone");
            self.close_active_client(device);
            return;
        }
        self.dispatch(LifecycleEvent::Check, device);
    }

    /// End the active session. `Stop` is delivered exactly once per session,
    /// whether or not the client is still reachable.
    pub fn close_active_client(&mut self, device: &mut Device) {
        let Some(mut conn) = self.client.take() else {
            return;
        };
        if let Err(e) = self.handler.on_event(LifecycleEvent::Stop, &mut conn, device) {
            debug!(server = %self.name, error = %e, "stop handler failed");
        }
        let remote = conn.remote();
        conn.shutdown();
        info!(server = %self.name, remote = %remote, "closed");
        metrics::counter!(metric_defs::CONNECTIONS_CLOSED.name, &self.labels.to_labels())
            .increment(1);
        metrics::gauge!(metric_defs::ACTIVE_CLIENTS.name, &self.labels.to_labels()).set(0.0);
    }

    /// Snapshot for status tables.
    pub fn status(&self) -> ServerStatus {
        let state = match (&self.listener, &self.client) {
            (None, _) => ServerState::Stopped,
            (Some(_), None) => ServerState::Idle,
            (Some(_), Some(_)) => ServerState::Connected,
        };
        ServerStatus {
            name: self.name.clone(),
            kind: self.handler.kind(),
            port: self.local_addr().map_or(self.addr.port(), |a| a.port()),
            state,
            remote: self.client.as_ref().map(Connection::remote),
            connected_since: self.client.as_ref().map(Connection::connected_since),
        }
    }

    fn accept_pending(&mut self, device: &mut Device) {
        let Some(listener) = self.listener.as_ref() else {
            return;
        };
        let (stream, remote) = match listener.accept() {
            Ok(accepted) => accepted,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return,
            Err(e) => {
                warn!(server = %self.name, error = %e, "accept failed");
                return;
            }
        };

        if self.client.is_some() {
            let _ = stream.shutdown(Shutdown::Both);
            info!(server = %self.name, remote = %remote, "rejected");
            metrics::counter!(metric_defs::CONNECTIONS_REJECTED.name, &self.labels.to_labels())
                .increment(1);
            return;
        }

        match Connection::new(stream, remote) {
            Ok(conn) => {
                info!(server = %self.name, remote = %remote, "new client");
                metrics::counter!(metric_defs::CONNECTIONS_ACCEPTED.name, &self.labels.to_labels())
                    .increment(1);
                metrics::gauge!(metric_defs::ACTIVE_CLIENTS.name, &self.labels.to_labels())
                    .set(1.0);
                self.client = Some(conn);
                self.dispatch(LifecycleEvent::Start, device);
            }
            Err(e) => warn!(server = %self.name, remote = %remote, error = %e, "failed"),
        }
    }

    fn dispatch(&mut self, event: LifecycleEvent, device: &mut Device) {
        let Some(conn) = self.client.as_mut() else {
            return;
        };
        trace!(server = %self.name, event = event.as_str(), "dispatch");
        let result = self
            .handler
            .on_event(event, conn, device)
            .and_then(|action| conn.drain().map(|()| action));
        match result {
            Ok(HandlerAction::Continue) => {}
            Ok(HandlerAction::Close) => self.close_active_client(device),
            Err(e) => {
                debug!(server = %self.name, error = %e, "client lost");
                self.close_active_client(device);
            }
        }
    }
}
