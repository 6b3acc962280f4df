//! Raw pass-through between a TCP client and a serial port.
//!
//! Each `Check` moves at most [`BRIDGE_CHUNK`] bytes in each direction.
//! Nothing is dropped: bytes the serial port does not take yet stay in a
//! pending buffer, and the serial port is not read while the client's
//! outbox is backed up.

use std::io::{self, Read, Write};
use std::time::Duration;

use devcfg_common::ServerKind;
use devcfg_metrics::{metric_defs, MetricLabels};
use serialport::SerialPort;
use tracing::{debug, info, warn};

use crate::device::Device;
use crate::error::{RunnerError, RunnerResult};
use crate::server::{Connection, ConnectionHandler, HandlerAction, LifecycleEvent};

/// Bytes forwarded per direction per `Check`.
pub const BRIDGE_CHUNK: usize = 128;

/// The byte stream on the far side of the bridge.
pub trait SecondaryStream {
    /// Bytes that can be read without blocking.
    fn bytes_available(&mut self) -> io::Result<usize>;

    /// Read up to `buf.len()` bytes. Only called when bytes are available.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write as much of `buf` as fits without blocking.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;
}

/// Opens the secondary stream at session start.
pub trait SerialOpener {
    /// Open the stream at `baud`, 8 data bits, no parity, one stop bit.
    fn open(&mut self, baud: u32) -> RunnerResult<Box<dyn SecondaryStream>>;
}

// ============================================================================
// Serial Port
// ============================================================================

/// Opens a host serial device through the `serialport` crate.
#[derive(Debug, Clone)]
pub struct SerialPortOpener {
    path: String,
}

impl SerialPortOpener {
    /// Opener for the device at `path`.
    pub fn new(path: impl Into<String>) -> Self {
        SerialPortOpener { path: path.into() }
    }
}

impl SerialOpener for SerialPortOpener {
    fn open(&mut self, baud: u32) -> RunnerResult<Box<dyn SecondaryStream>> {
        let port = serialport::new(&self.path, baud)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .timeout(Duration::from_millis(1))
            .open()
            .map_err(|source| RunnerError::Serial {
                path: self.path.clone(),
                source,
            })?;
        info!(path = %self.path, baud, "serial port opened");
        Ok(Box::new(port))
    }
}

impl SecondaryStream for Box<dyn SerialPort> {
    fn bytes_available(&mut self) -> io::Result<usize> {
        Ok(self.bytes_to_read()? as usize)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match Read::read(self, buf) {
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(0),
            other => other,
        }
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match Write::write(self, buf) {
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(0),
            other => other,
        }
    }
}

// ============================================================================
// Handler
// ============================================================================

/// Bridges the client to a [`SecondaryStream`].
pub struct BridgeHandler<O> {
    opener: O,
    stream: Option<Box<dyn SecondaryStream>>,
    to_serial: Vec<u8>,
    labels: MetricLabels,
}

impl<O: SerialOpener> BridgeHandler<O> {
    /// Bridge for the listener named `server`.
    pub fn new(server: &str, opener: O) -> Self {
        BridgeHandler {
            opener,
            stream: None,
            to_serial: Vec::with_capacity(BRIDGE_CHUNK),
            labels: MetricLabels::new(server, ServerKind::Bridge.as_str()),
        }
    }

    /// Whether the secondary stream is open.
    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    fn start(&mut self, device: &mut Device) -> HandlerAction {
        let baud = device.settings.uart_baud();
        match self.opener.open(baud) {
            Ok(stream) => {
                self.stream = Some(stream);
                self.to_serial.clear();
                HandlerAction::Continue
            }
            Err(e) => {
                warn!(server = %self.labels.server, error = %e, "bridge unavailable");
                HandlerAction::Close
            }
        }
    }

    fn check(&mut self, conn: &mut Connection) -> io::Result<HandlerAction> {
        let Some(stream) = self.stream.as_mut() else {
            return Ok(HandlerAction::Close);
        };
        let mut buf = [0u8; BRIDGE_CHUNK];

        // client -> serial
        if self.to_serial.is_empty() {
            let n = conn.read_available(&mut buf)?;
            self.to_serial.extend_from_slice(&buf[..n]);
        }
        if !self.to_serial.is_empty() {
            let written = match stream.write(&self.to_serial) {
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => 0,
                Err(e) => {
                    warn!(server = %self.labels.server, error = %e, "serial write failed");
                    return Ok(HandlerAction::Close);
                }
            };
            if written > 0 {
                self.to_serial.drain(..written);
                metrics::counter!(
                    metric_defs::BRIDGE_BYTES.name,
                    &self.labels.with(&[("direction", "to_serial".to_string())])
                )
                .increment(written as u64);
            }
        }

        // serial -> client
        if conn.pending_output() < BRIDGE_CHUNK {
            let available = match stream.bytes_available() {
                Ok(n) => n.min(BRIDGE_CHUNK),
                Err(e) => {
                    warn!(server = %self.labels.server, error = %e, "serial poll failed");
                    return Ok(HandlerAction::Close);
                }
            };
            if available > 0 {
                let n = match stream.read(&mut buf[..available]) {
                    Ok(n) => n,
                    Err(e) => {
                        warn!(server = %self.labels.server, error = %e, "serial read failed");
                        return Ok(HandlerAction::Close);
                    }
                };
                conn.write_all(&buf[..n])?;
                metrics::counter!(
                    metric_defs::BRIDGE_BYTES.name,
                    &self.labels.with(&[("direction", "to_client".to_string())])
                )
                .increment(n as u64);
            }
        }
        Ok(HandlerAction::Continue)
    }
}

impl<O: SerialOpener> ConnectionHandler for BridgeHandler<O> {
    fn kind(&self) -> ServerKind {
        ServerKind::Bridge
    }

    fn on_event(
        &mut self,
        event: LifecycleEvent,
        conn: &mut Connection,
        device: &mut Device,
    ) -> io::Result<HandlerAction> {
        match event {
            LifecycleEvent::Start => Ok(self.start(device)),
            LifecycleEvent::Check => self.check(conn),
            LifecycleEvent::Stop => {
                if self.stream.take().is_some() {
                    debug!(
                        server = %self.labels.server,
                        unsent = self.to_serial.len(),
                        "serial stream closed"
                    );
                }
                self.to_serial.clear();
                Ok(HandlerAction::Continue)
            }
        }
    }
}
