//! Loopback tests for the listeners and their handlers.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::net::{Ipv4Addr, SocketAddr, TcpStream};
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

use devcfg_cli_protocol::{Commander, CommanderConfig, HelpPolicy};
use devcfg_common::{HostNetwork, MacAddress, ServerKind, ServerState, SystemControl};
use devcfg_runner::bridge::{BridgeHandler, SecondaryStream, SerialOpener};
use devcfg_runner::http::HttpCommandHandler;
use devcfg_runner::interactive::{InteractiveHandler, DEFAULT_PROMPT, MAX_PENDING_OUTPUT};
use devcfg_runner::{
    Connection, ConnectionHandler, ConnectionManager, Device, HandlerAction, LifecycleEvent,
    RunnerResult,
};
use devcfg_settings::{MemoryBackend, Settings, SettingsConfig};

// ============================================================================
// Helpers
// ============================================================================

struct NoRestart;

impl SystemControl for NoRestart {
    fn restart(&mut self) {}
}

fn device() -> Device {
    let mac = MacAddress::new([0x24, 0x6f, 0x28, 0xa1, 0xb2, 0xc3]);
    let settings = Settings::open(
        Box::new(MemoryBackend::new()),
        SettingsConfig::default(),
        mac,
    )
    .unwrap();
    Device::new(
        settings,
        Box::new(HostNetwork::new("espressif", mac, Ipv4Addr::LOCALHOST.into())),
        Box::new(NoRestart),
    )
}

fn loopback() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::LOCALHOST, 0))
}

fn commander() -> Commander {
    Commander::with_config(CommanderConfig {
        help_policy: HelpPolicy::Full,
        reboot_delay: Duration::ZERO,
    })
}

fn started<H: ConnectionHandler>(name: &str, handler: H) -> ConnectionManager<H> {
    let mut mgr = ConnectionManager::new(name, loopback(), handler);
    mgr.start().unwrap();
    mgr
}

fn connect<H: ConnectionHandler>(mgr: &ConnectionManager<H>) -> TcpStream {
    let client = TcpStream::connect(mgr.local_addr().unwrap()).unwrap();
    client.set_nonblocking(true).unwrap();
    client
}

/// Poll the listener and read from `client` until `needle` shows up, the
/// client is closed, or a few seconds pass.
fn pump<H: ConnectionHandler>(
    mgr: &mut ConnectionManager<H>,
    device: &mut Device,
    client: &mut TcpStream,
    needle: &str,
) -> String {
    let deadline = Instant::now() + Duration::from_secs(3);
    let mut received = Vec::new();
    while Instant::now() < deadline {
        mgr.poll(device);
        let mut buf = [0u8; 1024];
        match client.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => received.extend_from_slice(&buf[..n]),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
            Err(_) => break,
        }
        if !needle.is_empty() && String::from_utf8_lossy(&received).contains(needle) {
            break;
        }
        thread::sleep(Duration::from_millis(2));
    }
    String::from_utf8_lossy(&received).into_owned()
}

/// Poll until `client` observes the server closing it.
fn wait_closed<H: ConnectionHandler>(
    mgr: &mut ConnectionManager<H>,
    device: &mut Device,
    client: &mut TcpStream,
) -> bool {
    let deadline = Instant::now() + Duration::from_secs(3);
    while Instant::now() < deadline {
        mgr.poll(device);
        let mut buf = [0u8; 256];
        match client.read(&mut buf) {
            Ok(0) => return true,
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
            Err(_) => return true,
        }
        thread::sleep(Duration::from_millis(2));
    }
    false
}

fn poll_until<H: ConnectionHandler>(
    mgr: &mut ConnectionManager<H>,
    device: &mut Device,
    cond: impl Fn(&ConnectionManager<H>) -> bool,
) -> bool {
    let deadline = Instant::now() + Duration::from_secs(3);
    while Instant::now() < deadline {
        mgr.poll(device);
        if cond(mgr) {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    false
}

/// Handler that only records the events it sees.
#[derive(Default)]
struct Recorder {
    events: Vec<LifecycleEvent>,
}

impl ConnectionHandler for Recorder {
    fn kind(&self) -> ServerKind {
        ServerKind::Console
    }

    fn on_event(
        &mut self,
        event: LifecycleEvent,
        _conn: &mut Connection,
        _device: &mut Device,
    ) -> io::Result<HandlerAction> {
        self.events.push(event);
        Ok(HandlerAction::Continue)
    }
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn test_lifecycle_event_order() {
    let mut device = device();
    let mut mgr = started("rec", Recorder::default());

    let client = connect(&mgr);
    assert!(poll_until(&mut mgr, &mut device, |m| m.is_connected()));
    for _ in 0..5 {
        mgr.poll(&mut device);
    }
    drop(client);
    assert!(poll_until(&mut mgr, &mut device, |m| !m.is_connected()));
    for _ in 0..5 {
        mgr.poll(&mut device);
    }

    let events = &mgr.handler().events;
    assert_eq!(events.first(), Some(&LifecycleEvent::Start));
    assert_eq!(events.last(), Some(&LifecycleEvent::Stop));
    assert_eq!(events.iter().filter(|e| **e == LifecycleEvent::Start).count(), 1);
    assert_eq!(events.iter().filter(|e| **e == LifecycleEvent::Stop).count(), 1);
    assert!(events[1..events.len() - 1]
        .iter()
        .all(|e| *e == LifecycleEvent::Check));
    assert!(events.len() >= 7);
}

#[test]
fn test_close_active_client_stops_once() {
    let mut device = device();
    let mut mgr = started("rec", Recorder::default());

    let mut client = connect(&mgr);
    assert!(poll_until(&mut mgr, &mut device, |m| m.is_connected()));
    mgr.close_active_client(&mut device);
    mgr.close_active_client(&mut device);
    assert!(wait_closed(&mut mgr, &mut device, &mut client));

    let stops = mgr
        .handler()
        .events
        .iter()
        .filter(|e| **e == LifecycleEvent::Stop)
        .count();
    assert_eq!(stops, 1);
}

#[test]
fn test_stop_ends_session_and_listener() {
    let mut device = device();
    let mut mgr = started("rec", Recorder::default());
    let _client = connect(&mgr);
    assert!(poll_until(&mut mgr, &mut device, |m| m.is_connected()));

    mgr.stop(&mut device);
    assert_eq!(mgr.handler().events.last(), Some(&LifecycleEvent::Stop));
    assert_eq!(mgr.status().state, ServerState::Stopped);
    assert!(mgr.local_addr().is_none());
}

#[test]
fn test_status_snapshot() {
    let mut device = device();
    let mut mgr = started("rec", Recorder::default());
    let status = mgr.status();
    assert_eq!(status.name, "rec");
    assert_eq!(status.state, ServerState::Idle);
    assert_eq!(status.port, mgr.local_addr().unwrap().port());
    assert!(status.remote.is_none());

    let client = connect(&mgr);
    assert!(poll_until(&mut mgr, &mut device, |m| m.is_connected()));
    let status = mgr.status();
    assert_eq!(status.state, ServerState::Connected);
    assert_eq!(status.remote, Some(client.local_addr().unwrap()));
    assert!(status.connected_since.is_some());
}

// ============================================================================
// Interactive Console
// ============================================================================

#[test]
fn test_console_greets_and_runs_commands() {
    let mut device = device();
    let mut mgr = started("telnet", InteractiveHandler::new("telnet", commander()));

    let mut client = connect(&mgr);
    let greeting = pump(&mut mgr, &mut device, &mut client, DEFAULT_PROMPT);
    assert!(greeting.ends_with(DEFAULT_PROMPT));

    client.write_all(b"sys boot\r\n").unwrap();
    let out = pump(&mut mgr, &mut device, &mut client, DEFAULT_PROMPT);
    assert_eq!(out, format!("boot: STA\n{}", DEFAULT_PROMPT));

    client.write_all(b"net mac\n").unwrap();
    let out = pump(&mut mgr, &mut device, &mut client, DEFAULT_PROMPT);
    assert_eq!(out, format!("24:6F:28:A1:B2:C3\n{}", DEFAULT_PROMPT));
}

#[test]
fn test_second_client_rejected() {
    let mut device = device();
    let mut mgr = started("telnet", InteractiveHandler::new("telnet", commander()));

    let mut first = connect(&mgr);
    pump(&mut mgr, &mut device, &mut first, DEFAULT_PROMPT);

    let mut second = connect(&mgr);
    assert!(wait_closed(&mut mgr, &mut device, &mut second));
    assert!(mgr.is_connected());

    first.write_all(b"sys boot\r\n").unwrap();
    let out = pump(&mut mgr, &mut device, &mut first, DEFAULT_PROMPT);
    assert_eq!(out, format!("boot: STA\n{}", DEFAULT_PROMPT));
}

#[test]
fn test_split_line_equals_whole_line() {
    let mut device = device();
    let mut mgr = started("telnet", InteractiveHandler::new("telnet", commander()));
    let mut client = connect(&mgr);
    pump(&mut mgr, &mut device, &mut client, DEFAULT_PROMPT);

    client.write_all(b"wifi list\r\n").unwrap();
    let whole = pump(&mut mgr, &mut device, &mut client, DEFAULT_PROMPT);

    client.write_all(b"wifi li").unwrap();
    for _ in 0..10 {
        mgr.poll(&mut device);
    }
    client.write_all(b"st\r\n").unwrap();
    let split = pump(&mut mgr, &mut device, &mut client, DEFAULT_PROMPT);

    assert!(whole.starts_with("  #  SSID  PASS\n"));
    assert_eq!(whole, split);
}

#[test]
fn test_overlength_line() {
    let mut device = device();
    let mut mgr = started("telnet", InteractiveHandler::new("telnet", commander()));
    let mut client = connect(&mgr);
    pump(&mut mgr, &mut device, &mut client, DEFAULT_PROMPT);

    client.write_all(&[b'a'; 128]).unwrap();
    let out = pump(&mut mgr, &mut device, &mut client, "\n");
    assert_eq!(out, "line too long (127 chars max)\n");

    // The rest of the over-long line is ignored, the next line works.
    client.write_all(b"aaaa\r\nsys boot\r\n").unwrap();
    let out = pump(&mut mgr, &mut device, &mut client, "boot: STA");
    assert!(out.contains("boot: STA\n"));
}

/// Console wrapper remembering the largest outbox left after an event.
struct OutboxHighWater {
    inner: InteractiveHandler,
    peak: usize,
}

impl ConnectionHandler for OutboxHighWater {
    fn kind(&self) -> ServerKind {
        self.inner.kind()
    }

    fn on_event(
        &mut self,
        event: LifecycleEvent,
        conn: &mut Connection,
        device: &mut Device,
    ) -> io::Result<HandlerAction> {
        let action = self.inner.on_event(event, conn, device)?;
        self.peak = self.peak.max(conn.pending_output());
        Ok(action)
    }
}

#[test]
fn test_console_output_bounded_for_non_reading_client() {
    let mut device = device();
    let handler = OutboxHighWater {
        inner: InteractiveHandler::new("telnet", commander()),
        peak: 0,
    };
    let mut mgr = started("telnet", handler);
    let mut client = connect(&mgr);
    assert!(poll_until(&mut mgr, &mut device, |m| m.is_connected()));

    // The client sends `help` over and over and never reads the replies.
    let burst = b"help\r\n".repeat(64);
    let deadline = Instant::now() + Duration::from_secs(10);
    let mut sent = 0usize;
    while Instant::now() < deadline && mgr.handler().peak < MAX_PENDING_OUTPUT {
        match client.write(&burst) {
            Ok(n) => sent += n,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
            Err(e) => panic!("client write failed: {}", e),
        }
        for _ in 0..16 {
            mgr.poll(&mut device);
        }
    }
    assert!(
        mgr.handler().peak >= MAX_PENDING_OUTPUT,
        "socket buffers never filled after {} bytes",
        sent
    );

    // Keep pushing for a while; the outbox must not keep growing.
    for _ in 0..2000 {
        let _ = client.write(&burst);
        mgr.poll(&mut device);
    }
    let help_len = {
        let mut out = Vec::new();
        let mut ctx = device.command_context();
        commander().process(&mut out, &mut ctx, "help").unwrap();
        out.len() + DEFAULT_PROMPT.len()
    };
    assert!(
        mgr.handler().peak < MAX_PENDING_OUTPUT + help_len,
        "outbox grew to {} bytes",
        mgr.handler().peak
    );
    assert!(mgr.is_connected());
}

#[test]
fn test_bye_closes_session() {
    let mut device = device();
    let mut mgr = started("telnet", InteractiveHandler::new("telnet", commander()));
    let mut client = connect(&mgr);
    pump(&mut mgr, &mut device, &mut client, DEFAULT_PROMPT);

    client.write_all(b"bye\r\n").unwrap();
    assert!(wait_closed(&mut mgr, &mut device, &mut client));
    assert!(!mgr.is_connected());
    assert_eq!(mgr.status().state, ServerState::Idle);
}

#[test]
fn test_writes_reach_settings() {
    let mut device = device();
    let mut mgr = started("telnet", InteractiveHandler::new("telnet", commander()));
    let mut client = connect(&mgr);
    pump(&mut mgr, &mut device, &mut client, DEFAULT_PROMPT);

    client.write_all(b"net hostname=bench\r\n").unwrap();
    let out = pump(&mut mgr, &mut device, &mut client, DEFAULT_PROMPT);
    assert_eq!(out, DEFAULT_PROMPT);
    assert_eq!(device.settings.hostname(), "bench");
    assert_eq!(device.network.hostname(), "bench");
}

// ============================================================================
// Serial Bridge
// ============================================================================

#[derive(Default)]
struct FakeSerialState {
    opened_at: Option<u32>,
    open: bool,
    written: Vec<u8>,
    incoming: VecDeque<u8>,
    max_write: Option<usize>,
}

struct FakeSerial(Rc<RefCell<FakeSerialState>>);

impl SecondaryStream for FakeSerial {
    fn bytes_available(&mut self) -> io::Result<usize> {
        Ok(self.0.borrow().incoming.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.0.borrow_mut();
        let n = buf.len().min(state.incoming.len());
        for slot in buf.iter_mut().take(n) {
            *slot = state.incoming.pop_front().unwrap();
        }
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.0.borrow_mut();
        let n = state.max_write.map_or(buf.len(), |max| buf.len().min(max));
        state.written.extend_from_slice(&buf[..n]);
        Ok(n)
    }
}

impl Drop for FakeSerial {
    fn drop(&mut self) {
        self.0.borrow_mut().open = false;
    }
}

struct FakeOpener(Rc<RefCell<FakeSerialState>>);

impl SerialOpener for FakeOpener {
    fn open(&mut self, baud: u32) -> RunnerResult<Box<dyn SecondaryStream>> {
        let mut state = self.0.borrow_mut();
        state.opened_at = Some(baud);
        state.open = true;
        Ok(Box::new(FakeSerial(self.0.clone())))
    }
}

#[test]
fn test_bridge_forwards_both_directions() {
    let mut device = device();
    assert!(device.settings.set_uart_baud(115_200));
    let serial = Rc::new(RefCell::new(FakeSerialState::default()));
    let mut mgr = started("uart", BridgeHandler::new("uart", FakeOpener(serial.clone())));

    let mut client = connect(&mgr);
    assert!(poll_until(&mut mgr, &mut device, |m| m.is_connected()));
    assert_eq!(serial.borrow().opened_at, Some(115_200));
    assert!(mgr.handler().is_open());

    client.write_all(b"hello").unwrap();
    assert!(poll_until(&mut mgr, &mut device, |_| serial.borrow().written == b"hello"));

    serial.borrow_mut().incoming.extend(b"world".iter().copied());
    let out = pump(&mut mgr, &mut device, &mut client, "world");
    assert_eq!(out, "world");

    drop(client);
    assert!(poll_until(&mut mgr, &mut device, |m| !m.is_connected()));
    assert!(!serial.borrow().open);
    assert!(!mgr.handler().is_open());
}

#[test]
fn test_bridge_never_drops_bytes() {
    let mut device = device();
    let serial = Rc::new(RefCell::new(FakeSerialState {
        max_write: Some(3),
        ..FakeSerialState::default()
    }));
    let mut mgr = started("uart", BridgeHandler::new("uart", FakeOpener(serial.clone())));
    let mut client = connect(&mgr);
    assert!(poll_until(&mut mgr, &mut device, |m| m.is_connected()));

    let payload: Vec<u8> = (0..600u32).map(|i| (i % 251) as u8).collect();
    client.write_all(&payload).unwrap();
    assert!(poll_until(&mut mgr, &mut device, |_| serial.borrow().written.len() == payload.len()));
    assert_eq!(serial.borrow().written, payload);

    let reply: Vec<u8> = (0..1000u32).map(|i| (i % 13) as u8 + b'a').collect();
    serial.borrow_mut().incoming.extend(reply.iter().copied());
    let mut received = Vec::new();
    let deadline = Instant::now() + Duration::from_secs(3);
    while received.len() < reply.len() && Instant::now() < deadline {
        mgr.poll(&mut device);
        let mut buf = [0u8; 512];
        match client.read(&mut buf) {
            Ok(n) => received.extend_from_slice(&buf[..n]),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
            Err(e) => panic!("read failed: {}", e),
        }
    }
    assert_eq!(received, reply);
}

// ============================================================================
// HTTP Gateway
// ============================================================================

#[test]
fn test_http_runs_quoted_command() {
    let mut device = device();
    let mut mgr = started("web", HttpCommandHandler::new(commander()));
    let mut client = connect(&mgr);

    client
        .write_all(b"GET /'net%20mac' HTTP/1.1\r\nHost: device\r\n\r\n")
        .unwrap();
    let response = pump(&mut mgr, &mut device, &mut client, "");
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(response.contains("Content-Type: text/plain"));
    assert!(response.contains("24:6F:28:A1:B2:C3\n"));
    assert!(!mgr.is_connected());
}

#[test]
fn test_http_bare_path_shows_help() {
    let mut device = device();
    device.servers = vec![devcfg_common::ServerStatus {
        name: "telnet".to_string(),
        kind: ServerKind::Console,
        port: 2300,
        state: ServerState::Idle,
        remote: None,
        connected_since: None,
    }];
    let mut mgr = started("web", HttpCommandHandler::new(commander()));
    let mut client = connect(&mgr);

    client.write_all(b"GET / HTTP/1.1\r\n\r\n").unwrap();
    let response = pump(&mut mgr, &mut device, &mut client, "");
    assert!(response.contains("available commands:\n"));
    assert!(response.contains("append command to address in single quotes-"));
    assert!(response.contains("via port 2300"));
}

#[test]
fn test_http_favicon_not_found() {
    let mut device = device();
    let mut mgr = started("web", HttpCommandHandler::new(commander()));
    let mut client = connect(&mgr);

    client
        .write_all(b"GET /favicon.ico HTTP/1.1\r\n\r\n")
        .unwrap();
    let response = pump(&mut mgr, &mut device, &mut client, "");
    assert!(response.starts_with("HTTP/1.1 404"));
    assert!(!response.contains("available commands"));
}

#[test]
fn test_http_silent_client_times_out() {
    let mut device = device();
    let handler =
        HttpCommandHandler::new(commander()).with_request_timeout(Duration::from_millis(100));
    let mut mgr = started("web", handler);

    let mut idle = connect(&mgr);
    assert!(poll_until(&mut mgr, &mut device, |m| m.is_connected()));
    assert!(wait_closed(&mut mgr, &mut device, &mut idle));
    assert!(!mgr.is_connected());

    let mut client = connect(&mgr);
    client.write_all(b"GET /'uart%20baud' HTTP/1.1\r\n\r\n").unwrap();
    let response = pump(&mut mgr, &mut device, &mut client, "");
    assert!(response.contains("baud: 230400\n"));
}
