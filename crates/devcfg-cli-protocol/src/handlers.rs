//! Leaf command handlers.
//!
//! Each handler gets the trimmed argument text that followed its command
//! word. An empty argument prints the current value; an argument starting
//! with `=` (or a recognised sub-token) validates and writes through the
//! store, printing nothing on success. Anything else asks the commander to
//! print help.

use std::fmt::Write as _;
use std::io::{self, Write};
use std::thread;

use devcfg_common::{BootMode, ServerStatus};
use devcfg_settings::{SlotField, MAX_NAME_LEN};
use tracing::{debug, info, warn};

use crate::commander::{CommandContext, CommanderConfig};
use crate::commands::CommandId;
use crate::responses::Diagnostic;

/// Outcome of a handler, rendered by the commander.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Handled {
    /// The handler produced its own output.
    Done,
    /// The arguments were not understood; print help.
    ShowHelp,
    /// The command takes no arguments but got some.
    Unknown,
}

pub(crate) fn run(
    id: CommandId,
    out: &mut dyn Write,
    ctx: &mut CommandContext<'_>,
    args: &str,
    config: &CommanderConfig,
) -> io::Result<Handled> {
    match id {
        CommandId::SysBoot => sys_boot(out, ctx, args),
        CommandId::SysReboot => sys_reboot(out, ctx, args, config),
        CommandId::SysEraseAll => sys_erase_all(out, ctx, args),
        CommandId::WifiList => wifi_list(out, ctx, args),
        CommandId::WifiAdd => wifi_add(out, ctx, args),
        CommandId::WifiErase => wifi_erase(out, ctx, args),
        CommandId::NetHostname => net_hostname(out, ctx, args),
        CommandId::NetApName => net_ap_name(out, ctx, args),
        CommandId::NetMac => net_mac(out, ctx, args),
        CommandId::NetInfo => net_info(out, ctx, args),
        CommandId::NetStatus => net_status(out, ctx, args),
        CommandId::UartBaud => uart_baud(out, ctx, args),
    }
}

fn done_or_failed(out: &mut dyn Write, written: bool) -> io::Result<Handled> {
    if !written {
        Diagnostic::WriteFailed.write_to(out)?;
    }
    Ok(Handled::Done)
}

/// Parse a leading slot index. Returns the index and the rest of the text.
fn parse_index(args: &str, slot_count: u8) -> Result<(u8, &str), Diagnostic> {
    let (first, rest) = args.split_once(' ').unwrap_or((args, ""));
    let index: usize = first.parse().map_err(|_| Diagnostic::MissingIndex)?;
    if index >= usize::from(slot_count) {
        return Err(Diagnostic::IndexOutOfRange {
            max: usize::from(slot_count).saturating_sub(1),
        });
    }
    // index < slot_count <= u8::MAX
    Ok((index as u8, rest.trim()))
}

// ============================================================================
// sys
// ============================================================================

fn sys_boot(out: &mut dyn Write, ctx: &mut CommandContext<'_>, args: &str) -> io::Result<Handled> {
    if args.is_empty() {
        writeln!(out, "boot: {}", ctx.settings.boot_mode())?;
        return Ok(Handled::Done);
    }
    let mode = match args.strip_prefix('=').map(str::parse::<BootMode>) {
        Some(Ok(mode)) => mode,
        _ => return Ok(Handled::ShowHelp),
    };
    info!(mode = %mode, "boot mode set");
    done_or_failed(out, ctx.settings.set_boot_mode(mode))
}

fn sys_reboot(
    out: &mut dyn Write,
    ctx: &mut CommandContext<'_>,
    args: &str,
    config: &CommanderConfig,
) -> io::Result<Handled> {
    if !args.is_empty() {
        return Ok(Handled::Unknown);
    }
    writeln!(out, "rebooting in {} seconds...", config.reboot_delay.as_secs())?;
    out.flush()?;
    info!(delay = ?config.reboot_delay, "reboot requested");
    thread::sleep(config.reboot_delay);
    ctx.system.restart();
    Ok(Handled::Done)
}

fn sys_erase_all(
    out: &mut dyn Write,
    ctx: &mut CommandContext<'_>,
    args: &str,
) -> io::Result<Handled> {
    if !args.is_empty() {
        return Ok(Handled::Unknown);
    }
    write!(out, "erasing all stored data...")?;
    if ctx.settings.erase_all() {
        info!("settings erased from console");
        writeln!(out, "done.")?;
    } else {
        writeln!(out)?;
        Diagnostic::WriteFailed.write_to(out)?;
    }
    Ok(Handled::Done)
}

// ============================================================================
// wifi
// ============================================================================

fn wifi_list(out: &mut dyn Write, ctx: &mut CommandContext<'_>, args: &str) -> io::Result<Handled> {
    if !args.is_empty() {
        return Ok(Handled::Unknown);
    }
    let slots: Vec<(String, String)> = (0..ctx.settings.slot_count())
        .map(|i| {
            (
                ctx.settings.get_slot_field(i, SlotField::Ssid),
                ctx.settings.get_slot_field(i, SlotField::Pass),
            )
        })
        .collect();
    let sw = slots.iter().map(|(s, _)| s.len()).max().unwrap_or(0).max(4);
    let pw = slots.iter().map(|(_, p)| p.len()).max().unwrap_or(0).max(4);

    writeln!(out, "{}", format!("  #  {:<sw$}  {:<pw$}", "SSID", "PASS").trim_end())?;
    writeln!(out, "{}", "-".repeat(sw + pw + 7))?;
    for (i, (ssid, pass)) in slots.iter().enumerate() {
        writeln!(out, "{}", format!(" {:2}  {:<sw$}  {:<pw$}", i, ssid, pass).trim_end())?;
    }
    Ok(Handled::Done)
}

fn wifi_add(out: &mut dyn Write, ctx: &mut CommandContext<'_>, args: &str) -> io::Result<Handled> {
    let (index, rest) = match parse_index(args, ctx.settings.slot_count()) {
        Ok(parsed) => parsed,
        Err(diag) => {
            diag.write_to(out)?;
            return Ok(Handled::Done);
        }
    };
    let (field, value) = if let Some(v) = rest.strip_prefix("ssid=") {
        (SlotField::Ssid, v)
    } else if let Some(v) = rest.strip_prefix("pass=") {
        (SlotField::Pass, v)
    } else {
        return Ok(Handled::ShowHelp);
    };
    if value.len() > field.max_len() {
        let diag = match field {
            SlotField::Ssid => Diagnostic::SSID_TOO_LONG,
            SlotField::Pass => Diagnostic::PASS_TOO_LONG,
        };
        diag.write_to(out)?;
        return Ok(Handled::Done);
    }
    debug!(index, field = field.as_str(), "slot field set");
    done_or_failed(out, ctx.settings.set_slot_field(index, field, value) > 0)
}

fn wifi_erase(out: &mut dyn Write, ctx: &mut CommandContext<'_>, args: &str) -> io::Result<Handled> {
    let index = match parse_index(args, ctx.settings.slot_count()) {
        Ok((index, "")) => index,
        Ok(_) => return Ok(Handled::ShowHelp),
        Err(diag) => {
            diag.write_to(out)?;
            return Ok(Handled::Done);
        }
    };
    debug!(index, "slot cleared");
    done_or_failed(out, ctx.settings.clear_slot(index))
}

// ============================================================================
// net
// ============================================================================

fn net_hostname(
    out: &mut dyn Write,
    ctx: &mut CommandContext<'_>,
    args: &str,
) -> io::Result<Handled> {
    if args.is_empty() {
        writeln!(
            out,
            "hardware: {}  stored: {}",
            ctx.network.hostname(),
            ctx.settings.stored_hostname().unwrap_or_default()
        )?;
        return Ok(Handled::Done);
    }
    let Some(name) = args.strip_prefix('=') else {
        return Ok(Handled::ShowHelp);
    };
    if name.len() > MAX_NAME_LEN {
        Diagnostic::HOSTNAME_TOO_LONG.write_to(out)?;
        return Ok(Handled::Done);
    }
    if ctx.settings.set_hostname(name) == 0 {
        return done_or_failed(out, false);
    }
    let effective = ctx.settings.hostname();
    ctx.network.set_hostname(&effective);
    Ok(Handled::Done)
}

fn net_ap_name(
    out: &mut dyn Write,
    ctx: &mut CommandContext<'_>,
    args: &str,
) -> io::Result<Handled> {
    if args.is_empty() {
        writeln!(out, "{}", ctx.settings.ap_name())?;
        return Ok(Handled::Done);
    }
    let Some(name) = args.strip_prefix('=') else {
        return Ok(Handled::ShowHelp);
    };
    if name.len() > MAX_NAME_LEN {
        Diagnostic::AP_NAME_TOO_LONG.write_to(out)?;
        return Ok(Handled::Done);
    }
    done_or_failed(out, ctx.settings.set_ap_name(name) > 0)
}

fn net_mac(out: &mut dyn Write, ctx: &mut CommandContext<'_>, args: &str) -> io::Result<Handled> {
    if !args.is_empty() {
        return Ok(Handled::ShowHelp);
    }
    writeln!(out, "{}", ctx.network.mac_address())?;
    Ok(Handled::Done)
}

fn net_info(out: &mut dyn Write, ctx: &mut CommandContext<'_>, args: &str) -> io::Result<Handled> {
    if !args.is_empty() {
        return Ok(Handled::ShowHelp);
    }
    writeln!(out, "ip:       {}", ctx.network.local_ip())?;
    writeln!(out, "hostname: {}", ctx.network.hostname())?;
    writeln!(out, "mac:      {}", ctx.network.mac_address())?;
    Ok(Handled::Done)
}

fn net_status(
    out: &mut dyn Write,
    ctx: &mut CommandContext<'_>,
    args: &str,
) -> io::Result<Handled> {
    if !args.is_empty() {
        return Ok(Handled::ShowHelp);
    }
    out.write_all(format_status_table(ctx.servers).as_bytes())?;
    Ok(Handled::Done)
}

/// Render the listener status table.
pub(crate) fn format_status_table(servers: &[ServerStatus]) -> String {
    let nw = servers.iter().map(|s| s.name.len()).max().unwrap_or(0).max(4);
    let mut text = String::new();
    let _ = writeln!(
        text,
        "  {:<nw$}  {:<7}  {:>5}  {:<9}  client",
        "name", "kind", "port", "state"
    );
    for s in servers {
        let client = match (s.remote, s.connected_since) {
            (Some(addr), Some(since)) => format!("{} since {}", addr, since.format("%H:%M:%S")),
            (Some(addr), None) => addr.to_string(),
            _ => String::new(),
        };
        let line = format!(
            "  {:<nw$}  {:<7}  {:>5}  {:<9}  {}",
            s.name,
            s.kind.as_str(),
            s.port,
            s.state.as_str(),
            client
        );
        let _ = writeln!(text, "{}", line.trim_end());
    }
    text
}

// ============================================================================
// uart
// ============================================================================

fn uart_baud(out: &mut dyn Write, ctx: &mut CommandContext<'_>, args: &str) -> io::Result<Handled> {
    if args.is_empty() {
        writeln!(out, "baud: {}", ctx.settings.uart_baud())?;
        return Ok(Handled::Done);
    }
    let Some(value) = args.strip_prefix('=') else {
        return Ok(Handled::ShowHelp);
    };
    let baud = match value.trim().parse::<u32>() {
        Ok(baud) if devcfg_settings::UART_BAUD_RANGE.contains(&baud) => baud,
        _ => {
            Diagnostic::InvalidBaud.write_to(out)?;
            return Ok(Handled::Done);
        }
    };
    if !ctx.settings.set_uart_baud(baud) {
        warn!(baud, "baud rate not stored");
        return done_or_failed(out, false);
    }
    Ok(Handled::Done)
}

#[cfg(test)]
mod tests {
    use super::*;
    use devcfg_common::{ServerKind, ServerState};

    #[test]
    fn test_parse_index() {
        assert_eq!(parse_index("2 ssid=home", 8), Ok((2, "ssid=home")));
        assert_eq!(parse_index("0", 8), Ok((0, "")));
        assert_eq!(parse_index("", 8), Err(Diagnostic::MissingIndex));
        assert_eq!(parse_index("x ssid=a", 8), Err(Diagnostic::MissingIndex));
        assert_eq!(parse_index("-1", 8), Err(Diagnostic::MissingIndex));
        assert_eq!(
            parse_index("8 ssid=a", 8),
            Err(Diagnostic::IndexOutOfRange { max: 7 })
        );
        assert_eq!(
            parse_index("99999999999999999999", 8),
            Err(Diagnostic::MissingIndex)
        );
    }

    #[test]
    fn test_status_table() {
        let servers = vec![
            ServerStatus {
                name: "telnet".to_string(),
                kind: ServerKind::Console,
                port: 2300,
                state: ServerState::Connected,
                remote: Some("10.0.0.2:51000".parse().unwrap()),
                connected_since: None,
            },
            ServerStatus {
                name: "uart".to_string(),
                kind: ServerKind::Bridge,
                port: 2301,
                state: ServerState::Idle,
                remote: None,
                connected_since: None,
            },
        ];
        let text = format_status_table(&servers);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "  name    kind      port  state      client");
        assert_eq!(lines[1], "  telnet  console   2300  connected  10.0.0.2:51000");
        assert_eq!(lines[2], "  uart    bridge    2301  idle");
    }
}
