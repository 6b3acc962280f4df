//! Console output: diagnostics and the help listing.
//!
//! Every diagnostic is a single line. Setters print nothing on success, so
//! these are the only fixed strings a client needs to recognise.

use std::io::{self, Write};

use devcfg_settings::{MAX_NAME_LEN, MAX_PASS_LEN, MAX_SSID_LEN, UART_BAUD_RANGE};
use serde::{Deserialize, Serialize};

use crate::codec::MAX_LINE_LENGTH;
use crate::table::CommandTable;

/// Header line of the help listing.
pub const HELP_HEADER: &str = "available commands:";

/// A one-line diagnostic printed to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Diagnostic {
    /// No root command matched.
    UnknownCommand,
    /// A slot index was missing or not a number.
    MissingIndex,
    /// A slot index was past the last slot.
    IndexOutOfRange {
        /// Highest valid index.
        max: usize,
    },
    /// A value exceeded its field limit.
    TooLong {
        /// Name of the field as the user typed it.
        field: &'static str,
        /// Limit in characters.
        max: usize,
    },
    /// Baud rate outside the accepted range.
    InvalidBaud,
    /// An input line exceeded the line buffer.
    LineTooLong,
    /// The store did not persist the value.
    WriteFailed,
}

impl Diagnostic {
    /// `ssid too long (31 chars max)`
    pub const SSID_TOO_LONG: Diagnostic = Diagnostic::TooLong {
        field: "ssid",
        max: MAX_SSID_LEN,
    };
    /// `pass too long (63 chars max)`
    pub const PASS_TOO_LONG: Diagnostic = Diagnostic::TooLong {
        field: "pass",
        max: MAX_PASS_LEN,
    };
    /// `hostname too long (32 chars max)`
    pub const HOSTNAME_TOO_LONG: Diagnostic = Diagnostic::TooLong {
        field: "hostname",
        max: MAX_NAME_LEN,
    };
    /// `APname too long (32 chars max)`
    pub const AP_NAME_TOO_LONG: Diagnostic = Diagnostic::TooLong {
        field: "APname",
        max: MAX_NAME_LEN,
    };

    /// Writes the diagnostic followed by a newline.
    pub fn write_to(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "{}", self)
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Diagnostic::UnknownCommand => f.write_str("unknown command"),
            Diagnostic::MissingIndex => f.write_str("missing index# or index# not valid"),
            Diagnostic::IndexOutOfRange { max } => write!(f, "index# is out of range (max {})", max),
            Diagnostic::TooLong { field, max } => write!(f, "{} too long ({} chars max)", field, max),
            Diagnostic::InvalidBaud => write!(
                f,
                "invalid baud rate ({}-{})",
                UART_BAUD_RANGE.start(),
                UART_BAUD_RANGE.end()
            ),
            Diagnostic::LineTooLong => write!(f, "line too long ({} chars max)", MAX_LINE_LENGTH),
            Diagnostic::WriteFailed => f.write_str("write failed"),
        }
    }
}

/// Which part of the table a help listing covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HelpPolicy {
    /// Always list every command.
    #[default]
    Full,
    /// List only the group the rejected line matched, when it has one.
    Group,
}

/// Writes the help listing.
///
/// One line per leaf: the root text followed by the leaf's help text, or
/// by the leaf text itself when it has none. With [`HelpPolicy::Group`]
/// and a `root` that has children, only that root's leaves are listed.
pub fn write_help(
    out: &mut dyn Write,
    table: &CommandTable,
    policy: HelpPolicy,
    root: Option<usize>,
) -> io::Result<()> {
    writeln!(out, "{}", HELP_HEADER)?;

    let group = match (policy, root) {
        (HelpPolicy::Group, Some(i)) if !table.children(i).is_empty() => Some(i),
        _ => None,
    };

    match group {
        Some(i) => {
            let root = &table.entries()[i];
            for leaf in table.children(i) {
                writeln!(out, "  {} {}", root.text, leaf.help.unwrap_or(leaf.text))?;
            }
        }
        None => {
            for (root, leaf) in table.leaves() {
                writeln!(out, "  {} {}", root.text, leaf.help.unwrap_or(leaf.text))?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::default_table;

    fn render(d: Diagnostic) -> String {
        let mut out = Vec::new();
        d.write_to(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_diagnostic_text() {
        assert_eq!(render(Diagnostic::UnknownCommand), "unknown command\n");
        assert_eq!(
            render(Diagnostic::IndexOutOfRange { max: 7 }),
            "index# is out of range (max 7)\n"
        );
        assert_eq!(render(Diagnostic::SSID_TOO_LONG), "ssid too long (31 chars max)\n");
        assert_eq!(render(Diagnostic::PASS_TOO_LONG), "pass too long (63 chars max)\n");
        assert_eq!(render(Diagnostic::HOSTNAME_TOO_LONG), "hostname too long (32 chars max)\n");
        assert_eq!(render(Diagnostic::AP_NAME_TOO_LONG), "APname too long (32 chars max)\n");
        assert_eq!(render(Diagnostic::InvalidBaud), "invalid baud rate (300-5000000)\n");
        assert_eq!(render(Diagnostic::LineTooLong), "line too long (127 chars max)\n");
    }

    #[test]
    fn test_full_help_lists_every_leaf() {
        let table = default_table();
        let mut out = Vec::new();
        write_help(&mut out, &table, HelpPolicy::Full, None).unwrap();
        let text = String::from_utf8(out).unwrap();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "available commands:");
        assert_eq!(lines[1], "  sys <boot | boot=AP | boot=STA>");
        assert_eq!(lines[2], "  sys reboot");
        assert_eq!(lines[3], "  sys erase all");
        assert!(lines.contains(&"  wifi add # <ssid=ssidname | pass=password>"));
        assert!(lines.contains(&"  net mac"));
        assert_eq!(lines.len(), 1 + table.leaves().count());
    }

    #[test]
    fn test_group_help() {
        let table = default_table();
        let (wifi, _) = table.roots().find(|(_, e)| e.text == "wifi").unwrap();
        let mut out = Vec::new();
        write_help(&mut out, &table, HelpPolicy::Group, Some(wifi)).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "available commands:\n  wifi list\n  wifi add # <ssid=ssidname | pass=password>\n  wifi erase #\n"
        );
    }

    #[test]
    fn test_group_help_falls_back_for_childless_root() {
        let table = default_table();
        let (help, _) = table.roots().find(|(_, e)| e.text == "help").unwrap();
        let mut grouped = Vec::new();
        write_help(&mut grouped, &table, HelpPolicy::Group, Some(help)).unwrap();
        let mut full = Vec::new();
        write_help(&mut full, &table, HelpPolicy::Full, None).unwrap();
        assert_eq!(grouped, full);
    }
}
