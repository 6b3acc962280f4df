//! Command table and line matching.
//!
//! A table is an ordered list of entries. Entries without an action are
//! roots (`sys`, `wifi`, ...); the leaf entries that follow a root, up to
//! the next root, are its sub-commands. Matching is a textual prefix test
//! in table order, first match wins, so a longer command text must be
//! listed before any shorter text that is a prefix of it (`erase all`
//! before `erase`). [`CommandTable::new`] rejects tables that break this.

use crate::commands::CommandId;
use crate::error::{CliError, CliResult};

/// Text that ends the session instead of running a command.
pub const DISCONNECT_COMMAND: &str = "bye";

/// One command table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandEntry {
    /// Command text matched against the input.
    pub text: &'static str,
    /// Handler to run; `None` marks a root/group entry.
    pub action: Option<CommandId>,
    /// Usage text shown in help listings.
    pub help: Option<&'static str>,
}

impl CommandEntry {
    /// A root/group entry.
    pub const fn root(text: &'static str) -> Self {
        CommandEntry {
            text,
            action: None,
            help: None,
        }
    }

    /// A leaf entry.
    pub const fn leaf(text: &'static str, action: CommandId, help: Option<&'static str>) -> Self {
        CommandEntry {
            text,
            action: Some(action),
            help,
        }
    }

    /// Whether this entry groups sub-commands.
    pub fn is_root(&self) -> bool {
        self.action.is_none()
    }
}

/// A validated command table.
#[derive(Debug, Clone)]
pub struct CommandTable {
    entries: Vec<CommandEntry>,
}

impl CommandTable {
    /// Build a table, checking the ordering rules.
    pub fn new(entries: Vec<CommandEntry>) -> CliResult<Self> {
        if let Some((i, _)) = entries
            .iter()
            .enumerate()
            .find(|(_, e)| e.text.trim().is_empty())
        {
            return Err(CliError::EmptyCommand(i));
        }
        if let Some(first) = entries.first() {
            if !first.is_root() {
                return Err(CliError::OrphanLeaf(first.text.to_string()));
            }
        }

        let table = CommandTable { entries };
        let roots: Vec<CommandEntry> = table.roots().map(|(_, e)| *e).collect();
        check_shadowing(&roots)?;
        for (i, _) in table.roots() {
            check_shadowing(table.children(i))?;
        }
        Ok(table)
    }

    /// All entries in order.
    pub fn entries(&self) -> &[CommandEntry] {
        &self.entries
    }

    /// Root entries with their table index.
    pub fn roots(&self) -> impl Iterator<Item = (usize, &CommandEntry)> {
        self.entries.iter().enumerate().filter(|(_, e)| e.is_root())
    }

    /// Leaf entries belonging to the root at `root`.
    pub fn children(&self, root: usize) -> &[CommandEntry] {
        let start = (root + 1).min(self.entries.len());
        let len = self.entries[start..]
            .iter()
            .take_while(|e| !e.is_root())
            .count();
        &self.entries[start..start + len]
    }

    /// Every leaf paired with its root, in table order.
    pub fn leaves(&self) -> impl Iterator<Item = (&CommandEntry, &CommandEntry)> {
        self.roots()
            .flat_map(move |(i, root)| self.children(i).iter().map(move |leaf| (root, leaf)))
    }
}

fn check_shadowing(entries: &[CommandEntry]) -> CliResult<()> {
    for (i, earlier) in entries.iter().enumerate() {
        if let Some(later) = entries[i + 1..]
            .iter()
            .find(|later| later.text.starts_with(earlier.text))
        {
            return Err(CliError::ShadowedCommand {
                earlier: earlier.text.to_string(),
                shadowed: later.text.to_string(),
            });
        }
    }
    Ok(())
}

// ============================================================================
// Matching
// ============================================================================

/// Result of matching one input line against a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineMatch<'t, 'l> {
    /// The line asks to end the session.
    Disconnect,
    /// No root command matched.
    Unknown,
    /// A root matched but was not followed by a space and a sub-command.
    Incomplete {
        /// Index of the matched root.
        root: usize,
    },
    /// A root matched but none of its sub-commands did.
    NoSubcommand {
        /// Index of the matched root.
        root: usize,
    },
    /// A leaf matched.
    Leaf {
        /// Index of the matched root.
        root: usize,
        /// The matched leaf entry.
        entry: &'t CommandEntry,
        /// Trimmed text following the leaf command text.
        args: &'l str,
    },
}

/// Match `line` against `table`.
///
/// The input is only sliced, never modified; `args` in the result borrows
/// from `line`.
pub fn match_line<'t, 'l>(table: &'t CommandTable, line: &'l str) -> LineMatch<'t, 'l> {
    let line = line.trim();
    if line.split_whitespace().next() == Some(DISCONNECT_COMMAND) {
        return LineMatch::Disconnect;
    }

    for (root, entry) in table.roots() {
        let Some(rest) = line.strip_prefix(entry.text) else {
            continue;
        };
        if !rest.starts_with(' ') {
            return LineMatch::Incomplete { root };
        }
        let rest = rest.trim();
        if rest.is_empty() {
            return LineMatch::Incomplete { root };
        }
        return table
            .children(root)
            .iter()
            .find_map(|child| {
                rest.strip_prefix(child.text).map(|args| LineMatch::Leaf {
                    root,
                    entry: child,
                    args: args.trim(),
                })
            })
            .unwrap_or(LineMatch::NoSubcommand { root });
    }

    LineMatch::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::default_table;

    fn leaf_of<'t, 'l>(m: LineMatch<'t, 'l>) -> (CommandId, &'l str) {
        match m {
            LineMatch::Leaf { entry, args, .. } => (entry.action.unwrap(), args),
            other => panic!("expected leaf, got {:?}", other),
        }
    }

    #[test]
    fn test_match_leaf_with_args() {
        let table = default_table();
        assert_eq!(
            leaf_of(match_line(&table, "wifi add 2 ssid=home")),
            (CommandId::WifiAdd, "2 ssid=home")
        );
        assert_eq!(leaf_of(match_line(&table, "  wifi list  ")), (CommandId::WifiList, ""));
        assert_eq!(leaf_of(match_line(&table, "sys boot=AP")), (CommandId::SysBoot, "=AP"));
        assert_eq!(leaf_of(match_line(&table, "sys erase all")), (CommandId::SysEraseAll, ""));
        assert_eq!(
            leaf_of(match_line(&table, "net hostname=bench")),
            (CommandId::NetHostname, "=bench")
        );
    }

    #[test]
    fn test_match_extra_spaces_between_levels() {
        let table = default_table();
        assert_eq!(leaf_of(match_line(&table, "wifi    erase   3")), (CommandId::WifiErase, "3"));
    }

    #[test]
    fn test_match_does_not_mutate_input() {
        let table = default_table();
        let line = String::from("wifi add 0 pass=pw");
        let m = match_line(&table, &line);
        assert_eq!(leaf_of(m), (CommandId::WifiAdd, "0 pass=pw"));
        assert_eq!(line, "wifi add 0 pass=pw");
    }

    #[test]
    fn test_match_unknown() {
        let table = default_table();
        assert_eq!(match_line(&table, "nonsense"), LineMatch::Unknown);
        assert_eq!(match_line(&table, ""), LineMatch::Unknown);
    }

    #[test]
    fn test_match_incomplete() {
        let table = default_table();
        assert!(matches!(match_line(&table, "wifi"), LineMatch::Incomplete { .. }));
        assert!(matches!(match_line(&table, "wifilist"), LineMatch::Incomplete { .. }));
        assert!(matches!(match_line(&table, "help"), LineMatch::Incomplete { .. }));
        assert!(matches!(match_line(&table, "?"), LineMatch::Incomplete { .. }));
    }

    #[test]
    fn test_match_no_subcommand() {
        let table = default_table();
        let m = match_line(&table, "sys erase");
        let LineMatch::NoSubcommand { root } = m else {
            panic!("expected NoSubcommand, got {:?}", m);
        };
        assert_eq!(table.entries()[root].text, "sys");
    }

    #[test]
    fn test_match_disconnect() {
        let table = default_table();
        assert_eq!(match_line(&table, "bye"), LineMatch::Disconnect);
        assert_eq!(match_line(&table, " bye "), LineMatch::Disconnect);
        assert_eq!(match_line(&table, "byebye"), LineMatch::Unknown);
    }

    #[test]
    fn test_children_and_leaves() {
        let table = default_table();
        let (sys, _) = table.roots().find(|(_, e)| e.text == "sys").unwrap();
        let texts: Vec<&str> = table.children(sys).iter().map(|e| e.text).collect();
        assert_eq!(texts, vec!["boot", "reboot", "erase all"]);

        let (help, _) = table.roots().find(|(_, e)| e.text == "help").unwrap();
        assert!(table.children(help).is_empty());
        assert!(table.leaves().all(|(root, leaf)| root.is_root() && !leaf.is_root()));
    }

    #[test]
    fn test_rejects_shadowed_leaf() {
        let err = CommandTable::new(vec![
            CommandEntry::root("sys"),
            CommandEntry::leaf("erase", CommandId::WifiErase, None),
            CommandEntry::leaf("erase all", CommandId::SysEraseAll, None),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            CliError::ShadowedCommand {
                earlier: "erase".to_string(),
                shadowed: "erase all".to_string(),
            }
        );
    }

    #[test]
    fn test_accepts_longer_first() {
        let table = CommandTable::new(vec![
            CommandEntry::root("sys"),
            CommandEntry::leaf("erase all", CommandId::SysEraseAll, None),
            CommandEntry::leaf("erase", CommandId::WifiErase, None),
        ])
        .unwrap();
        assert_eq!(leaf_of(match_line(&table, "sys erase all")), (CommandId::SysEraseAll, ""));
        assert_eq!(leaf_of(match_line(&table, "sys erase 1")), (CommandId::WifiErase, "1"));
    }

    #[test]
    fn test_rejects_shadowed_root_and_orphans() {
        let err = CommandTable::new(vec![CommandEntry::root("net"), CommandEntry::root("network")])
            .unwrap_err();
        assert!(matches!(err, CliError::ShadowedCommand { .. }));

        let err = CommandTable::new(vec![CommandEntry::leaf("list", CommandId::WifiList, None)])
            .unwrap_err();
        assert_eq!(err, CliError::OrphanLeaf("list".to_string()));

        let err = CommandTable::new(vec![CommandEntry::root(" ")]).unwrap_err();
        assert_eq!(err, CliError::EmptyCommand(0));
    }
}
