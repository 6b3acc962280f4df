//! Command identifiers and the default console command table.

use crate::table::{CommandEntry, CommandTable};

/// Every handler the console can dispatch to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandId {
    /// `sys boot`: show or set the next-boot network mode.
    SysBoot,
    /// `sys reboot`: restart the device.
    SysReboot,
    /// `sys erase all`: clear the settings store.
    SysEraseAll,
    /// `wifi list`: print the credential slots.
    WifiList,
    /// `wifi add`: write one field of a credential slot.
    WifiAdd,
    /// `wifi erase`: clear a credential slot.
    WifiErase,
    /// `net hostname`: show or set the station hostname.
    NetHostname,
    /// `net APname`: show or set the access-point name.
    NetApName,
    /// `net mac`: print the hardware address.
    NetMac,
    /// `net info`: print address, hostname and MAC.
    NetInfo,
    /// `net status`: print the listener status table.
    NetStatus,
    /// `uart baud`: show or set the bridge baud rate.
    UartBaud,
}

impl CommandId {
    /// Stable name used in logs and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandId::SysBoot => "sys_boot",
            CommandId::SysReboot => "sys_reboot",
            CommandId::SysEraseAll => "sys_erase_all",
            CommandId::WifiList => "wifi_list",
            CommandId::WifiAdd => "wifi_add",
            CommandId::WifiErase => "wifi_erase",
            CommandId::NetHostname => "net_hostname",
            CommandId::NetApName => "net_apname",
            CommandId::NetMac => "net_mac",
            CommandId::NetInfo => "net_info",
            CommandId::NetStatus => "net_status",
            CommandId::UartBaud => "uart_baud",
        }
    }
}

impl std::fmt::Display for CommandId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entries of the stock console table.
///
/// `?` and `help` are roots without children, so matching them always
/// ends in the help listing.
pub const DEFAULT_ENTRIES: &[CommandEntry] = &[
    CommandEntry::root("?"),
    CommandEntry::root("help"),
    CommandEntry::root("sys"),
    CommandEntry::leaf("boot", CommandId::SysBoot, Some("<boot | boot=AP | boot=STA>")),
    CommandEntry::leaf("reboot", CommandId::SysReboot, None),
    CommandEntry::leaf("erase all", CommandId::SysEraseAll, None),
    CommandEntry::root("wifi"),
    CommandEntry::leaf("list", CommandId::WifiList, None),
    CommandEntry::leaf(
        "add",
        CommandId::WifiAdd,
        Some("add # <ssid=ssidname | pass=password>"),
    ),
    CommandEntry::leaf("erase", CommandId::WifiErase, Some("erase #")),
    CommandEntry::root("net"),
    CommandEntry::leaf(
        "hostname",
        CommandId::NetHostname,
        Some("<hostname | hostname=myname>"),
    ),
    CommandEntry::leaf("APname", CommandId::NetApName, Some("<APname | APname=myapname>")),
    CommandEntry::leaf("mac", CommandId::NetMac, None),
    CommandEntry::leaf("info", CommandId::NetInfo, None),
    CommandEntry::leaf("status", CommandId::NetStatus, None),
    CommandEntry::root("uart"),
    CommandEntry::leaf("baud", CommandId::UartBaud, Some("<baud | baud=115200>")),
];

/// The stock console table.
pub fn default_table() -> CommandTable {
    match CommandTable::new(DEFAULT_ENTRIES.to_vec()) {
        Ok(table) => table,
        // The stock entries are covered by tests; reaching this is a bug.
        Err(e) => unreachable!("default command table is invalid: {e}"),
    }
}
