//! Network stack collaborator.

use std::net::{IpAddr, Ipv4Addr};

use tracing::info;

use crate::device::MacAddress;

/// The live network stack of the device.
///
/// The console reads identity from it and pushes hostname changes into it.
/// A hostname applied here may not be visible to DHCP servers or other
/// external observers until the next restart.
pub trait NetworkStack {
    /// Hostname currently in use by the stack.
    fn hostname(&self) -> String;

    /// Apply a new hostname to the running stack.
    fn set_hostname(&mut self, name: &str);

    /// Hardware address of the network interface.
    fn mac_address(&self) -> MacAddress;

    /// Local IP address of the network interface.
    fn local_ip(&self) -> IpAddr;
}

/// Network stack for a host process.
///
/// Identity comes from configuration; hostname changes are kept in memory
/// for the life of the process.
#[derive(Debug, Clone)]
pub struct HostNetwork {
    hostname: String,
    mac: MacAddress,
    local_ip: IpAddr,
}

impl HostNetwork {
    /// Create a host network stack with the given identity.
    pub fn new(hostname: impl Into<String>, mac: MacAddress, local_ip: IpAddr) -> Self {
        HostNetwork {
            hostname: hostname.into(),
            mac,
            local_ip,
        }
    }
}

impl Default for HostNetwork {
    fn default() -> Self {
        HostNetwork::new("espressif", MacAddress::default(), IpAddr::V4(Ipv4Addr::LOCALHOST))
    }
}

impl NetworkStack for HostNetwork {
    fn hostname(&self) -> String {
        self.hostname.clone()
    }

    fn set_hostname(&mut self, name: &str) {
        info!(old = %self.hostname, new = %name, "hostname applied (visible after restart)");
        self.hostname = name.to_string();
    }

    fn mac_address(&self) -> MacAddress {
        self.mac
    }

    fn local_ip(&self) -> IpAddr {
        self.local_ip
    }
}
