//! Bound-address discovery and lookup.

use std::net::{IpAddr, Ipv4Addr};

use get_if_addrs::IfAddr;
use tracing::{debug, info};

use crate::error::{NetworkError, Result};

/// The SSDP multicast group.
pub const DEFAULT_MULTICAST_GROUP: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 250);
/// The SSDP multicast port.
pub const DEFAULT_MULTICAST_PORT: u16 = 1900;
/// Default port for the local HTTP stream server (descriptions, GENA callbacks).
pub const DEFAULT_STREAM_PORT: u16 = 3400;

/// Multicast and stream-listen configuration.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    pub multicast_group: Ipv4Addr,
    pub multicast_port: u16,
    pub stream_listen_port: u16,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            multicast_group: DEFAULT_MULTICAST_GROUP,
            multicast_port: DEFAULT_MULTICAST_PORT,
            stream_listen_port: DEFAULT_STREAM_PORT,
        }
    }
}

/// One usable local interface address.
///
/// Only non-loopback IPv4 addresses qualify. The set is frozen at
/// construction time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundAddress {
    /// Interface name, e.g. `eth0`
    pub interface: String,
    pub address: Ipv4Addr,
    pub netmask: Ipv4Addr,
    /// Directed broadcast address, when the platform reports one
    pub broadcast: Option<Ipv4Addr>,
    /// Hardware (MAC) address, when obtainable
    pub hardware: Option<String>,
}

/// Enumerates usable local addresses and answers address-selection queries.
pub struct NetworkAddressFactory {
    config: NetworkConfig,
    bind_addresses: Vec<BoundAddress>,
    /// Every address seen during enumeration, including families we do
    /// not bind to; used for `local_address` family selection.
    all_addresses: Vec<(String, IpAddr)>,
}

impl NetworkAddressFactory {
    /// Discover local addresses. Fails when no usable address exists;
    /// the stack cannot run without at least one bindable address.
    pub fn new(config: NetworkConfig) -> Result<Self> {
        let interfaces = get_if_addrs::get_if_addrs()?;

        let mut bind_addresses = Vec::new();
        let mut all_addresses = Vec::new();

        for iface in interfaces {
            all_addresses.push((iface.name.clone(), iface.ip()));

            if iface.is_loopback() {
                continue;
            }
            if let IfAddr::V4(v4) = &iface.addr {
                let hardware = read_hardware_address(&iface.name);
                debug!(
                    interface = %iface.name,
                    address = %v4.ip,
                    hardware = hardware.as_deref().unwrap_or("unknown"),
                    "usable bind address"
                );
                bind_addresses.push(BoundAddress {
                    interface: iface.name.clone(),
                    address: v4.ip,
                    netmask: v4.netmask,
                    broadcast: v4.broadcast,
                    hardware,
                });
            }
        }

        if bind_addresses.is_empty() {
            return Err(NetworkError::NoUsableInterface);
        }

        info!(
            addresses = bind_addresses.len(),
            "network address factory initialized"
        );

        Ok(Self {
            config,
            bind_addresses,
            all_addresses,
        })
    }

    /// Build a factory from a fixed address set. Used by tests and by
    /// deployments that pin their interfaces explicitly.
    pub fn with_addresses(config: NetworkConfig, bind_addresses: Vec<BoundAddress>) -> Result<Self> {
        if bind_addresses.is_empty() {
            return Err(NetworkError::NoUsableInterface);
        }
        let all_addresses = bind_addresses
            .iter()
            .map(|bound| (bound.interface.clone(), IpAddr::V4(bound.address)))
            .collect();
        Ok(Self {
            config,
            bind_addresses,
            all_addresses,
        })
    }

    /// Names of the interfaces contributing at least one bind address,
    /// in first-seen order.
    pub fn interfaces(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for bound in &self.bind_addresses {
            if !names.contains(&bound.interface.as_str()) {
                names.push(bound.interface.as_str());
            }
        }
        names
    }

    pub fn bind_addresses(&self) -> &[BoundAddress] {
        &self.bind_addresses
    }

    pub fn multicast_group(&self) -> Ipv4Addr {
        self.config.multicast_group
    }

    pub fn multicast_port(&self) -> u16 {
        self.config.multicast_port
    }

    pub fn stream_listen_port(&self) -> u16 {
        self.config.stream_listen_port
    }

    /// Hardware address of the interface owning `address`. Absent when
    /// the platform does not expose one; never an error.
    pub fn hardware_address(&self, address: Ipv4Addr) -> Option<&str> {
        self.bind_addresses
            .iter()
            .find(|bound| bound.address == address)
            .and_then(|bound| bound.hardware.as_deref())
    }

    /// Directed broadcast address for `address`, when known.
    pub fn broadcast_address(&self, address: Ipv4Addr) -> Option<Ipv4Addr> {
        self.bind_addresses
            .iter()
            .find(|bound| bound.address == address)
            .and_then(|bound| bound.broadcast)
    }

    /// Pick a local address on `interface` whose family suits `remote`.
    ///
    /// Best-effort: the first matching address wins. Errors when the
    /// interface carries no address of the wanted family.
    pub fn local_address(
        &self,
        interface: &str,
        prefer_ipv6: bool,
        remote: IpAddr,
    ) -> Result<IpAddr> {
        let want_v6 = prefer_ipv6 || remote.is_ipv6();
        let family = if want_v6 { "IPv6" } else { "IPv4" };

        self.all_addresses
            .iter()
            .filter(|(name, _)| name == interface)
            .map(|(_, addr)| *addr)
            .find(|addr| addr.is_ipv6() == want_v6)
            .ok_or_else(|| NetworkError::NoAddressForInterface {
                interface: interface.to_string(),
                family,
            })
    }
}

/// Read the MAC of a named interface, Linux sysfs only. Everywhere else
/// this is simply unavailable.
fn read_hardware_address(interface: &str) -> Option<String> {
    #[cfg(target_os = "linux")]
    {
        let path = format!("/sys/class/net/{interface}/address");
        let raw = std::fs::read_to_string(path).ok()?;
        let mac = raw.trim().to_ascii_uppercase();
        if mac.is_empty() || mac == "00:00:00:00:00:00" {
            None
        } else {
            Some(mac)
        }
    }
    #[cfg(not(target_os = "linux"))]
    {
        let _ = interface;
        None
    }
}
