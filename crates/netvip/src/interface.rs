//! Network interface enumeration and lookup.
//!
//! Thin wrappers over the OS interface listing; all protocol work lives in
//! the netlink and packet modules.

use std::collections::BTreeMap;
use std::net::IpAddr;

use common::{Error, Result};
use nix::ifaddrs::getifaddrs;
use nix::net::if_::if_nametoindex;

use crate::types::{AddressPrefix, MacAddr};

/// A network interface as needed by the address and ARP entry points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interface {
    pub name: String,
    /// Kernel interface index.
    pub index: u32,
    /// Hardware address, if the interface has one.
    pub mac: Option<MacAddr>,
}

impl Interface {
    /// Look up an interface by name.
    pub fn by_name(name: &str) -> Result<Self> {
        let index = if_nametoindex(name)
            .map_err(|_| Error::interface(format!("no such network interface {name:?}")))?;
        Ok(Self {
            name: name.to_string(),
            index,
            mac: hardware_addr(name)?,
        })
    }

    /// List all interfaces on the host.
    pub fn list() -> Result<Vec<Self>> {
        let mut macs: BTreeMap<String, Option<MacAddr>> = BTreeMap::new();
        for ifaddr in getifaddrs().map_err(|e| Error::interface(e.to_string()))? {
            let entry = macs.entry(ifaddr.interface_name.clone()).or_default();
            if let Some(mac) = link_addr_of(&ifaddr) {
                *entry = Some(mac);
            }
        }

        let mut interfaces = Vec::with_capacity(macs.len());
        for (name, mac) in macs {
            let index = if_nametoindex(name.as_str())
                .map_err(|_| Error::interface(format!("no such network interface {name:?}")))?;
            interfaces.push(Self { name, index, mac });
        }
        Ok(interfaces)
    }

    /// The address prefixes currently assigned to this interface.
    pub fn addresses(&self) -> Result<Vec<AddressPrefix>> {
        let mut prefixes = Vec::new();
        for ifaddr in getifaddrs().map_err(|e| Error::interface(e.to_string()))? {
            if ifaddr.interface_name != self.name {
                continue;
            }
            let Some(address) = ifaddr.address.as_ref() else {
                continue;
            };
            let addr = if let Some(sin) = address.as_sockaddr_in() {
                IpAddr::V4(sin.ip())
            } else if let Some(sin6) = address.as_sockaddr_in6() {
                IpAddr::V6(sin6.ip())
            } else {
                continue;
            };
            let prefix_len = ifaddr
                .netmask
                .as_ref()
                .and_then(|mask| {
                    mask.as_sockaddr_in()
                        .map(|m| u32::from(m.ip()).count_ones() as u8)
                        .or_else(|| {
                            mask.as_sockaddr_in6()
                                .map(|m| u128::from(m.ip()).count_ones() as u8)
                        })
                })
                .unwrap_or_else(|| match addr {
                    IpAddr::V4(_) => 32,
                    IpAddr::V6(_) => 128,
                });
            prefixes.push(AddressPrefix::new(addr, prefix_len)?);
        }
        Ok(prefixes)
    }

    /// Whether this interface carries exactly the given prefix.
    pub fn has_prefix(&self, prefix: &AddressPrefix) -> Result<bool> {
        Ok(self.addresses()?.contains(prefix))
    }

    /// Whether any of this interface's prefixes contains the given address.
    pub fn has_address(&self, addr: IpAddr) -> Result<bool> {
        Ok(self.addresses()?.iter().any(|p| p.contains(addr)))
    }
}

/// Find the interface carrying exactly the given prefix.
pub fn interface_by_prefix(prefix: &AddressPrefix) -> Result<Interface> {
    for interface in Interface::list()? {
        if interface.has_prefix(prefix)? {
            return Ok(interface);
        }
    }
    Err(Error::interface(format!("no interface has prefix {prefix}")))
}

/// Find the interface with a prefix containing the given address.
pub fn interface_by_address(addr: IpAddr) -> Result<Interface> {
    for interface in Interface::list()? {
        if interface.has_address(addr)? {
            return Ok(interface);
        }
    }
    Err(Error::interface(format!("no interface has address {addr}")))
}

fn link_addr_of(ifaddr: &nix::ifaddrs::InterfaceAddress) -> Option<MacAddr> {
    ifaddr
        .address
        .as_ref()
        .and_then(|a| a.as_link_addr())
        .and_then(|link| link.addr())
        .map(MacAddr)
}

fn hardware_addr(name: &str) -> Result<Option<MacAddr>> {
    for ifaddr in getifaddrs().map_err(|e| Error::interface(e.to_string()))? {
        if ifaddr.interface_name == name {
            if let Some(mac) = link_addr_of(&ifaddr) {
                return Ok(Some(mac));
            }
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loopback_lookup() {
        // "lo" always exists on Linux
        let lo = Interface::by_name("lo").unwrap();
        assert_eq!(lo.name, "lo");
        assert!(lo.index > 0);
    }

    #[test]
    fn test_unknown_interface() {
        assert!(Interface::by_name("nonexistent99").is_err());
    }

    #[test]
    fn test_list_contains_loopback() {
        let interfaces = Interface::list().unwrap();
        assert!(interfaces.iter().any(|i| i.name == "lo"));
    }

    #[test]
    fn test_loopback_addresses() {
        // Addresses depend on the host; just exercise the plumbing.
        let lo = Interface::by_name("lo").unwrap();
        let addresses = lo.addresses().unwrap();
        let _ = addresses;
    }

    #[test]
    fn test_reverse_lookup() {
        let lo = Interface::by_name("lo").unwrap();
        let localhost: IpAddr = "127.0.0.1".parse().unwrap();
        // Only meaningful when loopback is actually configured.
        if lo.has_address(localhost).unwrap() {
            let found = interface_by_address(localhost).unwrap();
            assert_eq!(found.name, "lo");
        }
        let bogus: AddressPrefix = "203.0.113.77/32".parse().unwrap();
        assert!(interface_by_prefix(&bogus).is_err());
    }
}
