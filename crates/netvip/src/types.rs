//! Address and hardware-address types shared across the crate.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use common::Error;

/// An IP address prefix (CIDR), e.g. `192.0.2.100/32`.
///
/// The address family is derived from the address itself and can never
/// disagree with the prefix length bound checked at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressPrefix {
    addr: IpAddr,
    prefix_len: u8,
}

impl AddressPrefix {
    /// Create a prefix, rejecting a prefix length wider than the address.
    pub fn new(addr: IpAddr, prefix_len: u8) -> Result<Self, Error> {
        let max = match addr {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        };
        if prefix_len > max {
            return Err(Error::prefix(format!(
                "prefix length {prefix_len} out of range for {addr} (max {max})"
            )));
        }
        Ok(Self { addr, prefix_len })
    }

    pub fn addr(&self) -> IpAddr {
        self.addr
    }

    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// The netlink address family for this prefix (AF_INET or AF_INET6).
    pub fn family(&self) -> u8 {
        match self.addr {
            IpAddr::V4(_) => libc::AF_INET as u8,
            IpAddr::V6(_) => libc::AF_INET6 as u8,
        }
    }

    /// Whether `addr` falls inside this prefix. Mixed families never match.
    pub fn contains(&self, addr: IpAddr) -> bool {
        match (self.addr, addr) {
            (IpAddr::V4(net), IpAddr::V4(host)) => {
                let mask = if self.prefix_len == 0 {
                    0
                } else {
                    u32::MAX << (32 - u32::from(self.prefix_len))
                };
                u32::from(net) & mask == u32::from(host) & mask
            }
            (IpAddr::V6(net), IpAddr::V6(host)) => {
                let mask = if self.prefix_len == 0 {
                    0
                } else {
                    u128::MAX << (128 - u32::from(self.prefix_len))
                };
                u128::from(net) & mask == u128::from(host) & mask
            }
            _ => false,
        }
    }
}

impl FromStr for AddressPrefix {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        let (addr, len) = s
            .split_once('/')
            .ok_or_else(|| Error::prefix(format!("{s} is not in address/length form")))?;
        let addr: IpAddr = addr
            .parse()
            .map_err(|_| Error::prefix(format!("{s} has an invalid address")))?;
        let prefix_len: u8 = len
            .parse()
            .map_err(|_| Error::prefix(format!("{s} has an invalid prefix length")))?;
        Self::new(addr, prefix_len)
    }
}

impl fmt::Display for AddressPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix_len)
    }
}

/// A 6-byte Ethernet hardware address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    /// The all-ones broadcast address, used both as an Ethernet destination
    /// and as the ARP target hardware address of a gratuitous announcement.
    pub const BROADCAST: MacAddr = MacAddr([0xff; 6]);

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }

    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }
}

impl From<[u8; 6]> for MacAddr {
    fn from(octets: [u8; 6]) -> Self {
        MacAddr(octets)
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let o = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            o[0], o[1], o[2], o[3], o[4], o[5]
        )
    }
}
