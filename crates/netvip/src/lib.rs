//! Virtual IP address management over rtnetlink and gratuitous ARP.
//!
//! This crate speaks two kernel wire protocols directly: the rtnetlink
//! address-management protocol, to add and remove an IP prefix on an
//! interface, and ARP, to announce or detect address ownership through
//! gratuitous announcements ("GARP").
//!
//! # Example
//!
//! ```no_run
//! use netvip::{AddressPrefix, Interface};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let intf = Interface::by_name("eth0")?;
//! let vip: AddressPrefix = "192.0.2.100/32".parse()?;
//!
//! // Claim the address and tell the neighbors (requires CAP_NET_ADMIN).
//! netvip::add_address(intf.index, &vip, Some("eth0:0"))?;
//! netvip::send_garp(&intf, "192.0.2.100".parse()?)?;
//! # Ok(())
//! # }
//! ```

mod garp;
mod interface;
mod message;
mod netlink;
mod packet;
mod types;

pub use garp::{send_garp, watch_garp};
pub use interface::{Interface, interface_by_address, interface_by_prefix};
pub use message::{AddressAttr, AddressMessage, align_to};
pub use netlink::{add_address, delete_address};
pub use packet::{ArpOperation, ArpPacket, ETHERTYPE_ARP, EthernetFrame, PacketError};
pub use types::{AddressPrefix, MacAddr};
