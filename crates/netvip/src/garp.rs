//! Gratuitous ARP announcement and capture.
//!
//! Both entry points speak raw AF_PACKET sockets restricted to the ARP
//! ethertype. Each call owns its socket for its lifetime; the watcher is the
//! only long-lived loop and polls its cancellation token between
//! bounded-timeout receives so shutdown latency stays bounded.

use std::io::ErrorKind;
use std::mem::{self, MaybeUninit};
use std::net::Ipv4Addr;
use std::time::Duration;

use common::{Error, Result};
use socket2::{Domain, Protocol, SockAddr, SockAddrStorage, Socket, Type};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::interface::Interface;
use crate::packet::{ArpPacket, ETHERTYPE_ARP, EthernetFrame, PacketError};
use crate::types::MacAddr;

/// Large enough for any frame on a non-jumbo Ethernet link.
const CAPTURE_BUF_LEN: usize = 1500;

/// Upper bound on how long a receive may block before the cancellation
/// token is polled again.
const RECV_TIMEOUT: Duration = Duration::from_secs(1);

fn arp_socket() -> std::io::Result<Socket> {
    // The packet(7) protocol argument is an ethertype in network byte order.
    let protocol = i32::from(ETHERTYPE_ARP.to_be());
    Socket::new(Domain::PACKET, Type::RAW, Some(Protocol::from(protocol)))
}

/// Build a link-layer socket address for the given interface, optionally
/// carrying a destination hardware address for sendto.
fn link_layer_addr(index: u32, destination: Option<MacAddr>) -> SockAddr {
    let mut sll: libc::sockaddr_ll = unsafe { mem::zeroed() };
    sll.sll_family = libc::AF_PACKET as libc::sa_family_t;
    sll.sll_protocol = ETHERTYPE_ARP.to_be();
    sll.sll_ifindex = index as libc::c_int;
    if let Some(mac) = destination {
        sll.sll_halen = 6;
        sll.sll_addr[..6].copy_from_slice(&mac.octets());
    }

    let mut storage = SockAddrStorage::zeroed();
    unsafe {
        let view = storage.view_as::<libc::sockaddr_ll>();
        *view = sll;
        SockAddr::new(storage, mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t)
    }
}

/// Send a gratuitous ARP announcement for `addr` out of `interface`.
///
/// ARP has no acknowledgement; success means the local stack accepted the
/// frame for transmission.
pub fn send_garp(interface: &Interface, addr: Ipv4Addr) -> Result<()> {
    let mac = interface.mac.ok_or_else(|| {
        Error::interface(format!(
            "interface {} has no hardware address",
            interface.name
        ))
    })?;

    let packet = ArpPacket::gratuitous(mac, addr);
    let frame = EthernetFrame::new(MacAddr::BROADCAST, mac, ETHERTYPE_ARP, packet.to_bytes());

    let socket = arp_socket()?;
    let destination = link_layer_addr(interface.index, Some(MacAddr::BROADCAST));
    socket.send_to(&frame.to_bytes(), &destination)?;
    debug!(interface = %interface.name, %addr, "sent gratuitous ARP");
    Ok(())
}

/// Watch `interface` for gratuitous ARP announcements of `addr`, invoking
/// `on_match` for each one.
///
/// The loop runs until `cancel` is triggered (returning
/// [`Error::Cancelled`]), the callback fails (its error is returned
/// verbatim), or receiving/decoding fails fatally. Non-ARP frames are
/// skipped silently; any other decode failure on captured traffic is fatal.
pub fn watch_garp<F>(
    cancel: &CancellationToken,
    interface: &Interface,
    addr: Ipv4Addr,
    mut on_match: F,
) -> Result<()>
where
    F: FnMut(&ArpPacket) -> Result<()>,
{
    let socket = arp_socket()?;
    socket.bind(&link_layer_addr(interface.index, None))?;
    // A bounded receive keeps the cancellation poll from starving under a
    // quiet link.
    socket.set_read_timeout(Some(RECV_TIMEOUT))?;
    debug!(interface = %interface.name, %addr, "watching for gratuitous ARP");

    loop {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let mut buf: [MaybeUninit<u8>; CAPTURE_BUF_LEN] =
            unsafe { MaybeUninit::uninit().assume_init() };
        let len = match socket.recv(&mut buf) {
            Ok(len) => len,
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                ) =>
            {
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        let data: [u8; CAPTURE_BUF_LEN] = unsafe { mem::transmute(buf) };

        let frame = EthernetFrame::parse(&data[..len]).map_err(Error::frame)?;
        let packet = match ArpPacket::parse(&frame) {
            Ok(packet) => packet,
            // Expected on mixed traffic; skip without a word.
            Err(PacketError::NotArp(_)) => continue,
            Err(e) => return Err(Error::frame(e)),
        };

        if packet.is_gratuitous_for(addr) {
            trace!(sender = %packet.sender_hardware, %addr, "gratuitous ARP match");
            on_match(&packet)?;
        }
    }
}
