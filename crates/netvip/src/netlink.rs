//! Netlink address client: add and delete interface addresses over a raw
//! NETLINK_ROUTE socket.
//!
//! Each call opens its own socket, sends a single request, and runs an
//! acknowledgement loop until the kernel answers. There is no retry and no
//! pipelining; conflicting operations on the same (interface, prefix) pair
//! have to be serialized by the caller.

use common::{Error, Result};
use netlink_packet_core::{
    NLM_F_ACK, NLM_F_CREATE, NLM_F_EXCL, NLM_F_REQUEST, NetlinkHeader, NetlinkMessage,
    NetlinkPayload,
};
use netlink_sys::{Socket, SocketAddr, protocols::NETLINK_ROUTE};
use tracing::{debug, trace};

use crate::message::{AddressMessage, NETLINK_ALIGNTO, align_to};
use crate::types::AddressPrefix;

/// Receive buffer size, at least one memory page so a kernel reply is never
/// truncated.
const RECV_BUF_LEN: usize = 8192;

/// Request that `prefix` be added to the interface with kernel index
/// `index`, optionally tagging it with `label`.
///
/// An "address already exists" rejection is surfaced like any other kernel
/// error code; deciding whether that is fatal is the caller's business.
pub fn add_address(index: u32, prefix: &AddressPrefix, label: Option<&str>) -> Result<()> {
    debug!(index, %prefix, ?label, "adding interface address");
    request(
        AddressMessage::add(index, prefix, label),
        NLM_F_REQUEST | NLM_F_CREATE | NLM_F_EXCL | NLM_F_ACK,
    )
}

/// Request that `prefix` be removed from the interface with kernel index
/// `index`.
pub fn delete_address(index: u32, prefix: &AddressPrefix) -> Result<()> {
    debug!(index, %prefix, "deleting interface address");
    request(AddressMessage::del(index, prefix), NLM_F_REQUEST | NLM_F_ACK)
}

fn request(message: AddressMessage, flags: u16) -> Result<()> {
    let mut socket = Socket::new(NETLINK_ROUTE)
        .map_err(|e| Error::netlink(format!("failed to create netlink socket: {e}")))?;
    socket
        .bind(&SocketAddr::new(0, 0))
        .map_err(|e| Error::netlink(format!("failed to bind netlink socket: {e}")))?;

    let mut nlmsg = NetlinkMessage::new(
        NetlinkHeader::default(),
        NetlinkPayload::InnerMessage(message),
    );
    nlmsg.header.flags = flags;
    // Only one request is ever in flight on this socket, so a fixed
    // sequence number is sufficient.
    nlmsg.header.sequence_number = 1;
    nlmsg.finalize();

    let mut buf = vec![0u8; nlmsg.buffer_len()];
    nlmsg.serialize(&mut buf[..]);
    trace!(len = buf.len(), "sending rtnetlink request");

    socket
        .send(&buf, 0)
        .map_err(|e| Error::netlink(format!("failed to send netlink request: {e}")))?;

    wait_for_ack(&socket)
}

fn wait_for_ack(socket: &Socket) -> Result<()> {
    let mut rb = vec![0u8; RECV_BUF_LEN];
    loop {
        let len = socket
            .recv(&mut &mut rb[..], 0)
            .map_err(|e| Error::netlink(format!("failed to receive netlink response: {e}")))?;
        if scan_ack(&rb[..len])? {
            return Ok(());
        }
    }
}

/// Scan one received datagram as a list of netlink messages. Returns
/// `Ok(true)` once the request is acknowledged, `Ok(false)` if the datagram
/// holds nothing conclusive, and an error for a kernel rejection.
fn scan_ack(datagram: &[u8]) -> Result<bool> {
    let mut offset = 0;
    while offset < datagram.len() {
        let message = NetlinkMessage::<AddressMessage>::deserialize(&datagram[offset..])
            .map_err(|e| Error::netlink(format!("failed to parse netlink response: {e}")))?;
        match message.payload {
            NetlinkPayload::Done(_) => return Ok(true),
            NetlinkPayload::Error(err) => {
                let code = err.raw_code();
                trace!(code, "netlink error message");
                if code != 0 {
                    // The kernel reports a negated errno.
                    return Err(Error::Rejected(-code));
                }
                // A zero code is an explicit acknowledgement.
                return Ok(true);
            }
            // Anything else is not meaningful to an ack exchange.
            _ => {}
        }

        let advance = align_to(message.header.length as usize, NETLINK_ALIGNTO);
        if advance == 0 {
            return Err(Error::netlink("zero-length message in netlink response"));
        }
        offset += advance;
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use netlink_packet_core::{DoneMessage, ErrorMessage};
    use std::num::NonZeroI32;

    fn render<T>(payload: NetlinkPayload<T>) -> Vec<u8>
    where
        T: netlink_packet_core::NetlinkSerializable + std::fmt::Debug,
    {
        let mut msg = NetlinkMessage::new(NetlinkHeader::default(), payload);
        msg.header.sequence_number = 1;
        msg.finalize();
        let mut buf = vec![0u8; msg.buffer_len()];
        msg.serialize(&mut buf[..]);
        buf
    }

    fn error_message(code: i32) -> Vec<u8> {
        let mut err = ErrorMessage::default();
        err.code = NonZeroI32::new(code);
        // Echo of the offending request header, as the kernel sends it.
        err.header = vec![0u8; 16];
        render::<AddressMessage>(NetlinkPayload::Error(err))
    }

    fn done_message() -> Vec<u8> {
        render::<AddressMessage>(NetlinkPayload::Done(DoneMessage::default()))
    }

    #[test]
    fn test_zero_code_error_then_done_is_success() {
        let mut stream = error_message(0);
        stream.extend(done_message());
        assert!(scan_ack(&stream).unwrap());
    }

    #[test]
    fn test_done_is_success() {
        assert!(scan_ack(&done_message()).unwrap());
    }

    #[test]
    fn test_nonzero_error_surfaces_code() {
        let stream = error_message(-libc::EEXIST);
        match scan_ack(&stream) {
            Err(Error::Rejected(code)) => assert_eq!(code, libc::EEXIST),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn test_rejection_classifies_as_exist() {
        let err = scan_ack(&error_message(-libc::EEXIST)).unwrap_err();
        assert!(err.is_exist());
    }

    #[test]
    fn test_unrelated_message_is_ignored() {
        // An echoed address message is not an acknowledgement.
        let prefix: AddressPrefix = "192.0.2.100/32".parse().unwrap();
        let echo = render(NetlinkPayload::InnerMessage(AddressMessage::add(
            3,
            &prefix,
            Some("eth0:0"),
        )));
        assert!(!scan_ack(&echo).unwrap());

        let mut stream = echo;
        stream.extend(done_message());
        assert!(scan_ack(&stream).unwrap());
    }

    #[test]
    fn test_empty_datagram_is_inconclusive() {
        assert!(!scan_ack(&[]).unwrap());
    }

    #[test]
    fn test_truncated_datagram_is_an_error() {
        let stream = done_message();
        assert!(scan_ack(&stream[..10]).is_err());
    }
}
