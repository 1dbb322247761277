//! Ethernet framing and ARP packet format (RFC 826).
//!
//! ```text
//!  0                   1
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |         Hardware Type         |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |         Protocol Type         |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |  HW Addr Len  | Proto Addr Len|
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |           Operation           |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |    Sender Hardware Address    |
//! |    Sender Protocol Address    |
//! |    Target Hardware Address    |
//! |    Target Protocol Address    |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! The packet travels inside an Ethernet II frame with ethertype 0x0806.

use std::net::Ipv4Addr;

use bytes::{BufMut, Bytes, BytesMut};

use crate::types::MacAddr;

/// Ethertype identifying an ARP payload.
pub const ETHERTYPE_ARP: u16 = 0x0806;

/// ARP hardware type for Ethernet.
pub const HARDWARE_TYPE_ETHERNET: u16 = 1;

/// ARP protocol type for IPv4.
pub const PROTOCOL_TYPE_IPV4: u16 = 0x0800;

/// Destination MAC + source MAC + ethertype.
const ETHERNET_HEADER_LEN: usize = 14;

/// Fixed size of an Ethernet/IPv4 ARP packet.
const ARP_PACKET_LEN: usize = 28;

/// Frame and packet decoding failures.
///
/// `NotArp` is an expected outcome when looking at mixed link traffic and is
/// kept separate from the malformed-frame cases so callers can skip it
/// silently; everything else means the traffic does not look like Ethernet
/// at all and is fatal to a capture loop.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PacketError {
    #[error("ethernet frame too short ({0} bytes)")]
    TruncatedFrame(usize),

    #[error("not an ARP frame (ethertype {0:#06x})")]
    NotArp(u16),

    #[error("ARP packet too short ({0} bytes)")]
    TruncatedPacket(usize),

    #[error("unsupported ARP address lengths (hardware {hardware_len}, protocol {protocol_len})")]
    UnsupportedFormat { hardware_len: u8, protocol_len: u8 },
}

/// ARP operation field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArpOperation {
    Request,
    Reply,
    Other(u16),
}

impl From<u16> for ArpOperation {
    fn from(value: u16) -> Self {
        match value {
            1 => ArpOperation::Request,
            2 => ArpOperation::Reply,
            other => ArpOperation::Other(other),
        }
    }
}

impl From<ArpOperation> for u16 {
    fn from(op: ArpOperation) -> u16 {
        match op {
            ArpOperation::Request => 1,
            ArpOperation::Reply => 2,
            ArpOperation::Other(other) => other,
        }
    }
}

/// An Ethernet II frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EthernetFrame {
    pub destination: MacAddr,
    pub source: MacAddr,
    pub ethertype: u16,
    pub payload: Bytes,
}

impl EthernetFrame {
    pub fn new(destination: MacAddr, source: MacAddr, ethertype: u16, payload: Bytes) -> Self {
        Self {
            destination,
            source,
            ethertype,
            payload,
        }
    }

    /// Parse a frame from raw bytes as captured off the wire.
    pub fn parse(data: &[u8]) -> Result<Self, PacketError> {
        if data.len() < ETHERNET_HEADER_LEN {
            return Err(PacketError::TruncatedFrame(data.len()));
        }
        Ok(Self {
            destination: MacAddr(data[0..6].try_into().unwrap()),
            source: MacAddr(data[6..12].try_into().unwrap()),
            ethertype: u16::from_be_bytes([data[12], data[13]]),
            payload: Bytes::copy_from_slice(&data[ETHERNET_HEADER_LEN..]),
        })
    }

    /// Serialize the frame for transmission.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(ETHERNET_HEADER_LEN + self.payload.len());
        buf.put_slice(&self.destination.octets());
        buf.put_slice(&self.source.octets());
        buf.put_u16(self.ethertype);
        buf.put_slice(&self.payload);
        buf.freeze()
    }
}

/// An ARP packet over Ethernet/IPv4.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArpPacket {
    pub hardware_type: u16,
    pub protocol_type: u16,
    pub hardware_len: u8,
    pub protocol_len: u8,
    pub operation: ArpOperation,
    pub sender_hardware: MacAddr,
    pub sender_protocol: Ipv4Addr,
    pub target_hardware: MacAddr,
    pub target_protocol: Ipv4Addr,
}

impl ArpPacket {
    /// Create a request packet.
    pub fn request(
        sender_hardware: MacAddr,
        sender_protocol: Ipv4Addr,
        target_hardware: MacAddr,
        target_protocol: Ipv4Addr,
    ) -> Self {
        Self {
            hardware_type: HARDWARE_TYPE_ETHERNET,
            protocol_type: PROTOCOL_TYPE_IPV4,
            hardware_len: 6,
            protocol_len: 4,
            operation: ArpOperation::Request,
            sender_hardware,
            sender_protocol,
            target_hardware,
            target_protocol,
        }
    }

    /// Create a gratuitous announcement: a request where the sender claims
    /// `addr` towards the whole segment.
    pub fn gratuitous(sender_hardware: MacAddr, addr: Ipv4Addr) -> Self {
        Self::request(sender_hardware, addr, MacAddr::BROADCAST, addr)
    }

    /// Parse the ARP payload of a frame, rejecting non-ARP frames with the
    /// dedicated [`PacketError::NotArp`] variant.
    pub fn parse(frame: &EthernetFrame) -> Result<Self, PacketError> {
        if frame.ethertype != ETHERTYPE_ARP {
            return Err(PacketError::NotArp(frame.ethertype));
        }
        let data = &frame.payload;
        if data.len() < 8 {
            return Err(PacketError::TruncatedPacket(data.len()));
        }
        let hardware_len = data[4];
        let protocol_len = data[5];
        if hardware_len != 6 || protocol_len != 4 {
            return Err(PacketError::UnsupportedFormat {
                hardware_len,
                protocol_len,
            });
        }
        if data.len() < ARP_PACKET_LEN {
            return Err(PacketError::TruncatedPacket(data.len()));
        }

        Ok(Self {
            hardware_type: u16::from_be_bytes([data[0], data[1]]),
            protocol_type: u16::from_be_bytes([data[2], data[3]]),
            hardware_len,
            protocol_len,
            operation: u16::from_be_bytes([data[6], data[7]]).into(),
            sender_hardware: MacAddr(data[8..14].try_into().unwrap()),
            sender_protocol: Ipv4Addr::new(data[14], data[15], data[16], data[17]),
            target_hardware: MacAddr(data[18..24].try_into().unwrap()),
            target_protocol: Ipv4Addr::new(data[24], data[25], data[26], data[27]),
        })
    }

    /// Serialize to the canonical 28-byte wire layout.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(ARP_PACKET_LEN);
        buf.put_u16(self.hardware_type);
        buf.put_u16(self.protocol_type);
        buf.put_u8(self.hardware_len);
        buf.put_u8(self.protocol_len);
        buf.put_u16(self.operation.into());
        buf.put_slice(&self.sender_hardware.octets());
        buf.put_slice(&self.sender_protocol.octets());
        buf.put_slice(&self.target_hardware.octets());
        buf.put_slice(&self.target_protocol.octets());
        buf.freeze()
    }

    /// Whether this packet is a gratuitous announcement of `addr`: a request
    /// whose sender and target protocol addresses are both `addr` and whose
    /// target hardware address is the broadcast address.
    pub fn is_gratuitous_for(&self, addr: Ipv4Addr) -> bool {
        self.operation == ArpOperation::Request
            && self.sender_protocol == addr
            && self.target_protocol == addr
            && self.target_hardware.is_broadcast()
    }
}
