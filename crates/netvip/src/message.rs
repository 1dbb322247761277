//! rtnetlink interface-address message serialization and deserialization.
//!
//! An address add/delete request is a netlink header followed by the fixed
//! `ifaddrmsg` sub-header and a list of type-length-value attributes:
//!
//! ```text
//! +----------------+----------+-----------+-------+-----------+
//! | nlmsghdr (16)  | family   | prefixlen | flags | scope     |
//! |                +----------+-----------+-------+-----------+
//! |                | interface index (u32, host byte order)   |
//! +----------------+------------------------------------------+
//! | IFA_LOCAL | IFA_ADDRESS | IFA_LABEL (optional)            |
//! +----------------------------------------------------------+
//! ```
//!
//! Attribute payloads are padded to the 4-byte netlink alignment quantum on
//! the wire while each attribute's length field records the unpadded size.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use netlink_packet_core::{
    DecodeError, Emitable, NetlinkDeserializable, NetlinkHeader, NetlinkSerializable,
};
use netlink_packet_utils::{
    Emitable as NlaEmitable, Parseable,
    nla::{Nla, NlaBuffer, NlasIterator},
};

use crate::types::AddressPrefix;

/// Alignment quantum shared by netlink message framing and attribute
/// padding (NLMSG_ALIGNTO and NLA_ALIGNTO are both 4).
pub const NETLINK_ALIGNTO: usize = 4;

/// Fixed size of the `ifaddrmsg` sub-header.
const IFADDRMSG_LEN: usize = 8;

// Interface address attribute kinds from linux/if_addr.h.
const IFA_ADDRESS: u16 = 1;
const IFA_LOCAL: u16 = 2;
const IFA_LABEL: u16 = 3;

/// Round `size` up to the smallest multiple of `boundary` that holds it.
pub const fn align_to(size: usize, boundary: usize) -> usize {
    (size + boundary - 1) & !(boundary - 1)
}

/// Interface address attributes (the IFA_* subset this crate emits).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressAttr {
    /// Local address (IFA_LOCAL)
    Local(IpAddr),
    /// Peer/interface address (IFA_ADDRESS)
    Address(IpAddr),
    /// Address label, NUL-terminated on the wire (IFA_LABEL)
    Label(String),
    /// Unknown/unsupported attribute
    Other(u16, Vec<u8>),
}

impl Nla for AddressAttr {
    fn value_len(&self) -> usize {
        match self {
            Self::Local(IpAddr::V4(_)) | Self::Address(IpAddr::V4(_)) => 4,
            Self::Local(IpAddr::V6(_)) | Self::Address(IpAddr::V6(_)) => 16,
            Self::Label(label) => label.len() + 1, // NUL terminator
            Self::Other(_, bytes) => bytes.len(),
        }
    }

    fn kind(&self) -> u16 {
        match self {
            Self::Local(_) => IFA_LOCAL,
            Self::Address(_) => IFA_ADDRESS,
            Self::Label(_) => IFA_LABEL,
            Self::Other(kind, _) => *kind,
        }
    }

    fn emit_value(&self, buffer: &mut [u8]) {
        match self {
            Self::Local(addr) | Self::Address(addr) => match addr {
                IpAddr::V4(v4) => buffer.copy_from_slice(&v4.octets()),
                IpAddr::V6(v6) => buffer.copy_from_slice(&v6.octets()),
            },
            Self::Label(label) => {
                buffer[..label.len()].copy_from_slice(label.as_bytes());
                buffer[label.len()] = 0;
            }
            Self::Other(_, bytes) => buffer.copy_from_slice(bytes),
        }
    }
}

fn parse_ip(payload: &[u8]) -> Result<IpAddr, DecodeError> {
    match payload.len() {
        4 => {
            let octets: [u8; 4] = payload.try_into().unwrap();
            Ok(IpAddr::V4(Ipv4Addr::from(octets)))
        }
        16 => {
            let octets: [u8; 16] = payload.try_into().unwrap();
            Ok(IpAddr::V6(Ipv6Addr::from(octets)))
        }
        len => Err(DecodeError::from(format!(
            "invalid address attribute length {len}"
        ))),
    }
}

impl<'a, T: AsRef<[u8]> + ?Sized> Parseable<NlaBuffer<&'a T>> for AddressAttr {
    type Error = DecodeError;

    fn parse(buf: &NlaBuffer<&'a T>) -> Result<Self, Self::Error> {
        let payload = buf.value();
        Ok(match buf.kind() {
            IFA_LOCAL => Self::Local(parse_ip(payload)?),
            IFA_ADDRESS => Self::Address(parse_ip(payload)?),
            IFA_LABEL => {
                let label = std::str::from_utf8(payload)
                    .map_err(|_| DecodeError::from("invalid label attribute"))?
                    .trim_end_matches('\0')
                    .to_string();
                Self::Label(label)
            }
            kind => Self::Other(kind, payload.to_vec()),
        })
    }
}

/// An rtnetlink interface-address message: `ifaddrmsg` plus attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressMessage {
    /// RTM_NEWADDR or RTM_DELADDR
    pub message_type: u16,
    pub family: u8,
    pub prefix_len: u8,
    pub flags: u8,
    pub scope: u8,
    pub index: u32,
    pub attrs: Vec<AddressAttr>,
}

impl AddressMessage {
    /// Build an address-add request for `prefix` on the interface with the
    /// given kernel index.
    pub fn add(index: u32, prefix: &AddressPrefix, label: Option<&str>) -> Self {
        let mut msg = Self::with_type(libc::RTM_NEWADDR, index, prefix);
        // An empty label and an absent one are the same thing to the kernel.
        if let Some(label) = label.filter(|l| !l.is_empty()) {
            msg.attrs.push(AddressAttr::Label(label.to_string()));
        }
        msg
    }

    /// Build the symmetric address-delete request.
    pub fn del(index: u32, prefix: &AddressPrefix) -> Self {
        Self::with_type(libc::RTM_DELADDR, index, prefix)
    }

    fn with_type(message_type: u16, index: u32, prefix: &AddressPrefix) -> Self {
        Self {
            message_type,
            family: prefix.family(),
            prefix_len: prefix.prefix_len(),
            flags: 0,
            scope: 0,
            index,
            // The kernel wants the target address both as IFA_LOCAL and
            // IFA_ADDRESS, always equal, in that order.
            attrs: vec![
                AddressAttr::Local(prefix.addr()),
                AddressAttr::Address(prefix.addr()),
            ],
        }
    }
}

impl Emitable for AddressMessage {
    fn buffer_len(&self) -> usize {
        IFADDRMSG_LEN + self.attrs.iter().map(|nla| nla.buffer_len()).sum::<usize>()
    }

    fn emit(&self, buffer: &mut [u8]) {
        buffer[0] = self.family;
        buffer[1] = self.prefix_len;
        buffer[2] = self.flags;
        buffer[3] = self.scope;
        buffer[4..8].copy_from_slice(&self.index.to_ne_bytes());

        let mut offset = IFADDRMSG_LEN;
        for nla in &self.attrs {
            let len = nla.buffer_len();
            nla.emit(&mut buffer[offset..offset + len]);
            offset += len;
        }
    }
}

impl NetlinkSerializable for AddressMessage {
    fn message_type(&self) -> u16 {
        self.message_type
    }

    fn buffer_len(&self) -> usize {
        Emitable::buffer_len(self)
    }

    fn serialize(&self, buffer: &mut [u8]) {
        Emitable::emit(self, buffer)
    }
}

impl NetlinkDeserializable for AddressMessage {
    type Error = DecodeError;

    fn deserialize(header: &NetlinkHeader, payload: &[u8]) -> Result<Self, Self::Error> {
        if payload.len() < IFADDRMSG_LEN {
            return Err(DecodeError::from(format!(
                "ifaddrmsg too short ({} bytes)",
                payload.len()
            )));
        }

        let mut attrs = Vec::new();
        for nla in NlasIterator::new(&payload[IFADDRMSG_LEN..]) {
            let nla = nla.map_err(|e| DecodeError::from(e.to_string()))?;
            attrs.push(AddressAttr::parse(&nla)?);
        }

        Ok(Self {
            message_type: header.message_type,
            family: payload[0],
            prefix_len: payload[1],
            flags: payload[2],
            scope: payload[3],
            index: u32::from_ne_bytes(payload[4..8].try_into().unwrap()),
            attrs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netlink_packet_core::{
        NLM_F_ACK, NLM_F_CREATE, NLM_F_EXCL, NLM_F_REQUEST, NetlinkMessage, NetlinkPayload,
    };

    fn serialize(msg: AddressMessage, flags: u16) -> Vec<u8> {
        let mut nlmsg = NetlinkMessage::new(
            NetlinkHeader::default(),
            NetlinkPayload::InnerMessage(msg),
        );
        nlmsg.header.flags = flags;
        nlmsg.header.sequence_number = 1;
        nlmsg.finalize();
        let mut buf = vec![0u8; nlmsg.buffer_len()];
        nlmsg.serialize(&mut buf[..]);
        buf
    }

    #[test]
    fn test_align_to_contract() {
        assert_eq!(align_to(0, 4), 0);
        for x in 0..=64usize {
            let aligned = align_to(x, 4);
            assert!(aligned >= x);
            assert_eq!(aligned % 4, 0);
            assert_eq!(align_to(aligned, 4), aligned);
        }
        assert_eq!(align_to(1, 4), 4);
        assert_eq!(align_to(7, 4), 8);
        assert_eq!(align_to(8, 4), 8);
    }

    #[test]
    fn test_add_request_layout() {
        let prefix: AddressPrefix = "192.0.2.100/32".parse().unwrap();
        let buf = serialize(
            AddressMessage::add(3, &prefix, Some("eth0:0")),
            NLM_F_REQUEST | NLM_F_CREATE | NLM_F_EXCL | NLM_F_ACK,
        );

        // The declared length is how the receiver re-frames the stream; it
        // has to match the serialized size exactly.
        let declared = u32::from_ne_bytes(buf[0..4].try_into().unwrap()) as usize;
        assert_eq!(declared, buf.len());
        assert_eq!(
            u16::from_ne_bytes(buf[4..6].try_into().unwrap()),
            libc::RTM_NEWADDR
        );

        // ifaddrmsg sub-header
        assert_eq!(buf[16], libc::AF_INET as u8);
        assert_eq!(buf[17], 32);
        assert_eq!(u32::from_ne_bytes(buf[20..24].try_into().unwrap()), 3);

        // Three attributes, each starting on a 4-byte boundary, length field
        // recording the unpadded size.
        let mut offset = 16 + IFADDRMSG_LEN;
        let mut kinds = Vec::new();
        let mut lengths = Vec::new();
        while offset < buf.len() {
            assert_eq!(offset % NETLINK_ALIGNTO, 0);
            let len = u16::from_ne_bytes(buf[offset..offset + 2].try_into().unwrap()) as usize;
            kinds.push(u16::from_ne_bytes(
                buf[offset + 2..offset + 4].try_into().unwrap(),
            ));
            lengths.push(len);
            offset += align_to(len, NETLINK_ALIGNTO);
        }
        assert_eq!(offset, buf.len());
        assert_eq!(kinds, vec![IFA_LOCAL, IFA_ADDRESS, IFA_LABEL]);
        // 4 header + 4 address bytes; 4 header + "eth0:0\0"
        assert_eq!(lengths, vec![8, 8, 11]);

        // The label payload is NUL-terminated, then zero-padded.
        let label_start = buf.len() - align_to(11, NETLINK_ALIGNTO) + 4;
        assert_eq!(&buf[label_start..label_start + 7], b"eth0:0\0");
        assert_eq!(buf[label_start + 7], 0);
    }

    #[test]
    fn test_declared_length_matches_buffer() {
        let cases: Vec<(AddressPrefix, Option<&str>)> = vec![
            ("192.0.2.100/32".parse().unwrap(), Some("eth0:0")),
            ("192.0.2.100/24".parse().unwrap(), None),
            ("192.0.2.100/32".parse().unwrap(), Some("")),
            ("2001:db8::1/128".parse().unwrap(), None),
            ("2001:db8::1/64".parse().unwrap(), Some("eth2:vip")),
        ];
        for (prefix, label) in cases {
            let buf = serialize(
                AddressMessage::add(42, &prefix, label),
                NLM_F_REQUEST | NLM_F_ACK,
            );
            let declared = u32::from_ne_bytes(buf[0..4].try_into().unwrap()) as usize;
            assert_eq!(declared, buf.len(), "prefix {prefix} label {label:?}");
        }
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let prefix: AddressPrefix = "2001:db8::1/64".parse().unwrap();
        let msg = AddressMessage::add(7, &prefix, Some("eth1:0"));
        let expected = msg.clone();
        let buf = serialize(msg, NLM_F_REQUEST | NLM_F_ACK);

        let parsed = NetlinkMessage::<AddressMessage>::deserialize(&buf).unwrap();
        match parsed.payload {
            NetlinkPayload::InnerMessage(decoded) => assert_eq!(decoded, expected),
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn test_delete_request_has_no_label() {
        let prefix: AddressPrefix = "192.0.2.100/32".parse().unwrap();
        let msg = AddressMessage::del(3, &prefix);
        assert_eq!(msg.message_type, libc::RTM_DELADDR);
        assert_eq!(
            msg.attrs,
            vec![
                AddressAttr::Local(prefix.addr()),
                AddressAttr::Address(prefix.addr()),
            ]
        );
    }

    #[test]
    fn test_empty_label_is_omitted() {
        let prefix: AddressPrefix = "192.0.2.100/32".parse().unwrap();
        let msg = AddressMessage::add(3, &prefix, Some(""));
        assert_eq!(msg.attrs.len(), 2);
    }
}
