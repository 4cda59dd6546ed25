//! DHCPv4 wire codec.
//!
//! ```text
//! op(1) htype(1) hlen(1) hops(1) | xid(4) | secs(2) flags(2)
//! ciaddr(4) | yiaddr(4) | siaddr(4) | giaddr(4)
//! chaddr(16) | sname(64) | file(128)
//! magic cookie(4) = 63 82 53 63
//! options(variable, TLV, terminated by 0xFF)
//! ```
//!
//! Multi-byte fields are big endian on the wire.

use super::options::{OptionCode, OptionSet};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::net::Ipv4Addr;
use thiserror::Error;

pub const MAGIC_COOKIE: [u8; 4] = [0x63, 0x82, 0x53, 0x63];

/// Size of the fixed BOOTP header, up to but excluding the magic cookie.
pub const FIXED_HEADER_LEN: usize = 236;

/// Smallest datagram that can be decoded: header plus magic cookie.
pub const MIN_PACKET_LEN: usize = FIXED_HEADER_LEN + MAGIC_COOKIE.len();

/// Largest datagram the client sends or accepts.
///
/// The whole 576-byte message every DHCP client must accept (RFC 2131
/// section 2). This is wider than 548, the BOOTP payload left once IP and UDP
/// headers are taken out of 576, so replies padded to 576 still decode.
pub const MAX_PACKET_LEN: usize = 576;

/// Bytes available for options, End tag included.
pub const OPTIONS_MAX_LEN: usize = MAX_PACKET_LEN - MIN_PACKET_LEN;

pub const BOOTREQUEST: u8 = 1;
pub const BOOTREPLY: u8 = 2;
pub const HTYPE_ETHERNET: u8 = 1;
pub const FLAG_BROADCAST: u16 = 0x8000;

const CHADDR_LEN: usize = 16;
const SNAME_LEN: usize = 64;
const FILE_LEN: usize = 128;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CodecError {
    #[error("Packet too short: {len} bytes (minimum {min})")]
    TooShort { len: usize, min: usize },

    #[error("Packet too long: {len} bytes (maximum {max})")]
    TooLong { len: usize, max: usize },

    #[error("Invalid magic cookie")]
    BadMagicCookie,

    #[error("Options too large: {len} bytes (budget {max})")]
    OptionsTooLarge { len: usize, max: usize },

    #[error("Option {tag} value is {len} bytes, more than fits in a length byte")]
    OptionValueTooLong { tag: u8, len: usize },

    #[error("Tag {0} is a framing byte and cannot carry a value")]
    ReservedTag(u8),
}

/// The fixed header of a DHCPv4 packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub op: u8,
    pub htype: u8,
    pub hlen: u8,
    pub hops: u8,
    pub xid: u32,
    pub secs: u16,
    pub flags: u16,
    pub ciaddr: Ipv4Addr,
    pub yiaddr: Ipv4Addr,
    pub siaddr: Ipv4Addr,
    pub giaddr: Ipv4Addr,
    pub chaddr: [u8; CHADDR_LEN],
    pub sname: [u8; SNAME_LEN],
    pub file: [u8; FILE_LEN],
}

impl Default for Header {
    fn default() -> Self {
        Self {
            op: BOOTREQUEST,
            htype: HTYPE_ETHERNET,
            hlen: 6,
            hops: 0,
            xid: 0,
            secs: 0,
            flags: 0,
            ciaddr: Ipv4Addr::UNSPECIFIED,
            yiaddr: Ipv4Addr::UNSPECIFIED,
            siaddr: Ipv4Addr::UNSPECIFIED,
            giaddr: Ipv4Addr::UNSPECIFIED,
            chaddr: [0; CHADDR_LEN],
            sname: [0; SNAME_LEN],
            file: [0; FILE_LEN],
        }
    }
}

impl Header {
    /// Copies a hardware address into `chaddr` and sets `hlen` to match.
    /// Addresses longer than the field are truncated.
    pub fn set_chaddr(&mut self, hardware_address: &[u8]) -> &mut Self {
        let len = hardware_address.len().min(CHADDR_LEN);
        self.chaddr = [0; CHADDR_LEN];
        self.chaddr[..len].copy_from_slice(&hardware_address[..len]);
        self.hlen = len as u8;
        self
    }

    /// The significant part of `chaddr`.
    pub fn hardware_address(&self) -> &[u8] {
        &self.chaddr[..(self.hlen as usize).min(CHADDR_LEN)]
    }

    pub fn is_broadcast(&self) -> bool {
        self.flags & FLAG_BROADCAST != 0
    }
}

/// A decoded packet. Options are kept raw and parsed on demand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub header: Header,
    options: Bytes,
}

impl Packet {
    pub fn xid(&self) -> u32 {
        self.header.xid
    }

    pub fn yiaddr(&self) -> Ipv4Addr {
        self.header.yiaddr
    }

    pub fn parse_options(&self) -> OptionSet {
        OptionSet::parse(&self.options)
    }
}

/// Serializes a header and option set.
///
/// Fails instead of truncating when the options do not fit the option area.
pub fn encode(header: &Header, options: &OptionSet) -> Result<Bytes, CodecError> {
    let mut option_len = 1; // End
    for option in options.iter() {
        if option.tag == OptionCode::Pad as u8 || option.tag == OptionCode::End as u8 {
            return Err(CodecError::ReservedTag(option.tag));
        }
        if option.value.len() > u8::MAX as usize {
            return Err(CodecError::OptionValueTooLong {
                tag: option.tag,
                len: option.value.len(),
            });
        }
        option_len += 2 + option.value.len();
    }
    if option_len > OPTIONS_MAX_LEN {
        return Err(CodecError::OptionsTooLarge {
            len: option_len,
            max: OPTIONS_MAX_LEN,
        });
    }

    let mut buf = BytesMut::with_capacity(MIN_PACKET_LEN + option_len);
    buf.put_u8(header.op);
    buf.put_u8(header.htype);
    buf.put_u8(header.hlen);
    buf.put_u8(header.hops);
    buf.put_u32(header.xid);
    buf.put_u16(header.secs);
    buf.put_u16(header.flags);
    buf.put_slice(&header.ciaddr.octets());
    buf.put_slice(&header.yiaddr.octets());
    buf.put_slice(&header.siaddr.octets());
    buf.put_slice(&header.giaddr.octets());
    buf.put_slice(&header.chaddr);
    buf.put_slice(&header.sname);
    buf.put_slice(&header.file);
    buf.put_slice(&MAGIC_COOKIE);

    for option in options.iter() {
        buf.put_u8(option.tag);
        buf.put_u8(option.value.len() as u8);
        buf.put_slice(&option.value);
    }
    buf.put_u8(OptionCode::End as u8);

    debug_assert!(buf.len() <= MAX_PACKET_LEN);
    Ok(buf.freeze())
}

/// Decodes the fixed header and captures the option area.
pub fn decode(data: &[u8]) -> Result<Packet, CodecError> {
    if data.len() < MIN_PACKET_LEN {
        return Err(CodecError::TooShort {
            len: data.len(),
            min: MIN_PACKET_LEN,
        });
    }
    if data.len() > MAX_PACKET_LEN {
        return Err(CodecError::TooLong {
            len: data.len(),
            max: MAX_PACKET_LEN,
        });
    }

    let mut buf = data;
    let mut header = Header {
        op: buf.get_u8(),
        htype: buf.get_u8(),
        hlen: buf.get_u8(),
        hops: buf.get_u8(),
        xid: buf.get_u32(),
        secs: buf.get_u16(),
        flags: buf.get_u16(),
        ciaddr: Ipv4Addr::from(buf.get_u32()),
        yiaddr: Ipv4Addr::from(buf.get_u32()),
        siaddr: Ipv4Addr::from(buf.get_u32()),
        giaddr: Ipv4Addr::from(buf.get_u32()),
        ..Header::default()
    };
    buf.copy_to_slice(&mut header.chaddr);
    buf.copy_to_slice(&mut header.sname);
    buf.copy_to_slice(&mut header.file);

    let mut cookie = [0u8; 4];
    buf.copy_to_slice(&mut cookie);
    if cookie != MAGIC_COOKIE {
        return Err(CodecError::BadMagicCookie);
    }

    Ok(Packet {
        header,
        options: Bytes::copy_from_slice(buf),
    })
}
