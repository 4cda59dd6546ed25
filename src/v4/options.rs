//! DHCP option handling.
//!
//! Options travel as tag/length/value triples after the magic cookie. This
//! module parses that area into an [`OptionSet`] and exposes typed getters
//! over the handful of options the client consumes.

use bytes::{BufMut, Bytes, BytesMut};
use std::{fmt, net::Ipv4Addr};

/// Option tags understood by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OptionCode {
    Pad = 0,
    SubnetMask = 1,
    Router = 3,
    RequestedIpAddress = 50,
    AddressLeaseTime = 51,
    MessageType = 53,
    ServerIdentifier = 54,
    ParameterRequestList = 55,
    End = 255,
}

impl From<OptionCode> for u8 {
    fn from(code: OptionCode) -> u8 {
        code as u8
    }
}

/// DHCP message type carried in option 53.
///
/// Values outside the seven types the client knows about are kept as
/// [`MessageType::Unrecognized`] instead of being rejected at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Discover,
    Offer,
    Request,
    Decline,
    Ack,
    Nak,
    Release,
    Unrecognized(u8),
}

impl From<u8> for MessageType {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::Discover,
            2 => Self::Offer,
            3 => Self::Request,
            4 => Self::Decline,
            5 => Self::Ack,
            6 => Self::Nak,
            7 => Self::Release,
            other => Self::Unrecognized(other),
        }
    }
}

impl From<MessageType> for u8 {
    fn from(kind: MessageType) -> u8 {
        match kind {
            MessageType::Discover => 1,
            MessageType::Offer => 2,
            MessageType::Request => 3,
            MessageType::Decline => 4,
            MessageType::Ack => 5,
            MessageType::Nak => 6,
            MessageType::Release => 7,
            MessageType::Unrecognized(other) => other,
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Discover => write!(f, "DHCPDISCOVER"),
            Self::Offer => write!(f, "DHCPOFFER"),
            Self::Request => write!(f, "DHCPREQUEST"),
            Self::Decline => write!(f, "DHCPDECLINE"),
            Self::Ack => write!(f, "DHCPACK"),
            Self::Nak => write!(f, "DHCPNAK"),
            Self::Release => write!(f, "DHCPRELEASE"),
            Self::Unrecognized(value) => write!(f, "unrecognized({value})"),
        }
    }
}

/// A fixed-width value that can be read out of an option payload.
pub trait OptionValue: Sized {
    /// Encoded size of one value in bytes.
    const WIDTH: usize;

    /// Interprets exactly `WIDTH` bytes.
    fn from_bytes(bytes: &[u8]) -> Option<Self>;
}

impl OptionValue for u8 {
    const WIDTH: usize = 1;

    fn from_bytes(bytes: &[u8]) -> Option<Self> {
        bytes.first().copied()
    }
}

impl OptionValue for u16 {
    const WIDTH: usize = 2;

    fn from_bytes(bytes: &[u8]) -> Option<Self> {
        Some(u16::from_be_bytes(bytes.try_into().ok()?))
    }
}

impl OptionValue for u32 {
    const WIDTH: usize = 4;

    fn from_bytes(bytes: &[u8]) -> Option<Self> {
        Some(u32::from_be_bytes(bytes.try_into().ok()?))
    }
}

impl OptionValue for Ipv4Addr {
    const WIDTH: usize = 4;

    fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let octets: [u8; 4] = bytes.try_into().ok()?;
        Some(Ipv4Addr::from(octets))
    }
}

impl OptionValue for MessageType {
    const WIDTH: usize = 1;

    fn from_bytes(bytes: &[u8]) -> Option<Self> {
        bytes.first().map(|&b| MessageType::from(b))
    }
}

/// A single raw option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawOption {
    pub tag: u8,
    pub value: Bytes,
}

/// Parsed view over a packet's option area.
///
/// Tags are unique: inserting or parsing a tag that is already present
/// replaces the earlier value in place, so the last value seen wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionSet {
    entries: Vec<RawOption>,
}

impl OptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Walks the tag/length/value triples of an option area.
    ///
    /// Parsing stops at the End tag or at the end of the buffer. A trailing
    /// option whose length byte runs past the buffer is discarded on its own.
    pub fn parse(raw: &[u8]) -> Self {
        let mut set = Self::new();
        let mut index = 0;

        while index < raw.len() {
            let tag = raw[index];
            if tag == OptionCode::Pad as u8 {
                index += 1;
                continue;
            }
            if tag == OptionCode::End as u8 {
                break;
            }

            let Some(&length) = raw.get(index + 1) else {
                tracing::debug!("Option {} has no length byte, discarding it", tag);
                break;
            };
            let start = index + 2;
            let end = start + length as usize;
            if end > raw.len() {
                tracing::debug!(
                    "Option {} claims {} bytes but only {} remain, discarding it",
                    tag,
                    length,
                    raw.len() - start
                );
                break;
            }

            set.insert_raw(tag, Bytes::copy_from_slice(&raw[start..end]));
            index = end;
        }

        set
    }

    /// Inserts a raw value, replacing any previous value for the same tag.
    pub fn insert_raw(&mut self, tag: u8, value: impl Into<Bytes>) -> &mut Self {
        let value = value.into();
        match self.entries.iter_mut().find(|entry| entry.tag == tag) {
            Some(entry) => entry.value = value,
            None => self.entries.push(RawOption { tag, value }),
        }
        self
    }

    pub fn insert_message_type(&mut self, kind: MessageType) -> &mut Self {
        self.insert_raw(OptionCode::MessageType.into(), vec![u8::from(kind)])
    }

    pub fn insert_address(&mut self, code: OptionCode, address: Ipv4Addr) -> &mut Self {
        self.insert_raw(code.into(), address.octets().to_vec())
    }

    pub fn insert_addresses(&mut self, code: OptionCode, addresses: &[Ipv4Addr]) -> &mut Self {
        let mut value = BytesMut::with_capacity(addresses.len() * Ipv4Addr::WIDTH);
        for address in addresses {
            value.put_slice(&address.octets());
        }
        self.insert_raw(code.into(), value.freeze())
    }

    pub fn insert_u32(&mut self, code: OptionCode, value: u32) -> &mut Self {
        self.insert_raw(code.into(), value.to_be_bytes().to_vec())
    }

    pub fn insert_parameter_request_list(&mut self, codes: &[OptionCode]) -> &mut Self {
        let value: Vec<u8> = codes.iter().map(|&code| u8::from(code)).collect();
        self.insert_raw(OptionCode::ParameterRequestList.into(), value)
    }

    /// Raw payload of an option, if present.
    pub fn raw(&self, tag: u8) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|entry| entry.tag == tag)
            .map(|entry| entry.value.as_ref())
    }

    /// Reads a single fixed-width value. A payload of the wrong size is
    /// reported as absent.
    pub fn get<T: OptionValue>(&self, code: OptionCode) -> Option<T> {
        let raw = self.raw(code.into())?;
        if raw.len() != T::WIDTH {
            return None;
        }
        T::from_bytes(raw)
    }

    /// Reads the first `min_count` values of a repeated option such as the
    /// router list. Absent if fewer than `min_count` values are present.
    pub fn get_many<T: OptionValue>(&self, code: OptionCode, min_count: usize) -> Option<Vec<T>> {
        let raw = self.raw(code.into())?;
        if raw.len() < T::WIDTH.checked_mul(min_count)? {
            return None;
        }
        raw.chunks_exact(T::WIDTH)
            .take(min_count)
            .map(T::from_bytes)
            .collect()
    }

    pub fn message_type(&self) -> Option<MessageType> {
        self.get(OptionCode::MessageType)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RawOption> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for OptionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}({} bytes)", entry.tag, entry.value.len())?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_stops_at_end_tag() {
        let raw = [53, 1, 2, 255, 1, 4, 255, 255, 255, 0];
        let set = OptionSet::parse(&raw);

        assert_eq!(set.len(), 1);
        assert_eq!(set.message_type(), Some(MessageType::Offer));
        assert_eq!(set.get::<Ipv4Addr>(OptionCode::SubnetMask), None);
    }

    #[test]
    fn test_parse_skips_padding() {
        let raw = [0, 0, 53, 1, 5, 0, 51, 4, 0, 1, 0x51, 0x80];
        let set = OptionSet::parse(&raw);

        assert_eq!(set.message_type(), Some(MessageType::Ack));
        assert_eq!(set.get::<u32>(OptionCode::AddressLeaseTime), Some(86400));
    }

    #[test]
    fn test_duplicate_tag_last_wins() {
        let raw = [53, 1, 2, 53, 1, 5, 255];
        let set = OptionSet::parse(&raw);

        assert_eq!(set.len(), 1);
        assert_eq!(set.message_type(), Some(MessageType::Ack));
    }

    #[test]
    fn test_truncated_trailing_option_is_discarded() {
        let raw = [53, 1, 2, 1, 4, 255, 255];
        let set = OptionSet::parse(&raw);

        assert_eq!(set.len(), 1);
        assert_eq!(set.message_type(), Some(MessageType::Offer));
        assert!(set.raw(OptionCode::SubnetMask.into()).is_none());
    }

    #[test]
    fn test_missing_length_byte_is_discarded() {
        let set = OptionSet::parse(&[53, 1, 6, 3]);
        assert_eq!(set.len(), 1);
        assert_eq!(set.message_type(), Some(MessageType::Nak));
    }

    #[test]
    fn test_mistyped_option_is_absent() {
        let mut set = OptionSet::new();
        set.insert_raw(OptionCode::AddressLeaseTime.into(), vec![0, 1]);
        set.insert_raw(OptionCode::SubnetMask.into(), vec![255, 255, 255]);

        assert_eq!(set.get::<u32>(OptionCode::AddressLeaseTime), None);
        assert_eq!(set.get::<u16>(OptionCode::AddressLeaseTime), Some(1));
        assert_eq!(set.get::<Ipv4Addr>(OptionCode::SubnetMask), None);
    }

    #[test]
    fn test_get_many_routers() {
        let mut set = OptionSet::new();
        set.insert_addresses(
            OptionCode::Router,
            &[Ipv4Addr::new(10, 0, 2, 2), Ipv4Addr::new(10, 0, 2, 3)],
        );

        assert_eq!(
            set.get_many::<Ipv4Addr>(OptionCode::Router, 1),
            Some(vec![Ipv4Addr::new(10, 0, 2, 2)])
        );
        assert_eq!(set.get_many::<Ipv4Addr>(OptionCode::Router, 2).map(|r| r.len()), Some(2));
        assert_eq!(set.get_many::<Ipv4Addr>(OptionCode::Router, 3), None);
    }

    #[test]
    fn test_get_many_ignores_partial_trailing_entry() {
        let mut set = OptionSet::new();
        set.insert_raw(OptionCode::Router.into(), vec![10, 0, 0, 1, 10, 0]);

        assert_eq!(
            set.get_many::<Ipv4Addr>(OptionCode::Router, 1),
            Some(vec![Ipv4Addr::new(10, 0, 0, 1)])
        );
        assert_eq!(set.get_many::<Ipv4Addr>(OptionCode::Router, 2), None);
    }

    #[test]
    fn test_get_many_with_huge_count_is_absent() {
        let mut set = OptionSet::new();
        set.insert_addresses(OptionCode::Router, &[Ipv4Addr::new(10, 0, 2, 2)]);

        assert_eq!(set.get_many::<Ipv4Addr>(OptionCode::Router, usize::MAX), None);
        assert_eq!(set.get_many::<u32>(OptionCode::Router, usize::MAX / 2), None);
    }

    #[test]
    fn test_message_type_fallback() {
        assert_eq!(MessageType::from(4), MessageType::Decline);
        assert_eq!(MessageType::from(8), MessageType::Unrecognized(8));
        assert_eq!(u8::from(MessageType::Unrecognized(42)), 42);
        assert_eq!(MessageType::Ack.to_string(), "DHCPACK");
    }
}
