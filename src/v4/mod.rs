//! DHCPv4 protocol implementation
//!
//! This module contains the DHCPv4-specific implementation including:
//! - Packet encoding and decoding
//! - Option parsing with typed accessors
//! - Client message construction

pub mod message;
pub mod options;
pub mod packet;


pub use message::{build_dhcp_discover, build_dhcp_request};
pub use options::{MessageType, OptionCode, OptionSet, OptionValue};
pub use packet::{decode, encode, CodecError, Header, Packet};
