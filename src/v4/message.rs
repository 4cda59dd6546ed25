use super::{
    options::{MessageType, OptionCode, OptionSet},
    packet::{self, CodecError, Header, BOOTREQUEST, FLAG_BROADCAST, HTYPE_ETHERNET},
};
use bytes::Bytes;
use std::net::Ipv4Addr;

/// Elapsed-seconds value advertised in every client packet.
pub const SECS_ELAPSED: u16 = u16::MAX;

/// Options the client asks servers to include.
pub const PARAMETER_REQUEST_LIST: [OptionCode; 3] = [
    OptionCode::SubnetMask,
    OptionCode::Router,
    OptionCode::AddressLeaseTime,
];

fn client_header(mac_addr: &[u8], xid: u32, current_address: Ipv4Addr) -> Header {
    let mut header = Header {
        op: BOOTREQUEST,
        htype: HTYPE_ETHERNET,
        xid,
        secs: SECS_ELAPSED,
        flags: FLAG_BROADCAST,
        ciaddr: current_address,
        ..Header::default()
    };
    header.set_chaddr(mac_addr);
    header
}

/// Constructs a DHCP Discover message.
///
/// When the interface already holds an address it is requested again via
/// option 50.
pub fn build_dhcp_discover(
    mac_addr: &[u8],
    xid: u32,
    current_address: Ipv4Addr,
) -> Result<Bytes, CodecError> {
    let header = client_header(mac_addr, xid, current_address);

    let mut options = OptionSet::new();
    options.insert_message_type(MessageType::Discover);
    if !current_address.is_unspecified() {
        options.insert_address(OptionCode::RequestedIpAddress, current_address);
    }
    options.insert_parameter_request_list(&PARAMETER_REQUEST_LIST);

    packet::encode(&header, &options)
}

/// Constructs a DHCP Request message accepting `offered_ip`.
pub fn build_dhcp_request(
    mac_addr: &[u8],
    xid: u32,
    current_address: Ipv4Addr,
    offered_ip: Ipv4Addr,
    server_id: Option<Ipv4Addr>,
) -> Result<Bytes, CodecError> {
    let header = client_header(mac_addr, xid, current_address);

    let mut options = OptionSet::new();
    options
        .insert_message_type(MessageType::Request)
        .insert_address(OptionCode::RequestedIpAddress, offered_ip);
    if let Some(server_id) = server_id {
        options.insert_address(OptionCode::ServerIdentifier, server_id);
    }
    options.insert_parameter_request_list(&PARAMETER_REQUEST_LIST);

    packet::encode(&header, &options)
}
