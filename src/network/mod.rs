//! Host-side collaborators: the UDP transport, interface discovery, and
//! installing leases on the operating system.

pub mod configurator;
pub mod interface;

pub use configurator::{ConfigureError, LeaseApplier, LogApplier, NetworkConfigurator};
pub use interface::{parse_mac_address, read_interface};

use std::io;
use thiserror::Error;
use tokio::net::UdpSocket;

/// Errors raised while opening a client socket.
#[derive(Error, Debug)]
pub enum SocketError {
    #[error("Failed to create a new socket")]
    CreateSocket(#[source] io::Error),

    #[error("Failed to enable broadcast on socket")]
    SetBroadcast(#[source] io::Error),

    #[error("Failed to bind socket to interface '{interface}'")]
    BindToDevice {
        interface: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to bind socket to port {port}")]
    BindSocket {
        port: u16,
        #[source]
        source: io::Error,
    },

    #[error("Failed to set SO_REUSEADDR on socket")]
    SetReuseAddress(#[source] io::Error),

    #[error("Failed to set socket to non-blocking mode")]
    SetNonBlocking(#[source] io::Error),

    #[error("Failed to hand socket to the runtime")]
    ConvertToTokio(#[source] io::Error),

    #[cfg(not(target_os = "linux"))]
    #[error("Binding to a specific device is not implemented on this platform")]
    NotImplemented,
}

/// Opens the client-port socket for one managed interface.
///
/// Each interface gets its own socket on the same port, pinned to its device
/// so broadcasts leave and arrive through that interface only.
#[cfg(target_os = "linux")]
pub fn bind_client_socket(interface: &str, port: u16) -> Result<UdpSocket, SocketError> {
    use socket2::{Domain, Protocol, Socket, Type};
    use std::net::{Ipv4Addr, SocketAddrV4};

    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
        .map_err(SocketError::CreateSocket)?;
    socket
        .set_reuse_address(true)
        .map_err(SocketError::SetReuseAddress)?;
    socket
        .set_broadcast(true)
        .map_err(SocketError::SetBroadcast)?;
    socket
        .bind_device(Some(interface.as_bytes()))
        .map_err(|source| SocketError::BindToDevice {
            interface: interface.to_owned(),
            source,
        })?;
    socket
        .set_nonblocking(true)
        .map_err(SocketError::SetNonBlocking)?;

    let local = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port);
    socket
        .bind(&local.into())
        .map_err(|source| SocketError::BindSocket { port, source })?;

    UdpSocket::from_std(socket.into()).map_err(SocketError::ConvertToTokio)
}

#[cfg(not(target_os = "linux"))]
pub fn bind_client_socket(_interface: &str, _port: u16) -> Result<UdpSocket, SocketError> {
    Err(SocketError::NotImplemented)
}
