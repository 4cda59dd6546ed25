//! # Leased - A multi-interface DHCPv4 client
//!
//! Leased negotiates, holds and renews IPv4 leases on any number of network
//! interfaces. The protocol logic lives in a sans-IO [`Engine`] that turns
//! inbound datagrams and timer expiries into actions; [`DhcpClient`] runs that
//! engine on tokio with real sockets.
//!
//! ## Features
//!
//! - DHCPv4 wire codec with typed option access
//! - Per-interface DISCOVER / OFFER / REQUEST / ACK negotiation
//! - NAK back-off and lease-expiry re-discovery
//! - Linux interface configuration through ioctls
//!
//! ## Example
//!
//! ```rust,no_run
//! use leased::{ClientConfig, DhcpClient, InterfaceDescriptor, LogApplier};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let eth0 = InterfaceDescriptor::new("eth0", [0x52, 0x54, 0x00, 0x12, 0x34, 0x56]);
//!     let config = ClientConfig::new(vec!["eth0".to_string()]);
//!     let mut client = DhcpClient::new(config, vec![eth0], Box::new(LogApplier))?;
//!     client.run().await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod network;
pub mod transaction;
pub mod v4;

pub use client::DhcpClient;
pub use config::{Args, ClientConfig, EngineConfig};
pub use engine::{Action, Engine, Event, Lease, TimerKind};
pub use error::LeasedError;
pub use network::{LeaseApplier, LogApplier, NetworkConfigurator};
pub use transaction::{InterfaceDescriptor, Phase, Transaction, TransactionTable};
