use clap::Parser;
use std::{net::Ipv4Addr, time::Duration};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Network interface to lease an address for (e.g., 'eth0'); repeatable
    #[arg(short, long = "interface", required = true)]
    pub interfaces: Vec<String>,

    /// Seconds to wait after a DHCPNAK before discovering again
    #[arg(long, default_value_t = 10)]
    pub nak_retry_secs: u64,

    /// Lease time in seconds to assume when the server does not send one
    #[arg(long, default_value_t = 3600)]
    pub fallback_lease_secs: u64,

    /// Log negotiated leases instead of configuring the interfaces
    #[arg(long)]
    pub dry_run: bool,
}

/// Protocol timing used by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub nak_retry_delay: Duration,
    pub fallback_lease_time: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            nak_retry_delay: Duration::from_secs(10),
            fallback_lease_time: Duration::from_secs(3600),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub interfaces: Vec<String>,
    pub client_port: u16,
    pub server_port: u16,
    pub broadcast_address: Ipv4Addr,
    pub recv_buffer_size: usize,
    /// Pause after a failed socket read before reading again.
    pub recv_error_backoff: Duration,
    pub dry_run: bool,
    pub engine: EngineConfig,
}

impl ClientConfig {
    pub fn new(interfaces: Vec<String>) -> Self {
        Self {
            interfaces,
            client_port: 68,
            server_port: 67,
            broadcast_address: Ipv4Addr::BROADCAST,
            recv_buffer_size: 1500,
            recv_error_backoff: Duration::from_secs(1),
            dry_run: false,
            engine: EngineConfig::default(),
        }
    }
}

impl From<Args> for ClientConfig {
    fn from(args: Args) -> Self {
        let mut config = Self::new(args.interfaces);
        config.dry_run = args.dry_run;
        config.engine = EngineConfig {
            nak_retry_delay: Duration::from_secs(args.nak_retry_secs),
            fallback_lease_time: Duration::from_secs(args.fallback_lease_secs),
        };
        config
    }
}
