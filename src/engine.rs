//! DHCP client engine
//!
//! The engine owns every interface descriptor and the transaction table. It
//! performs no I/O: inbound datagrams and timer expiries arrive as [`Event`]s
//! and the engine answers with the [`Action`]s the driver must carry out.
//! All events must be fed from a single context; the table is not shared.

use crate::{
    config::EngineConfig,
    transaction::{InterfaceDescriptor, Transaction, TransactionTable},
    v4::{self, MessageType, OptionCode, OptionSet, Packet},
};
use bytes::Bytes;
use std::{collections::HashMap, net::Ipv4Addr, time::Duration};

/// Lease time meaning "never expires".
pub const INFINITE_LEASE: u32 = u32::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// Re-discover after a DHCPNAK.
    Retry,
    /// The bound lease ran out.
    LeaseExpiry,
}

/// External events the engine reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    DatagramReceived(Bytes),
    TimerFired { xid: u32, kind: TimerKind },
}

/// Work the driver performs on the engine's behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Broadcast a packet to the server port out of `interface`.
    Send { interface: String, packet: Bytes },
    /// Install a negotiated lease on the host.
    ApplyLease(Lease),
    /// Post `Event::TimerFired { xid, kind }` after `delay`.
    ArmTimer {
        xid: u32,
        kind: TimerKind,
        delay: Duration,
    },
}

/// A lease as handed to the lease-apply collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
    pub interface: String,
    pub address: Ipv4Addr,
    pub subnet_mask: Ipv4Addr,
    pub gateway: Option<Ipv4Addr>,
    /// `None` for an infinite lease.
    pub lease_time: Option<Duration>,
}

pub struct Engine {
    config: EngineConfig,
    interfaces: HashMap<String, InterfaceDescriptor>,
    transactions: TransactionTable,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            interfaces: HashMap::new(),
            transactions: TransactionTable::new(),
        }
    }

    pub fn transactions(&self) -> &TransactionTable {
        &self.transactions
    }

    pub fn interface(&self, name: &str) -> Option<&InterfaceDescriptor> {
        self.interfaces.get(name)
    }

    /// Registers the interfaces and sends a DISCOVER on each.
    pub fn start(&mut self, interfaces: Vec<InterfaceDescriptor>) -> Vec<Action> {
        let mut actions = Vec::with_capacity(interfaces.len());
        for iface in interfaces {
            let name = iface.name.clone();
            tracing::info!("Managing interface {} ({})", name, iface.mac_string());
            self.interfaces.insert(name.clone(), iface);
            actions.extend(self.discover(&name));
        }
        actions
    }

    pub fn handle_event(&mut self, event: Event) -> Vec<Action> {
        match event {
            Event::DatagramReceived(data) => self.on_datagram(&data),
            Event::TimerFired { xid, kind } => self.on_timer(xid, kind),
        }
    }

    pub fn on_datagram(&mut self, data: &[u8]) -> Vec<Action> {
        let packet = match v4::decode(data) {
            Ok(packet) => packet,
            Err(e) => {
                tracing::warn!("Dropping {} byte datagram: {}", data.len(), e);
                return Vec::new();
            }
        };
        let options = packet.parse_options();
        tracing::debug!("Options of xid {:#010x}: {}", packet.xid(), options);

        let Some(message_type) = options.message_type() else {
            tracing::warn!(
                "Dropping packet for xid {:#010x} without a message type",
                packet.xid()
            );
            return Vec::new();
        };

        if !self.transactions.contains(packet.xid()) {
            tracing::debug!(
                "Not looking for xid {:#010x}, ignoring {}",
                packet.xid(),
                message_type
            );
            return Vec::new();
        }

        match message_type {
            MessageType::Offer => self.handle_offer(&packet, &options),
            MessageType::Ack => self.handle_ack(&packet, &options),
            MessageType::Nak => self.handle_nak(&packet),
            MessageType::Discover | MessageType::Request | MessageType::Release => {
                // Other clients broadcasting on the same subnet.
                tracing::debug!("Ignoring {} for xid {:#010x}", message_type, packet.xid());
                Vec::new()
            }
            MessageType::Decline | MessageType::Unrecognized(_) => {
                tracing::warn!(
                    "No handler for {} on xid {:#010x}, dropping packet",
                    message_type,
                    packet.xid()
                );
                Vec::new()
            }
        }
    }

    pub fn on_timer(&mut self, xid: u32, kind: TimerKind) -> Vec<Action> {
        let Some(transaction) = self.transactions.get_mut(xid) else {
            tracing::debug!("{:?} timer for retired xid {:#010x}, ignoring", kind, xid);
            return Vec::new();
        };

        match kind {
            TimerKind::Retry => {
                let interface = transaction.interface().to_owned();
                tracing::info!("Retrying discovery on {}", interface);
                self.discover(&interface)
            }
            TimerKind::LeaseExpiry => {
                transaction.reset();
                let interface = transaction.interface().to_owned();
                tracing::info!("Lease on {} expired, discovering again", interface);
                self.discover(&interface)
            }
        }
    }

    /// Starts a fresh transaction for an interface, superseding any previous one.
    fn discover(&mut self, interface: &str) -> Vec<Action> {
        let Some(iface) = self.interfaces.get(interface) else {
            tracing::error!("Cannot discover on unknown interface {}", interface);
            return Vec::new();
        };

        let xid: u32 = rand::random();
        tracing::debug!("Trying to lease an IP for {} with xid {:#010x}", interface, xid);
        if !iface.current_address.is_unspecified() {
            tracing::debug!("Asking to keep {}", iface.current_address);
        }

        let packet =
            match v4::build_dhcp_discover(&iface.mac_address, xid, iface.current_address) {
                Ok(packet) => packet,
                Err(e) => {
                    tracing::error!("Failed to build DHCPDISCOVER for {}: {}", interface, e);
                    return Vec::new();
                }
            };

        if let Some(old) = self
            .transactions
            .insert(Transaction::new(interface, xid))
        {
            tracing::debug!(
                "xid {:#010x} on {} superseded by {:#010x}",
                old.xid(),
                interface,
                xid
            );
        }

        vec![Action::Send {
            interface: interface.to_owned(),
            packet,
        }]
    }

    fn handle_offer(&mut self, packet: &Packet, options: &OptionSet) -> Vec<Action> {
        let xid = packet.xid();
        let lease_time = options.get::<u32>(OptionCode::AddressLeaseTime);
        tracing::info!(
            "Offered {} for {}s on xid {:#010x}",
            packet.yiaddr(),
            lease_time.unwrap_or(0),
            xid
        );

        let Some(transaction) = self.transactions.get_mut(xid) else {
            return Vec::new();
        };
        if !transaction.accepts_offers() {
            tracing::debug!("Already committed on xid {:#010x}, ignoring offer", xid);
            return Vec::new();
        }
        let Some(iface) = self.interfaces.get(transaction.interface()) else {
            tracing::error!("Transaction {:#010x} refers to an unknown interface", xid);
            return Vec::new();
        };

        let server_id = options.get::<Ipv4Addr>(OptionCode::ServerIdentifier);
        let request = match v4::build_dhcp_request(
            &iface.mac_address,
            xid,
            iface.current_address,
            packet.yiaddr(),
            server_id,
        ) {
            Ok(request) => request,
            Err(e) => {
                tracing::error!("Failed to build DHCPREQUEST for {}: {}", iface.name, e);
                return Vec::new();
            }
        };

        tracing::info!("Leasing {} for adapter {}", packet.yiaddr(), iface.name);
        transaction.accept_offer(lease_time);
        vec![Action::Send {
            interface: iface.name.clone(),
            packet: request,
        }]
    }

    fn handle_ack(&mut self, packet: &Packet, options: &OptionSet) -> Vec<Action> {
        let xid = packet.xid();
        let Some(transaction) = self.transactions.get_mut(xid) else {
            return Vec::new();
        };
        let Some(iface) = self.interfaces.get_mut(transaction.interface()) else {
            tracing::error!("Transaction {:#010x} refers to an unknown interface", xid);
            return Vec::new();
        };

        let address = packet.yiaddr();
        tracing::info!("Server handed {} to {}", address, iface.name);
        transaction.bind();
        iface.current_address = address;

        let lease_secs = options
            .get::<u32>(OptionCode::AddressLeaseTime)
            .or(transaction.offered_lease_time());
        let lease_time = match lease_secs {
            Some(INFINITE_LEASE) => None,
            Some(secs) => Some(Duration::from_secs(secs.into())),
            None => {
                tracing::warn!(
                    "No lease time from server for {}, assuming {:?}",
                    iface.name,
                    self.config.fallback_lease_time
                );
                Some(self.config.fallback_lease_time)
            }
        };

        let subnet_mask = options
            .get::<Ipv4Addr>(OptionCode::SubnetMask)
            .unwrap_or_else(|| classful_mask(address));
        let gateway = options
            .get_many::<Ipv4Addr>(OptionCode::Router, 1)
            .and_then(|routers| routers.first().copied());

        let mut actions = vec![Action::ApplyLease(Lease {
            interface: iface.name.clone(),
            address,
            subnet_mask,
            gateway,
            lease_time,
        })];
        if let Some(delay) = lease_time {
            actions.push(Action::ArmTimer {
                xid,
                kind: TimerKind::LeaseExpiry,
                delay,
            });
        }
        actions
    }

    fn handle_nak(&mut self, packet: &Packet) -> Vec<Action> {
        let xid = packet.xid();
        let Some(transaction) = self.transactions.get_mut(xid) else {
            return Vec::new();
        };

        tracing::warn!(
            "Server refused {} on {}, retrying in {:?}",
            packet.yiaddr(),
            transaction.interface(),
            self.config.nak_retry_delay
        );
        transaction.reset();
        vec![Action::ArmTimer {
            xid,
            kind: TimerKind::Retry,
            delay: self.config.nak_retry_delay,
        }]
    }
}

/// Default mask of the address's class, used when a server omits option 1.
pub fn classful_mask(address: Ipv4Addr) -> Ipv4Addr {
    match address.octets()[0] {
        0..=127 => Ipv4Addr::new(255, 0, 0, 0),
        128..=191 => Ipv4Addr::new(255, 255, 0, 0),
        _ => Ipv4Addr::new(255, 255, 255, 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classful_mask() {
        assert_eq!(classful_mask(Ipv4Addr::new(10, 1, 2, 3)), Ipv4Addr::new(255, 0, 0, 0));
        assert_eq!(classful_mask(Ipv4Addr::new(172, 16, 0, 1)), Ipv4Addr::new(255, 255, 0, 0));
        assert_eq!(classful_mask(Ipv4Addr::new(192, 168, 1, 1)), Ipv4Addr::new(255, 255, 255, 0));
    }

    #[test]
    fn test_timer_for_unknown_xid_is_ignored() {
        let mut engine = Engine::new(EngineConfig::default());
        assert!(engine.on_timer(1, TimerKind::Retry).is_empty());
        assert!(engine.on_timer(1, TimerKind::LeaseExpiry).is_empty());
        assert!(engine.transactions().is_empty());
    }
}
