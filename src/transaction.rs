//! Per-interface lease negotiations and the table that tracks them.

use std::{collections::HashMap, net::Ipv4Addr};

/// An interface participating in DHCP, as reported by interface enumeration.
///
/// Identity is the interface name. The held address is the only field that
/// changes after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceDescriptor {
    pub name: String,
    pub mac_address: [u8; 6],
    pub current_address: Ipv4Addr,
}

impl InterfaceDescriptor {
    pub fn new(name: impl Into<String>, mac_address: [u8; 6]) -> Self {
        Self {
            name: name.into(),
            mac_address,
            current_address: Ipv4Addr::UNSPECIFIED,
        }
    }

    pub fn mac_string(&self) -> String {
        self.mac_address
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect::<Vec<_>>()
            .join(":")
    }
}

/// Where a transaction is in the DISCOVER/OFFER/REQUEST/ACK cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// DISCOVER sent, no OFFER accepted yet.
    Discovering,
    /// OFFER accepted and REQUEST sent, waiting for ACK or NAK.
    Requesting,
    /// ACK received, lease active.
    Bound,
}

/// One outstanding lease negotiation for one interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    interface: String,
    xid: u32,
    phase: Phase,
    offered_lease_time: Option<u32>,
    offer_accepted: bool,
    has_lease: bool,
}

impl Transaction {
    pub fn new(interface: impl Into<String>, xid: u32) -> Self {
        Self {
            interface: interface.into(),
            xid,
            phase: Phase::Discovering,
            offered_lease_time: None,
            offer_accepted: false,
            has_lease: false,
        }
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    pub fn xid(&self) -> u32 {
        self.xid
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn offered_lease_time(&self) -> Option<u32> {
        self.offered_lease_time
    }

    pub fn offer_accepted(&self) -> bool {
        self.offer_accepted
    }

    pub fn has_lease(&self) -> bool {
        self.has_lease
    }

    /// Whether an inbound OFFER may still be taken.
    pub fn accepts_offers(&self) -> bool {
        !self.has_lease && !self.offer_accepted
    }

    /// Records the first accepted OFFER and moves to `Requesting`.
    pub fn accept_offer(&mut self, lease_time: Option<u32>) {
        self.offered_lease_time = lease_time;
        self.offer_accepted = true;
        self.phase = Phase::Requesting;
    }

    pub fn bind(&mut self) {
        self.has_lease = true;
        self.phase = Phase::Bound;
    }

    /// Drops back to `Discovering` after a NAK or lease expiry.
    pub fn reset(&mut self) {
        self.offer_accepted = false;
        self.has_lease = false;
        self.phase = Phase::Discovering;
    }
}

/// Transactions keyed by xid.
///
/// Every key equals the xid of the transaction stored under it. The table is
/// owned by a single event loop and is not synchronized.
///
/// At most one transaction per interface is kept: inserting a transaction for
/// an interface evicts the one it supersedes. Packets or timers that still
/// carry the old xid then miss the table and are dropped.
#[derive(Debug, Default)]
pub struct TransactionTable {
    by_xid: HashMap<u32, Transaction>,
    by_interface: HashMap<String, u32>,
}

impl TransactionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a transaction and returns the entry it superseded, if any.
    pub fn insert(&mut self, transaction: Transaction) -> Option<Transaction> {
        let xid = transaction.xid;
        let previous = self
            .by_interface
            .insert(transaction.interface.clone(), xid)
            .filter(|&old| old != xid)
            .and_then(|old| self.by_xid.remove(&old));
        self.by_xid.insert(xid, transaction);
        previous
    }

    pub fn get(&self, xid: u32) -> Option<&Transaction> {
        self.by_xid.get(&xid)
    }

    pub fn get_mut(&mut self, xid: u32) -> Option<&mut Transaction> {
        self.by_xid.get_mut(&xid)
    }

    pub fn contains(&self, xid: u32) -> bool {
        self.by_xid.contains_key(&xid)
    }

    /// The transaction currently outstanding for an interface.
    pub fn for_interface(&self, interface: &str) -> Option<&Transaction> {
        self.by_interface
            .get(interface)
            .and_then(|xid| self.by_xid.get(xid))
    }

    pub fn len(&self) -> usize {
        self.by_xid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_xid.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Transaction> {
        self.by_xid.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_lifecycle() {
        let mut txn = Transaction::new("eth0", 42);
        assert_eq!(txn.phase(), Phase::Discovering);
        assert!(txn.accepts_offers());

        txn.accept_offer(Some(86400));
        assert_eq!(txn.phase(), Phase::Requesting);
        assert_eq!(txn.offered_lease_time(), Some(86400));
        assert!(!txn.accepts_offers());

        txn.bind();
        assert_eq!(txn.phase(), Phase::Bound);
        assert!(txn.has_lease());

        txn.reset();
        assert_eq!(txn.phase(), Phase::Discovering);
        assert!(!txn.has_lease());
        assert!(!txn.offer_accepted());
        assert!(txn.accepts_offers());
    }

    #[test]
    fn test_table_keys_match_xid() {
        let mut table = TransactionTable::new();
        assert!(table.insert(Transaction::new("eth0", 1)).is_none());
        assert!(table.insert(Transaction::new("eth1", 2)).is_none());

        assert_eq!(table.len(), 2);
        for txn in table.iter() {
            assert_eq!(table.get(txn.xid()).map(Transaction::xid), Some(txn.xid()));
        }
    }

    #[test]
    fn test_new_transaction_supersedes_old_for_same_interface() {
        let mut table = TransactionTable::new();
        table.insert(Transaction::new("eth0", 1));
        table.insert(Transaction::new("eth1", 2));

        let superseded = table.insert(Transaction::new("eth0", 3));

        assert_eq!(superseded.map(|t| t.xid()), Some(1));
        assert!(!table.contains(1));
        assert!(table.contains(2));
        assert!(table.contains(3));
        assert_eq!(table.for_interface("eth0").map(Transaction::xid), Some(3));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_reinserting_same_xid_replaces_in_place() {
        let mut table = TransactionTable::new();
        table.insert(Transaction::new("eth0", 9));
        assert!(table.insert(Transaction::new("eth0", 9)).is_none());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_mac_string() {
        let iface = InterfaceDescriptor::new("eth0", [0x52, 0x54, 0x00, 0x12, 0x34, 0x56]);
        assert_eq!(iface.mac_string(), "52:54:00:12:34:56");
        assert!(iface.current_address.is_unspecified());
    }
}
