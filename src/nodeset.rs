//! The ordered, liveness-tracked cache of measured nodes. Ordering matters:
//! front is most-recently-refreshed, back is the next entry due to expire,
//! which is exactly the ordering `lru::LruCache` gives for free.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use lru::LruCache;
use tokio::sync::Notify;

use crate::measure::ProbeResult;
use crate::node::{NodeId, NodeRecord};

/// How long a fresh or refreshed entry stays live before the liveness loop
/// re-probes it.
pub const LIVENESS_TIMEOUT: Duration = Duration::from_secs(15 * 60);

/// A node-set entry: a record, its latest probe result, and the three
/// timestamps the liveness loop and snapshot writer both need.
#[derive(Debug, Clone)]
pub struct MeasuredNode {
    pub record: NodeRecord,
    pub result: ProbeResult,
    pub expiry: Instant,
    pub refreshed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The ordered, in-memory cache described by the node set component.
/// Unbounded capacity: the only eviction path is the liveness loop removing
/// expired entries, never a size cap.
pub struct NodeSet {
    entries: LruCache<NodeId, MeasuredNode>,
    /// Pinged by `add`/`refresh`/`remove` so a waiter blocked on the
    /// earliest expiry can re-check it as soon as it changes, instead of
    /// sleeping against a deadline computed before the change happened.
    changed: Arc<Notify>,
}

impl NodeSet {
    pub fn new() -> Self {
        Self {
            entries: LruCache::unbounded(),
            changed: Arc::new(Notify::new()),
        }
    }

    /// A handle the liveness loop can `notified().await` on, woken any time
    /// `add`/`refresh`/`remove` changes which entry is due next.
    pub fn change_notifier(&self) -> Arc<Notify> {
        self.changed.clone()
    }

    /// `true` iff `node` is either unseen or strictly newer (by `seq`) than
    /// the entry already held for its ID. Doesn't mutate the set.
    pub fn dry_add(&self, node: &NodeRecord) -> bool {
        match self.entries.peek(&node.id()) {
            Some(existing) => node.seq() > existing.record.seq(),
            None => true,
        }
    }

    /// Inserts or replaces, moving the entry to the front and resetting its
    /// expiry and both timestamps.
    pub fn add(&mut self, record: NodeRecord, result: ProbeResult) {
        let now = Utc::now();
        let entry = MeasuredNode {
            expiry: Instant::now() + LIVENESS_TIMEOUT,
            refreshed_at: now,
            updated_at: now,
            result,
            record: record.clone(),
        };
        self.entries.put(record.id(), entry);
        crate::metrics::record_node_discovered();
        self.changed.notify_one();
    }

    /// Moves an existing entry to the front and resets its expiry and
    /// `refreshed_at`. No-op if the entry isn't present.
    pub fn refresh(&mut self, id: &NodeId) {
        if let Some(entry) = self.entries.get_mut(id) {
            entry.expiry = Instant::now() + LIVENESS_TIMEOUT;
            entry.refreshed_at = Utc::now();
        }
        self.changed.notify_one();
    }

    pub fn remove(&mut self, id: &NodeId) {
        self.entries.pop(id);
        self.changed.notify_one();
    }

    /// A snapshot copy of the back (oldest-expiry) entry, if any.
    pub fn last(&mut self) -> Option<MeasuredNode> {
        self.entries.peek_lru().map(|(_, entry)| entry.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &NodeId) -> Option<&MeasuredNode> {
        self.entries.peek(id)
    }

    /// Entries whose `expiry` is in the past, ordered back-to-front (oldest
    /// first), the order the liveness loop scans in.
    pub fn collect_expired(&self) -> Vec<MeasuredNode> {
        let now = Instant::now();
        self.entries
            .iter()
            .rev()
            .map(|(_, entry)| entry)
            .take_while(|entry| entry.expiry <= now)
            .cloned()
            .collect()
    }

    /// `back.expiry - now`, used by the driver to re-arm its liveness timer.
    /// `None` when the set is empty.
    pub fn next_expiry(&mut self) -> Option<Instant> {
        self.entries.peek_lru().map(|(_, entry)| entry.expiry)
    }

    /// Entries front-to-back, for the snapshot writer.
    pub fn iter_front_to_back(&self) -> impl Iterator<Item = &MeasuredNode> {
        self.entries.iter().map(|(_, entry)| entry)
    }

    /// Inserts a snapshot-loaded entry at the front with `expiry = now`, per
    /// the documented load-time behavior: every reloaded entry is due for
    /// immediate re-probe, with no staggering.
    pub fn load_entry(
        &mut self,
        record: NodeRecord,
        result: ProbeResult,
        refreshed_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) {
        let entry = MeasuredNode {
            expiry: Instant::now(),
            refreshed_at,
            updated_at,
            result,
            record: record.clone(),
        };
        self.entries.put(record.id(), entry);
        self.changed.notify_one();
    }
}

impl Default for NodeSet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn record_with_seq(seq: u64, port: u16) -> NodeRecord {
        let key = discv5::enr::CombinedKey::generate_secp256k1();
        let enr = discv5::enr::Enr::builder()
            .seq(seq)
            .ip4(Ipv4Addr::LOCALHOST)
            .udp4(port)
            .build(&key)
            .unwrap();
        NodeRecord::from_enr(enr)
    }

    fn ok_result() -> ProbeResult {
        ProbeResult {
            rtt: Duration::from_millis(10),
            loss_rate: 0.0,
        }
    }

    #[test]
    fn dry_add_accepts_unseen_nodes_and_rejects_stale_reannouncements() {
        let mut set = NodeSet::new();
        let a = record_with_seq(1, 30303);
        assert!(set.dry_add(&a), "unseen node should be accepted");
        set.add(a.clone(), ok_result());

        assert!(
            !set.dry_add(&a),
            "re-announcing the same seq should be rejected"
        );

        // A different node entirely is still unseen and accepted.
        let other = record_with_seq(1, 30304);
        assert!(set.dry_add(&other));
    }

    #[test]
    fn dry_add_accepts_strictly_newer_seq_for_same_id() {
        let key = discv5::enr::CombinedKey::generate_secp256k1();
        let older = discv5::enr::Enr::builder()
            .seq(1)
            .ip4(Ipv4Addr::LOCALHOST)
            .udp4(30305)
            .build(&key)
            .unwrap();
        let newer = discv5::enr::Enr::builder()
            .seq(2)
            .ip4(Ipv4Addr::LOCALHOST)
            .udp4(30305)
            .build(&key)
            .unwrap();
        let older = NodeRecord::from_enr(older);
        let newer = NodeRecord::from_enr(newer);
        assert_eq!(older.id(), newer.id(), "same key => same node id");

        let mut set = NodeSet::new();
        set.add(older, ok_result());
        assert!(set.dry_add(&newer), "strictly greater seq must supersede");
    }

    #[test]
    fn add_then_refresh_moves_entry_to_front() {
        let mut set = NodeSet::new();
        let a = record_with_seq(1, 30301);
        let b = record_with_seq(1, 30302);
        set.add(a.clone(), ok_result());
        set.add(b.clone(), ok_result());

        // b is most recent, so the back (oldest) entry is a.
        let back = set.last().unwrap();
        assert_eq!(back.record.id(), a.id());

        set.refresh(&a.id());
        let back_after = set.last().unwrap();
        assert_eq!(back_after.record.id(), b.id());
    }

    #[test]
    fn remove_detaches_entry() {
        let mut set = NodeSet::new();
        let a = record_with_seq(1, 30301);
        set.add(a.clone(), ok_result());
        assert_eq!(set.len(), 1);
        set.remove(&a.id());
        assert_eq!(set.len(), 0);
        assert!(set.get(&a.id()).is_none());
    }

    #[test]
    fn collect_expired_returns_only_past_deadline_entries_oldest_first() {
        let mut set = NodeSet::new();
        let a = record_with_seq(1, 30301);
        let b = record_with_seq(1, 30302);
        set.add(a.clone(), ok_result());
        set.add(b.clone(), ok_result());

        // a is already the back (oldest) entry; push both expiries into the
        // past while preserving that relative order, using peek_mut so the
        // LRU structural order (which collect_expired trusts) isn't
        // disturbed by the lookup itself.
        if let Some(entry) = set.entries.peek_mut(&a.id()) {
            entry.expiry = Instant::now() - Duration::from_secs(2);
        }
        if let Some(entry) = set.entries.peek_mut(&b.id()) {
            entry.expiry = Instant::now() - Duration::from_secs(1);
        }

        let expired = set.collect_expired();
        assert_eq!(expired.len(), 2);
        // Oldest (a, expiry -2s, and structurally the back entry) first.
        assert_eq!(expired[0].record.id(), a.id());
        assert_eq!(expired[1].record.id(), b.id());
    }

    #[test]
    fn load_entry_sets_expiry_to_now() {
        let mut set = NodeSet::new();
        let a = record_with_seq(1, 30301);
        let before = Instant::now();
        set.load_entry(a.clone(), ok_result(), Utc::now(), Utc::now());
        let entry = set.get(&a.id()).unwrap();
        assert!(entry.expiry >= before);
    }
}
