use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::watch::Watch;
use embassy_time::{Duration, Instant};

use crate::node::{DmxNode, NodeKey};

/// Registry capacity; inserting past it evicts the longest-unseen node.
pub const MAX_NODES: usize = 256;

/// Consumer slots on the revision watch.
const REVISION_CONSUMERS: usize = 2;

pub type RevisionWatch = Watch<CriticalSectionRawMutex, u32, REVISION_CONSUMERS>;

/// The observable registry of discovered nodes.
///
/// Mutated only by the discovery loop; everyone else takes key-ordered
/// snapshots. A revision watch fires on every change so collaborators know
/// when to re-snapshot.
pub struct NodeRegistry {
    nodes: Mutex<CriticalSectionRawMutex, RefCell<BTreeMap<NodeKey, DmxNode>>>,
    revision: RevisionWatch,
    max_nodes: usize,
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::with_capacity(MAX_NODES)
    }

    pub fn with_capacity(max_nodes: usize) -> Self {
        Self {
            nodes: Mutex::new(RefCell::new(BTreeMap::new())),
            revision: Watch::new(),
            max_nodes: max_nodes.max(1),
        }
    }

    /// Insert a fresh node or refresh an existing one, evicting the node
    /// with the oldest `last_seen` when the cap would be exceeded. Inserts
    /// never fail.
    pub fn insert(&self, node: DmxNode) {
        let key = node.key();
        self.nodes.lock(|nodes| {
            let mut nodes = nodes.borrow_mut();
            if let Some(existing) = nodes.get_mut(&key) {
                let first_seen = existing.first_seen;
                *existing = node;
                existing.first_seen = first_seen;
                return;
            }

            if nodes.len() >= self.max_nodes {
                let oldest = nodes
                    .iter()
                    .min_by_key(|(_, n)| n.last_seen)
                    .map(|(k, _)| *k);
                if let Some(oldest) = oldest {
                    debug!("registry full, evicting oldest node");
                    nodes.remove(&oldest);
                }
            }
            nodes.insert(key, node);
        });
        self.bump();
    }

    /// Drop every node unseen for longer than `timeout`. Returns how many
    /// were removed.
    pub fn prune(&self, now: Instant, timeout: Duration) -> usize {
        let removed = self.nodes.lock(|nodes| {
            let mut nodes = nodes.borrow_mut();
            let before = nodes.len();
            nodes.retain(|_, node| node.is_alive(now, timeout));
            before - nodes.len()
        });
        if removed > 0 {
            info!("pruned {} stale nodes", removed);
            self.bump();
        }
        removed
    }

    pub fn clear(&self) {
        let had_nodes = self.nodes.lock(|nodes| {
            let mut nodes = nodes.borrow_mut();
            let had_nodes = !nodes.is_empty();
            nodes.clear();
            had_nodes
        });
        if had_nodes {
            self.bump();
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.lock(|nodes| nodes.borrow().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, key: &NodeKey) -> Option<DmxNode> {
        self.nodes.lock(|nodes| nodes.borrow().get(key).cloned())
    }

    /// A key-ordered copy of the registry.
    pub fn snapshot(&self) -> Vec<DmxNode> {
        self.nodes
            .lock(|nodes| nodes.borrow().values().cloned().collect())
    }

    /// Fires with a new revision number on every mutation.
    pub fn revision(&self) -> &RevisionWatch {
        &self.revision
    }

    fn bump(&self) {
        let next = self.revision.try_get().unwrap_or(0).wrapping_add(1);
        self.revision.sender().send(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use artnet_codec::ArtPollReply;

    fn at_ms(ms: u64) -> Instant {
        Instant::from_micros(ms * 1000)
    }

    fn node(mac_low: u8, last_seen_ms: u64) -> DmxNode {
        let reply = ArtPollReply {
            mac: [0, 0, 0, 0, 0, mac_low],
            num_ports: 1,
            ..ArtPollReply::default()
        };
        DmxNode::from_reply(&reply, at_ms(last_seen_ms))
    }

    #[test]
    fn insert_then_snapshot_in_key_order() {
        let registry = NodeRegistry::new();
        registry.insert(node(9, 0));
        registry.insert(node(3, 0));

        let snapshot = registry.snapshot();
        assert_eq!(2, snapshot.len());
        assert!(snapshot[0].mac[5] < snapshot[1].mac[5]);
    }

    #[test]
    fn reinsert_refreshes_but_keeps_first_seen() {
        let registry = NodeRegistry::new();
        registry.insert(node(1, 100));
        registry.insert(node(1, 900));

        let snapshot = registry.snapshot();
        assert_eq!(1, snapshot.len());
        assert_eq!(at_ms(100), snapshot[0].first_seen);
        assert_eq!(at_ms(900), snapshot[0].last_seen);
    }

    #[test]
    fn capacity_evicts_oldest() {
        let registry = NodeRegistry::with_capacity(2);
        registry.insert(node(1, 100));
        registry.insert(node(2, 200));
        registry.insert(node(3, 300));

        assert_eq!(2, registry.len());
        let last_seen: Vec<_> = registry.snapshot().iter().map(|n| n.last_seen).collect();
        assert!(last_seen.contains(&at_ms(200)));
        assert!(last_seen.contains(&at_ms(300)));
    }

    #[test]
    fn prune_removes_only_stale_nodes() {
        let registry = NodeRegistry::new();
        registry.insert(node(1, 0));
        registry.insert(node(2, 5000));

        let removed = registry.prune(at_ms(6000), Duration::from_millis(3000));

        assert_eq!(1, removed);
        assert_eq!(1, registry.len());
        assert_eq!(at_ms(5000), registry.snapshot()[0].last_seen);
    }

    #[test]
    fn revision_bumps_on_change() {
        let registry = NodeRegistry::new();
        assert_eq!(None, registry.revision().try_get());
        registry.insert(node(1, 0));
        let first = registry.revision().try_get().unwrap();
        registry.insert(node(2, 0));
        assert!(registry.revision().try_get().unwrap() > first);
    }
}
