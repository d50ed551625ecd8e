//! Consistent-Hashing Ring
//!
//! Converts a membership snapshot into a sorted ring and resolves each key to
//! its three replica nodes. A ring is an immutable value: every refresh
//! builds a new one from scratch and replaces the old wholesale.
//!
//! Node and key positions come from crc32 of their canonical string form,
//! reduced modulo the configured slot count. The hash must be identical on
//! every node, which rules out the per-process-seeded std hasher.

use crate::membership::types::NodeId;

pub const REPLICA_COUNT: usize = 3;

/// A node placed on the ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingNode {
    pub id: NodeId,
    pub hash: u64,
}

/// Ordered ring snapshot: strictly ascending by hash, no duplicate node.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Ring {
    nodes: Vec<RingNode>,
}

pub fn ring_hash(key: &str, slots: u64) -> u64 {
    u64::from(crc32fast::hash(key.as_bytes())) % slots
}

impl Ring {
    /// Place every member on the ring and sort ascending by hash position.
    /// Hash ties are not expected (the probability is negligible for the slot
    /// counts in use) and their order is left undefined.
    pub fn from_members(ids: impl IntoIterator<Item = NodeId>, slots: u64) -> Self {
        let mut nodes: Vec<RingNode> = ids
            .into_iter()
            .map(|id| RingNode {
                id,
                hash: ring_hash(&id.to_string(), slots),
            })
            .collect();
        nodes.sort_by_key(|node| node.hash);
        Self { nodes }
    }

    /// Build a ring from pre-positioned nodes (tests pin hash positions with
    /// this).
    pub fn from_nodes(mut nodes: Vec<RingNode>) -> Self {
        nodes.sort_by_key(|node| node.hash);
        Self { nodes }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[RingNode] {
        &self.nodes
    }

    pub fn position_of(&self, id: &NodeId) -> Option<usize> {
        self.nodes.iter().position(|node| &node.id == id)
    }

    /// Replica set for a key: the primary plus its two ring successors.
    /// Requires ring size >= 3; smaller rings have no replica set and the
    /// operation is unavailable.
    pub fn replicas_for(&self, key: &str, slots: u64) -> Option<[RingNode; REPLICA_COUNT]> {
        self.replicas_for_position(ring_hash(key, slots))
    }

    /// Walk clockwise from `pos`. A position at or below the smallest node
    /// hash, or strictly above the largest, wraps to the start of the ring;
    /// otherwise the primary is the first node with `hash >= pos`.
    pub fn replicas_for_position(&self, pos: u64) -> Option<[RingNode; REPLICA_COUNT]> {
        if self.nodes.len() < REPLICA_COUNT {
            return None;
        }

        let first = self.nodes[0].hash;
        let last = self.nodes[self.nodes.len() - 1].hash;
        let primary = if pos <= first || pos > last {
            0
        } else {
            self.nodes.iter().position(|node| node.hash >= pos)?
        };

        Some([
            self.nodes[primary],
            self.nodes[(primary + 1) % self.nodes.len()],
            self.nodes[(primary + 2) % self.nodes.len()],
        ])
    }
}
