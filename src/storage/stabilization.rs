//! Stabilization Protocol
//!
//! Corrective re-replication after ring membership changes. Each run compares
//! the node's current ring neighbors against the previously recorded ones and
//! pushes local data to the new second successor when they differ, restoring
//! three-way replication after a failure or join.
//!
//! Best-effort and single-shot: a push is not retried, and data is never
//! rebalanced away from a node that stopped being responsible for a key
//! range; stale replicas linger until overwritten or superseded by a later
//! push. The two-branch policy (successor changed vs predecessor changed)
//! can also under-replicate when several adjacent nodes fail in the same
//! round.

use tokio::sync::Mutex;
use tracing::debug;

use super::engine::StorageEngine;
use super::protocol::ReplicaRole;
use crate::membership::types::NodeId;
use crate::ring::{Ring, RingNode};

/// The four ring neighbors recorded at the previous run: the two
/// predecessors whose data this node replicates and the two successors that
/// replicate this node's data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NeighborSets {
    /// `[second predecessor, immediate predecessor]`
    pub have_replicas_of: [RingNode; 2],
    /// `[immediate successor, second successor]`
    pub has_my_replicas: [RingNode; 2],
}

/// One entry to re-replicate to a peer. The carried timestamp is the entry's
/// original write timestamp, not the push time, so the pushed copy loses any
/// later timestamp comparison during quorum reads. The receiver itself
/// upserts unconditionally; a stale push can still overwrite that replica's
/// local copy (the best-effort caveat in the module doc).
#[derive(Debug, Clone, PartialEq)]
pub struct ReplicatePush {
    pub target: NodeId,
    pub key: String,
    pub value: String,
    pub timestamp: u64,
}

#[derive(Default)]
pub struct StabilizationProtocol {
    neighbors: Mutex<Option<NeighborSets>>,
}

impl StabilizationProtocol {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn recorded_neighbors(&self) -> Option<NeighborSets> {
        *self.neighbors.lock().await
    }

    /// One stabilization round over a freshly built ring. Returns the data
    /// pushes the caller must deliver (as `Replicate` messages); an unchanged
    /// neighborhood yields none.
    pub async fn run(
        &self,
        ring: &Ring,
        local: NodeId,
        engine: &StorageEngine,
    ) -> Vec<ReplicatePush> {
        if ring.len() < 3 {
            return Vec::new();
        }
        let Some(index) = ring.position_of(&local) else {
            return Vec::new();
        };

        let len = ring.len();
        let nodes = ring.nodes();
        let current = NeighborSets {
            have_replicas_of: [nodes[(index + len - 2) % len], nodes[(index + len - 1) % len]],
            has_my_replicas: [nodes[(index + 1) % len], nodes[(index + 2) % len]],
        };

        let mut recorded = self.neighbors.lock().await;
        let pushes = match *recorded {
            // First run: this node holds no data yet, recording the
            // neighborhood is enough.
            None => Vec::new(),
            Some(previous) => {
                let [new_n1, new_n2] = current.has_my_replicas;
                let new_p1 = current.have_replicas_of[1];

                if new_n1.id != previous.has_my_replicas[0].id {
                    debug!("immediate successor changed, re-replicating primary data");
                    Self::pushes_for(engine, ReplicaRole::Primary, new_n2.id)
                } else if new_n2.id != previous.has_my_replicas[1].id {
                    debug!("second successor changed, re-replicating primary data");
                    Self::pushes_for(engine, ReplicaRole::Primary, new_n2.id)
                } else if new_p1.id != previous.have_replicas_of[1].id {
                    debug!("predecessor changed, re-replicating secondary data");
                    Self::pushes_for(engine, ReplicaRole::Secondary, new_n2.id)
                } else {
                    Vec::new()
                }
            }
        };

        *recorded = Some(current);
        pushes
    }

    fn pushes_for(engine: &StorageEngine, role: ReplicaRole, target: NodeId) -> Vec<ReplicatePush> {
        engine
            .entries_with_role(role)
            .into_iter()
            .map(|(key, entry)| ReplicatePush {
                target,
                key,
                value: entry.value,
                timestamp: entry.timestamp,
            })
            .collect()
    }
}
