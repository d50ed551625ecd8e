//! Key-Value Network Protocol
//!
//! Defines the wire messages of the replicated store and the outcome record
//! the coordinator emits to the logging side-channel.
//!
//! Two message classes ride the shared node socket:
//! - `Query`/`Reply`: the client-quorum protocol. A coordinator sends one
//!   query per replica and correlates replies by transaction id.
//! - `Replicate`: stabilization data pushes between servers. Never counted
//!   toward any client quorum.

use serde::{Deserialize, Serialize};

use crate::membership::types::NodeId;

/// Operation kind carried by a query and recorded per transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpKind {
    Create,
    Read,
    Update,
    Delete,
}

/// Which replica of a key a node is. Roles differ only by tag, not by
/// behavior; the stabilization protocol uses them to select which entries to
/// re-replicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplicaRole {
    /// The first replica encountered for the key on the ring.
    Primary,
    /// The primary's immediate ring successor.
    Secondary,
    /// The second ring successor.
    Tertiary,
}

impl ReplicaRole {
    /// Role of the i-th node of a resolved replica set.
    pub fn from_index(index: usize) -> Self {
        match index {
            0 => ReplicaRole::Primary,
            1 => ReplicaRole::Secondary,
            _ => ReplicaRole::Tertiary,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum KvMessage {
    /// Coordinator-to-replica request. `value` is present for writes; `role`
    /// tags which replica of the key the receiver becomes (writes only).
    Query {
        transaction_id: u64,
        from: NodeId,
        op: OpKind,
        key: String,
        value: Option<String>,
        role: Option<ReplicaRole>,
    },

    /// Replica-to-coordinator acknowledgement. `value`/`timestamp` are filled
    /// for successful reads. A `success: false` reply never counts toward
    /// quorum.
    Reply {
        transaction_id: u64,
        from: NodeId,
        success: bool,
        value: Option<String>,
        timestamp: Option<u64>,
    },

    /// Stabilization push: the receiver upserts the entry as a tertiary
    /// replica, keeping the carried write timestamp.
    Replicate {
        from: NodeId,
        key: String,
        value: String,
        timestamp: u64,
        role: ReplicaRole,
    },
}

/// Terminal report of one client transaction, delivered exactly once to the
/// outcome channel (and mirrored to the log). `value` carries the chosen
/// value for successful reads.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationOutcome {
    pub transaction_id: u64,
    pub op: OpKind,
    pub key: String,
    pub success: bool,
    pub value: Option<String>,
}
