use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;

/// Identity of a cluster node: its gossip socket address. An immutable value
/// with structural equality; the ring position is derived from it by hashing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub SocketAddr);

impl NodeId {
    pub fn addr(&self) -> SocketAddr {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One row of the membership table. Keyed by `id` (unique); `last_update` is
/// in unix milliseconds and is what the failure sweep compares against.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemberEntry {
    pub id: NodeId,
    pub heartbeat: u64,
    pub last_update: u64,
}

/// The membership wire protocol.
///
/// - `JoinRequest`: sent by a new node to a seed to enter the cluster.
/// - `JoinReply`: the receiver's full membership table; the requester adopts
///   it verbatim and becomes a member.
/// - `Gossip`: the periodic full-table exchange with one random peer.
///
/// There is no failure announcement: each node drops silent peers on its own
/// timeout and the cluster converges independently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MembershipMessage {
    JoinRequest {
        sender: NodeId,
        heartbeat: u64,
    },

    JoinReply {
        sender: NodeId,
        members: Vec<MemberEntry>,
    },

    Gossip {
        sender: NodeId,
        members: Vec<MemberEntry>,
    },
}
