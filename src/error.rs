//! Error taxonomy.
//!
//! Per-replica failures are recovered locally where possible and surfaced to
//! the client only in aggregate (quorum reached or not). Nothing is fatal
//! except the inability to join the cluster at startup.

use crate::membership::types::NodeId;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No seed node could be reached at startup. Fatal: the node cannot
    /// become a member.
    #[error("unable to join the cluster (no seed reachable)")]
    JoinRejected,

    /// A point-to-point send failed. Dropped by callers; gossip timeouts
    /// eventually reflect the peer's state.
    #[error("peer {0} unreachable")]
    PeerUnreachable(NodeId),

    /// Local read/delete miss. An operation failure, not a system fault.
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// Fewer than a majority of replicas acknowledged within the timeout
    /// window.
    #[error("transaction {0} timed out before reaching quorum")]
    QuorumTimeout(u64),

    #[error("wire codec error: {0}")]
    Codec(#[from] bincode::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
