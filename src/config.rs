//! Protocol Configuration
//!
//! All timing and sizing knobs of the membership and replication protocols in
//! one place. The node binary fills this from CLI flags; tests shrink the
//! periods to keep runs short.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Tunable parameters shared by every subsystem of a node.
#[derive(Debug, Clone)]
pub struct ProtocolConfig {
    /// Interval between gossip rounds (heartbeat increment + table exchange).
    pub gossip_period: Duration,
    /// Extra slack added on top of two gossip periods before a silent peer is
    /// declared failed and dropped from the membership table.
    pub failure_grace: Duration,
    /// Size of the consistent-hashing ring; node and key hashes are reduced
    /// modulo this value.
    pub ring_slots: u64,
    /// Number of replicas per key. The protocol is written for 3.
    pub replica_count: usize,
    /// How long a client transaction may wait for quorum before it is reaped
    /// and reported failed.
    pub transaction_timeout: Duration,
    /// Interval between ring rebuilds (and therefore stabilization runs).
    pub stabilization_period: Duration,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            gossip_period: Duration::from_millis(500),
            failure_grace: Duration::from_secs(2),
            ring_slots: 512,
            replica_count: 3,
            transaction_timeout: Duration::from_secs(3),
            stabilization_period: Duration::from_secs(1),
        }
    }
}

impl ProtocolConfig {
    /// Majority quorum: 2 of 3 with the default replica count.
    pub fn quorum(&self) -> u32 {
        (self.replica_count / 2 + 1) as u32
    }

    /// A peer whose entry has not been refreshed within this window is
    /// removed from the membership table.
    pub fn failure_timeout(&self) -> Duration {
        self.gossip_period * 2 + self.failure_grace
    }

    /// An unknown gossiped entry is admitted only if its timestamp is at most
    /// this old, so failed peers are not revived by stale tables.
    pub fn admit_window(&self) -> Duration {
        self.gossip_period * 2
    }
}

/// Wall-clock milliseconds since the unix epoch. Used for member entry
/// timestamps and stored-value write timestamps.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
