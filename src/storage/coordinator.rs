//! Replication Coordinator
//!
//! Client-facing CRUD entry points. Each call allocates a global transaction
//! id, fans the request out to the key's three replicas and returns
//! immediately; quorum (2 of 3 acknowledgements) is correlated asynchronously
//! from inbound replies. A transaction either completes with quorum success
//! or is reaped by the timeout sweep and reported failed, exactly once either
//! way.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::protocol::{KvMessage, OpKind, OperationOutcome, ReplicaRole};
use crate::config::{unix_millis, ProtocolConfig};
use crate::error::Error;
use crate::membership::types::NodeId;
use crate::ring::Ring;
use crate::wire::{send_packet, Packet};

/// Bookkeeping for one in-flight client transaction. Lives only in the
/// coordinator's table: created on the client call, destroyed on quorum
/// completion or timeout.
#[derive(Debug)]
struct InflightTransaction {
    op: OpKind,
    key: String,
    submitted_at: u64,
    remaining: u32,
    /// Best read result seen so far (highest write timestamp wins).
    best_timestamp: u64,
    best_value: Option<String>,
}

pub struct ReplicationCoordinator {
    local_id: NodeId,
    socket: Arc<UdpSocket>,
    config: ProtocolConfig,
    ring: RwLock<Ring>,
    inflight: DashMap<u64, InflightTransaction>,
    next_transaction_id: AtomicU64,
    outcomes: UnboundedSender<OperationOutcome>,
}

impl ReplicationCoordinator {
    pub fn new(
        local_id: NodeId,
        socket: Arc<UdpSocket>,
        config: ProtocolConfig,
        outcomes: UnboundedSender<OperationOutcome>,
    ) -> Self {
        Self {
            local_id,
            socket,
            config,
            ring: RwLock::new(Ring::default()),
            inflight: DashMap::new(),
            next_transaction_id: AtomicU64::new(0),
            outcomes,
        }
    }

    /// Install the ring built from the latest membership snapshot.
    pub async fn set_ring(&self, ring: Ring) {
        *self.ring.write().await = ring;
    }

    pub async fn create(&self, key: &str, value: &str) -> u64 {
        self.write_op(OpKind::Create, key, value).await
    }

    pub async fn update(&self, key: &str, value: &str) -> u64 {
        self.write_op(OpKind::Update, key, value).await
    }

    pub async fn read(&self, key: &str) -> u64 {
        self.broadcast_op(OpKind::Read, key).await
    }

    pub async fn delete(&self, key: &str) -> u64 {
        self.broadcast_op(OpKind::Delete, key).await
    }

    /// Create/Update: one point-to-point query per replica, each tagged with
    /// the role the receiver stores the key under.
    async fn write_op(&self, op: OpKind, key: &str, value: &str) -> u64 {
        let transaction_id = self.next_transaction_id.fetch_add(1, Ordering::SeqCst) + 1;

        let replicas = {
            let ring = self.ring.read().await;
            ring.replicas_for(key, self.config.ring_slots)
        };
        let Some(replicas) = replicas else {
            self.report_unavailable(transaction_id, op, key);
            return transaction_id;
        };

        // Register before the fan-out: the receive loop runs concurrently, so
        // a loopback replica's ack can arrive mid-send and must find the
        // transaction already in the table.
        self.register(transaction_id, op, key);

        for (index, replica) in replicas.iter().enumerate() {
            let query = Packet::Kv(KvMessage::Query {
                transaction_id,
                from: self.local_id,
                op,
                key: key.to_string(),
                value: Some(value.to_string()),
                role: Some(ReplicaRole::from_index(index)),
            });
            if let Err(e) = send_packet(&self.socket, replica.id.addr(), &query).await {
                warn!("query for transaction {} to {} failed: {}", transaction_id, replica.id, e);
            }
        }

        transaction_id
    }

    /// Read/Delete: the same query goes to the whole replica set.
    async fn broadcast_op(&self, op: OpKind, key: &str) -> u64 {
        let transaction_id = self.next_transaction_id.fetch_add(1, Ordering::SeqCst) + 1;

        let replicas = {
            let ring = self.ring.read().await;
            ring.replicas_for(key, self.config.ring_slots)
        };
        let Some(replicas) = replicas else {
            self.report_unavailable(transaction_id, op, key);
            return transaction_id;
        };

        // Same ordering as write_op: the table entry must exist before any
        // replica can have seen the query.
        self.register(transaction_id, op, key);

        let query = Packet::Kv(KvMessage::Query {
            transaction_id,
            from: self.local_id,
            op,
            key: key.to_string(),
            value: None,
            role: None,
        });
        for replica in &replicas {
            if let Err(e) = send_packet(&self.socket, replica.id.addr(), &query).await {
                warn!("query for transaction {} to {} failed: {}", transaction_id, replica.id, e);
            }
        }

        transaction_id
    }

    fn register(&self, transaction_id: u64, op: OpKind, key: &str) {
        self.inflight.insert(
            transaction_id,
            InflightTransaction {
                op,
                key: key.to_string(),
                submitted_at: unix_millis(),
                remaining: self.config.quorum(),
                best_timestamp: 0,
                best_value: None,
            },
        );
    }

    /// Quorum bookkeeping for one replica acknowledgement.
    ///
    /// A reply for an unknown transaction is stale (already completed or
    /// reaped) and ignored. A failure reply never decrements the quorum
    /// count: the transaction needs a majority of *successes*, or it dies by
    /// timeout.
    pub fn handle_reply(
        &self,
        transaction_id: u64,
        success: bool,
        value: Option<String>,
        timestamp: Option<u64>,
    ) {
        if !success {
            debug!("failure reply for transaction {} ignored", transaction_id);
            return;
        }

        let completed = {
            let Some(mut transaction) = self.inflight.get_mut(&transaction_id) else {
                debug!("stale reply for transaction {} ignored", transaction_id);
                return;
            };

            // Merge before the quorum check so the completing reply's value
            // still participates in latest-write-wins.
            if transaction.op == OpKind::Read {
                if let (Some(v), Some(ts)) = (value, timestamp) {
                    if ts >= transaction.best_timestamp {
                        transaction.best_timestamp = ts;
                        transaction.best_value = Some(v);
                    }
                }
            }

            transaction.remaining -= 1;
            transaction.remaining == 0
        };

        if completed {
            if let Some((_, transaction)) = self.inflight.remove(&transaction_id) {
                let value = match transaction.op {
                    OpKind::Read => transaction.best_value,
                    _ => None,
                };
                self.report(OperationOutcome {
                    transaction_id,
                    op: transaction.op,
                    key: transaction.key,
                    success: true,
                    value,
                });
            }
        }
    }

    /// Reap every transaction older than the timeout threshold, regardless of
    /// votes received so far.
    pub fn sweep_timeouts(&self, now: u64) {
        let timeout = self.config.transaction_timeout.as_millis() as u64;
        let expired: Vec<u64> = self
            .inflight
            .iter()
            .filter(|entry| now.saturating_sub(entry.value().submitted_at) > timeout)
            .map(|entry| *entry.key())
            .collect();

        for transaction_id in expired {
            if let Some((_, transaction)) = self.inflight.remove(&transaction_id) {
                warn!("{}", Error::QuorumTimeout(transaction_id));
                self.report(OperationOutcome {
                    transaction_id,
                    op: transaction.op,
                    key: transaction.key,
                    success: false,
                    value: None,
                });
            }
        }
    }

    pub fn inflight_len(&self) -> usize {
        self.inflight.len()
    }

    fn report_unavailable(&self, transaction_id: u64, op: OpKind, key: &str) {
        warn!(
            "transaction {}: ring too small, no replica set for {:?} {}",
            transaction_id, op, key
        );
        self.report(OperationOutcome {
            transaction_id,
            op,
            key: key.to_string(),
            success: false,
            value: None,
        });
    }

    fn report(&self, outcome: OperationOutcome) {
        if outcome.success {
            info!(
                "transaction {} {:?} {} succeeded",
                outcome.transaction_id, outcome.op, outcome.key
            );
        } else {
            warn!(
                "transaction {} {:?} {} failed",
                outcome.transaction_id, outcome.op, outcome.key
            );
        }
        // The receiver may be gone (observer shut down); correctness does not
        // depend on the side-channel.
        let _ = self.outcomes.send(outcome);
    }
}
