//! Node Wiring
//!
//! Ties the subsystems to a single UDP socket. One receive loop decodes each
//! datagram once and dispatches on the packet tag; periodic loops drive the
//! gossip round, the ring refresh + stabilization, and the transaction
//! timeout sweep. All sends are fire-and-forget: failures are logged and
//! dropped, and quorum is correlated from later inbound replies.

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{unix_millis, ProtocolConfig};
use crate::error::Result;
use crate::membership::service::MembershipService;
use crate::membership::types::NodeId;
use crate::ring::Ring;
use crate::storage::coordinator::ReplicationCoordinator;
use crate::storage::engine::StorageEngine;
use crate::storage::protocol::{KvMessage, OpKind, OperationOutcome, ReplicaRole};
use crate::storage::stabilization::StabilizationProtocol;
use crate::wire::{self, send_packet, Packet};

pub struct KvNode {
    pub local_id: NodeId,
    pub membership: Arc<MembershipService>,
    pub engine: Arc<StorageEngine>,
    pub coordinator: Arc<ReplicationCoordinator>,
    stabilizer: StabilizationProtocol,
    socket: Arc<UdpSocket>,
    seeds: Vec<SocketAddr>,
    config: ProtocolConfig,
}

impl KvNode {
    /// Bind the node socket and assemble the subsystems. The returned
    /// receiver is the outcome side-channel: one record per completed or
    /// timed-out client transaction.
    pub async fn new(
        bind_addr: SocketAddr,
        seeds: Vec<SocketAddr>,
        config: ProtocolConfig,
    ) -> Result<(Arc<Self>, UnboundedReceiver<OperationOutcome>)> {
        let socket = Arc::new(UdpSocket::bind(bind_addr).await?);
        let local_id = NodeId(socket.local_addr()?);

        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        let membership = Arc::new(MembershipService::new(
            local_id,
            socket.clone(),
            seeds.is_empty(),
            config.clone(),
        ));
        let coordinator = Arc::new(ReplicationCoordinator::new(
            local_id,
            socket.clone(),
            config.clone(),
            outcome_tx,
        ));

        let node = Arc::new(Self {
            local_id,
            membership,
            engine: Arc::new(StorageEngine::new()),
            coordinator,
            stabilizer: StabilizationProtocol::new(),
            socket,
            seeds,
            config,
        });
        Ok((node, outcome_rx))
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_id.addr()
    }

    /// Join the cluster (unless bootstrapping) and spawn the background
    /// loops. Aborting the returned handles stops the node.
    pub async fn start(self: Arc<Self>) -> Result<Vec<JoinHandle<()>>> {
        if !self.seeds.is_empty() {
            self.membership.join(&self.seeds).await?;
        } else {
            info!("{} starting as bootstrap node", self.local_id);
        }

        let mut handles = Vec::new();
        {
            let node = self.clone();
            handles.push(tokio::spawn(async move { node.receive_loop().await }));
        }
        {
            let node = self.clone();
            handles.push(tokio::spawn(async move { node.gossip_loop().await }));
        }
        {
            let node = self.clone();
            handles.push(tokio::spawn(async move { node.ring_loop().await }));
        }
        {
            let node = self.clone();
            handles.push(tokio::spawn(async move { node.sweep_loop().await }));
        }
        Ok(handles)
    }

    // Client-facing CRUD: fire-and-forget, completion arrives on the outcome
    // channel under the returned transaction id.

    pub async fn create(&self, key: &str, value: &str) -> u64 {
        self.coordinator.create(key, value).await
    }

    pub async fn read(&self, key: &str) -> u64 {
        self.coordinator.read(key).await
    }

    pub async fn update(&self, key: &str, value: &str) -> u64 {
        self.coordinator.update(key, value).await
    }

    pub async fn delete(&self, key: &str) -> u64 {
        self.coordinator.delete(key).await
    }

    async fn receive_loop(self: Arc<Self>) {
        let mut buf = vec![0u8; 65536];
        loop {
            match self.socket.recv_from(&mut buf).await {
                Ok((len, src)) => match wire::decode(&buf[..len]) {
                    Ok(Packet::Membership(msg)) => self.membership.handle_message(msg).await,
                    Ok(Packet::Kv(msg)) => self.handle_kv(msg).await,
                    Err(e) => warn!("undecodable packet from {}: {}", src, e),
                },
                Err(e) => {
                    debug!("socket receive failed: {}", e);
                    return;
                }
            }
        }
    }

    async fn handle_kv(&self, msg: KvMessage) {
        match msg {
            KvMessage::Query {
                transaction_id,
                from,
                op,
                key,
                value,
                role,
            } => {
                self.handle_query(transaction_id, from, op, &key, value, role)
                    .await;
            }
            KvMessage::Reply {
                transaction_id,
                success,
                value,
                timestamp,
                ..
            } => {
                self.coordinator
                    .handle_reply(transaction_id, success, value, timestamp);
            }
            KvMessage::Replicate {
                from,
                key,
                value,
                timestamp,
                role,
            } => {
                debug!("replicate push for '{}' from {}", key, from);
                self.engine.create(&key, &value, timestamp, role);
            }
        }
    }

    /// Server side of the quorum protocol: apply the operation to the local
    /// engine and acknowledge to the originating coordinator under the same
    /// transaction id.
    async fn handle_query(
        &self,
        transaction_id: u64,
        from: NodeId,
        op: OpKind,
        key: &str,
        value: Option<String>,
        role: Option<ReplicaRole>,
    ) {
        let (success, value, timestamp) = match op {
            OpKind::Create | OpKind::Update => {
                let role = role.unwrap_or(ReplicaRole::Tertiary);
                let ok = self
                    .engine
                    .create(key, value.as_deref().unwrap_or(""), unix_millis(), role);
                (ok, None, None)
            }
            OpKind::Read => match self.engine.read(key) {
                Ok(entry) => (true, Some(entry.value), Some(entry.timestamp)),
                Err(e) => {
                    debug!("transaction {}: {}", transaction_id, e);
                    (false, None, None)
                }
            },
            OpKind::Delete => (self.engine.delete(key), None, None),
        };

        if success {
            debug!("transaction {} {:?} '{}' applied locally", transaction_id, op, key);
        } else {
            debug!("transaction {} {:?} '{}' failed locally", transaction_id, op, key);
        }

        let reply = Packet::Kv(KvMessage::Reply {
            transaction_id,
            from: self.local_id,
            success,
            value,
            timestamp,
        });
        if let Err(e) = send_packet(&self.socket, from.addr(), &reply).await {
            warn!("reply for transaction {} to {} failed: {}", transaction_id, from, e);
        }
    }

    async fn gossip_loop(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.config.gossip_period);
        loop {
            interval.tick().await;
            self.membership.gossip_tick().await;
        }
    }

    /// Rebuild the ring from the membership snapshot and run a stabilization
    /// round. An unchanged neighborhood makes the round a no-op, so running
    /// unconditionally mirrors the membership view with bounded lag.
    async fn ring_loop(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.config.stabilization_period);
        loop {
            interval.tick().await;
            if !self.membership.is_member() {
                continue;
            }

            let ids = self.membership.snapshot().into_iter().map(|m| m.id);
            let ring = Ring::from_members(ids, self.config.ring_slots);
            self.coordinator.set_ring(ring.clone()).await;

            let pushes = self.stabilizer.run(&ring, self.local_id, &self.engine).await;
            for push in pushes {
                let packet = Packet::Kv(KvMessage::Replicate {
                    from: self.local_id,
                    key: push.key,
                    value: push.value,
                    timestamp: push.timestamp,
                    role: ReplicaRole::Tertiary,
                });
                if let Err(e) = send_packet(&self.socket, push.target.addr(), &packet).await {
                    warn!("replicate push to {} failed: {}", push.target, e);
                }
            }
        }
    }

    async fn sweep_loop(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.config.gossip_period);
        loop {
            interval.tick().await;
            self.coordinator.sweep_timeouts(unix_millis());
        }
    }
}
