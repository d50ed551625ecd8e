use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

use super::types::{MemberEntry, MembershipMessage, NodeId};
use crate::config::{unix_millis, ProtocolConfig};
use crate::error::{Error, Result};
use crate::wire::{send_packet, Packet};

/// Maintains this node's view of the live peer set.
///
/// A node starts `joining` and becomes a `member` either immediately (when it
/// is the bootstrap, started with no seeds) or once a seed answers its join
/// request with a full membership table. Members gossip their whole table to
/// one random peer per tick and drop peers whose entries go stale; failure is
/// never announced, every node times silent peers out on its own.
pub struct MembershipService {
    pub local_id: NodeId,
    pub members: DashMap<NodeId, MemberEntry>,
    heartbeat: AtomicU64,
    in_group: AtomicBool,
    socket: Arc<UdpSocket>,
    config: ProtocolConfig,
}

impl MembershipService {
    pub fn new(
        local_id: NodeId,
        socket: Arc<UdpSocket>,
        bootstrap: bool,
        config: ProtocolConfig,
    ) -> Self {
        let members = DashMap::new();
        members.insert(
            local_id,
            MemberEntry {
                id: local_id,
                heartbeat: 0,
                last_update: unix_millis(),
            },
        );

        Self {
            local_id,
            members,
            heartbeat: AtomicU64::new(0),
            in_group: AtomicBool::new(bootstrap),
            socket,
            config,
        }
    }

    /// Introduce this node to the cluster via the seed list. Succeeds if at
    /// least one join request left the socket; admission itself happens
    /// asynchronously when a `JoinReply` arrives.
    pub async fn join(&self, seeds: &[SocketAddr]) -> Result<()> {
        let request = Packet::Membership(MembershipMessage::JoinRequest {
            sender: self.local_id,
            heartbeat: self.heartbeat.load(Ordering::SeqCst),
        });

        let mut sent = false;
        for seed in seeds {
            match send_packet(&self.socket, *seed, &request).await {
                Ok(()) => {
                    info!("sent join request to {}", seed);
                    sent = true;
                }
                Err(e) => warn!("join request to {} failed: {}", seed, e),
            }
        }

        if sent {
            Ok(())
        } else {
            Err(Error::JoinRejected)
        }
    }

    pub fn is_member(&self) -> bool {
        self.in_group.load(Ordering::SeqCst)
    }

    /// Current membership table, self entry included. Consumed by the ring
    /// layer.
    pub fn snapshot(&self) -> Vec<MemberEntry> {
        self.members
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub async fn handle_message(&self, msg: MembershipMessage) {
        match msg {
            MembershipMessage::JoinRequest { sender, heartbeat } => {
                self.handle_join_request(sender, heartbeat).await;
            }
            MembershipMessage::JoinReply { sender, members } => {
                self.handle_join_reply(sender, members);
            }
            MembershipMessage::Gossip { sender: _, members } => {
                self.merge_gossip(&members, unix_millis());
            }
        }
    }

    /// Any receiver of a join request admits the sender and answers with its
    /// full table.
    async fn handle_join_request(&self, sender: NodeId, heartbeat: u64) {
        let now = unix_millis();
        match self.members.get_mut(&sender) {
            Some(mut entry) => {
                entry.heartbeat = heartbeat;
                entry.last_update = now;
            }
            None => {
                self.members.insert(
                    sender,
                    MemberEntry {
                        id: sender,
                        heartbeat,
                        last_update: now,
                    },
                );
                info!("node added: {} (join request)", sender);
            }
        }

        let reply = Packet::Membership(MembershipMessage::JoinReply {
            sender: self.local_id,
            members: self.snapshot(),
        });
        if let Err(e) = send_packet(&self.socket, sender.addr(), &reply).await {
            warn!("join reply to {} failed: {}", sender, e);
        }
    }

    /// Adopt the introducer's table verbatim and transition to `member`.
    fn handle_join_reply(&self, sender: NodeId, members: Vec<MemberEntry>) {
        if self.is_member() {
            debug!("duplicate join reply from {} ignored", sender);
            return;
        }

        self.members.clear();
        for entry in members {
            info!("node added: {} (join reply)", entry.id);
            self.members.insert(entry.id, entry);
        }
        // The introducer's table already contains us (it upserted our entry
        // before replying), but never leave the self entry to chance.
        self.members.entry(self.local_id).or_insert(MemberEntry {
            id: self.local_id,
            heartbeat: self.heartbeat.load(Ordering::SeqCst),
            last_update: unix_millis(),
        });

        self.in_group.store(true, Ordering::SeqCst);
        info!("joined cluster via {} ({} members)", sender, self.members.len());
    }

    /// Gossip merge rule: a known entry is overwritten only by a strictly
    /// greater heartbeat; an unknown entry is admitted only while its
    /// timestamp is recent, so failed peers are not revived by stale tables.
    pub fn merge_gossip(&self, members: &[MemberEntry], now: u64) {
        for remote in members {
            if remote.id == self.local_id {
                continue;
            }

            match self.members.get_mut(&remote.id) {
                Some(mut local) => {
                    if remote.heartbeat > local.heartbeat {
                        local.heartbeat = remote.heartbeat;
                        local.last_update = remote.last_update;
                    } else {
                        debug!("stale gossip for {} ignored", remote.id);
                    }
                }
                None => {
                    if now.saturating_sub(remote.last_update)
                        < self.config.admit_window().as_millis() as u64
                    {
                        info!("node added: {} (gossip)", remote.id);
                        self.members.insert(remote.id, remote.clone());
                    } else {
                        debug!("stale entry for unknown {} ignored", remote.id);
                    }
                }
            }
        }
    }

    /// Drop every non-self entry that has gone silent past the failure
    /// timeout. Removal is local; other nodes reach the same conclusion via
    /// their own sweep.
    pub fn sweep_failures(&self, now: u64) -> Vec<NodeId> {
        let timeout = self.config.failure_timeout().as_millis() as u64;
        let expired: Vec<NodeId> = self
            .members
            .iter()
            .filter(|entry| {
                entry.key() != &self.local_id
                    && now.saturating_sub(entry.value().last_update) > timeout
            })
            .map(|entry| *entry.key())
            .collect();

        for id in &expired {
            self.members.remove(id);
            info!("node removed: {} (failure timeout)", id);
        }
        expired
    }

    /// One gossip round: sweep failures, refresh our own entry, send the full
    /// table to one peer chosen uniformly at random.
    pub async fn gossip_tick(&self) {
        if !self.is_member() {
            return;
        }

        let now = unix_millis();
        self.sweep_failures(now);

        let heartbeat = self.heartbeat.fetch_add(1, Ordering::SeqCst) + 1;
        self.members.insert(
            self.local_id,
            MemberEntry {
                id: self.local_id,
                heartbeat,
                last_update: now,
            },
        );

        let peers: Vec<NodeId> = self
            .members
            .iter()
            .filter(|entry| entry.key() != &self.local_id)
            .map(|entry| *entry.key())
            .collect();
        if peers.is_empty() {
            return;
        }

        let target = {
            use rand::Rng;
            peers[rand::thread_rng().gen_range(0..peers.len())]
        };

        let gossip = Packet::Membership(MembershipMessage::Gossip {
            sender: self.local_id,
            members: self.snapshot(),
        });
        if let Err(e) = send_packet(&self.socket, target.addr(), &gossip).await {
            warn!("gossip to {} failed: {}", target, e);
        }
    }
}
