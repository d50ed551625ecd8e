//! Membership Module Tests
//!
//! Validates the cluster membership protocol.
//!
//! ## Test Scopes
//! - **Data Structures**: Identity semantics and wire serialization.
//! - **Join Handshake**: bootstrap vs seeded startup, table adoption.
//! - **Gossip Merge**: the strictly-greater-heartbeat rule and the stale-entry
//!   admission window.
//! - **Failure Sweep**: silent peers are dropped, the self entry never is.

#[cfg(test)]
mod tests {
    use crate::config::{unix_millis, ProtocolConfig};
    use crate::membership::service::MembershipService;
    use crate::membership::types::{MemberEntry, MembershipMessage, NodeId};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::net::UdpSocket;

    fn test_config() -> ProtocolConfig {
        ProtocolConfig {
            gossip_period: Duration::from_millis(100),
            failure_grace: Duration::from_millis(300),
            ..ProtocolConfig::default()
        }
    }

    async fn service(bootstrap: bool) -> MembershipService {
        let socket = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
        let local_id = NodeId(socket.local_addr().unwrap());
        MembershipService::new(local_id, socket, bootstrap, test_config())
    }

    fn peer(port: u16) -> NodeId {
        NodeId(format!("127.0.0.1:{}", port).parse().unwrap())
    }

    fn entry(id: NodeId, heartbeat: u64, last_update: u64) -> MemberEntry {
        MemberEntry {
            id,
            heartbeat,
            last_update,
        }
    }

    // ============================================================
    // NODE ID TESTS
    // ============================================================

    #[test]
    fn test_node_id_equality_follows_address() {
        assert_eq!(peer(5000), peer(5000));
        assert_ne!(peer(5000), peer(5001));
    }

    #[test]
    fn test_node_id_display_is_the_address() {
        assert_eq!(peer(5000).to_string(), "127.0.0.1:5000");
    }

    // ============================================================
    // WIRE SERIALIZATION
    // ============================================================

    #[test]
    fn test_gossip_message_serialization() {
        let msg = MembershipMessage::Gossip {
            sender: peer(5000),
            members: vec![entry(peer(5001), 3, 42)],
        };

        let encoded = bincode::serialize(&msg).expect("serialize gossip");
        let decoded: MembershipMessage =
            bincode::deserialize(&encoded).expect("deserialize gossip");

        if let MembershipMessage::Gossip { sender, members } = decoded {
            assert_eq!(sender, peer(5000));
            assert_eq!(members, vec![entry(peer(5001), 3, 42)]);
        } else {
            panic!("wrong message type");
        }
    }

    // ============================================================
    // JOIN HANDSHAKE
    // ============================================================

    #[tokio::test]
    async fn test_bootstrap_node_is_member_immediately() {
        let service = service(true).await;

        assert!(service.is_member());
        assert_eq!(service.members.len(), 1);
        assert_eq!(service.snapshot()[0].id, service.local_id);
    }

    #[tokio::test]
    async fn test_seeded_node_starts_joining() {
        let service = service(false).await;
        assert!(!service.is_member());
    }

    #[tokio::test]
    async fn test_join_request_admits_sender() {
        let receiver = service(true).await;
        let joiner = service(true).await; // bound socket so the reply has somewhere to go

        receiver
            .handle_message(MembershipMessage::JoinRequest {
                sender: joiner.local_id,
                heartbeat: 0,
            })
            .await;

        assert_eq!(receiver.members.len(), 2);
        assert!(receiver.members.contains_key(&joiner.local_id));
    }

    #[tokio::test]
    async fn test_join_reply_adopts_table_and_admits() {
        let service = service(false).await;
        let now = unix_millis();
        let table = vec![
            entry(peer(7001), 5, now),
            entry(peer(7002), 9, now),
            entry(service.local_id, 0, now),
        ];

        service
            .handle_message(MembershipMessage::JoinReply {
                sender: peer(7001),
                members: table,
            })
            .await;

        assert!(service.is_member());
        assert_eq!(service.members.len(), 3);
        assert_eq!(service.members.get(&peer(7002)).unwrap().heartbeat, 9);
    }

    // ============================================================
    // GOSSIP MERGE RULE
    // ============================================================

    #[tokio::test]
    async fn test_merge_keeps_strictly_greater_heartbeat() {
        let service = service(true).await;
        let now = unix_millis();
        service.members.insert(peer(7001), entry(peer(7001), 5, 100));

        // Strictly greater: overwritten, timestamp taken from the remote.
        service.merge_gossip(&[entry(peer(7001), 6, now)], now);
        assert_eq!(service.members.get(&peer(7001)).unwrap().heartbeat, 6);
        assert_eq!(service.members.get(&peer(7001)).unwrap().last_update, now);

        // Equal: ignored.
        service.merge_gossip(&[entry(peer(7001), 6, now + 50)], now);
        assert_eq!(service.members.get(&peer(7001)).unwrap().last_update, now);

        // Lower: ignored.
        service.merge_gossip(&[entry(peer(7001), 2, now + 50)], now);
        assert_eq!(service.members.get(&peer(7001)).unwrap().heartbeat, 6);
    }

    #[tokio::test]
    async fn test_merge_admits_recent_unknown_entry() {
        let service = service(true).await;
        let now = unix_millis();

        // Within the two-gossip-period window (200ms with the test config).
        service.merge_gossip(&[entry(peer(7001), 1, now - 50)], now);
        assert!(service.members.contains_key(&peer(7001)));
    }

    #[tokio::test]
    async fn test_merge_drops_stale_unknown_entry() {
        let service = service(true).await;
        let now = unix_millis();

        // Older than the admission window: a failed peer must not be revived.
        service.merge_gossip(&[entry(peer(7001), 99, now - 10_000)], now);
        assert!(!service.members.contains_key(&peer(7001)));
    }

    #[tokio::test]
    async fn test_merge_never_touches_self_entry() {
        let service = service(true).await;
        let now = unix_millis();

        service.merge_gossip(&[entry(service.local_id, 1000, now)], now);
        assert_eq!(service.members.get(&service.local_id).unwrap().heartbeat, 0);
    }

    // ============================================================
    // FAILURE SWEEP
    // ============================================================

    #[tokio::test]
    async fn test_sweep_removes_silent_peers_only() {
        let service = service(true).await;
        let now = unix_millis();
        // failure timeout = 2*100ms + 300ms = 500ms with the test config
        service.members.insert(peer(7001), entry(peer(7001), 4, now - 600));
        service.members.insert(peer(7002), entry(peer(7002), 4, now - 100));

        let removed = service.sweep_failures(now);

        assert_eq!(removed, vec![peer(7001)]);
        assert!(!service.members.contains_key(&peer(7001)));
        assert!(service.members.contains_key(&peer(7002)));
    }

    #[tokio::test]
    async fn test_sweep_spares_a_stale_self_entry() {
        let service = service(true).await;
        let now = unix_millis();
        service
            .members
            .insert(service.local_id, entry(service.local_id, 0, now - 60_000));

        assert!(service.sweep_failures(now).is_empty());
        assert!(service.members.contains_key(&service.local_id));
    }

    // ============================================================
    // GOSSIP TICK
    // ============================================================

    #[tokio::test]
    async fn test_gossip_tick_refreshes_own_entry() {
        let service = service(true).await;

        service.gossip_tick().await;
        service.gossip_tick().await;

        let own = service.members.get(&service.local_id).unwrap();
        assert_eq!(own.heartbeat, 2);
    }

    #[tokio::test]
    async fn test_gossip_tick_is_a_no_op_while_joining() {
        let service = service(false).await;

        service.gossip_tick().await;

        // Still not admitted, own heartbeat untouched.
        assert!(!service.is_member());
        assert_eq!(service.members.get(&service.local_id).unwrap().heartbeat, 0);
    }
}
