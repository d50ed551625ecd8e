//! Wire envelope.
//!
//! Every datagram on the node socket is one bincode-encoded [`Packet`]: a
//! self-describing tagged union over the membership and key-value protocols.
//! Packets are decoded once at the socket boundary and then matched
//! exhaustively by the node's dispatch loop.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::net::UdpSocket;

use crate::error::{Error, Result};
use crate::membership::types::{MembershipMessage, NodeId};
use crate::storage::protocol::KvMessage;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Packet {
    Membership(MembershipMessage),
    Kv(KvMessage),
}

pub fn encode(packet: &Packet) -> Result<Vec<u8>> {
    Ok(bincode::serialize(packet)?)
}

pub fn decode(bytes: &[u8]) -> Result<Packet> {
    Ok(bincode::deserialize(bytes)?)
}

/// Fire-and-forget unicast. A failed send surfaces as [`Error::PeerUnreachable`];
/// callers log it and move on, relying on gossip timeouts to reflect reality.
pub async fn send_packet(socket: &UdpSocket, to: SocketAddr, packet: &Packet) -> Result<()> {
    let bytes = encode(packet)?;
    socket.send_to(&bytes, to).await.map_err(|e| {
        tracing::debug!("send to {} failed: {}", to, e);
        Error::PeerUnreachable(NodeId(to))
    })?;
    Ok(())
}
