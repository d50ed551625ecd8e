//! Membership & Discovery Module
//!
//! Implements a heartbeat-gossip membership protocol to manage the cluster topology.
//! Nodes use this service to discover each other and detect failures without a
//! central coordinator.
//!
//! ## Core Mechanisms
//! - **Join handshake**: A new node asks a seed for admission and adopts the seed's full table.
//! - **Gossip Protocol**: Each tick a member sends its entire table to one random peer; merges keep the strictly greater heartbeat.
//! - **Failure Detection**: Entries that go silent past `2 x gossip_period + grace` are dropped locally; no failure message is ever broadcast.

pub mod service;
pub mod types;

#[cfg(test)]
mod tests;
