//! Distributed Key-Value Store Library
//!
//! This library crate defines the core modules that make up the distributed system.
//! It serves as the foundation for the node binary (`main.rs`).
//!
//! ## Architecture Modules
//! The system is composed of five loosely coupled subsystems:
//!
//! - **`membership`**: The cluster coordination layer. Uses a UDP-based heartbeat
//!   Gossip protocol to manage node discovery and failure detection without a
//!   central coordinator.
//! - **`ring`**: The placement layer. Converts a membership snapshot into a sorted
//!   consistent-hashing ring and resolves each key to its three replica nodes.
//! - **`storage`**: The data layer. A local storage engine per node, a replication
//!   coordinator that drives client CRUD operations to quorum (2 of 3
//!   acknowledgements), and a stabilization protocol that re-replicates data
//!   when ring neighbors change.
//! - **`node`**: The event-loop wiring. One UDP socket per node, a receive loop
//!   dispatching decoded packets, and the periodic gossip, ring-refresh and
//!   transaction-timeout ticks.
//! - **`wire`**: The packet envelope shared by membership and store traffic.

pub mod config;
pub mod error;
pub mod membership;
pub mod node;
pub mod ring;
pub mod storage;
pub mod wire;

pub use config::ProtocolConfig;
pub use error::{Error, Result};
pub use node::KvNode;
