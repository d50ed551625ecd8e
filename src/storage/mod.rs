//! Distributed Storage Module
//!
//! Implements the replicated in-memory key-value store on top of the
//! membership view.
//!
//! ## Core Concepts
//! - **Placement**: the ring resolves every key to three replicas (primary +
//!   two ring successors).
//! - **Replication**: the `ReplicationCoordinator` fans each client CRUD call
//!   out to the replica set and reports success once a majority (2 of 3)
//!   acknowledges.
//! - **Local state**: the `StorageEngine` is a plain map from key to
//!   value+metadata, one per node.
//! - **Self-healing**: the `StabilizationProtocol` re-replicates data when a
//!   node's ring neighbors change.

pub mod coordinator;
pub mod engine;
pub mod protocol;
pub mod stabilization;
