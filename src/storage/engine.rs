//! Local Storage Engine
//!
//! The per-node map from key to value+metadata. No network awareness: the
//! coordinator and the stabilization protocol decide what lands here and
//! under which replica role.

use dashmap::DashMap;

use super::protocol::ReplicaRole;
use crate::error::{Error, Result};

/// A stored value with its write timestamp and the replica role it was
/// stored under.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEntry {
    pub value: String,
    pub timestamp: u64,
    pub role: ReplicaRole,
}

#[derive(Default)]
pub struct StorageEngine {
    data: DashMap<String, StoredEntry>,
}

impl StorageEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent upsert; create and update share latest-write-wins
    /// semantics.
    pub fn create(&self, key: &str, value: &str, timestamp: u64, role: ReplicaRole) -> bool {
        self.data.insert(
            key.to_string(),
            StoredEntry {
                value: value.to_string(),
                timestamp,
                role,
            },
        );
        true
    }

    pub fn read(&self, key: &str) -> Result<StoredEntry> {
        self.data
            .get(key)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::KeyNotFound(key.to_string()))
    }

    /// Remove the key; reports whether it existed.
    pub fn delete(&self, key: &str) -> bool {
        self.data.remove(key).is_some()
    }

    /// Entries stored under the given role, for stabilization pushes.
    pub fn entries_with_role(&self, role: ReplicaRole) -> Vec<(String, StoredEntry)> {
        self.data
            .iter()
            .filter(|entry| entry.value().role == role)
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
