//! In-memory cache store

use super::{validate_partition_name, CacheStore, Partition};
use crate::error::ShellcacheResult;
use crate::http::{RequestKey, Response};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

type Entries = HashMap<RequestKey, Response>;

/// Cache store held entirely in process memory
///
/// Partitions are kept in name order, so `match_any` is deterministic here
/// even though callers must not rely on it.
#[derive(Debug, Default)]
pub struct MemoryStore {
    partitions: RwLock<BTreeMap<String, Entries>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries in a partition, if it exists
    pub fn entry_count(&self, name: &str) -> Option<usize> {
        self.partitions.read().get(name).map(HashMap::len)
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn open_partition(&self, name: &str) -> ShellcacheResult<Partition> {
        validate_partition_name(name)?;
        let mut partitions = self.partitions.write();
        let entries = partitions.entry(name.to_string()).or_default();
        Ok(Partition {
            name: name.to_string(),
            entries: entries.len(),
        })
    }

    async fn match_any(&self, key: &RequestKey) -> ShellcacheResult<Option<Response>> {
        let partitions = self.partitions.read();
        Ok(partitions.values().find_map(|entries| entries.get(key).cloned()))
    }

    async fn match_in(&self, name: &str, key: &RequestKey) -> ShellcacheResult<Option<Response>> {
        let partitions = self.partitions.read();
        Ok(partitions
            .get(name)
            .and_then(|entries| entries.get(key).cloned()))
    }

    async fn put(&self, name: &str, key: &RequestKey, response: &Response) -> ShellcacheResult<()> {
        validate_partition_name(name)?;
        self.partitions
            .write()
            .entry(name.to_string())
            .or_default()
            .insert(key.clone(), response.clone());
        Ok(())
    }

    async fn delete_partition(&self, name: &str) -> ShellcacheResult<bool> {
        Ok(self.partitions.write().remove(name).is_some())
    }

    async fn list_partitions(&self) -> ShellcacheResult<Vec<String>> {
        Ok(self.partitions.read().keys().cloned().collect())
    }
}
