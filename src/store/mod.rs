//! Cache store abstraction
//!
//! The store owns named partitions of cached entries. It is treated as an
//! external, concurrency-safe key-value store: concurrent writes to the
//! same entry are last-write-wins.
//!
//! | Backend | Use |
//! |---------|-----|
//! | [`MemoryStore`] | in-process, tests and embedding |
//! | [`FsStore`] | one directory per partition, survives restarts |

pub mod fs;
pub mod memory;
pub mod partition;

pub use fs::FsStore;
pub use memory::MemoryStore;
pub use partition::{validate_partition_name, CachePartitions, PartitionKind, PartitionName};

use crate::error::ShellcacheResult;
use crate::http::{RequestKey, Response};
use async_trait::async_trait;

/// Summary of an opened partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub name: String,
    pub entries: usize,
}

/// Abstract cache storage interface
///
/// Implementations must be safe to share between concurrently running
/// request handlers.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Open a partition, creating it empty if it does not exist
    async fn open_partition(&self, name: &str) -> ShellcacheResult<Partition>;

    /// Look up an entry in any partition, in unspecified order
    async fn match_any(&self, key: &RequestKey) -> ShellcacheResult<Option<Response>>;

    /// Look up an entry in one partition
    async fn match_in(&self, name: &str, key: &RequestKey) -> ShellcacheResult<Option<Response>>;

    /// Store an entry, creating the partition if needed and replacing any previous entry
    async fn put(&self, name: &str, key: &RequestKey, response: &Response) -> ShellcacheResult<()>;

    /// Delete a partition and its entries, returning whether it existed
    async fn delete_partition(&self, name: &str) -> ShellcacheResult<bool>;

    /// Names of all existing partitions
    async fn list_partitions(&self) -> ShellcacheResult<Vec<String>>;
}
