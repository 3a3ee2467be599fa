//! Filesystem-backed cache store
//!
//! Layout under the store root:
//!
//! ```text
//! <root>/<partition>/<sha256(key)>.entry
//! ```
//!
//! Each entry file holds one line of JSON metadata followed by the raw body.
//! Entries are written to a temporary file and renamed into place, so readers
//! see either the previous or the new entry, never a torn one.

use super::{validate_partition_name, CacheStore, Partition};
use crate::error::{ShellcacheError, ShellcacheResult};
use crate::http::{RequestKey, Response, ResponseKind};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tracing::{debug, warn};

const ENTRY_EXTENSION: &str = "entry";

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Metadata line stored ahead of the body
#[derive(Debug, Serialize, Deserialize)]
struct EntryMeta {
    key: RequestKey,
    status: u16,
    headers: BTreeMap<String, String>,
    kind: ResponseKind,
    stored_at: DateTime<Utc>,
}

/// Cache store persisted as plain files
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Create a store rooted at `root`; the directory is created lazily
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn partition_dir(&self, name: &str) -> ShellcacheResult<PathBuf> {
        validate_partition_name(name)?;
        Ok(self.root.join(name))
    }

    fn entry_file_name(key: &RequestKey) -> String {
        let digest = Sha256::digest(key.to_string().as_bytes());
        format!("{}.{}", hex::encode(digest), ENTRY_EXTENSION)
    }

    fn encode(key: &RequestKey, response: &Response) -> ShellcacheResult<Vec<u8>> {
        let meta = EntryMeta {
            key: key.clone(),
            status: response.status,
            headers: response.headers.clone(),
            kind: response.kind,
            stored_at: Utc::now(),
        };

        let mut bytes = serde_json::to_vec(&meta)?;
        bytes.push(b'\n');
        bytes.extend_from_slice(&response.body);
        Ok(bytes)
    }

    fn decode(path: &Path, bytes: &[u8]) -> ShellcacheResult<(EntryMeta, Vec<u8>)> {
        let split = bytes.iter().position(|b| *b == b'\n').ok_or_else(|| {
            ShellcacheError::store(
                format!("reading entry {}", path.display()),
                "missing metadata line",
            )
        })?;

        let meta: EntryMeta = serde_json::from_slice(&bytes[..split])?;
        Ok((meta, bytes[split + 1..].to_vec()))
    }
}

#[async_trait]
impl CacheStore for FsStore {
    async fn open_partition(&self, name: &str) -> ShellcacheResult<Partition> {
        let dir = self.partition_dir(name)?;
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| ShellcacheError::io(format!("creating partition {}", dir.display()), e))?;

        let mut entries = 0;
        let mut listing = fs::read_dir(&dir)
            .await
            .map_err(|e| ShellcacheError::io(format!("listing partition {}", dir.display()), e))?;
        while let Some(item) = listing
            .next_entry()
            .await
            .map_err(|e| ShellcacheError::io(format!("listing partition {}", dir.display()), e))?
        {
            if item.path().extension().is_some_and(|ext| ext == ENTRY_EXTENSION) {
                entries += 1;
            }
        }

        Ok(Partition {
            name: name.to_string(),
            entries,
        })
    }

    async fn match_any(&self, key: &RequestKey) -> ShellcacheResult<Option<Response>> {
        for name in self.list_partitions().await? {
            match self.match_in(&name, key).await {
                Ok(Some(response)) => return Ok(Some(response)),
                Ok(None) => {}
                Err(e) => warn!("Skipping partition {} while matching {}: {}", name, key, e),
            }
        }
        Ok(None)
    }

    async fn match_in(&self, name: &str, key: &RequestKey) -> ShellcacheResult<Option<Response>> {
        let path = self.partition_dir(name)?.join(Self::entry_file_name(key));

        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(ShellcacheError::io(
                    format!("reading entry {}", path.display()),
                    e,
                ))
            }
        };

        let (meta, body) = Self::decode(&path, &bytes)?;
        if &meta.key != key {
            debug!("Entry {} belongs to {}, not {}", path.display(), meta.key, key);
            return Ok(None);
        }

        Ok(Some(Response {
            status: meta.status,
            headers: meta.headers,
            body,
            kind: meta.kind,
        }))
    }

    async fn put(&self, name: &str, key: &RequestKey, response: &Response) -> ShellcacheResult<()> {
        let dir = self.partition_dir(name)?;
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| ShellcacheError::io(format!("creating partition {}", dir.display()), e))?;

        let file_name = Self::entry_file_name(key);
        let target = dir.join(&file_name);
        let tmp = dir.join(format!(
            ".{}.{}.{}",
            file_name,
            std::process::id(),
            TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));

        let bytes = Self::encode(key, response)?;
        fs::write(&tmp, bytes)
            .await
            .map_err(|e| ShellcacheError::io(format!("writing entry {}", tmp.display()), e))?;

        if let Err(e) = fs::rename(&tmp, &target).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(ShellcacheError::io(
                format!("committing entry {}", target.display()),
                e,
            ));
        }

        debug!("Stored {} in {}", key, name);
        Ok(())
    }

    async fn delete_partition(&self, name: &str) -> ShellcacheResult<bool> {
        let dir = self.partition_dir(name)?;
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ShellcacheError::io(
                format!("deleting partition {}", dir.display()),
                e,
            )),
        }
    }

    async fn list_partitions(&self) -> ShellcacheResult<Vec<String>> {
        let mut listing = match fs::read_dir(&self.root).await {
            Ok(listing) => listing,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(ShellcacheError::io(
                    format!("listing store {}", self.root.display()),
                    e,
                ))
            }
        };

        let mut names = Vec::new();
        while let Some(item) = listing
            .next_entry()
            .await
            .map_err(|e| ShellcacheError::io(format!("listing store {}", self.root.display()), e))?
        {
            let is_dir = item.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            let name = item.file_name().to_string_lossy().into_owned();
            if is_dir && !name.starts_with('.') {
                names.push(name);
            }
        }

        names.sort();
        Ok(names)
    }
}
