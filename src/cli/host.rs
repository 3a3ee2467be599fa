//! Command-line hosting of the cache layer
//!
//! Each invocation is one short-lived "runtime": the layer is rebuilt from
//! config over a filesystem store, the lifecycle state is resumed from the
//! state directory, and written back after a transition. The record also
//! remembers which older version keeps serving until the new one activates.

use crate::config::{Config, ConfigManager};
use crate::error::ShellcacheResult;
use crate::layer::ShellCache;
use crate::lifecycle::{LifecycleRecord, LifecycleState};
use crate::network::HttpNetwork;
use crate::store::FsStore;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

pub struct Host {
    pub layer: ShellCache,
    pub store: Arc<FsStore>,
    pub network: Arc<HttpNetwork>,
    record_path: PathBuf,
    config: Config,
}

impl Host {
    /// Build the layer for `config` and resume its persisted state
    pub async fn open(config: &Config) -> ShellcacheResult<Self> {
        ConfigManager::ensure_state_dirs(config).await?;

        let store = Arc::new(FsStore::new(ConfigManager::partitions_dir(config)));
        let network = Arc::new(
            HttpNetwork::new(config.origin.url.clone(), config.origin.user_agent.clone())
                .with_body_limit(config.origin.max_body_bytes),
        );
        let record_path = ConfigManager::lifecycle_path(config);
        let point = LifecycleRecord::resume(&record_path, &config.cache.version).await?;
        debug!("Resuming {} at {}", config.cache.version, point.state);
        if let Some(previous) = &point.predecessor {
            debug!("{} keeps serving until activation", previous);
        }

        let layer = ShellCache::from_config(config, store.clone(), network.clone())?
            .with_state(point.state)
            .with_predecessor(point.predecessor);

        Ok(Self {
            layer,
            store,
            network,
            record_path,
            config: config.clone(),
        })
    }

    pub fn state(&self) -> LifecycleState {
        self.layer.state()
    }

    /// Write the current lifecycle state back to the state directory
    pub async fn persist(&self) -> ShellcacheResult<()> {
        LifecycleRecord::new(self.config.cache.version.clone(), self.state())
            .with_predecessor(self.layer.predecessor().cloned())
            .save(&self.record_path)
            .await
    }

    /// Let detached cache writes finish before the process exits
    pub async fn shutdown(&self) -> ShellcacheResult<()> {
        self.layer.settle().await;
        self.persist().await
    }
}
