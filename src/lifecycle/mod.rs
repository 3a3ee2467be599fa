//! Install and activation lifecycle
//!
//! ```text
//! INSTALLING --install--> INSTALLED --ACTIVATE_NOW--> ACTIVATING --activate--> ACTIVE
//! ```
//!
//! The controller is the only component that deletes partitions. Install and
//! activate are serialized; the current state can be read at any time.

pub mod state;

pub use state::{LifecycleRecord, LifecycleState, ResumePoint};

use crate::control::ControlSignal;
use crate::error::{ShellcacheError, ShellcacheResult};
use crate::http::{RequestDescriptor, RequestKey, Response};
use crate::journal::Journal;
use crate::manifest::StaticManifest;
use crate::network::Network;
use crate::store::{CacheStore, CachePartitions};
use futures_util::future::join_all;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Outcome of a successful install
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    /// Static partition the manifest was written to
    pub partition: String,
    /// Number of manifest assets cached
    pub assets: usize,
    /// True when the version was already installed and nothing was fetched
    pub already_installed: bool,
}

/// Outcome of an activation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvictionReport {
    /// Stale partitions that were deleted
    pub deleted: Vec<String>,
    /// Stale partitions whose deletion failed, with the reason
    pub failed: Vec<(String, String)>,
}

impl EvictionReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Drives one version of the cache layer through its lifecycle
pub struct LifecycleController {
    store: Arc<dyn CacheStore>,
    network: Arc<dyn Network>,
    partitions: CachePartitions,
    manifest: Arc<StaticManifest>,
    journal: Journal,
    state: RwLock<LifecycleState>,
    transition: Mutex<()>,
}

impl LifecycleController {
    pub fn new(
        store: Arc<dyn CacheStore>,
        network: Arc<dyn Network>,
        partitions: CachePartitions,
        manifest: Arc<StaticManifest>,
    ) -> Self {
        Self {
            store,
            network,
            partitions,
            manifest,
            journal: Journal::disabled(),
            state: RwLock::new(LifecycleState::Installing),
            transition: Mutex::new(()),
        }
    }

    /// Record lifecycle events in `journal`
    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = journal;
        self
    }

    /// Resume from a previously persisted state
    pub fn with_state(self, state: LifecycleState) -> Self {
        *self.state.write() = state;
        self
    }

    /// Current state
    pub fn state(&self) -> LifecycleState {
        *self.state.read()
    }

    pub fn partitions(&self) -> &CachePartitions {
        &self.partitions
    }

    fn set_state(&self, next: LifecycleState) {
        let mut state = self.state.write();
        if *state != next {
            debug!("Lifecycle {} -> {}", *state, next);
            *state = next;
        }
    }

    /// Fetch and cache every manifest asset
    ///
    /// Either all assets end up in the static partition or none do. On
    /// failure the state stays `Installing` and the install can be retried.
    pub async fn on_install(&self) -> ShellcacheResult<InstallReport> {
        let _guard = self.transition.lock().await;
        let static_name = self.partitions.static_name();

        if self.state() != LifecycleState::Installing {
            debug!("Version {} already installed", self.partitions.generation());
            return Ok(InstallReport {
                partition: static_name,
                assets: self.manifest.len(),
                already_installed: true,
            });
        }

        info!(
            "Installing {} manifest assets into {}",
            self.manifest.len(),
            static_name
        );

        let assets = match self.fetch_manifest().await {
            Ok(assets) => assets,
            Err(e) => {
                self.journal
                    .record("install.failed", serde_json::json!({ "reason": e.to_string() }))
                    .await;
                return Err(e);
            }
        };

        if let Err(e) = self.write_static(&static_name, &assets).await {
            warn!("Install write failed, discarding {}: {}", static_name, e);
            if let Err(cleanup) = self.store.delete_partition(&static_name).await {
                warn!("Failed to discard {}: {}", static_name, cleanup);
            }
            self.journal
                .record("install.failed", serde_json::json!({ "reason": e.to_string() }))
                .await;
            return Err(e);
        }

        self.set_state(LifecycleState::Installed);
        self.journal
            .record(
                "install.completed",
                serde_json::json!({ "partition": static_name, "assets": assets.len() }),
            )
            .await;

        info!("Installed {}, waiting for activation", static_name);

        Ok(InstallReport {
            partition: static_name,
            assets: assets.len(),
            already_installed: false,
        })
    }

    /// Fetch all manifest assets concurrently, failing on the first bad one
    async fn fetch_manifest(&self) -> ShellcacheResult<Vec<(RequestKey, Response)>> {
        let fetches = self.manifest.urls().iter().map(|url| {
            let request = RequestDescriptor::get(url.clone());
            async move {
                let response = self.network.fetch(&request).await;
                (request, response)
            }
        });

        let mut assets = Vec::with_capacity(self.manifest.len());
        for (request, response) in join_all(fetches).await {
            let path = request.url.path().to_string();
            match response {
                Ok(response) if response.is_ok() => assets.push((request.key(), response)),
                Ok(response) => {
                    return Err(ShellcacheError::InstallManifestFetchFailed {
                        path,
                        reason: format!("status {}", response.status),
                    });
                }
                Err(e) => {
                    return Err(ShellcacheError::InstallManifestFetchFailed {
                        path,
                        reason: e.to_string(),
                    });
                }
            }
        }

        Ok(assets)
    }

    async fn write_static(
        &self,
        name: &str,
        assets: &[(RequestKey, Response)],
    ) -> ShellcacheResult<()> {
        self.store.open_partition(name).await?;
        for (key, response) in assets {
            self.store.put(name, key, response).await?;
        }
        Ok(())
    }

    /// Apply a control signal
    ///
    /// Returns whether the state changed. Signals that do not apply to the
    /// current state are ignored.
    pub fn on_control_signal(&self, signal: ControlSignal) -> bool {
        match signal {
            ControlSignal::ActivateNow => {
                let mut state = self.state.write();
                if *state == LifecycleState::Installed {
                    debug!("Activation requested, skipping wait");
                    *state = LifecycleState::Activating;
                    true
                } else {
                    debug!("Ignoring {} while {}", signal, *state);
                    false
                }
            }
        }
    }

    /// Evict every partition that is not current and take over
    ///
    /// Deletions are independent: one failing does not stop the others and
    /// does not fail the activation.
    pub async fn on_activate(&self) -> ShellcacheResult<EvictionReport> {
        let _guard = self.transition.lock().await;

        let state = self.state();
        if !matches!(state, LifecycleState::Activating | LifecycleState::Active) {
            return Err(ShellcacheError::LifecycleTransition {
                state: state.to_string(),
                event: "activate".to_string(),
            });
        }

        let existing = self.store.list_partitions().await?;
        let stale = self.partitions.stale(&existing);
        debug!("{} stale partitions to evict", stale.len());

        let deletions = stale.iter().map(|name| async move {
            (name.to_string(), self.store.delete_partition(name).await)
        });

        let mut report = EvictionReport::default();
        for (name, result) in join_all(deletions).await {
            match result {
                Ok(_) => {
                    info!("Deleted stale partition {}", name);
                    self.journal
                        .record("partition.deleted", serde_json::json!({ "name": name }))
                        .await;
                    report.deleted.push(name);
                }
                Err(e) => {
                    let failure = ShellcacheError::PartitionDeleteFailed {
                        name: name.clone(),
                        reason: e.to_string(),
                    };
                    warn!("{}", failure);
                    self.journal
                        .record(
                            "partition.delete_failed",
                            serde_json::json!({ "name": name, "reason": e.to_string() }),
                        )
                        .await;
                    report.failed.push((name, e.to_string()));
                }
            }
        }

        self.set_state(LifecycleState::Active);
        self.journal
            .record(
                "activate.completed",
                serde_json::json!({
                    "generation": self.partitions.generation().to_string(),
                    "deleted": report.deleted.len(),
                    "failed": report.failed.len(),
                }),
            )
            .await;

        Ok(report)
    }
}
