//! The offline cache layer
//!
//! [`ShellCache`] is what a hosting runtime talks to. It exposes one entry
//! point per runtime event (install, activate, message, intercept) and wires
//! the classifier, lifecycle controller and strategy executor around an
//! injected [`CacheStore`] and [`Network`].

use crate::classify::{Classification, PassthroughReason, RequestClassifier};
use crate::config::schema::{Config, InterceptConfig};
use crate::control::parse_message;
use crate::error::ShellcacheResult;
use crate::http::RequestDescriptor;
use crate::journal::Journal;
use crate::lifecycle::{EvictionReport, InstallReport, LifecycleController, LifecycleState};
use crate::manifest::StaticManifest;
use crate::network::Network;
use crate::store::{CacheStore, CachePartitions};
use crate::strategy::{Served, StrategyExecutor};
use crate::tasks::BackgroundTasks;
use semver::Version;
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// Everything that identifies one version of the layer
#[derive(Debug, Clone)]
pub struct LayerSettings {
    pub origin: Url,
    pub version: Version,
    pub manifest: Vec<String>,
    pub intercept: InterceptConfig,
}

impl LayerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            origin: config.origin.url.clone(),
            version: config.cache.version.clone(),
            manifest: config.cache.manifest.clone(),
            intercept: config.intercept.clone(),
        }
    }
}

/// What the layer did with an intercepted request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interception {
    /// The host should perform the request itself
    Passthrough(PassthroughReason),
    /// The layer produced the response
    Served(Served),
}

impl Interception {
    pub fn served(self) -> Option<Served> {
        match self {
            Self::Served(served) => Some(served),
            Self::Passthrough(_) => None,
        }
    }
}

pub struct ShellCache {
    classifier: RequestClassifier,
    lifecycle: LifecycleController,
    executor: StrategyExecutor,
    /// Serves from an older version's partitions until this one controls
    predecessor: Option<StrategyExecutor>,
    background: BackgroundTasks,
}

impl ShellCache {
    pub fn new(
        settings: LayerSettings,
        store: Arc<dyn CacheStore>,
        network: Arc<dyn Network>,
    ) -> ShellcacheResult<Self> {
        let manifest = Arc::new(StaticManifest::new(&settings.origin, &settings.manifest)?);
        let partitions = CachePartitions::new(settings.version);
        let background = BackgroundTasks::new();

        let classifier = RequestClassifier::from_config(settings.origin, &settings.intercept);
        let lifecycle = LifecycleController::new(
            store.clone(),
            network.clone(),
            partitions.clone(),
            manifest.clone(),
        );
        let executor = StrategyExecutor::new(
            store,
            network,
            partitions,
            manifest,
            background.clone(),
        );

        Ok(Self {
            classifier,
            lifecycle,
            executor,
            predecessor: None,
            background,
        })
    }

    /// Build a layer from configuration, journaling lifecycle events
    pub fn from_config(
        config: &Config,
        store: Arc<dyn CacheStore>,
        network: Arc<dyn Network>,
    ) -> ShellcacheResult<Self> {
        let layer = Self::new(LayerSettings::from_config(config), store, network)?;
        Ok(layer.with_journal(Journal::new(config)))
    }

    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.lifecycle = self.lifecycle.with_journal(journal);
        self
    }

    /// Resume a lifecycle persisted by an earlier run
    pub fn with_state(mut self, state: LifecycleState) -> Self {
        self.lifecycle = self.lifecycle.with_state(state);
        self
    }

    /// Keep answering from `version`'s partitions until this version activates
    pub fn with_predecessor(mut self, version: Option<Version>) -> Self {
        self.predecessor = version
            .filter(|previous| previous != self.partitions().generation())
            .map(|previous| self.executor.for_generation(previous));
        self
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    /// Older version serving requests while this one is not active
    pub fn predecessor(&self) -> Option<&Version> {
        self.predecessor
            .as_ref()
            .map(|executor| executor.partitions().generation())
    }

    pub fn partitions(&self) -> &CachePartitions {
        self.lifecycle.partitions()
    }

    pub fn classify(&self, request: &RequestDescriptor) -> Classification {
        self.classifier.classify(request)
    }

    /// Install event
    pub async fn on_install(&self) -> ShellcacheResult<InstallReport> {
        self.lifecycle.on_install().await
    }

    /// Activate event
    pub async fn on_activate(&self) -> ShellcacheResult<EvictionReport> {
        self.lifecycle.on_activate().await
    }

    /// Message event
    ///
    /// A recognized skip-waiting message activates the installed version
    /// right away. Returns the eviction report when that happened.
    pub async fn on_message(&self, raw: &str) -> ShellcacheResult<Option<EvictionReport>> {
        let Some(signal) = parse_message(raw) else {
            return Ok(None);
        };

        if !self.lifecycle.on_control_signal(signal) {
            return Ok(None);
        }

        self.on_activate().await.map(Some)
    }

    /// Fetch event
    ///
    /// Passthrough requests never touch the cache store. Until this version
    /// activates, requests are served by the predecessor's partitions when
    /// one is known, and passed through otherwise.
    pub async fn on_intercept(&self, request: &RequestDescriptor) -> ShellcacheResult<Interception> {
        let classification = self.classifier.classify(request);

        if let Classification::Passthrough(reason) = classification {
            debug!("Passing through {} {}: {}", request.method, request.url, reason);
            return Ok(Interception::Passthrough(reason));
        }

        let executor = if self.state().is_controlling() {
            &self.executor
        } else if let Some(predecessor) = &self.predecessor {
            debug!(
                "Serving {} from {} while {} is {}",
                request.url,
                predecessor.partitions().generation(),
                self.partitions().generation(),
                self.state()
            );
            predecessor
        } else {
            debug!("Passing through {}: layer is {}", request.url, self.state());
            return Ok(Interception::Passthrough(PassthroughReason::NotControlling));
        };

        let served = executor.execute(request, classification).await?;
        Ok(Interception::Served(served))
    }

    /// Wait for detached revalidations and cache writes to finish
    pub async fn settle(&self) {
        self.background.settle().await;
    }
}
