//! Response strategies
//!
//! | Classification | Strategy |
//! |----------------|----------|
//! | `RootDocument` | stale-while-revalidate |
//! | `Document` | network-first, root shell on network failure |
//! | `Asset` | cache-first, no revalidation |
//!
//! Network failures never escape as-is: they become a fallback response or
//! `NoCacheAndNoNetwork`. Cache writes and revalidation run detached on
//! [`BackgroundTasks`] and never delay the response to the caller.

use crate::classify::Classification;
use crate::error::{ShellcacheError, ShellcacheResult};
use crate::http::{RequestDescriptor, RequestKey, Response};
use crate::manifest::StaticManifest;
use crate::network::Network;
use crate::store::{CacheStore, CachePartitions, PartitionKind};
use crate::tasks::BackgroundTasks;
use semver::Version;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Where a served response came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    /// Replayed from a cache partition
    Cache,
    /// Fetched live
    Network,
    /// Cached root document served in place of an unreachable page
    ShellFallback,
}

impl fmt::Display for ResponseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cache => write!(f, "cache"),
            Self::Network => write!(f, "network"),
            Self::ShellFallback => write!(f, "shell-fallback"),
        }
    }
}

/// A response returned to the application
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Served {
    pub response: Response,
    pub source: ResponseSource,
}

impl Served {
    fn new(response: Response, source: ResponseSource) -> Self {
        Self { response, source }
    }
}

/// Runs the strategy selected by a request's classification
#[derive(Clone)]
pub struct StrategyExecutor {
    store: Arc<dyn CacheStore>,
    network: Arc<dyn Network>,
    partitions: CachePartitions,
    manifest: Arc<StaticManifest>,
    background: BackgroundTasks,
}

impl StrategyExecutor {
    pub fn new(
        store: Arc<dyn CacheStore>,
        network: Arc<dyn Network>,
        partitions: CachePartitions,
        manifest: Arc<StaticManifest>,
        background: BackgroundTasks,
    ) -> Self {
        Self {
            store,
            network,
            partitions,
            manifest,
            background,
        }
    }

    /// Same store, network and background tasks over another version's partitions
    pub fn for_generation(&self, generation: Version) -> Self {
        Self {
            partitions: CachePartitions::new(generation),
            ..self.clone()
        }
    }

    pub fn partitions(&self) -> &CachePartitions {
        &self.partitions
    }

    /// Serve an intercepted request
    ///
    /// A passthrough classification is rejected without touching the store
    /// or the network.
    pub async fn execute(
        &self,
        request: &RequestDescriptor,
        classification: Classification,
    ) -> ShellcacheResult<Served> {
        debug!("{} {} as {}", request.method, request.url, classification);

        match classification {
            Classification::RootDocument => self.stale_while_revalidate(request).await,
            Classification::Document => self.network_first(request).await,
            Classification::Asset => self.cache_first(request).await,
            Classification::Passthrough(reason) => Err(ShellcacheError::NotIntercepted {
                url: request.url.to_string(),
                reason: reason.to_string(),
            }),
        }
    }

    /// Cached copy now, refreshed copy for next time
    pub async fn stale_while_revalidate(
        &self,
        request: &RequestDescriptor,
    ) -> ShellcacheResult<Served> {
        let key = request.key();

        if let Some(cached) = self.lookup_any(&key).await {
            self.revalidate_in_background(request.clone());
            return Ok(Served::new(cached, ResponseSource::Cache));
        }

        match self.network.fetch(request).await {
            Ok(response) => {
                if response.is_cacheable() {
                    self.store_in_background(request, &response);
                }
                Ok(Served::new(response, ResponseSource::Network))
            }
            Err(e) if e.is_network() => {
                debug!("Root document unavailable: {}", e);
                Err(ShellcacheError::NoCacheAndNoNetwork {
                    url: request.url.to_string(),
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Live response whatever its status; the root shell only when offline
    pub async fn network_first(&self, request: &RequestDescriptor) -> ShellcacheResult<Served> {
        match self.network.fetch(request).await {
            Ok(response) => Ok(Served::new(response, ResponseSource::Network)),
            Err(e) if e.is_network() => {
                debug!("Falling back to shell for {}: {}", request.url, e);
                self.shell_fallback(request).await
            }
            Err(e) => Err(e),
        }
    }

    /// Cached copy if any partition has one, otherwise fetch and store
    pub async fn cache_first(&self, request: &RequestDescriptor) -> ShellcacheResult<Served> {
        let key = request.key();

        if let Some(cached) = self.lookup_any(&key).await {
            return Ok(Served::new(cached, ResponseSource::Cache));
        }

        match self.network.fetch(request).await {
            Ok(response) => {
                if response.is_cacheable() {
                    self.store_in_background(request, &response);
                }
                Ok(Served::new(response, ResponseSource::Network))
            }
            Err(e) if e.is_network() && request.is_document_destined() => {
                debug!("Falling back to shell for {}: {}", request.url, e);
                self.shell_fallback(request).await
            }
            Err(e) if e.is_network() => {
                debug!("Asset unavailable: {}", e);
                Err(ShellcacheError::NoCacheAndNoNetwork {
                    url: request.url.to_string(),
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Partition a cacheable response for `request` belongs in
    pub fn partition_for(&self, request: &RequestDescriptor) -> String {
        let kind = if self.manifest.contains(&request.url) {
            PartitionKind::Static
        } else {
            PartitionKind::Dynamic
        };
        self.partitions.name(kind).to_string()
    }

    /// The cached root document, static partition first
    pub async fn cached_shell(&self) -> Option<Response> {
        let key = RequestKey::get(self.manifest.root());
        let static_name = self.partitions.static_name();

        match self.store.match_in(&static_name, &key).await {
            Ok(Some(shell)) => return Some(shell),
            Ok(None) => {}
            Err(e) => warn!("Shell lookup in {} failed: {}", static_name, e),
        }

        self.lookup_any(&key).await
    }

    async fn shell_fallback(&self, request: &RequestDescriptor) -> ShellcacheResult<Served> {
        match self.cached_shell().await {
            Some(shell) => Ok(Served::new(shell, ResponseSource::ShellFallback)),
            None => Err(ShellcacheError::NoCacheAndNoNetwork {
                url: request.url.to_string(),
            }),
        }
    }

    /// Cache lookup where store failures count as a miss
    async fn lookup_any(&self, key: &RequestKey) -> Option<Response> {
        match self.store.match_any(key).await {
            Ok(hit) => hit,
            Err(e) => {
                warn!("Cache lookup for {} failed, treating as miss: {}", key, e);
                None
            }
        }
    }

    fn store_in_background(&self, request: &RequestDescriptor, response: &Response) {
        let store = self.store.clone();
        let partition = self.partition_for(request);
        let key = request.key();
        let response = response.clone();

        self.background.spawn(async move {
            if let Err(e) = store.put(&partition, &key, &response).await {
                warn!("Failed to cache {} in {}: {}", key, partition, e);
            }
        });
    }

    fn revalidate_in_background(&self, request: RequestDescriptor) {
        let executor = self.clone();

        self.background.spawn(async move {
            match executor.network.fetch(&request).await {
                Ok(fresh) if fresh.is_cacheable() => {
                    let partition = executor.partition_for(&request);
                    let key = request.key();
                    match executor.store.put(&partition, &key, &fresh).await {
                        Ok(()) => debug!("Revalidated {} in {}", key, partition),
                        Err(e) => warn!("Failed to store revalidated {}: {}", key, e),
                    }
                }
                Ok(fresh) => {
                    debug!(
                        "Revalidation of {} returned {}, keeping cached copy",
                        request.url, fresh.status
                    );
                }
                Err(e) => warn!("Revalidation of {} failed: {}", request.url, e),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::PassthroughReason;
    use crate::store::MemoryStore;
    use crate::testing::{html, origin, url, RecordingStore, ScriptedNetwork};
    use semver::Version;

    struct Harness {
        store: Arc<RecordingStore>,
        network: Arc<ScriptedNetwork>,
        background: BackgroundTasks,
        executor: StrategyExecutor,
    }

    fn harness() -> Harness {
        let store = RecordingStore::new();
        let network = ScriptedNetwork::new();
        let background = BackgroundTasks::new();
        let manifest = StaticManifest::new(&origin(), &["/", "/manifest.json"]).unwrap();
        let executor = StrategyExecutor::new(
            store.clone(),
            network.clone(),
            CachePartitions::new(Version::new(1, 0, 0)),
            Arc::new(manifest),
            background.clone(),
        );
        Harness {
            store,
            network,
            background,
            executor,
        }
    }

    fn page(path: &str) -> RequestDescriptor {
        RequestDescriptor::get(url(path)).navigation()
    }

    fn asset(path: &str) -> RequestDescriptor {
        RequestDescriptor::get(url(path))
    }

    async fn seed(store: &MemoryStore, partition: &str, path: &str, response: Response) {
        store
            .put(partition, &RequestKey::get(&url(path)), &response)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn swr_returns_cached_root_without_waiting_on_network() {
        let h = harness();
        seed(&h.store.inner, "static-v1.0.0", "/", html("stale")).await;
        h.network.respond("/", html("fresh"));
        h.network.hold();

        // Held network: the call would hang if it awaited the revalidation
        let served = h.executor.stale_while_revalidate(&page("/")).await.unwrap();
        assert_eq!(served.source, ResponseSource::Cache);
        assert_eq!(served.response.body, b"stale");
        assert!(h.network.calls().is_empty());
        assert_eq!(h.background.pending(), 1);

        h.network.release();
        h.background.settle().await;

        let next = h.executor.stale_while_revalidate(&page("/")).await.unwrap();
        assert_eq!(next.response.body, b"fresh");
    }

    #[tokio::test]
    async fn swr_serves_cache_when_offline_and_swallows_revalidation_error() {
        let h = harness();
        seed(&h.store.inner, "static-v1.0.0", "/", html("shell")).await;
        h.network.go_offline();

        let served = h.executor.stale_while_revalidate(&page("/")).await.unwrap();
        h.background.settle().await;

        assert_eq!(served.response.body, b"shell");
        let cached = h.store.inner.match_any(&RequestKey::get(&url("/"))).await.unwrap();
        assert_eq!(cached.unwrap().body, b"shell");
    }

    #[tokio::test]
    async fn swr_revalidation_ignores_error_status() {
        let h = harness();
        seed(&h.store.inner, "static-v1.0.0", "/", html("good")).await;
        h.network.respond("/", Response::new(503, "maintenance"));

        h.executor.stale_while_revalidate(&page("/")).await.unwrap();
        h.background.settle().await;

        let cached = h.store.inner.match_any(&RequestKey::get(&url("/"))).await.unwrap();
        assert_eq!(cached.unwrap().body, b"good");
    }

    #[tokio::test]
    async fn swr_miss_fetches_and_stores() {
        let h = harness();
        h.network.respond("/", html("first"));

        let served = h.executor.stale_while_revalidate(&page("/")).await.unwrap();
        assert_eq!(served.source, ResponseSource::Network);
        h.background.settle().await;

        let stored = h
            .store
            .inner
            .match_in("static-v1.0.0", &RequestKey::get(&url("/")))
            .await
            .unwrap();
        assert_eq!(stored.unwrap().body, b"first");
    }

    #[tokio::test]
    async fn swr_miss_offline_is_no_cache_and_no_network() {
        let h = harness();
        h.network.go_offline();

        let err = h.executor.stale_while_revalidate(&page("/")).await.unwrap_err();
        assert!(matches!(err, ShellcacheError::NoCacheAndNoNetwork { .. }));
    }

    #[tokio::test]
    async fn network_first_preserves_not_found_and_never_caches() {
        let h = harness();
        seed(&h.store.inner, "static-v1.0.0", "/", html("shell")).await;
        h.network.respond("/missing", Response::new(404, "not found"));

        let served = h.executor.network_first(&page("/missing")).await.unwrap();
        h.background.settle().await;

        assert_eq!(served.source, ResponseSource::Network);
        assert_eq!(served.response.status, 404);
        assert!(!h.store.operations().iter().any(|op| op.starts_with("put")));
    }

    #[tokio::test]
    async fn network_first_ok_is_not_cached_either() {
        let h = harness();
        h.network.respond("/history", html("history"));

        h.executor.network_first(&page("/history")).await.unwrap();
        h.background.settle().await;

        assert!(h.store.inner.list_partitions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn network_first_offline_falls_back_to_shell() {
        let h = harness();
        seed(&h.store.inner, "static-v1.0.0", "/", html("shell")).await;
        h.network.go_offline();

        let served = h.executor.network_first(&page("/some/missing/page")).await.unwrap();
        assert_eq!(served.source, ResponseSource::ShellFallback);
        assert_eq!(served.response.body, b"shell");
    }

    #[tokio::test]
    async fn network_first_offline_without_shell_fails() {
        let h = harness();
        h.network.go_offline();

        let err = h.executor.network_first(&page("/history")).await.unwrap_err();
        assert!(matches!(err, ShellcacheError::NoCacheAndNoNetwork { .. }));
    }

    #[tokio::test]
    async fn shell_prefers_static_partition() {
        let h = harness();
        seed(&h.store.inner, "dynamic-v1.0.0", "/", html("dynamic")).await;
        seed(&h.store.inner, "static-v1.0.0", "/", html("static")).await;

        let shell = h.executor.cached_shell().await.unwrap();
        assert_eq!(shell.body, b"static");
    }

    #[tokio::test]
    async fn cache_first_stores_non_manifest_asset_in_dynamic() {
        let h = harness();
        h.network.respond("/logo.png", Response::new(200, "png"));

        let first = h.executor.cache_first(&asset("/logo.png")).await.unwrap();
        assert_eq!(first.source, ResponseSource::Network);
        h.background.settle().await;

        let key = RequestKey::get(&url("/logo.png"));
        assert!(h.store.inner.match_in("dynamic-v1.0.0", &key).await.unwrap().is_some());
        assert!(h.store.inner.match_in("static-v1.0.0", &key).await.unwrap().is_none());

        let second = h.executor.cache_first(&asset("/logo.png")).await.unwrap();
        h.background.settle().await;
        assert_eq!(second.source, ResponseSource::Cache);
        assert_eq!(h.network.calls_to("/logo.png"), 1);
    }

    #[tokio::test]
    async fn cache_first_stores_manifest_asset_in_static() {
        let h = harness();
        h.network.respond("/manifest.json", Response::new(200, "{}"));

        h.executor.cache_first(&asset("/manifest.json")).await.unwrap();
        h.background.settle().await;

        let key = RequestKey::get(&url("/manifest.json"));
        assert!(h.store.inner.match_in("static-v1.0.0", &key).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn cache_first_does_not_store_errors_or_opaque_bodies() {
        let h = harness();
        h.network.respond("/missing.js", Response::new(404, ""));
        h.network.respond(
            "/opaque.js",
            Response::new(200, "").with_kind(crate::http::ResponseKind::Opaque),
        );

        let missing = h.executor.cache_first(&asset("/missing.js")).await.unwrap();
        assert_eq!(missing.response.status, 404);
        h.executor.cache_first(&asset("/opaque.js")).await.unwrap();
        h.background.settle().await;

        assert!(h.store.inner.list_partitions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn cache_first_offline_asset_fails_but_document_gets_shell() {
        let h = harness();
        seed(&h.store.inner, "static-v1.0.0", "/", html("shell")).await;
        h.network.go_offline();

        let err = h.executor.cache_first(&asset("/chart.js")).await.unwrap_err();
        assert!(matches!(err, ShellcacheError::NoCacheAndNoNetwork { .. }));

        let doc = RequestDescriptor::get(url("/report"))
            .with_destination(crate::http::Destination::Document);
        let served = h.executor.cache_first(&doc).await.unwrap();
        assert_eq!(served.source, ResponseSource::ShellFallback);
    }

    #[tokio::test]
    async fn cached_asset_is_never_revalidated() {
        let h = harness();
        seed(&h.store.inner, "dynamic-v1.0.0", "/app.css", Response::new(200, "css")).await;
        h.network.respond("/app.css", Response::new(200, "new css"));

        h.executor.cache_first(&asset("/app.css")).await.unwrap();
        h.background.settle().await;

        assert!(h.network.calls().is_empty());
    }

    #[tokio::test]
    async fn execute_rejects_passthrough_without_cache_access() {
        let h = harness();
        seed(&h.store.inner, "static-v1.0.0", "/dashboard", html("cached")).await;
        let before = h.store.operations().len();

        let err = h
            .executor
            .execute(
                &page("/dashboard"),
                Classification::Passthrough(PassthroughReason::Excluded),
            )
            .await
            .unwrap_err();
        h.background.settle().await;

        assert!(matches!(err, ShellcacheError::NotIntercepted { .. }));
        assert_eq!(h.store.operations().len(), before);
        assert!(h.network.calls().is_empty());
    }

    #[tokio::test]
    async fn failed_cache_write_does_not_affect_response() {
        let h = harness();
        h.store.fail_puts();
        h.network.respond("/logo.png", Response::new(200, "png"));

        let served = h.executor.cache_first(&asset("/logo.png")).await.unwrap();
        h.background.settle().await;
        assert_eq!(served.response.body, b"png");
    }

    #[tokio::test]
    async fn execute_dispatches_by_classification() {
        let h = harness();
        seed(&h.store.inner, "static-v1.0.0", "/", html("shell")).await;
        h.network.go_offline();

        let root = h
            .executor
            .execute(&page("/"), Classification::RootDocument)
            .await
            .unwrap();
        assert_eq!(root.source, ResponseSource::Cache);

        let other = h
            .executor
            .execute(&page("/plans"), Classification::Document)
            .await
            .unwrap();
        assert_eq!(other.source, ResponseSource::ShellFallback);
        h.background.settle().await;
    }
}
