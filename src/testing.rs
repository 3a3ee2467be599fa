//! Scripted collaborators for unit tests

use crate::error::{ShellcacheError, ShellcacheResult};
use crate::http::{RequestDescriptor, RequestKey, Response};
use crate::network::Network;
use crate::store::{CacheStore, MemoryStore, Partition};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::watch;
use url::Url;

pub const ORIGIN: &str = "https://fit.example/";

pub fn origin() -> Url {
    Url::parse(ORIGIN).unwrap()
}

pub fn url(path: &str) -> Url {
    origin().join(path).unwrap()
}

pub fn html(body: &str) -> Response {
    Response::new(200, body).with_header("content-type", "text/html")
}

/// Network whose responses are set per URL
///
/// Unscripted URLs fail as unreachable. While the gate is held, every fetch
/// waits until it is released.
pub struct ScriptedNetwork {
    routes: Mutex<HashMap<String, Response>>,
    calls: Mutex<Vec<String>>,
    offline: Mutex<bool>,
    gate: watch::Sender<bool>,
}

impl ScriptedNetwork {
    pub fn new() -> Arc<Self> {
        let (gate, _) = watch::channel(true);
        Arc::new(Self {
            routes: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            offline: Mutex::new(false),
            gate,
        })
    }

    pub fn respond(&self, path: &str, response: Response) {
        self.routes.lock().insert(url(path).to_string(), response);
    }

    pub fn go_offline(&self) {
        *self.offline.lock() = true;
    }

    pub fn go_online(&self) {
        *self.offline.lock() = false;
    }

    pub fn hold(&self) {
        self.gate.send_replace(false);
    }

    pub fn release(&self) {
        self.gate.send_replace(true);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn calls_to(&self, path: &str) -> usize {
        let wanted = url(path).to_string();
        self.calls.lock().iter().filter(|c| **c == wanted).count()
    }
}

#[async_trait]
impl Network for ScriptedNetwork {
    async fn fetch(&self, request: &RequestDescriptor) -> ShellcacheResult<Response> {
        let target = request.url.to_string();
        self.calls.lock().push(target.clone());

        let mut gate = self.gate.subscribe();
        let _ = gate.wait_for(|open| *open).await;

        if *self.offline.lock() {
            return Err(ShellcacheError::network(target, "offline"));
        }

        let scripted = self.routes.lock().get(&target).cloned();
        scripted.ok_or_else(|| ShellcacheError::network(target, "connection refused"))
    }
}

/// Memory store that records operations and can fail chosen ones
#[derive(Default)]
pub struct RecordingStore {
    pub inner: MemoryStore,
    operations: Mutex<Vec<String>>,
    failing_deletes: Mutex<HashSet<String>>,
    failing_puts: Mutex<bool>,
}

impl RecordingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_delete_of(&self, name: &str) {
        self.failing_deletes.lock().insert(name.to_string());
    }

    pub fn fail_puts(&self) {
        *self.failing_puts.lock() = true;
    }

    pub fn operations(&self) -> Vec<String> {
        self.operations.lock().clone()
    }

    fn record(&self, op: String) {
        self.operations.lock().push(op);
    }
}

#[async_trait]
impl CacheStore for RecordingStore {
    async fn open_partition(&self, name: &str) -> ShellcacheResult<Partition> {
        self.record(format!("open {}", name));
        self.inner.open_partition(name).await
    }

    async fn match_any(&self, key: &RequestKey) -> ShellcacheResult<Option<Response>> {
        self.record(format!("match_any {}", key.url));
        self.inner.match_any(key).await
    }

    async fn match_in(&self, name: &str, key: &RequestKey) -> ShellcacheResult<Option<Response>> {
        self.record(format!("match_in {} {}", name, key.url));
        self.inner.match_in(name, key).await
    }

    async fn put(&self, name: &str, key: &RequestKey, response: &Response) -> ShellcacheResult<()> {
        self.record(format!("put {} {}", name, key.url));
        if *self.failing_puts.lock() {
            return Err(ShellcacheError::store("writing entry", "disk full"));
        }
        self.inner.put(name, key, response).await
    }

    async fn delete_partition(&self, name: &str) -> ShellcacheResult<bool> {
        self.record(format!("delete {}", name));
        if self.failing_deletes.lock().contains(name) {
            return Err(ShellcacheError::store(format!("deleting {}", name), "busy"));
        }
        self.inner.delete_partition(name).await
    }

    async fn list_partitions(&self) -> ShellcacheResult<Vec<String>> {
        self.inner.list_partitions().await
    }
}
