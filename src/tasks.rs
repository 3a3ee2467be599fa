//! Detached background work
//!
//! Revalidation fetches and cache writes run detached from the request that
//! triggered them: the caller never awaits them and their errors are logged,
//! not returned. The tracker keeps their handles so a host (or a test) can
//! wait for everything in flight to settle.

use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::warn;

/// Tracker for detached tasks
#[derive(Debug, Clone, Default)]
pub struct BackgroundTasks {
    handles: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a detached task on the current runtime
    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(task);
        let mut handles = self.handles.lock();
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
    }

    /// Number of tasks that have not finished yet
    pub fn pending(&self) -> usize {
        self.handles.lock().iter().filter(|h| !h.is_finished()).count()
    }

    /// Wait until every task spawned so far, and any they spawn, has finished
    pub async fn settle(&self) {
        loop {
            let batch = std::mem::take(&mut *self.handles.lock());
            if batch.is_empty() {
                return;
            }

            for handle in batch {
                if let Err(e) = handle.await {
                    warn!("Background task panicked: {}", e);
                }
            }
        }
    }
}
