//! Network abstraction
//!
//! A fetch either produces a response (any status, including errors the
//! server reported) or fails with `NetworkUnavailable` when no response
//! could be obtained at all.

pub mod http;

pub use http::HttpNetwork;

use crate::error::ShellcacheResult;
use crate::http::{RequestDescriptor, Response};
use async_trait::async_trait;

/// Abstract network interface used by the cache layer
#[async_trait]
pub trait Network: Send + Sync {
    /// Perform a live fetch
    ///
    /// Returns `ShellcacheError::NetworkUnavailable` only when no response
    /// was obtained. Non-2xx statuses are successful fetches.
    async fn fetch(&self, request: &RequestDescriptor) -> ShellcacheResult<Response>;
}
