//! Live HTTP network client backed by `ureq`

use super::Network;
use crate::error::{ShellcacheError, ShellcacheResult};
use crate::http::{RequestDescriptor, Response, ResponseKind};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tracing::debug;
use ureq::{Agent, ResponseExt};
use url::Url;

/// Default cap on a response body read into memory
pub const DEFAULT_MAX_BODY_BYTES: u64 = 64 * 1024 * 1024;

/// Raw response before its kind is known
struct Fetched {
    status: u16,
    headers: BTreeMap<String, String>,
    body: Vec<u8>,
    /// URL the response came from after redirects
    final_url: Option<Url>,
}

/// Blocking `ureq` agent driven from a tokio blocking thread
///
/// Server error statuses are returned as responses; only transport failures
/// become `NetworkUnavailable`. No timeout is applied, matching the cache
/// layer's contract that fetches run to completion or failure. Bodies larger
/// than the configured limit fail with `ResponseTooLarge`.
#[derive(Clone)]
pub struct HttpNetwork {
    agent: Agent,
    origin: Url,
    user_agent: String,
    max_body_bytes: u64,
}

impl HttpNetwork {
    /// Create a client for the application at `origin`
    pub fn new(origin: Url, user_agent: impl Into<String>) -> Self {
        let agent: Agent = Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .into();

        Self {
            agent,
            origin,
            user_agent: user_agent.into(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    pub fn with_body_limit(mut self, max_body_bytes: u64) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    fn kind_for(&self, url: &Url) -> ResponseKind {
        if url.origin() == self.origin.origin() {
            ResponseKind::Basic
        } else {
            ResponseKind::Cors
        }
    }

    fn fetch_blocking(
        agent: &Agent,
        request: &RequestDescriptor,
        user_agent: &str,
        limit: u64,
    ) -> ShellcacheResult<Fetched> {
        let url = request.url.as_str();

        let mut builder = ureq::http::Request::builder()
            .method(request.method.as_str())
            .uri(url)
            .header("user-agent", user_agent);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let outgoing = builder
            .body(())
            .map_err(|e| ShellcacheError::InvalidUrl {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let mut response = agent
            .run(outgoing)
            .map_err(|e| ShellcacheError::network(url, e))?;

        let final_url = Url::parse(&response.get_uri().to_string()).ok();
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .body_mut()
            .with_config()
            .limit(limit)
            .read_to_vec()
            .map_err(|e| match e {
                ureq::Error::BodyExceedsLimit(_) => ShellcacheError::ResponseTooLarge {
                    url: url.to_string(),
                    limit,
                },
                e => ShellcacheError::network(url, e),
            })?;

        Ok(Fetched {
            status,
            headers,
            body,
            final_url,
        })
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &RequestDescriptor) -> ShellcacheResult<Response> {
        let agent = self.agent.clone();
        let user_agent = self.user_agent.clone();
        let limit = self.max_body_bytes;
        let outgoing = request.clone();

        let fetched = tokio::task::spawn_blocking(move || {
            Self::fetch_blocking(&agent, &outgoing, &user_agent, limit)
        })
        .await
        .map_err(|e| ShellcacheError::Internal(format!("fetch task failed: {}", e)))??;

        // A redirect can land on another origin; the response belongs to wherever it ended
        let kind = match &fetched.final_url {
            Some(final_url) => {
                if final_url != &request.url {
                    debug!("{} redirected to {}", request.url, final_url);
                }
                self.kind_for(final_url)
            }
            None => ResponseKind::Cors,
        };
        debug!("{} {} -> {}", request.method, request.url, fetched.status);

        Ok(Response {
            status: fetched.status,
            headers: fetched.headers,
            body: fetched.body,
            kind,
        })
    }
}
