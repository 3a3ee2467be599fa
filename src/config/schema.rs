//! Configuration schema for shellcache
//!
//! Configuration is stored at `~/.config/shellcache/config.toml`

use crate::network::http::DEFAULT_MAX_BODY_BYTES;
use semver::Version;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Application origin settings
    pub origin: OriginConfig,

    /// Cache partition settings
    pub cache: CacheConfig,

    /// Request interception settings
    pub intercept: InterceptConfig,
}

impl Config {
    /// Check values that the type system cannot, returning a reason on failure
    pub fn validate(&self) -> Result<(), String> {
        if !matches!(self.origin.url.scheme(), "http" | "https") {
            return Err(format!(
                "origin.url must be http or https, got {}",
                self.origin.url.scheme()
            ));
        }

        if self.origin.max_body_bytes == 0 {
            return Err("origin.max_body_bytes must be greater than zero".to_string());
        }

        if self.cache.manifest.is_empty() {
            return Err("cache.manifest must list at least the document root".to_string());
        }

        for path in &self.cache.manifest {
            if !path.starts_with('/') {
                return Err(format!("cache.manifest entry {:?} must start with '/'", path));
            }
        }

        for prefix in self
            .intercept
            .excluded_prefixes
            .iter()
            .chain(&self.intercept.excluded_paths)
        {
            if !prefix.starts_with('/') {
                return Err(format!("intercept exclusion {:?} must start with '/'", prefix));
            }
        }

        Ok(())
    }
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Append lifecycle events to the journal
    pub journal: bool,

    /// Override for the state directory (partitions, lifecycle record, journal)
    pub state_dir: Option<PathBuf>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            journal: true,
            state_dir: None,
        }
    }
}

/// Application origin configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OriginConfig {
    /// Origin every intercepted request must share
    pub url: Url,

    /// User-Agent sent with network fetches
    pub user_agent: String,

    /// Largest response body read from the network, in bytes
    pub max_body_bytes: u64,
}

impl Default for OriginConfig {
    fn default() -> Self {
        Self {
            url: Url::parse("http://localhost:8080/").expect("static URL is valid"),
            user_agent: format!("shellcache/{}", env!("CARGO_PKG_VERSION")),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

/// Cache partition configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Version tag embedded in partition names
    pub version: Version,

    /// Root-relative paths that must be present after install
    pub manifest: Vec<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            version: Version::new(1, 0, 0),
            manifest: vec![
                "/".to_string(),
                "/index.html".to_string(),
                "/manifest.json".to_string(),
                "/icons/icon-192.png".to_string(),
                "/icons/icon-512.png".to_string(),
            ],
        }
    }
}

/// Request interception configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InterceptConfig {
    /// Path prefixes that are never intercepted
    pub excluded_prefixes: Vec<String>,

    /// Exact paths that are never intercepted
    pub excluded_paths: Vec<String>,

    /// Path suffixes that mark a request as a document
    pub document_extensions: Vec<String>,
}

impl Default for InterceptConfig {
    fn default() -> Self {
        Self {
            excluded_prefixes: vec![
                "/dashboard".to_string(),
                "/api/".to_string(),
                "/health".to_string(),
            ],
            excluded_paths: vec!["/dashboard.html".to_string()],
            document_extensions: vec![".html".to_string(), ".htm".to_string()],
        }
    }
}
