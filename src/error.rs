//! Error types for shellcache
//!
//! All modules use `ShellcacheResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for shellcache operations
pub type ShellcacheResult<T> = Result<T, ShellcacheError>;

/// All errors that can occur in shellcache
#[derive(Error, Debug)]
pub enum ShellcacheError {
    // Lifecycle errors
    #[error("Install failed: could not fetch manifest asset {path}: {reason}")]
    InstallManifestFetchFailed { path: String, reason: String },

    #[error("Failed to delete partition {name}: {reason}")]
    PartitionDeleteFailed { name: String, reason: String },

    #[error("Cannot {event} while lifecycle is {state}")]
    LifecycleTransition { state: String, event: String },

    // Request errors
    #[error("Network unavailable for {url}: {reason}")]
    NetworkUnavailable { url: String, reason: String },

    #[error("Content unavailable: no cached copy of {url} and the network is unreachable")]
    NoCacheAndNoNetwork { url: String },

    #[error("Request for {url} is not intercepted: {reason}")]
    NotIntercepted { url: String, reason: String },

    #[error("Response from {url} exceeds the {limit} byte body limit")]
    ResponseTooLarge { url: String, limit: u64 },

    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    // Store errors
    #[error("Cache store error while {context}: {reason}")]
    Store { context: String, reason: String },

    #[error("Invalid partition name: {0}")]
    InvalidPartitionName(String),

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl ShellcacheError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a store error with context
    pub fn store(context: impl Into<String>, reason: impl ToString) -> Self {
        Self::Store {
            context: context.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a network error for a URL
    pub fn network(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::NetworkUnavailable {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether this error means the network could not produce any response
    pub fn is_network(&self) -> bool {
        matches!(self, Self::NetworkUnavailable { .. })
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::InstallManifestFetchFailed { .. }
                | Self::NetworkUnavailable { .. }
                | Self::NoCacheAndNoNetwork { .. }
        )
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::InstallManifestFetchFailed { .. } => {
                Some("Check that origin.url is reachable, then run: shellcache install")
            }
            Self::NoCacheAndNoNetwork { .. } => {
                Some("Run `shellcache install` while online to populate the cache")
            }
            Self::LifecycleTransition { .. } => Some("Run: shellcache activate"),
            Self::ConfigInvalid { .. } => Some("Run: shellcache config show"),
            Self::ResponseTooLarge { .. } => Some("Raise origin.max_body_bytes in the config"),
            _ => None,
        }
    }
}
