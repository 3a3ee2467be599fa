//! Request classification
//!
//! Decides, in order: whether a request may be intercepted at all, whether
//! it is a document or a subordinate asset, and whether a document targets
//! the application root. The label selects the strategy that serves it.

use crate::config::schema::InterceptConfig;
use crate::http::{Method, RequestDescriptor};
use std::fmt;
use url::Url;

/// Why a request bypasses the cache layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassthroughReason {
    /// Only GET requests are cached
    NonGet,
    /// Request targets another origin
    CrossOrigin,
    /// Path is on the exclusion list
    Excluded,
    /// The layer has not been activated for this version yet
    NotControlling,
}

impl fmt::Display for PassthroughReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonGet => write!(f, "non-GET method"),
            Self::CrossOrigin => write!(f, "cross-origin"),
            Self::Excluded => write!(f, "excluded path"),
            Self::NotControlling => write!(f, "not activated"),
        }
    }
}

/// Classification of an intercepted request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Document request for exactly `/`
    RootDocument,
    /// Document request for any other path
    Document,
    /// Subordinate resource
    Asset,
    /// Forwarded to the network untouched
    Passthrough(PassthroughReason),
}

impl Classification {
    pub fn is_intercepted(&self) -> bool {
        !matches!(self, Self::Passthrough(_))
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RootDocument => write!(f, "document@root"),
            Self::Document => write!(f, "document@other"),
            Self::Asset => write!(f, "asset"),
            Self::Passthrough(reason) => write!(f, "passthrough ({})", reason),
        }
    }
}

/// Paths the layer must never intercept
#[derive(Debug, Clone, Default)]
pub struct ExclusionRules {
    prefixes: Vec<String>,
    exact: Vec<String>,
}

impl ExclusionRules {
    pub fn new(prefixes: Vec<String>, exact: Vec<String>) -> Self {
        Self { prefixes, exact }
    }

    pub fn is_excluded(&self, path: &str) -> bool {
        self.exact.iter().any(|p| p == path) || self.prefixes.iter().any(|p| path.starts_with(p))
    }
}

/// Labels requests for the strategy executor
#[derive(Debug, Clone)]
pub struct RequestClassifier {
    origin: Url,
    exclusions: ExclusionRules,
    document_extensions: Vec<String>,
}

impl RequestClassifier {
    pub fn new(origin: Url, exclusions: ExclusionRules, document_extensions: Vec<String>) -> Self {
        Self {
            origin,
            exclusions,
            document_extensions,
        }
    }

    /// Build a classifier from the `[intercept]` config section
    pub fn from_config(origin: Url, config: &InterceptConfig) -> Self {
        Self::new(
            origin,
            ExclusionRules::new(
                config.excluded_prefixes.clone(),
                config.excluded_paths.clone(),
            ),
            config.document_extensions.clone(),
        )
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn classify(&self, request: &RequestDescriptor) -> Classification {
        if request.method != Method::Get {
            return Classification::Passthrough(PassthroughReason::NonGet);
        }

        if request.url.origin() != self.origin.origin() {
            return Classification::Passthrough(PassthroughReason::CrossOrigin);
        }

        let path = request.url.path();
        if self.exclusions.is_excluded(path) {
            return Classification::Passthrough(PassthroughReason::Excluded);
        }

        if !self.is_document(request) {
            return Classification::Asset;
        }

        if path == "/" {
            Classification::RootDocument
        } else {
            Classification::Document
        }
    }

    fn is_document(&self, request: &RequestDescriptor) -> bool {
        if request.is_document_destined() {
            return true;
        }

        let path = request.url.path().to_ascii_lowercase();
        self.document_extensions
            .iter()
            .any(|ext| path.ends_with(&ext.to_ascii_lowercase()))
    }
}
