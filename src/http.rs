//! Request and response values exchanged with the cache layer
//!
//! These are runtime-agnostic: the hosting adapter translates its own
//! request objects into a [`RequestDescriptor`] and renders the returned
//! [`Response`] however it needs to.

use crate::error::{ShellcacheError, ShellcacheResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use url::Url;

/// HTTP request method
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
}

impl Method {
    /// Uppercase wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "HEAD" => Ok(Self::Head),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            "OPTIONS" => Ok(Self::Options),
            other => Err(format!("unsupported method: {}", other)),
        }
    }
}

/// Declared destination (resource type) of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    /// Top-level page navigation
    Document,
    Script,
    Style,
    Image,
    Font,
    Manifest,
    /// No declared destination (fetch/XHR)
    #[default]
    Empty,
}

impl FromStr for Destination {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "document" => Ok(Self::Document),
            "script" => Ok(Self::Script),
            "style" => Ok(Self::Style),
            "image" => Ok(Self::Image),
            "font" => Ok(Self::Font),
            "manifest" => Ok(Self::Manifest),
            "" | "empty" => Ok(Self::Empty),
            other => Err(format!("unknown destination: {}", other)),
        }
    }
}

/// An intercepted request
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub method: Method,
    pub url: Url,
    pub destination: Destination,
    /// Set by the runtime for top-level navigations
    pub navigate: bool,
    pub headers: BTreeMap<String, String>,
}

impl RequestDescriptor {
    /// Create a GET request with no destination
    pub fn get(url: Url) -> Self {
        Self::new(Method::Get, url)
    }

    /// Create a request with the given method
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            destination: Destination::Empty,
            navigate: false,
            headers: BTreeMap::new(),
        }
    }

    /// Resolve `target` against `origin` when it is root-relative
    pub fn resolve(origin: &Url, target: &str) -> ShellcacheResult<Url> {
        let parsed = if target.starts_with('/') {
            origin.join(target)
        } else {
            Url::parse(target)
        };

        parsed.map_err(|e| ShellcacheError::InvalidUrl {
            url: target.to_string(),
            reason: e.to_string(),
        })
    }

    /// Mark the request as a top-level navigation
    pub fn navigation(mut self) -> Self {
        self.destination = Destination::Document;
        self.navigate = true;
        self
    }

    /// Set the declared destination
    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }

    /// Add a request header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Whether the caller expects a page back
    pub fn is_document_destined(&self) -> bool {
        self.navigate || self.destination == Destination::Document
    }

    /// Cache identity of this request
    pub fn key(&self) -> RequestKey {
        RequestKey::new(self.method, &self.url)
    }
}

/// Identity of a cached entry: method plus absolute URL without fragment
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestKey {
    pub method: Method,
    pub url: String,
}

impl RequestKey {
    /// Build a key, dropping any URL fragment
    pub fn new(method: Method, url: &Url) -> Self {
        let mut url = url.clone();
        url.set_fragment(None);
        Self {
            method,
            url: url.into(),
        }
    }

    /// Key for a GET of `url`
    pub fn get(url: &Url) -> Self {
        Self::new(Method::Get, url)
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// How a response relates to the requesting origin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseKind {
    /// Same-origin, readable body
    Basic,
    /// Cross-origin with CORS, readable body
    Cors,
    /// Cross-origin without CORS, body not readable
    Opaque,
}

/// A response produced by the network or replayed from the cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
    pub kind: ResponseKind,
}

impl Response {
    /// Create a same-origin response
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: body.into(),
            kind: ResponseKind::Basic,
        }
    }

    /// Set a header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Set the response kind
    pub fn with_kind(mut self, kind: ResponseKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    /// Only successful, same-origin responses may enter the cache
    pub fn is_cacheable(&self) -> bool {
        self.is_ok() && self.kind == ResponseKind::Basic
    }
}
