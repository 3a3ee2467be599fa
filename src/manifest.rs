//! Static manifest of must-have assets

use crate::error::ShellcacheResult;
use crate::http::{RequestDescriptor, RequestKey};
use url::Url;

/// Ordered list of assets that must be cached at install time
///
/// The first entry is conventionally the document root, which doubles as
/// the offline shell for document fallbacks.
#[derive(Debug, Clone)]
pub struct StaticManifest {
    root: Url,
    entries: Vec<Url>,
}

impl StaticManifest {
    /// Resolve root-relative `paths` against `origin`
    pub fn new<S: AsRef<str>>(origin: &Url, paths: &[S]) -> ShellcacheResult<Self> {
        let entries = paths
            .iter()
            .map(|path| RequestDescriptor::resolve(origin, path.as_ref()))
            .collect::<ShellcacheResult<Vec<_>>>()?;

        Ok(Self {
            root: RequestDescriptor::resolve(origin, "/")?,
            entries,
        })
    }

    /// Absolute URLs in manifest order
    pub fn urls(&self) -> &[Url] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// URL of the root document
    pub fn root(&self) -> &Url {
        &self.root
    }

    /// Whether `url` names a manifest entry (fragments ignored)
    pub fn contains(&self, url: &Url) -> bool {
        let wanted = RequestKey::get(url);
        self.entries.iter().any(|entry| RequestKey::get(entry) == wanted)
    }
}
