//! Lifecycle states and their persisted record

use crate::error::{ShellcacheError, ShellcacheResult};
use chrono::{DateTime, Utc};
use semver::Version;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tokio::fs;

/// Lifecycle of one cache-layer version
///
/// `Installed -> Activating` only happens on an explicit control signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    /// Static manifest not yet (successfully) cached
    Installing,
    /// Installed and waiting for the activation signal
    Installed,
    /// Activation signalled, eviction pending
    Activating,
    /// Stale partitions evicted, requests are intercepted
    Active,
}

impl LifecycleState {
    /// Whether requests should be served by this version
    pub fn is_controlling(&self) -> bool {
        matches!(self, Self::Active)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Installing => write!(f, "installing"),
            Self::Installed => write!(f, "installed (waiting)"),
            Self::Activating => write!(f, "activating"),
            Self::Active => write!(f, "active"),
        }
    }
}

/// Lifecycle state persisted between runs of a hosting adapter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleRecord {
    /// Version the state belongs to
    pub version: Version,

    /// Last reached state
    pub state: LifecycleState,

    /// Older version still answering requests until this one activates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predecessor: Option<Version>,

    /// When the record was last written
    pub updated_at: DateTime<Utc>,
}

/// Where a run picks up for the configured version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumePoint {
    pub state: LifecycleState,
    /// Version whose partitions serve requests while `state` is not active
    pub predecessor: Option<Version>,
}

impl LifecycleRecord {
    pub fn new(version: Version, state: LifecycleState) -> Self {
        Self {
            version,
            state,
            predecessor: None,
            updated_at: Utc::now(),
        }
    }

    /// Record the version still serving; dropped once this version controls
    pub fn with_predecessor(mut self, predecessor: Option<Version>) -> Self {
        self.predecessor = predecessor
            .filter(|previous| previous != &self.version && !self.state.is_controlling());
        self
    }

    /// Version whose partitions answer requests under this record
    pub fn serving(&self) -> Option<&Version> {
        if self.state.is_controlling() {
            Some(&self.version)
        } else {
            self.predecessor.as_ref()
        }
    }

    /// Load a record from file
    pub async fn load(path: &Path) -> ShellcacheResult<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            ShellcacheError::io(format!("reading lifecycle record {}", path.display()), e)
        })?;

        let record: LifecycleRecord = serde_json::from_str(&content)?;
        Ok(Some(record))
    }

    /// State to resume for `version`
    ///
    /// A record written for another version does not carry its state over:
    /// the new version starts installing from scratch, while whichever
    /// version was serving keeps serving until the new one activates.
    pub async fn resume(path: &Path, version: &Version) -> ShellcacheResult<ResumePoint> {
        let point = match Self::load(path).await? {
            Some(record) if &record.version == version => ResumePoint {
                state: record.state,
                predecessor: record.serving().filter(|v| *v != version).cloned(),
            },
            Some(record) => ResumePoint {
                state: LifecycleState::Installing,
                predecessor: record.serving().filter(|v| *v != version).cloned(),
            },
            None => ResumePoint {
                state: LifecycleState::Installing,
                predecessor: None,
            },
        };
        Ok(point)
    }

    /// Save record to file
    pub async fn save(&self, path: &Path) -> ShellcacheResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| ShellcacheError::io("creating state directory", e))?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).await.map_err(|e| {
            ShellcacheError::io(format!("writing lifecycle record {}", path.display()), e)
        })?;

        Ok(())
    }
}
