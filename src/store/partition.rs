//! Versioned partition names
//!
//! A partition name is the kind followed by the version tag, e.g.
//! `static-v1.4.0`. Whether a partition is current is decided by comparing
//! its generation with the configured version, never by string matching.

use crate::error::{ShellcacheError, ShellcacheResult};
use semver::Version;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The two logical partitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartitionKind {
    /// Install-time manifest assets
    Static,
    /// Opportunistically cached responses
    Dynamic,
}

impl PartitionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::Dynamic => "dynamic",
        }
    }
}

impl fmt::Display for PartitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A partition name as a value: kind plus generation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PartitionName {
    pub kind: PartitionKind,
    pub generation: Version,
}

impl PartitionName {
    pub fn new(kind: PartitionKind, generation: Version) -> Self {
        Self { kind, generation }
    }
}

impl fmt::Display for PartitionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-v{}", self.kind, self.generation)
    }
}

impl FromStr for PartitionName {
    type Err = ShellcacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ShellcacheError::InvalidPartitionName(s.to_string());

        let (kind, tag) = s.split_once("-v").ok_or_else(invalid)?;
        let kind = match kind {
            "static" => PartitionKind::Static,
            "dynamic" => PartitionKind::Dynamic,
            _ => return Err(invalid()),
        };
        let generation = Version::parse(tag).map_err(|_| invalid())?;

        Ok(Self { kind, generation })
    }
}

/// The current pair of partitions for one version tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePartitions {
    generation: Version,
}

impl CachePartitions {
    pub fn new(generation: Version) -> Self {
        Self { generation }
    }

    pub fn generation(&self) -> &Version {
        &self.generation
    }

    /// Current name for a partition kind
    pub fn name(&self, kind: PartitionKind) -> PartitionName {
        PartitionName::new(kind, self.generation.clone())
    }

    /// Current `STATIC` partition name
    pub fn static_name(&self) -> String {
        self.name(PartitionKind::Static).to_string()
    }

    /// Current `DYNAMIC` partition name
    pub fn dynamic_name(&self) -> String {
        self.name(PartitionKind::Dynamic).to_string()
    }

    /// Whether a stored partition belongs to this generation
    ///
    /// Names that do not parse as a partition name are never current.
    pub fn is_current(&self, name: &str) -> bool {
        name.parse::<PartitionName>()
            .map(|parsed| parsed.generation == self.generation)
            .unwrap_or(false)
    }

    /// Names from `existing` that are eligible for eviction
    pub fn stale<'a>(&self, existing: &'a [String]) -> Vec<&'a str> {
        existing
            .iter()
            .map(String::as_str)
            .filter(|name| !self.is_current(name))
            .collect()
    }
}

/// Reject names that cannot be used as a single storage path segment
pub fn validate_partition_name(name: &str) -> ShellcacheResult<()> {
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\'])
        || name.starts_with('.')
    {
        return Err(ShellcacheError::InvalidPartitionName(name.to_string()));
    }
    Ok(())
}
