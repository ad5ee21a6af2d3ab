use crate::storage::jsonl::{StorageError, StorageResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A browse-page URL waiting to be fetched, with its traversal depth
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrontierEntry {
    pub url: String,
    pub depth: u32,
}

impl FrontierEntry {
    pub fn new(url: impl Into<String>, depth: u32) -> Self {
        Self {
            url: url.into(),
            depth,
        }
    }
}

/// Durable snapshot of in-progress discovery state
///
/// Owned exclusively by the discovery engine: written periodically during a
/// run and unconditionally on shutdown, read once at startup to resume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Browse pages already fetched
    pub visited: Vec<String>,

    /// Browse pages still queued
    pub frontier: Vec<FrontierEntry>,

    /// Leaf URLs discovered so far
    pub discovered_count: u64,

    /// Hash of the configuration the run started with, when known
    #[serde(default)]
    pub config_hash: Option<String>,

    pub timestamp: DateTime<Utc>,
}

impl Checkpoint {
    /// Writes the snapshot atomically: the document is written to a sibling
    /// temp file and renamed over the previous checkpoint, so a crash mid-write
    /// leaves the prior valid snapshot intact
    pub fn save(&self, path: &Path) -> StorageResult<()> {
        let json = serde_json::to_string_pretty(self)?;

        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json).map_err(|source| StorageError::Io {
            path: tmp_path.clone(),
            source,
        })?;
        std::fs::rename(&tmp_path, path).map_err(|source| StorageError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(())
    }

    /// Loads the snapshot at `path`; `None` if no checkpoint has been written
    pub fn load(path: &Path) -> StorageResult<Option<Checkpoint>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path).map_err(|source| StorageError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let checkpoint = serde_json::from_str(&content)?;
        Ok(Some(checkpoint))
    }
}
