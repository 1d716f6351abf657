//! Snapshot persistence: the whole blackboard in one JSON file.
//!
//! ```json
//! {
//!   "entries": [{"agent": "...", "content": ..., "timestamp": "...",
//!                "confidence": 1.0, "tags": [], "entry_type": "info"}],
//!   "knowledge_base": {"key": {"value": ..., "agent": "...", "timestamp": "..."}}
//! }
//! ```
//!
//! Subscriptions are process-local and never written.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::entry::Entry;
use super::knowledge::KnowledgeStore;
use crate::error::{BlackboardError, Result};

/// Serialized form of the blackboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub entries: Vec<Entry>,
    #[serde(default)]
    pub knowledge_base: KnowledgeStore,
}

/// A snapshot file on disk.
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the snapshot. A missing file is `Ok(None)`.
    ///
    /// Entries are returned in timestamp order regardless of file order.
    pub fn load(&self) -> Result<Option<Snapshot>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(BlackboardError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        if raw.trim().is_empty() {
            return Ok(None);
        }
        let mut snapshot: Snapshot =
            serde_json::from_str(&raw).map_err(|source| BlackboardError::Snapshot {
                path: self.path.clone(),
                source,
            })?;
        snapshot.entries.sort_by_key(Entry::timestamp);
        Ok(Some(snapshot))
    }

    /// Write the snapshot, creating parent directories as needed.
    ///
    /// The data goes to a sibling temp file first and is renamed over the
    /// target, so readers never observe a half-written file.
    pub fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let io_err = |source| BlackboardError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(io_err)?;
            }
        }

        let content =
            serde_json::to_string_pretty(snapshot).map_err(|source| BlackboardError::Snapshot {
                path: self.path.clone(),
                source,
            })?;

        let tmp = self.tmp_path();
        fs::write(&tmp, content).map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)?;
        log::debug!(
            "[blackboard] wrote snapshot: {} entries, {} knowledge keys -> {}",
            snapshot.entries.len(),
            snapshot.knowledge_base.len(),
            self.path.display()
        );
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "blackboard.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
