//! Durable processing state: the single source of truth for resuming a run.
//!
//! [`CheckpointState`] is a plain value; [`CheckpointStore`] owns one and
//! rewrites the whole file after every mutation. Writes go through a sibling
//! temp file and an atomic rename, so a crash leaves either the previous or
//! the new checkpoint on disk, never a torn one.
//!
//! File format (compatible with earlier pipeline versions):
//!
//! ```json
//! {
//!   "processed": ["a.pdf"],
//!   "failed": [{"pdf": "b.pdf", "error": "...", "failed_at": "..."}],
//!   "stats": {"a.pdf": {"num_records": 3, "processed_at": "..."}}
//! }
//! ```

use crate::error::Pdf2DataError;
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One failed attempt. Failures are history: never deduplicated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    #[serde(rename = "pdf")]
    pub document: String,
    pub error: String,
    #[serde(rename = "failed_at")]
    pub timestamp: String,
}

/// Per-document statistics for a processed document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentStats {
    #[serde(rename = "num_records")]
    pub record_count: usize,
    #[serde(rename = "processed_at")]
    pub timestamp: String,
}

/// Processing progress for one target folder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointState {
    #[serde(default)]
    pub processed: IndexSet<String>,
    #[serde(default)]
    pub failed: Vec<FailureRecord>,
    #[serde(default)]
    pub stats: IndexMap<String, DocumentStats>,
}

impl CheckpointState {
    pub fn is_processed(&self, name: &str) -> bool {
        self.processed.contains(name)
    }

    /// Add `name` to the processed set (no-op if present) and refresh its stats.
    pub fn mark_processed(&mut self, name: &str, record_count: usize, timestamp: String) {
        self.processed.insert(name.to_string());
        self.stats.insert(
            name.to_string(),
            DocumentStats {
                record_count,
                timestamp,
            },
        );
    }

    /// Append a failure record.
    pub fn mark_failed(&mut self, name: &str, error: &str, timestamp: String) {
        self.failed.push(FailureRecord {
            document: name.to_string(),
            error: error.to_string(),
            timestamp,
        });
    }

    /// Failure records for one document, oldest first.
    pub fn failures_for<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a FailureRecord> {
        self.failed.iter().filter(move |f| f.document == name)
    }
}

/// File-backed owner of a [`CheckpointState`].
///
/// Must be the only writer of its file for the duration of a run.
#[derive(Debug)]
pub struct CheckpointStore {
    path: PathBuf,
    state: CheckpointState,
}

impl CheckpointStore {
    /// Load the checkpoint at `path`, starting empty when the file is absent.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, Pdf2DataError> {
        let path = path.into();
        let state = if path.exists() {
            let raw = std::fs::read_to_string(&path).map_err(|e| {
                Pdf2DataError::CheckpointCorrupt {
                    path: path.clone(),
                    detail: e.to_string(),
                }
            })?;
            serde_json::from_str(&raw).map_err(|e| Pdf2DataError::CheckpointCorrupt {
                path: path.clone(),
                detail: e.to_string(),
            })?
        } else {
            CheckpointState::default()
        };
        debug!(
            "Checkpoint {}: {} processed, {} failures",
            path.display(),
            state.processed.len(),
            state.failed.len()
        );
        Ok(Self { path, state })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> &CheckpointState {
        &self.state
    }

    pub fn is_processed(&self, name: &str) -> bool {
        self.state.is_processed(name)
    }

    /// Record a success and persist immediately.
    pub fn mark_processed(&mut self, name: &str, record_count: usize) -> Result<(), Pdf2DataError> {
        self.state.mark_processed(name, record_count, crate::now_timestamp());
        self.save()
    }

    /// Record a failure and persist immediately.
    pub fn mark_failed(&mut self, name: &str, error: &str) -> Result<(), Pdf2DataError> {
        self.state.mark_failed(name, error, crate::now_timestamp());
        self.save()
    }

    /// Rewrite the whole checkpoint file.
    pub fn save(&self) -> Result<(), Pdf2DataError> {
        write_json_atomic(&self.path, &self.state).map_err(|source| {
            Pdf2DataError::CheckpointWriteFailed {
                path: self.path.clone(),
                source,
            }
        })
    }
}

/// Serialise `value` as pretty JSON to `path` via temp file + rename.
pub(crate) fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> std::io::Result<()> {
    let json = serde_json::to_vec_pretty(value)?;
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(&json)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
