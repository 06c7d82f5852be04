//! Informational log of filename normalisation.
//!
//! Maps each new canonical file name to where it came from. Nothing in the
//! pipeline reads it back for control decisions, so an unreadable log is
//! treated as empty and a failed save is only a warning.

use crate::checkpoint::write_json_atomic;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameEntry {
    pub original_name: String,
    pub doi: Option<String>,
    pub title: String,
    pub renamed_at: String,
}

/// Append-only rename history persisted next to the checkpoint.
#[derive(Debug)]
pub struct RenameLog {
    path: PathBuf,
    entries: IndexMap<String, RenameEntry>,
}

impl RenameLog {
    /// Load the log, falling back to empty on a missing or unreadable file.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = std::fs::read_to_string(&path)
            .ok()
            .and_then(|raw| match serde_json::from_str(&raw) {
                Ok(entries) => Some(entries),
                Err(e) => {
                    warn!("Ignoring unreadable rename log {}: {}", path.display(), e);
                    None
                }
            })
            .unwrap_or_default();
        Self { path, entries }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> &IndexMap<String, RenameEntry> {
        &self.entries
    }

    pub fn record(&mut self, new_name: impl Into<String>, entry: RenameEntry) {
        self.entries.insert(new_name.into(), entry);
    }

    /// Persist the log; failure is logged, never returned.
    pub fn save(&self) {
        if let Err(e) = write_json_atomic(&self.path, &self.entries) {
            warn!("Could not save rename log {}: {}", self.path.display(), e);
        }
    }
}
