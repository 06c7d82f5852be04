//! Output artifacts: per-document JSON, the combined file, the CSV export,
//! debug replies, and relocation of consumed inputs.
//!
//! Every helper here returns a [`Pdf2DataError`] persistence variant; the
//! orchestrator logs them and moves on.

use crate::error::Pdf2DataError;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// One extracted record. Key order is preserved: provenance first.
pub type Record = serde_json::Map<String, Value>;

/// Counts and artifact paths for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// PDFs in the target folder after the rename pass.
    pub inputs_found: usize,
    /// Inputs already in the checkpoint before this run.
    pub already_processed: usize,
    /// Documents attempted this run (after `max_documents`).
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Unprocessed inputs left in the folder afterwards.
    pub remaining: usize,
    pub records: usize,
    pub renamed: usize,
    /// `combined_data.json`, when anything was produced.
    pub combined_file: Option<PathBuf>,
    /// `dataset.csv`, when the export succeeded.
    pub export_file: Option<PathBuf>,
}

/// Write `records` as pretty-printed JSON.
pub fn write_records(path: &Path, records: &[Record]) -> Result<(), Pdf2DataError> {
    let json = serde_json::to_string_pretty(records)
        .map_err(|e| Pdf2DataError::Internal(format!("serialise records: {e}")))?;
    std::fs::write(path, json).map_err(|source| Pdf2DataError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    })
}

/// Save a raw service reply verbatim.
pub fn write_debug_reply(path: &Path, raw: &str) -> Result<(), Pdf2DataError> {
    std::fs::write(path, raw).map_err(|source| Pdf2DataError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    })
}

/// Project records into a CSV table.
///
/// Columns are the union of record keys in first-seen order. Strings are
/// written as-is, `null` as an empty cell, everything else as compact JSON.
pub fn export_csv(path: &Path, records: &[Record]) -> Result<(), Pdf2DataError> {
    let export_err = |detail: String| Pdf2DataError::ExportFailed {
        path: path.to_path_buf(),
        detail,
    };

    let columns: IndexSet<&str> = records
        .iter()
        .flat_map(|r| r.keys().map(String::as_str))
        .collect();

    let mut writer = csv::Writer::from_path(path).map_err(|e| export_err(e.to_string()))?;
    writer
        .write_record(&columns)
        .map_err(|e| export_err(e.to_string()))?;
    for record in records {
        let row = columns
            .iter()
            .map(|col| record.get(*col).map(cell).unwrap_or_default());
        writer
            .write_record(row)
            .map_err(|e| export_err(e.to_string()))?;
    }
    writer.flush().map_err(|e| export_err(e.to_string()))
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Move a consumed input into `processed_dir`, keeping its name unique.
pub fn move_to_processed(pdf: &Path, processed_dir: &Path) -> Result<PathBuf, Pdf2DataError> {
    let file_name = pdf
        .file_name()
        .ok_or_else(|| Pdf2DataError::Internal(format!("no file name in {}", pdf.display())))?;
    let dest = crate::naming::unique_path(&processed_dir.join(file_name));
    std::fs::rename(pdf, &dest).map_err(|source| Pdf2DataError::MoveFailed {
        from: pdf.to_path_buf(),
        to: dest.clone(),
        source,
    })?;
    Ok(dest)
}
