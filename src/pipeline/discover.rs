//! Input discovery: which PDFs exist, and which of them still need work.

use crate::checkpoint::CheckpointState;
use crate::error::Pdf2DataError;
use std::path::{Path, PathBuf};

/// All `*.pdf` files directly inside `dir`, sorted by file name.
///
/// The extension match is case-insensitive; sub-folders (including the
/// processed folder) are never descended into.
pub fn list_pdfs(dir: &Path) -> Result<Vec<PathBuf>, Pdf2DataError> {
    let unreadable = |source| Pdf2DataError::InputUnreadable {
        path: dir.to_path_buf(),
        source,
    };

    let mut pdfs = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(unreadable)? {
        let path = entry.map_err(unreadable)?.path();
        if path.is_file() && is_pdf(&path) {
            pdfs.push(path);
        }
    }
    pdfs.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(pdfs)
}

pub fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

/// File name used as the checkpoint key.
pub fn document_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Inputs not yet in the processed set, in order, capped at `max`.
pub fn pending(all: &[PathBuf], state: &CheckpointState, max: Option<usize>) -> Vec<PathBuf> {
    all.iter()
        .filter(|p| !state.is_processed(&document_name(p)))
        .take(max.unwrap_or(usize::MAX))
        .cloned()
        .collect()
}
