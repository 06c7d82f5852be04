//! Filename normalisation pass.
//!
//! Gives every input a `"{doi} - {title}.pdf"` / `"NO_DOI - {title}.pdf"`
//! name so that the checkpoint keys stay stable across runs. Inputs that
//! already carry a canonical name are left alone; a failure on one file
//! never stops the pass.
//!
//! A name counts as taken when it exists in the input folder, is in the
//! checkpoint's processed set, or sits in the processed folder. Reusing
//! such a name would make a new input look already done.

use crate::checkpoint::CheckpointState;
use crate::identify::identify_file;
use crate::naming::{canonical_name, is_canonical, unique_path_with};
use crate::pipeline::discover::{document_name, list_pdfs};
use crate::rename_log::{RenameEntry, RenameLog};
use std::path::Path;
use tracing::{debug, info, warn};

/// Rename non-canonical PDFs in `dir`, recording each move in `log`.
///
/// Returns the number of files renamed. The log is saved once at the end
/// when anything changed. A folder that cannot be listed renames nothing.
pub fn rename_inputs(
    dir: &Path,
    processed_dir: &Path,
    state: &CheckpointState,
    log: &mut RenameLog,
) -> usize {
    let pdfs = match list_pdfs(dir) {
        Ok(p) => p,
        Err(e) => {
            warn!("Rename pass skipped: {}", e);
            return 0;
        }
    };

    let mut renamed = 0;
    for pdf in pdfs {
        let original = document_name(&pdf);
        if is_canonical(&original) {
            debug!("Already canonical: {}", original);
            continue;
        }

        let identity = identify_file(&pdf);
        let candidate = dir.join(canonical_name(identity.doi.as_deref(), &identity.title));
        let target = unique_path_with(&candidate, |p| name_taken(p, processed_dir, state));
        let new_name = document_name(&target);

        match std::fs::rename(&pdf, &target) {
            Ok(()) => {
                info!("Renamed: {} -> {}", original, new_name);
                log.record(
                    new_name,
                    RenameEntry {
                        original_name: original,
                        doi: identity.doi,
                        title: identity.title,
                        renamed_at: crate::now_timestamp(),
                    },
                );
                renamed += 1;
            }
            Err(e) => warn!("Could not rename {}: {}", original, e),
        }
    }

    if renamed > 0 {
        log.save();
    }
    renamed
}

fn name_taken(path: &Path, processed_dir: &Path, state: &CheckpointState) -> bool {
    if path.exists() {
        return true;
    }
    let name = document_name(path);
    state.is_processed(&name) || processed_dir.join(&name).exists()
}
