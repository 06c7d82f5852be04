//! Filename normalisation: noisy extracted text → safe, bounded file names.
//!
//! Every function here is deterministic. [`unique_path`] only *reads* the
//! file system; it never reserves the name it returns, so two processes
//! racing on the same target can still collide. The pipeline is single
//! writer per folder, which makes that acceptable.

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use unicode_normalization::UnicodeNormalization;

/// Placeholder used whenever cleaning leaves nothing behind.
pub const UNTITLED: &str = "Untitled";

/// Characters rejected by at least one mainstream file system.
pub const RESERVED_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Prefix given to inputs for which no DOI could be found.
pub const NO_DOI_PREFIX: &str = "NO_DOI";

const DOI_PART_MAX: usize = 50;
const TITLE_WITH_DOI_MAX: usize = 100;
const TITLE_ALONE_MAX: usize = 150;

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

static RE_CANONICAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:10\.\d{4,9}|NO_DOI - )").unwrap());

/// Clean `text` into a Windows-safe file-name fragment of at most `max_len`
/// characters.
///
/// Steps: NFKD decomposition, drop non-ASCII and control characters, drop
/// [`RESERVED_CHARS`], collapse whitespace, trim surrounding dots and
/// spaces, then truncate at the last word boundary inside the bound
/// (hard cut if the text has no space). Returns [`UNTITLED`] if nothing
/// survives, itself cut to `max_len` when the bound is shorter. A zero
/// bound is treated as one so the result is never empty.
pub fn clean_filename(text: &str, max_len: usize) -> String {
    let max_len = max_len.max(1);
    let ascii: String = text
        .nfkd()
        .filter(|c| c.is_ascii() && !RESERVED_CHARS.contains(c))
        .map(|c| if c.is_ascii_control() { ' ' } else { c })
        .collect();

    let collapsed = RE_WHITESPACE.replace_all(&ascii, " ");
    let mut cleaned = trim_name(&collapsed).to_string();

    if cleaned.len() > max_len {
        // ASCII only from here, so byte indices are char indices.
        let cut = &cleaned[..max_len];
        let kept = match cut.rfind(' ') {
            Some(pos) => &cut[..pos],
            None => cut,
        };
        cleaned = trim_name(kept).to_string();
    }

    if cleaned.is_empty() {
        UNTITLED[..UNTITLED.len().min(max_len)].to_string()
    } else {
        cleaned
    }
}

fn trim_name(s: &str) -> &str {
    s.trim_matches(|c: char| c == '.' || c == ' ')
}

/// Build the canonical file name for a document.
///
/// `"{doi} - {title}.pdf"` when a DOI is known, otherwise
/// `"NO_DOI - {title}.pdf"`.
pub fn canonical_name(doi: Option<&str>, title: &str) -> String {
    match doi {
        Some(doi) => format!(
            "{} - {}.pdf",
            clean_filename(doi, DOI_PART_MAX),
            clean_filename(title, TITLE_WITH_DOI_MAX)
        ),
        None => format!(
            "{} - {}.pdf",
            NO_DOI_PREFIX,
            clean_filename(title, TITLE_ALONE_MAX)
        ),
    }
}

/// True when `file_name` already follows the canonical naming scheme.
pub fn is_canonical(file_name: &str) -> bool {
    RE_CANONICAL.is_match(file_name)
}

/// Return `candidate` if it is free, else the first free
/// `"<stem> (n)<.ext>"` with `n` counting up from 2.
pub fn unique_path(candidate: &Path) -> PathBuf {
    unique_path_with(candidate, |p| p.exists())
}

/// [`unique_path`] with a caller-supplied notion of "taken".
///
/// The rename pass uses this to also avoid names that a previous run
/// already processed and moved away.
pub fn unique_path_with(candidate: &Path, taken: impl Fn(&Path) -> bool) -> PathBuf {
    if !taken(candidate) {
        return candidate.to_path_buf();
    }

    let parent = candidate.parent().unwrap_or_else(|| Path::new(""));
    let stem = candidate
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = candidate
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    (2u64..)
        .map(|n| parent.join(format!("{stem} ({n}){ext}")))
        .find(|p| !taken(p))
        .unwrap_or_else(|| candidate.to_path_buf())
}
