//! Document identity: DOI and human title from PDF metadata and text.
//!
//! Every lookup fails soft. A corrupt PDF, a missing pdfium library or an
//! unreadable page all mean "not found" and fall through to the next source;
//! the caller always gets a title, at worst [`UNTITLED`].
//!
//! DOI sources, in order:
//! 1. `Subject` / `Keywords` metadata tags, then a custom `doi` / `DOI`
//!    information-dictionary entry
//! 2. text of the first [`DOI_SCAN_PAGES`] pages, per page trying a
//!    `doi:` label, then a `doi.org/` URL, then a bare `10.xxxx/...` token
//!
//! Title sources, in order:
//! 1. `Title` metadata tag, when longer than [`MIN_METADATA_TITLE`] chars
//! 2. first plausible line of page 1 (see [`title_from_text`])
//! 3. [`UNTITLED`]

use crate::naming::UNTITLED;
use crate::pipeline::pdf::{read_document_text, DocumentText};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use tracing::debug;

/// Pages scanned for a DOI in the body text.
pub const DOI_SCAN_PAGES: usize = 3;

const MIN_METADATA_TITLE: usize = 10;
const MIN_DOI_LEN: usize = 7;
const TITLE_SCAN_LINES: usize = 10;
const TITLE_FALLBACK_LINES: usize = 5;
const TITLE_MIN_LEN: usize = 15;
const TITLE_MAX_LEN: usize = 200;
const FALLBACK_MIN_LEN: usize = 10;

static RE_DOI_METADATA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(10\.\d{4,9}/[-._;()/:A-Z0-9]+)").unwrap());

static RE_DOI_TEXT: Lazy<[Regex; 3]> = Lazy::new(|| {
    [
        Regex::new(r"(?i)doi[\s:]*\s*(10\.\d{4,9}/[-._;()/:A-Z0-9]+)").unwrap(),
        Regex::new(r"(?i)(?:dx\.doi\.org|doi\.org)/\s*(10\.\d{4,9}/[-._;()/:A-Z0-9]+)").unwrap(),
        Regex::new(r"(?i)\b(10\.\d{4,9}/[-._;()/:A-Z0-9]+)\b").unwrap(),
    ]
});

static RE_TITLE_EXCLUDE: Lazy<[Regex; 6]> = Lazy::new(|| {
    [
        Regex::new(r"(?i)doi[\s:]").unwrap(),
        Regex::new(r"(?i)published|received|accepted").unwrap(),
        Regex::new(r"(?i)volume|issue|page").unwrap(),
        Regex::new(r"(?i)copyright|©|\(c\)").unwrap(),
        Regex::new(r"^\d+$").unwrap(),
        Regex::new(r"^[A-Z\s]{3,}$").unwrap(),
    ]
});

/// What identification produced for one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentIdentity {
    pub doi: Option<String>,
    pub title: String,
}

/// Identify a PDF on disk. Never fails.
pub fn identify_file(pdf_path: &Path) -> DocumentIdentity {
    match read_document_text(pdf_path, DOI_SCAN_PAGES) {
        Ok(text) => identify(&text),
        Err(e) => {
            debug!("Identification skipped for {}: {:?}", pdf_path.display(), e);
            DocumentIdentity {
                doi: None,
                title: UNTITLED.to_string(),
            }
        }
    }
}

/// Identify a document from already-extracted metadata and text.
pub fn identify(text: &DocumentText) -> DocumentIdentity {
    let doi = text
        .doi_metadata()
        .find_map(doi_from_metadata)
        .or_else(|| text.pages.iter().find_map(|p| doi_from_text(p)));

    let title = text
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| t.chars().count() > MIN_METADATA_TITLE)
        .map(str::to_string)
        .or_else(|| text.pages.first().and_then(|p| title_from_text(p)))
        .unwrap_or_else(|| UNTITLED.to_string());

    DocumentIdentity { doi, title }
}

/// Find a DOI in a metadata value.
pub fn doi_from_metadata(value: &str) -> Option<String> {
    RE_DOI_METADATA
        .captures(value)
        .map(|caps| caps[1].trim_end_matches([' ', '.', ',', ';']).to_string())
}

/// Find a DOI in one page of body text.
///
/// Patterns are tried from most to least specific; the first match that
/// still contains a `/` and is longer than 7 characters after trimming
/// trailing punctuation wins.
pub fn doi_from_text(text: &str) -> Option<String> {
    RE_DOI_TEXT.iter().find_map(|re| {
        let caps = re.captures(text)?;
        let doi = caps[1].trim_end_matches([' ', '.', ',', ';', ')']);
        (doi.contains('/') && doi.chars().count() > MIN_DOI_LEN).then(|| doi.to_string())
    })
}

/// Guess a title from the first page's text.
///
/// Looks at the first 10 non-empty lines for one of 15–200 characters that
/// is not journal boilerplate, a page number or a short all-caps banner.
/// Falls back to the first of the first 5 lines longer than 10 characters.
pub fn title_from_text(page_text: &str) -> Option<String> {
    let lines: Vec<&str> = page_text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    lines
        .iter()
        .take(TITLE_SCAN_LINES)
        .find(|line| {
            let len = line.chars().count();
            (TITLE_MIN_LEN..=TITLE_MAX_LEN).contains(&len)
                && !RE_TITLE_EXCLUDE.iter().any(|re| re.is_match(line))
        })
        .or_else(|| {
            lines
                .iter()
                .take(TITLE_FALLBACK_LINES)
                .find(|line| line.chars().count() > FALLBACK_MIN_LEN)
        })
        .map(|l| l.to_string())
}
