//! PDF access via pdfium: metadata and page text for identification, page
//! rasters for vision providers.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which keeps thread-local
//! state and is not async-safe. Async entry points move the work onto
//! tokio's blocking pool; the rename pass runs outside any async context and
//! calls the blocking functions directly.

use crate::error::DocumentError;
use image::DynamicImage;
use once_cell::sync::Lazy;
use pdfium_render::prelude::*;
use regex::bytes::Regex;
use std::path::Path;
use tracing::debug;

/// A `/doi` or `/DOI` entry holding a literal string, e.g. `/doi (10.1000/x)`.
static RE_INFO_DOI: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?-u)/(?:doi|DOI)\s*\(((?:[^()\\]|\\.)*)\)").unwrap());

/// Metadata tags and leading page text of one PDF.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentText {
    pub title: Option<String>,
    pub subject: Option<String>,
    pub keywords: Option<String>,
    /// Custom `doi` / `DOI` entry of the document information dictionary.
    pub doi_entry: Option<String>,
    /// Extracted text of the first pages, in page order.
    pub pages: Vec<String>,
}

impl DocumentText {
    /// Metadata values that may carry a DOI, in scan order.
    pub fn doi_metadata(&self) -> impl Iterator<Item = &str> {
        [
            self.subject.as_deref(),
            self.keywords.as_deref(),
            self.doi_entry.as_deref(),
        ]
        .into_iter()
        .flatten()
    }
}

/// Find a custom `doi` entry in raw PDF bytes.
///
/// pdfium only exposes the standard information tags, so custom keys are
/// read straight from the file. Entries inside compressed object streams
/// are not seen.
pub fn info_doi_entry(bytes: &[u8]) -> Option<String> {
    RE_INFO_DOI.captures_iter(bytes).find_map(|caps| {
        let raw = caps.get(1)?.as_bytes();
        let mut value = Vec::with_capacity(raw.len());
        let mut escaped = false;
        for &b in raw {
            if escaped || b != b'\\' {
                value.push(b);
                escaped = false;
            } else {
                escaped = true;
            }
        }
        let value = String::from_utf8_lossy(&value).trim().to_string();
        (!value.is_empty()).then_some(value)
    })
}

/// Bind to a pdfium library.
///
/// `PDFIUM_LIB_PATH` wins when set; otherwise a library next to the working
/// directory, then the system library.
pub fn bind_pdfium() -> Result<Pdfium, PdfiumError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(path) if !path.is_empty() => Pdfium::bind_to_library(path)?,
        _ => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library())?,
    };
    Ok(Pdfium::new(bindings))
}

/// Read metadata and the text of up to `max_pages` leading pages.
pub fn read_document_text(pdf_path: &Path, max_pages: usize) -> Result<DocumentText, PdfiumError> {
    let pdfium = bind_pdfium()?;
    let document = pdfium.load_pdf_from_file(pdf_path, None)?;

    let metadata = document.metadata();
    let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
        metadata.get(tag).and_then(|t| {
            let v = t.value().trim().to_string();
            if v.is_empty() {
                None
            } else {
                Some(v)
            }
        })
    };

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    let mut texts = Vec::with_capacity(total_pages.min(max_pages));
    for idx in 0..total_pages.min(max_pages) {
        let page = pages.get(idx as u16)?;
        texts.push(page.text()?.all());
    }
    debug!(
        "Read {} of {} pages from {}",
        texts.len(),
        total_pages,
        pdf_path.display()
    );

    Ok(DocumentText {
        title: get_meta(PdfDocumentMetadataTagType::Title),
        subject: get_meta(PdfDocumentMetadataTagType::Subject),
        keywords: get_meta(PdfDocumentMetadataTagType::Keywords),
        doi_entry: std::fs::read(pdf_path)
            .ok()
            .and_then(|bytes| info_doi_entry(&bytes)),
        pages: texts,
    })
}

/// Rasterise up to `max_pages` leading pages, longest edge capped at `max_pixels`.
pub async fn render_leading_pages(
    pdf_path: &Path,
    max_pages: usize,
    max_pixels: u32,
) -> Result<Vec<DynamicImage>, DocumentError> {
    let path = pdf_path.to_path_buf();
    tokio::task::spawn_blocking(move || render_blocking(&path, max_pages, max_pixels))
        .await
        .map_err(|e| DocumentError::Unreadable {
            detail: format!("render task panicked: {e}"),
        })?
        .map_err(|e| DocumentError::Unreadable {
            detail: format!("{e:?}"),
        })
}

fn render_blocking(
    pdf_path: &Path,
    max_pages: usize,
    max_pixels: u32,
) -> Result<Vec<DynamicImage>, PdfiumError> {
    let pdfium = bind_pdfium()?;
    let document = pdfium.load_pdf_from_file(pdf_path, None)?;

    let render_config = PdfRenderConfig::new()
        .set_target_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let pages = document.pages();
    let count = (pages.len() as usize).min(max_pages);
    let mut images = Vec::with_capacity(count);
    for idx in 0..count {
        let page = pages.get(idx as u16)?;
        let image = page.render_with_config(&render_config)?.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            idx + 1,
            image.width(),
            image.height()
        );
        images.push(image);
    }
    Ok(images)
}
