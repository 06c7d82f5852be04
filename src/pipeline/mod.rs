//! Pipeline stages for batch PDF extraction.
//!
//! Each submodule implements one step of a run; [`crate::run::Pipeline`]
//! composes them.
//!
//! ## Data Flow
//!
//! ```text
//! rename ──▶ discover ──▶ (client) ──▶ parse ──▶ output
//!  (names)   (pending)    (raw text)   (records)
//! ```
//!
//! 1. [`rename`]  : give inputs canonical `{doi} - {title}.pdf` names
//! 2. [`discover`]: list inputs, drop the ones the checkpoint already has
//! 3. [`pdf`]     : pdfium access: metadata/text for naming, rasters for
//!    vision providers
//! 4. [`encode`]  : PNG + base64 wrapping of rendered pages
//! 5. [`parse`]   : turn a model reply into provenance-stamped records

pub mod discover;
pub mod encode;
pub mod parse;
pub mod pdf;
pub mod rename;
