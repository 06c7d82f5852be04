//! Progress-callback trait for per-document run events.
//!
//! Inject an [`Arc<dyn RunProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to receive
//! events as the pipeline works through the batch. The CLI renders them as a
//! progress bar; library callers can forward them anywhere.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdf2data::{RunProgressCallback, PipelineConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     records: Arc<AtomicUsize>,
//! }
//!
//! impl RunProgressCallback for CountingCallback {
//!     fn on_document_complete(&self, _index: usize, _total: usize, name: &str, records: usize) {
//!         self.records.fetch_add(records, Ordering::SeqCst);
//!         eprintln!("{name}: {records} records");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     records: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = PipelineConfig::builder(".")
//!     .progress_callback(counter as Arc<dyn RunProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the orchestrator as it processes each document.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Documents are processed one at a time, but the
/// trait is `Send + Sync` so implementations can be shared with other tasks.
pub trait RunProgressCallback: Send + Sync {
    /// Called once after discovery, before the first document.
    ///
    /// # Arguments
    /// * `pending`: documents that will be attempted in this run
    /// * `total`  : PDFs present in the input folder
    fn on_run_start(&self, pending: usize, total: usize) {
        let _ = (pending, total);
    }

    /// Called just before a document is submitted.
    ///
    /// `index` is 1-based within this run.
    fn on_document_start(&self, index: usize, pending: usize, name: &str) {
        let _ = (index, pending, name);
    }

    /// Called after a document's records are persisted and checkpointed.
    fn on_document_complete(&self, index: usize, pending: usize, name: &str, records: usize) {
        let _ = (index, pending, name, records);
    }

    /// Called after a document failure has been recorded in the checkpoint.
    fn on_document_error(&self, index: usize, pending: usize, name: &str, error: &str) {
        let _ = (index, pending, name, error);
    }

    /// Called once after every pending document has been attempted.
    fn on_run_complete(&self, succeeded: usize, failed: usize) {
        let _ = (succeeded, failed);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl RunProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn RunProgressCallback>;
