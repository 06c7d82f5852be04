//! # edgequake-pdf2data
//!
//! Batch extraction of structured data from a folder of PDFs with an LLM.
//!
//! Point it at a folder of papers and a plain-text extraction directive
//! ("extract every compound with its IC50 ..."). Each PDF is renamed after
//! its DOI and title, sent to the model, and the JSON records that come back
//! are written per document and merged into one dataset. A checkpoint file
//! makes runs resumable: re-running after a crash or Ctrl-C picks up exactly
//! where the last committed document left off.
//!
//! ## Pipeline Overview
//!
//! ```text
//! target/
//!  │
//!  ├─ 1. Rename    "{doi} - {title}.pdf" from metadata / first pages
//!  ├─ 2. Discover  sorted *.pdf minus the checkpoint's processed set
//!  ├─ 3. Extract   Gemini Files API, or page images to any vision LLM
//!  ├─ 4. Parse     fenced / bare JSON → records + provenance
//!  ├─ 5. Persist   output/<stem>.json, checkpoint, move to processed_pdfs/
//!  └─ 6. Combine   output/combined_data.json + output/dataset.csv
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdf2data::{resolve_api_key, GeminiClient, Pipeline, PipelineConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PipelineConfig::builder("papers").max_documents(5).build()?;
//!     let key = resolve_api_key(None, &config.target_dir, "gemini")?;
//!     let client = GeminiClient::new(key, None, config.poll_policy())?;
//!
//!     let summary = Pipeline::open(config, Arc::new(client))?.run().await?;
//!     eprintln!("{} succeeded, {} failed", summary.succeeded, summary.failed);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2data` binary (clap + anyhow + indicatif + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod checkpoint;
pub mod client;
pub mod config;
pub mod credentials;
pub mod error;
pub mod identify;
pub mod naming;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod rename_log;
pub mod run;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use checkpoint::{CheckpointState, CheckpointStore};
pub use client::gemini::GeminiClient;
pub use client::vision::VisionClient;
pub use client::{ExtractionClient, PollPolicy, SubmissionState};
pub use config::{PipelineConfig, PipelineConfigBuilder, WorkspaceLayout};
pub use credentials::resolve_api_key;
pub use error::{DocumentError, Pdf2DataError};
pub use output::{Record, RunSummary};
pub use progress::{NoopProgressCallback, ProgressCallback, RunProgressCallback};
pub use run::{run, Pipeline};

/// Local wall-clock timestamp used in the checkpoint, rename log and records.
pub(crate) fn now_timestamp() -> String {
    chrono::Local::now()
        .format("%Y-%m-%dT%H:%M:%S%.6f")
        .to_string()
}
