//! Error types for the edgequake-pdf2data library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Pdf2DataError`]: **Fatal or persistence-level**: setup problems that
//!   abort a run before any document is touched (missing directive, missing
//!   credentials, missing target folder, corrupt checkpoint), plus the
//!   artifact-write failures that the orchestrator logs and moves past.
//!
//! * [`DocumentError`]: **Per-document**: a single PDF could not be
//!   extracted (service error, timeout, unusable reply). The orchestrator
//!   records it in the checkpoint and continues with the next document.
//!
//! Identifier extraction never produces an error at all: it degrades to
//! "not found" (see [`crate::identify`]).

use std::path::PathBuf;
use thiserror::Error;

/// Fatal and persistence-level errors returned by the library.
///
/// Per-document failures use [`DocumentError`] and are stored in the
/// checkpoint rather than propagated here.
#[derive(Debug, Error)]
pub enum Pdf2DataError {
    // ── Setup errors ──────────────────────────────────────────────────────
    /// The target folder does not exist or is not a directory.
    #[error("Target folder not found: '{path}'\nCheck the path exists and is a directory.")]
    TargetNotFound { path: PathBuf },

    /// The target folder exists but could not be listed.
    #[error("Failed to read input folder '{path}': {source}")]
    InputUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The extraction directive file is missing.
    #[error("Extraction prompt not found: '{path}'\nCreate it or pass --prompt <FILE>.")]
    PromptNotFound { path: PathBuf },

    /// The extraction directive file exists but holds no text.
    #[error("Extraction prompt '{path}' is empty")]
    PromptEmpty { path: PathBuf },

    /// No API key could be resolved for the provider.
    #[error(
        "No API key found for provider '{provider}'.\n\
Pass --api-key, set LLM_API_KEY / GEMINI_API_KEY, or create api_key.txt in the target folder."
    )]
    MissingApiKey { provider: String },

    /// The configured provider could not be initialised.
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The checkpoint file exists but is not valid checkpoint JSON.
    #[error("Checkpoint '{path}' is corrupt: {detail}\nFix or remove it to start over.")]
    CheckpointCorrupt { path: PathBuf, detail: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Persistence errors ────────────────────────────────────────────────
    /// The checkpoint could not be written. Fatal: progress would be lost.
    #[error("Failed to write checkpoint '{path}': {source}")]
    CheckpointWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An output artifact could not be written.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A consumed input could not be moved to the processed folder.
    #[error("Failed to move '{from}' to '{to}': {source}")]
    MoveFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The tabular export could not be produced.
    #[error("Tabular export to '{path}' failed: {detail}")]
    ExportFailed { path: PathBuf, detail: String },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Pdf2DataError {
    /// True for errors that must abort a run before any document is touched.
    pub fn is_setup(&self) -> bool {
        matches!(
            self,
            Pdf2DataError::TargetNotFound { .. }
                | Pdf2DataError::InputUnreadable { .. }
                | Pdf2DataError::PromptNotFound { .. }
                | Pdf2DataError::PromptEmpty { .. }
                | Pdf2DataError::MissingApiKey { .. }
                | Pdf2DataError::ProviderNotConfigured { .. }
                | Pdf2DataError::CheckpointCorrupt { .. }
                | Pdf2DataError::InvalidConfig(_)
        )
    }
}

/// A non-fatal error for a single document.
///
/// The display string is what lands in the checkpoint's `failed` list.
#[derive(Debug, Clone, Error)]
pub enum DocumentError {
    /// The PDF could not be opened or rendered locally.
    #[error("could not read PDF: {detail}")]
    Unreadable { detail: String },

    /// The upload or request to the extraction service failed.
    #[error("submission failed: {detail}")]
    Submission { detail: String },

    /// The service reported a terminal failed state for the document.
    #[error("{provider} processing failed state")]
    ProcessingFailed { provider: String },

    /// The service did not reach a terminal state in time.
    #[error("extraction timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The generation call itself failed.
    #[error("generation failed: {detail}")]
    Generation { detail: String },

    /// The service answered, but with no text.
    #[error("Empty response from API")]
    EmptyResponse,

    /// The reply could not be turned into a list of records.
    #[error("malformed output: {detail}")]
    MalformedOutput { detail: String },
}
