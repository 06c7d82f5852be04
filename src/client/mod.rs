//! Extraction service clients.
//!
//! The orchestrator only sees [`ExtractionClient`]: hand it a PDF and the
//! extraction directive, get back the model's raw text. One implementation
//! per provider family:
//!
//! * [`gemini::GeminiClient`]: uploads the PDF to the Gemini Files API,
//!   waits for it to leave `PROCESSING`, generates, then deletes the upload.
//! * [`vision::VisionClient`]: renders pages to PNG and sends them to any
//!   `edgequake-llm` vision provider in one chat request.
//!
//! ## Submission state machine
//!
//! ```text
//! Submitted ──▶ Processing ──▶ Ready
//!                   │
//!                   └────────▶ Failed
//! ```
//!
//! [`wait_for_terminal`] drives the `Processing` leg for any service that
//! exposes a status endpoint: poll at a fixed interval, stop on a terminal
//! state, give up at a hard deadline.

pub mod gemini;
pub mod vision;

use crate::error::DocumentError;
use async_trait::async_trait;
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::debug;

/// Submits one document to an external extraction service.
///
/// Calls are awaited one at a time by the orchestrator; implementations do
/// not need to support concurrent submissions.
#[async_trait]
pub trait ExtractionClient: Send + Sync {
    /// Identifier stamped into every record's `provider` field.
    fn provider_id(&self) -> &str;

    /// Run the directive against `pdf_path` and return the raw reply text.
    async fn extract(&self, pdf_path: &Path, directive: &str) -> Result<String, DocumentError>;
}

/// Service-side lifecycle of one submitted document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionState {
    Submitted,
    Processing,
    Ready,
    Failed,
}

impl SubmissionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SubmissionState::Ready | SubmissionState::Failed)
    }
}

/// Polling cadence and deadline for one submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            timeout: Duration::from_secs(300),
        }
    }
}

/// Poll until the submission reaches a terminal state.
///
/// Returns `Ok(())` on [`SubmissionState::Ready`],
/// [`DocumentError::ProcessingFailed`] on [`SubmissionState::Failed`] and
/// [`DocumentError::Timeout`] when `policy.timeout` elapses first. Errors
/// from `poll` itself are returned as-is.
pub async fn wait_for_terminal<F, Fut>(
    policy: PollPolicy,
    provider: &str,
    mut poll: F,
) -> Result<(), DocumentError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<SubmissionState, DocumentError>>,
{
    let deadline = Instant::now() + policy.timeout;
    let mut polls = 0u32;

    loop {
        let state = poll().await?;
        polls += 1;
        match state {
            SubmissionState::Ready => {
                debug!("{provider}: ready after {polls} polls");
                return Ok(());
            }
            SubmissionState::Failed => {
                return Err(DocumentError::ProcessingFailed {
                    provider: provider.to_string(),
                })
            }
            SubmissionState::Submitted | SubmissionState::Processing => {}
        }

        if Instant::now() + policy.interval > deadline {
            return Err(DocumentError::Timeout {
                secs: policy.timeout.as_secs(),
            });
        }
        sleep(policy.interval).await;
    }
}
