//! Gemini client: Files API upload, state polling, generation, cleanup.
//!
//! ## Request sequence
//!
//! ```text
//! POST /upload/v1beta/files          (resumable start → upload URL)
//! POST <upload URL>                  (bytes, finalize → File{name, uri, state})
//! GET  /v1beta/files/{id}            (repeat while state == PROCESSING)
//! POST /v1beta/models/{m}:generateContent   [directive, file_data{uri}]
//! DELETE /v1beta/files/{id}          (best-effort)
//! ```
//!
//! The API key travels in the `x-goog-api-key` header so it never appears
//! in URLs that might end up in logs.

use super::{wait_for_terminal, ExtractionClient, PollPolicy, SubmissionState};
use crate::error::{DocumentError, Pdf2DataError};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::fmt;
use std::path::Path;
use tracing::{debug, info, warn};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-pro";
pub const PROVIDER_ID: &str = "gemini";

const PDF_MIME: &str = "application/pdf";
const ERROR_BODY_MAX: usize = 300;

/// Server-side handle for an uploaded document.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GeminiFile {
    /// Resource name, e.g. `files/abc123`.
    pub name: String,
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

impl GeminiFile {
    /// Map the Files API state onto the submission state machine.
    ///
    /// Unknown or missing states keep the poll loop waiting; the deadline
    /// still bounds it.
    pub fn submission_state(&self) -> SubmissionState {
        match self.state.as_deref() {
            Some("ACTIVE") => SubmissionState::Ready,
            Some("FAILED") => SubmissionState::Failed,
            Some("PROCESSING") => SubmissionState::Processing,
            _ => SubmissionState::Submitted,
        }
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    file: GeminiFile,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

impl GenerateResponse {
    /// Concatenated text parts of the first candidate.
    fn text(&self) -> Result<String, DocumentError> {
        if let Some(reason) = self
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.as_deref())
        {
            return Err(DocumentError::Generation {
                detail: format!("prompt blocked: {reason}"),
            });
        }
        Ok(self
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| {
                c.parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default())
    }
}

/// [`ExtractionClient`] for Google Gemini via the Files API.
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    poll: PollPolicy,
}

impl fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiClient")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("poll", &self.poll)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl GeminiClient {
    pub fn new(
        api_key: impl Into<String>,
        model: Option<String>,
        poll: PollPolicy,
    ) -> Result<Self, Pdf2DataError> {
        let http = reqwest::Client::builder()
            .timeout(poll.timeout)
            .build()
            .map_err(|e| Pdf2DataError::ProviderNotConfigured {
                provider: PROVIDER_ID.to_string(),
                hint: e.to_string(),
            })?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            model: model.unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            base_url: DEFAULT_BASE_URL.to_string(),
            poll,
        })
    }

    /// Point the client at a different endpoint (proxies, test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn upload(&self, pdf_path: &Path) -> Result<GeminiFile, DocumentError> {
        let bytes = tokio::fs::read(pdf_path)
            .await
            .map_err(|e| DocumentError::Unreadable {
                detail: e.to_string(),
            })?;
        let display_name = pdf_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let start = self
            .http
            .post(format!("{}/upload/v1beta/files", self.base_url))
            .header("x-goog-api-key", &self.api_key)
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", bytes.len())
            .header("X-Goog-Upload-Header-Content-Type", PDF_MIME)
            .json(&json!({ "file": { "display_name": display_name } }))
            .send()
            .await
            .map_err(|e| request_error(e, self.poll, submission))?;
        let start = ensure_success(start, submission).await?;

        let upload_url = start
            .headers()
            .get("x-goog-upload-url")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| DocumentError::Submission {
                detail: "upload session returned no upload URL".into(),
            })?;

        let finished = self
            .http
            .post(upload_url)
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(bytes)
            .send()
            .await
            .map_err(|e| request_error(e, self.poll, submission))?;
        let uploaded: UploadResponse = ensure_success(finished, submission)
            .await?
            .json()
            .await
            .map_err(|e| submission(e.to_string()))?;

        debug!("Uploaded {} as {}", display_name, uploaded.file.name);
        Ok(uploaded.file)
    }

    async fn file_state(&self, name: &str) -> Result<SubmissionState, DocumentError> {
        let resp = self
            .http
            .get(format!("{}/v1beta/{}", self.base_url, name))
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| request_error(e, self.poll, submission))?;
        let file: GeminiFile = ensure_success(resp, submission)
            .await?
            .json()
            .await
            .map_err(|e| submission(e.to_string()))?;
        Ok(file.submission_state())
    }

    async fn generate(&self, file: &GeminiFile, directive: &str) -> Result<String, DocumentError> {
        let body = json!({
            "contents": [{
                "role": "user",
                "parts": [
                    { "text": directive },
                    { "file_data": {
                        "mime_type": file.mime_type.as_deref().unwrap_or(PDF_MIME),
                        "file_uri": file.uri,
                    }},
                ],
            }],
        });

        let resp = self
            .http
            .post(format!(
                "{}/v1beta/models/{}:generateContent",
                self.base_url, self.model
            ))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| request_error(e, self.poll, generation))?;
        let parsed: GenerateResponse = ensure_success(resp, generation)
            .await?
            .json()
            .await
            .map_err(|e| generation(e.to_string()))?;
        parsed.text()
    }

    /// Delete the uploaded file. Failure is only logged.
    async fn release(&self, file: &GeminiFile) {
        let result = self
            .http
            .delete(format!("{}/v1beta/{}", self.base_url, file.name))
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await;
        match result {
            Ok(resp) if resp.status().is_success() => debug!("Released {}", file.name),
            Ok(resp) => warn!("Could not release {}: HTTP {}", file.name, resp.status()),
            Err(e) => warn!("Could not release {}: {}", file.name, e),
        }
    }
}

#[async_trait]
impl ExtractionClient for GeminiClient {
    fn provider_id(&self) -> &str {
        PROVIDER_ID
    }

    async fn extract(&self, pdf_path: &Path, directive: &str) -> Result<String, DocumentError> {
        info!("  > Uploading...");
        let file = self.upload(pdf_path).await?;

        let result: Result<String, DocumentError> = async {
            if file.submission_state() != SubmissionState::Ready {
                wait_for_terminal(self.poll, PROVIDER_ID, || self.file_state(&file.name)).await?;
            }
            info!("  > Extracting...");
            self.generate(&file, directive).await
        }
        .await;

        // Uploaded files are released on every outcome.
        self.release(&file).await;
        result
    }
}

fn submission(detail: String) -> DocumentError {
    DocumentError::Submission { detail }
}

fn generation(detail: String) -> DocumentError {
    DocumentError::Generation { detail }
}

fn request_error(
    e: reqwest::Error,
    poll: PollPolicy,
    kind: fn(String) -> DocumentError,
) -> DocumentError {
    if e.is_timeout() {
        DocumentError::Timeout {
            secs: poll.timeout.as_secs(),
        }
    } else {
        kind(e.to_string())
    }
}

async fn ensure_success(
    resp: reqwest::Response,
    kind: fn(String) -> DocumentError,
) -> Result<reqwest::Response, DocumentError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let body: String = body.chars().take(ERROR_BODY_MAX).collect();
    Err(kind(format!("HTTP {status}: {body}")))
}
