//! Configuration types for a batch extraction run.
//!
//! Every knob lives in [`PipelineConfig`], built via its
//! [`PipelineConfigBuilder`]. The on-disk layout derived from the target
//! folder is described separately by [`WorkspaceLayout`] so that tests and
//! callers can locate artifacts without re-deriving file names.

use crate::error::Pdf2DataError;
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default directive file name inside the target folder.
pub const DEFAULT_PROMPT_FILE: &str = "extraction_prompt.txt";

/// Configuration for a batch extraction run.
///
/// # Example
/// ```rust
/// use edgequake_pdf2data::PipelineConfig;
///
/// let config = PipelineConfig::builder("papers")
///     .max_documents(10)
///     .rename_inputs(false)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_documents, Some(10));
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Folder scanned for `*.pdf` inputs; all state lives under it.
    pub target_dir: PathBuf,

    /// Directive file override. `None` means `<target>/extraction_prompt.txt`.
    pub prompt_path: Option<PathBuf>,

    /// Provider selector: `gemini` (default) or any `edgequake-llm` provider name.
    pub provider: String,

    /// Model identifier. `None` uses the provider default.
    pub model: Option<String>,

    /// Cap on documents attempted in one run (not cumulative).
    pub max_documents: Option<usize>,

    /// Run the filename-normalisation pass before discovery. Default: true.
    pub rename_inputs: bool,

    /// Save raw service replies as `output/DEBUG_<stem>.txt`. Default: false.
    pub debug: bool,

    /// Interval between status polls while the service is processing. Default: 1000 ms.
    pub poll_interval_ms: u64,

    /// Upper bound on waiting for one document. Default: 300 s.
    pub extraction_timeout_secs: u64,

    /// Pause between documents to respect provider rate limits. Default: 1000 ms.
    pub document_delay_ms: u64,

    /// Retries for transient vision-provider failures. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Longest rendered edge in pixels for the vision client. Default: 1600.
    pub max_rendered_pixels: u32,

    /// Pages sent to a vision provider per document. Default: 20.
    pub max_pages: usize,

    /// Sampling temperature for vision providers. Default: 0.0.
    pub temperature: f32,

    /// Output token cap for vision providers. Default: 8192.
    pub max_tokens: usize,

    /// Receives per-document progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl PipelineConfig {
    /// Create a new builder rooted at `target_dir`.
    pub fn builder(target_dir: impl Into<PathBuf>) -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self {
                target_dir: target_dir.into(),
                prompt_path: None,
                provider: "gemini".to_string(),
                model: None,
                max_documents: None,
                rename_inputs: true,
                debug: false,
                poll_interval_ms: 1000,
                extraction_timeout_secs: 300,
                document_delay_ms: 1000,
                max_retries: 3,
                retry_backoff_ms: 500,
                max_rendered_pixels: 1600,
                max_pages: 20,
                temperature: 0.0,
                max_tokens: 8192,
                progress_callback: None,
            },
        }
    }

    /// Paths of every file and folder the pipeline reads or writes.
    pub fn layout(&self) -> WorkspaceLayout {
        WorkspaceLayout::new(&self.target_dir)
    }

    /// Directive path after applying the override.
    pub fn prompt_file(&self) -> PathBuf {
        self.prompt_path
            .clone()
            .unwrap_or_else(|| self.target_dir.join(DEFAULT_PROMPT_FILE))
    }

    pub fn poll_policy(&self) -> crate::client::PollPolicy {
        crate::client::PollPolicy {
            interval: Duration::from_millis(self.poll_interval_ms),
            timeout: Duration::from_secs(self.extraction_timeout_secs),
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("target_dir", &self.target_dir)
            .field("prompt_path", &self.prompt_path)
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("max_documents", &self.max_documents)
            .field("rename_inputs", &self.rename_inputs)
            .field("debug", &self.debug)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .field("extraction_timeout_secs", &self.extraction_timeout_secs)
            .field("document_delay_ms", &self.document_delay_ms)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn RunProgressCallback>"),
            )
            .finish()
    }
}

/// Builder for [`PipelineConfig`].
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn prompt_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.prompt_path = Some(path.into());
        self
    }

    pub fn provider(mut self, name: impl Into<String>) -> Self {
        self.config.provider = name.into().trim().to_lowercase();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn max_documents(mut self, n: usize) -> Self {
        self.config.max_documents = Some(n);
        self
    }

    pub fn rename_inputs(mut self, v: bool) -> Self {
        self.config.rename_inputs = v;
        self
    }

    pub fn debug(mut self, v: bool) -> Self {
        self.config.debug = v;
        self
    }

    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    pub fn extraction_timeout_secs(mut self, secs: u64) -> Self {
        self.config.extraction_timeout_secs = secs;
        self
    }

    pub fn document_delay_ms(mut self, ms: u64) -> Self {
        self.config.document_delay_ms = ms;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn max_pages(mut self, n: usize) -> Self {
        self.config.max_pages = n.max(1);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, Pdf2DataError> {
        let c = &self.config;
        if c.provider.is_empty() {
            return Err(Pdf2DataError::InvalidConfig(
                "Provider name must not be empty".into(),
            ));
        }
        if c.max_documents == Some(0) {
            return Err(Pdf2DataError::InvalidConfig(
                "--max must be ≥ 1 when set".into(),
            ));
        }
        if c.extraction_timeout_secs == 0 {
            return Err(Pdf2DataError::InvalidConfig(
                "Extraction timeout must be ≥ 1s".into(),
            ));
        }
        Ok(self.config)
    }
}

/// Derived on-disk layout of a target folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceLayout {
    /// Folder scanned for inputs (the target folder itself).
    pub input_dir: PathBuf,
    /// Per-document JSON, combined JSON, CSV export and debug replies.
    pub output_dir: PathBuf,
    /// Holding area for consumed inputs.
    pub processed_dir: PathBuf,
    pub checkpoint_file: PathBuf,
    pub rename_log_file: PathBuf,
}

impl WorkspaceLayout {
    pub fn new(target_dir: &Path) -> Self {
        Self {
            input_dir: target_dir.to_path_buf(),
            output_dir: target_dir.join("output"),
            processed_dir: target_dir.join("processed_pdfs"),
            checkpoint_file: target_dir.join("pipeline_checkpoint.json"),
            rename_log_file: target_dir.join("renamed_files.json"),
        }
    }

    pub fn combined_file(&self) -> PathBuf {
        self.output_dir.join("combined_data.json")
    }

    pub fn export_file(&self) -> PathBuf {
        self.output_dir.join("dataset.csv")
    }

    /// `output/<stem>.json` for one document.
    pub fn document_output(&self, pdf_path: &Path) -> PathBuf {
        self.output_dir.join(format!("{}.json", file_stem(pdf_path)))
    }

    /// `output/DEBUG_<stem>.txt` for one document's raw reply.
    pub fn debug_output(&self, pdf_path: &Path) -> PathBuf {
        self.output_dir
            .join(format!("DEBUG_{}.txt", file_stem(pdf_path)))
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}
