//! Vision-provider client: rendered pages sent through `edgequake-llm`.
//!
//! For providers without a file-upload API (OpenAI, Anthropic, Ollama, ...)
//! the document is rasterised locally and shipped as page images in a single
//! chat request. There is no server-side state to poll: a submission goes
//! straight from `Submitted` to `Ready` or `Failed`.
//!
//! ## Retry Strategy
//!
//! 429 / 5xx / timeouts are retried with exponential backoff
//! (`retry_backoff_ms * 2^attempt`, capped at [`MAX_RETRY_DELAY`]). Each
//! attempt is bounded by the extraction timeout.

use super::ExtractionClient;
use crate::config::PipelineConfig;
use crate::error::{DocumentError, Pdf2DataError};
use crate::pipeline::{encode, pdf};
use crate::prompts::vision_system_prompt;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

pub const DEFAULT_VISION_MODEL: &str = "gpt-4.1-mini";

/// Upper bound on the pause between two attempts.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

const USER_INSTRUCTION: &str = "Extract the requested data from this document.";

/// Pause before retry number `attempt` (1-based). Saturates instead of
/// overflowing for large attempt counts.
fn retry_delay(base_ms: u64, attempt: u32) -> Duration {
    let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
    Duration::from_millis(base_ms.saturating_mul(factor)).min(MAX_RETRY_DELAY)
}

/// Knobs for one vision extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct VisionSettings {
    pub max_pages: usize,
    pub max_rendered_pixels: u32,
    pub temperature: f32,
    pub max_tokens: usize,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub timeout: Duration,
}

impl VisionSettings {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            max_pages: config.max_pages,
            max_rendered_pixels: config.max_rendered_pixels,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            timeout: Duration::from_secs(config.extraction_timeout_secs),
        }
    }

    fn options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }
}

/// [`ExtractionClient`] over any `edgequake-llm` vision provider.
pub struct VisionClient {
    provider: Arc<dyn LLMProvider>,
    provider_id: String,
    settings: VisionSettings,
}

impl fmt::Debug for VisionClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VisionClient")
            .field("provider_id", &self.provider_id)
            .field("provider", &"<dyn LLMProvider>")
            .field("settings", &self.settings)
            .finish()
    }
}

impl VisionClient {
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        provider_id: impl Into<String>,
        settings: VisionSettings,
    ) -> Self {
        Self {
            provider,
            provider_id: provider_id.into(),
            settings,
        }
    }

    /// Build the provider named in `config.provider` via [`ProviderFactory`].
    ///
    /// API keys are read from the provider's usual environment variables
    /// (`OPENAI_API_KEY`, `ANTHROPIC_API_KEY`, ...).
    pub fn from_config(config: &PipelineConfig) -> Result<Self, Pdf2DataError> {
        let model = config.model.as_deref().unwrap_or(DEFAULT_VISION_MODEL);
        let provider = ProviderFactory::create_llm_provider(&config.provider, model).map_err(
            |e| Pdf2DataError::ProviderNotConfigured {
                provider: config.provider.clone(),
                hint: format!("{e}"),
            },
        )?;
        Ok(Self::new(
            provider,
            config.provider.clone(),
            VisionSettings::from_config(config),
        ))
    }

    async fn chat_with_retry(&self, messages: &[ChatMessage]) -> Result<String, DocumentError> {
        let options = self.settings.options();
        let mut last_err = DocumentError::EmptyResponse;

        for attempt in 0..=self.settings.max_retries {
            if attempt > 0 {
                let backoff = retry_delay(self.settings.retry_backoff_ms, attempt);
                warn!(
                    "{}: retry {}/{} after {:?}",
                    self.provider_id, attempt, self.settings.max_retries, backoff
                );
                sleep(backoff).await;
            }

            let start = Instant::now();
            match timeout(self.settings.timeout, self.provider.chat(messages, Some(&options))).await
            {
                Ok(Ok(response)) => {
                    debug!(
                        "{}: {} input tokens, {} output tokens, {:?}",
                        self.provider_id,
                        response.prompt_tokens,
                        response.completion_tokens,
                        start.elapsed()
                    );
                    return Ok(response.content);
                }
                Ok(Err(e)) => {
                    warn!("{}: attempt {} failed: {}", self.provider_id, attempt + 1, e);
                    last_err = DocumentError::Generation {
                        detail: e.to_string(),
                    };
                }
                Err(_) => {
                    warn!("{}: attempt {} timed out", self.provider_id, attempt + 1);
                    last_err = DocumentError::Timeout {
                        secs: self.settings.timeout.as_secs(),
                    };
                }
            }
        }

        Err(last_err)
    }
}

#[async_trait]
impl ExtractionClient for VisionClient {
    fn provider_id(&self) -> &str {
        &self.provider_id
    }

    async fn extract(&self, pdf_path: &Path, directive: &str) -> Result<String, DocumentError> {
        let images = pdf::render_leading_pages(
            pdf_path,
            self.settings.max_pages,
            self.settings.max_rendered_pixels,
        )
        .await?;
        if images.is_empty() {
            return Err(DocumentError::Unreadable {
                detail: "document has no pages".into(),
            });
        }
        let pages = encode::encode_pages(&images)?;

        info!("  > Extracting ({} pages)...", pages.len());
        let messages = vec![
            ChatMessage::system(vision_system_prompt(directive)),
            ChatMessage::user_with_images(USER_INSTRUCTION, pages),
        ];
        self.chat_with_retry(&messages).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edgequake_llm::{LLMResponse, LlmError};
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails `failures` times, then answers; or never answers when `hang`.
    struct FlakyProvider {
        failures: u32,
        hang: bool,
        calls: AtomicU32,
    }

    impl FlakyProvider {
        fn failing(failures: u32) -> Arc<Self> {
            Arc::new(Self {
                failures,
                hang: false,
                calls: AtomicU32::new(0),
            })
        }

        fn hanging() -> Arc<Self> {
            Arc::new(Self {
                failures: 0,
                hang: true,
                calls: AtomicU32::new(0),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LLMProvider for FlakyProvider {
        fn name(&self) -> &str {
            "flaky"
        }

        fn model(&self) -> &str {
            "flaky-1"
        }

        fn max_context_length(&self) -> usize {
            8192
        }

        async fn complete(&self, prompt: &str) -> edgequake_llm::Result<LLMResponse> {
            self.chat(&[ChatMessage::user(prompt)], None).await
        }

        async fn complete_with_options(
            &self,
            prompt: &str,
            options: &CompletionOptions,
        ) -> edgequake_llm::Result<LLMResponse> {
            self.chat(&[ChatMessage::user(prompt)], Some(options)).await
        }

        async fn chat(
            &self,
            _messages: &[ChatMessage],
            _options: Option<&CompletionOptions>,
        ) -> edgequake_llm::Result<LLMResponse> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.hang {
                std::future::pending::<()>().await;
            }
            if n < self.failures {
                return Err(LlmError::ApiError("503 Service Unavailable".into()));
            }
            Ok(LLMResponse::new(r#"[{"ok": true}]"#, "flaky-1").with_usage(10, 5))
        }
    }

    fn client(provider: Arc<FlakyProvider>, max_retries: u32, timeout: Duration) -> VisionClient {
        let settings = VisionSettings {
            max_pages: 1,
            max_rendered_pixels: 100,
            temperature: 0.0,
            max_tokens: 64,
            max_retries,
            retry_backoff_ms: 1,
            timeout,
        };
        VisionClient::new(provider, "flaky", settings)
    }

    fn messages() -> Vec<ChatMessage> {
        vec![ChatMessage::user("extract")]
    }

    #[test]
    fn settings_follow_config() {
        let config = PipelineConfig::builder(".")
            .provider("openai")
            .max_pages(4)
            .max_retries(1)
            .extraction_timeout_secs(42)
            .build()
            .unwrap();
        let s = VisionSettings::from_config(&config);
        assert_eq!(s.max_pages, 4);
        assert_eq!(s.max_retries, 1);
        assert_eq!(s.timeout, Duration::from_secs(42));
    }

    #[test]
    fn options_carry_sampling_knobs() {
        let config = PipelineConfig::builder(".").build().unwrap();
        let opts = VisionSettings::from_config(&config).options();
        assert_eq!(opts.temperature, Some(0.0));
        assert_eq!(opts.max_tokens, Some(8192));
    }

    #[test]
    fn retry_delay_doubles_then_caps() {
        assert_eq!(retry_delay(500, 1), Duration::from_millis(500));
        assert_eq!(retry_delay(500, 2), Duration::from_millis(1000));
        assert_eq!(retry_delay(500, 3), Duration::from_millis(2000));
        assert_eq!(retry_delay(500, 40), MAX_RETRY_DELAY);
        assert_eq!(retry_delay(500, 64), MAX_RETRY_DELAY);
        assert_eq!(retry_delay(u64::MAX, u32::MAX), MAX_RETRY_DELAY);
    }

    #[tokio::test]
    async fn transient_errors_are_retried_until_success() {
        let provider = FlakyProvider::failing(2);
        let client = client(provider.clone(), 3, Duration::from_secs(5));

        let reply = client.chat_with_retry(&messages()).await.unwrap();
        assert_eq!(reply, r#"[{"ok": true}]"#);
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let provider = FlakyProvider::failing(u32::MAX);
        let client = client(provider.clone(), 2, Duration::from_secs(5));

        let err = client.chat_with_retry(&messages()).await.unwrap_err();
        assert!(matches!(err, DocumentError::Generation { .. }), "{err:?}");
        assert!(err.to_string().contains("503"));
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn hung_provider_times_out_each_attempt() {
        let provider = FlakyProvider::hanging();
        let client = client(provider.clone(), 1, Duration::from_millis(50));

        let err = client.chat_with_retry(&messages()).await.unwrap_err();
        assert!(matches!(err, DocumentError::Timeout { .. }), "{err:?}");
        assert_eq!(provider.calls(), 2);
    }
}
