//! Groq completion provider using the OpenAI-compatible chat completions API.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::completion::{CompletionProvider, GenerationOptions, Message};
use crate::config::{DEFAULT_COMPLETION_BASE_URL, RagConfig};
use crate::error::{RagError, Result};
use crate::retry::{RetryPolicy, with_timeout};

/// Environment variable holding the Groq API key.
pub const GROQ_API_KEY_VAR: &str = "GROQ_API_KEY";

const PROVIDER: &str = "Groq";

/// A [`CompletionProvider`] backed by Groq (or any OpenAI-compatible
/// `/chat/completions` endpoint).
///
/// Construction fails with [`RagError::CredentialMissing`] when no API key is
/// available, so a misconfigured deployment stops at startup instead of at
/// the first question.
///
/// # Example
///
/// ```rust,ignore
/// use admit_rag::GroqCompletionProvider;
///
/// let llm = GroqCompletionProvider::from_env("llama-3.1-8b-instant")?;
/// ```
pub struct GroqCompletionProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    timeout: Duration,
    retry: RetryPolicy,
}

impl std::fmt::Debug for GroqCompletionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroqCompletionProvider")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl GroqCompletionProvider {
    /// Create a provider with the given API key and model.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Self::missing_credential());
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: DEFAULT_COMPLETION_BASE_URL.to_string(),
            model: model.into(),
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        })
    }

    /// Create a provider using the `GROQ_API_KEY` environment variable.
    pub fn from_env(model: impl Into<String>) -> Result<Self> {
        let api_key = std::env::var(GROQ_API_KEY_VAR).map_err(|_| Self::missing_credential())?;
        Self::new(api_key, model)
    }

    /// Create a provider from the pipeline configuration and `GROQ_API_KEY`.
    pub fn from_config(config: &RagConfig) -> Result<Self> {
        Ok(Self::from_env(&config.completion_model_id)?
            .with_base_url(&config.completion_base_url)
            .with_timeout(config.request_timeout())
            .with_retry(RetryPolicy::new(config.max_retries)))
    }

    /// Point the provider at another OpenAI-compatible API base.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the retry policy for transient failures.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn missing_credential() -> RagError {
        RagError::CredentialMissing { provider: PROVIDER.into(), variable: GROQ_API_KEY_VAR.into() }
    }

    fn unavailable(message: impl Into<String>) -> RagError {
        RagError::GenerationUnavailable { provider: PROVIDER.into(), message: message.into() }
    }

    async fn request(&self, body: &ChatRequest<'_>) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!(provider = PROVIDER, %url, model = %self.model, "completion request");

        let response =
            self.client.post(&url).bearer_auth(&self.api_key).json(body).send().await.map_err(
                |e| {
                    error!(provider = PROVIDER, error = %e, "request failed");
                    Self::unavailable(format!("request failed: {e}"))
                },
            )?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            error!(provider = PROVIDER, %status, "API error");
            return Err(Self::unavailable(format!("API returned {status}: {detail}")));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "failed to parse response");
            Self::unavailable(format!("failed to parse response: {e}"))
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Self::unavailable("response has no message content"))
    }
}

// ── Chat completions request/response types ────────────────────────

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

#[async_trait]
impl CompletionProvider for GroqCompletionProvider {
    async fn complete(&self, messages: &[Message], options: &GenerationOptions) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            messages,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            stream: false,
        };

        self.retry
            .run("completion request", || {
                with_timeout("completion request", self.timeout, self.request(&body))
            })
            .await
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}
