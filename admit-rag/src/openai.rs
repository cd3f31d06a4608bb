//! Embedding provider for OpenAI-compatible embeddings APIs.
//!
//! Works against OpenAI itself and against self-hosted servers exposing the
//! same `/embeddings` route (text-embeddings-inference, Ollama, vLLM), which is
//! how `sentence-transformers/all-MiniLM-L6-v2` is usually served.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::config::RagConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::retry::{RetryPolicy, with_timeout};

/// The default OpenAI API base.
pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// Environment variable holding the embeddings API key.
pub const EMBEDDING_API_KEY_VAR: &str = "ADMIT_EMBEDDING_API_KEY";

const PROVIDER: &str = "OpenAI";

/// An [`EmbeddingProvider`] backed by an OpenAI-compatible embeddings API.
///
/// Uses `reqwest` to call `{base_url}/embeddings` directly. Each request is
/// bounded by a timeout and transient failures (connection errors, timeouts,
/// HTTP 429 and 5xx) are retried according to the [`RetryPolicy`].
///
/// # Example
///
/// ```rust,ignore
/// use admit_rag::OpenAIEmbeddingProvider;
///
/// let provider = OpenAIEmbeddingProvider::new(
///     "http://localhost:8080/v1",
///     "sentence-transformers/all-MiniLM-L6-v2",
///     384,
/// )?;
/// let embedding = provider.embed("hostel fee").await?;
/// ```
pub struct OpenAIEmbeddingProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    dimensions: usize,
    batch_size: usize,
    timeout: Duration,
    retry: RetryPolicy,
}

impl OpenAIEmbeddingProvider {
    /// Create a provider for `model` served at `base_url`.
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        dimensions: usize,
    ) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(RagError::ConfigError("embedding base URL must not be empty".into()));
        }
        if dimensions == 0 {
            return Err(RagError::ConfigError(
                "embedding dimensions must be greater than zero".into(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
            api_key: None,
            model: model.into(),
            dimensions,
            batch_size: 64,
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        })
    }

    /// Create a provider from the pipeline configuration.
    ///
    /// Requests [`RagConfig::remote_embedding_model_id`], so the default
    /// config asks for `all-MiniLM-L6-v2`. Reads an optional API key from
    /// `ADMIT_EMBEDDING_API_KEY`; self-hosted endpoints usually need none.
    pub fn from_config(config: &RagConfig) -> Result<Self> {
        let base_url = config.embedding_base_url.clone().ok_or_else(|| {
            RagError::ConfigError("embedding_base_url is required for a remote embedder".into())
        })?;
        let mut provider =
            Self::new(base_url, config.remote_embedding_model_id(), config.embedding_dimensions)?
                .with_batch_size(config.embedding_batch_size)
                .with_timeout(config.request_timeout())
                .with_retry(RetryPolicy::new(config.max_retries));
        if let Ok(key) = std::env::var(EMBEDDING_API_KEY_VAR) {
            if !key.is_empty() {
                provider = provider.with_api_key(key);
            }
        }
        Ok(provider)
    }

    /// Send `Authorization: Bearer <key>` with each request.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the maximum number of inputs per request.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
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

    fn unavailable(message: impl Into<String>) -> RagError {
        RagError::ModelUnavailable { provider: PROVIDER.into(), message: message.into() }
    }

    async fn request(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let request_body = EmbeddingRequest { model: &self.model, input: texts.to_vec() };

        let mut request =
            self.client.post(format!("{}/embeddings", self.base_url)).json(&request_body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "request failed");
            Self::unavailable(format!("request failed: {e}"))
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "failed to read response");
            Self::unavailable(format!("failed to read response: {e}"))
        })?;
        if !status.is_success() {
            error!(provider = PROVIDER, %status, "API error");
            return Err(status_error(status, &body));
        }

        decode_embeddings(&body, texts.len(), self.dimensions, &self.model)
    }
}

/// Classify a non-success response.
///
/// 429 and 5xx are transient ([`RagError::ModelUnavailable`]); any other
/// status means the request itself is wrong (bad model name, bad key,
/// malformed input) and maps to [`RagError::ConfigError`].
fn status_error(status: reqwest::StatusCode, body: &str) -> RagError {
    let detail = serde_json::from_str::<ErrorResponse>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.to_string());
    let message = format!("API returned {status}: {detail}");
    if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        OpenAIEmbeddingProvider::unavailable(message)
    } else {
        RagError::ConfigError(format!("embedding request rejected: {message}"))
    }
}

/// Parse an embeddings response, restore input order and check its shape.
fn decode_embeddings(
    body: &str,
    expected: usize,
    dimensions: usize,
    model: &str,
) -> Result<Vec<Vec<f32>>> {
    let response: EmbeddingResponse = serde_json::from_str(body).map_err(|e| {
        error!(provider = PROVIDER, error = %e, "failed to parse response");
        OpenAIEmbeddingProvider::unavailable(format!("failed to parse response: {e}"))
    })?;

    let mut data = response.data;
    // Servers are not required to keep input order.
    data.sort_by_key(|d| d.index);
    let vectors: Vec<Vec<f32>> = data.into_iter().map(|d| d.embedding).collect();

    if vectors.len() != expected {
        return Err(OpenAIEmbeddingProvider::unavailable(format!(
            "expected {expected} embeddings, got {}",
            vectors.len()
        )));
    }
    if let Some(bad) = vectors.iter().find(|v| v.len() != dimensions) {
        return Err(OpenAIEmbeddingProvider::unavailable(format!(
            "model '{model}' returned {} dimensions, expected {dimensions}",
            bad.len()
        )));
    }

    Ok(vectors)
}

// ── OpenAI API request/response types ──────────────────────────────

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

// ── EmbeddingProvider implementation ───────────────────────────────

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!(provider = PROVIDER, text_len = text.len(), "embedding single text");

        let results = self.embed_batch(&[text]).await?;
        results.into_iter().next().ok_or_else(|| Self::unavailable("API returned empty response"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            provider = PROVIDER,
            batch_size = texts.len(),
            model = %self.model,
            "embedding batch"
        );

        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let embedded = self
                .retry
                .run("embedding request", || {
                    with_timeout("embedding request", self.timeout, self.request(batch))
                })
                .await?;
            vectors.extend(embedded);
        }
        Ok(vectors)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    #[test]
    fn rejects_empty_base_url_and_zero_dimensions() {
        assert!(OpenAIEmbeddingProvider::new("", "m", 384).is_err());
        assert!(OpenAIEmbeddingProvider::new("http://localhost:8080/v1", "m", 0).is_err());
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let provider = OpenAIEmbeddingProvider::new("http://localhost:8080/v1/", "m", 3).unwrap();
        assert_eq!(provider.base_url, "http://localhost:8080/v1");
        assert_eq!(provider.model_id(), "m");
        assert_eq!(provider.dimensions(), 3);
    }

    #[test]
    fn from_config_requires_base_url() {
        let config = RagConfig::default();
        assert!(OpenAIEmbeddingProvider::from_config(&config).is_err());

        let config = RagConfig::builder()
            .embedding_base_url("http://localhost:8080/v1")
            .embedding_model_id("sentence-transformers/all-MiniLM-L6-v2")
            .embedding_batch_size(16)
            .build()
            .unwrap();
        let provider = OpenAIEmbeddingProvider::from_config(&config).unwrap();
        assert_eq!(provider.batch_size, 16);
        assert_eq!(provider.model_id(), "sentence-transformers/all-MiniLM-L6-v2");
    }

    #[test]
    fn response_is_reordered_by_index() {
        let body = r#"{"data":[{"index":1,"embedding":[0.0,1.0]},{"index":0,"embedding":[1.0,0.0]}]}"#;
        let vectors = decode_embeddings(body, 2, 2, "m").unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn response_shape_is_checked() {
        let body = r#"{"data":[{"index":0,"embedding":[1.0,0.0]}]}"#;
        let err = decode_embeddings(body, 2, 2, "m").unwrap_err();
        assert!(matches!(err, RagError::ModelUnavailable { .. }), "unexpected error: {err}");

        let err = decode_embeddings(body, 1, 3, "m").unwrap_err();
        assert!(err.to_string().contains("returned 2 dimensions"), "unexpected error: {err}");

        let err = decode_embeddings("<html>bad gateway</html>", 1, 2, "m").unwrap_err();
        assert!(err.is_transient());
    }

    #[test]
    fn status_classification() {
        use reqwest::StatusCode;

        let overloaded = status_error(StatusCode::TOO_MANY_REQUESTS, "slow down");
        assert!(matches!(overloaded, RagError::ModelUnavailable { .. }));
        let down = status_error(StatusCode::SERVICE_UNAVAILABLE, "");
        assert!(down.is_transient());

        let bad_model = status_error(
            StatusCode::NOT_FOUND,
            r#"{"error":{"message":"model 'x' not found"}}"#,
        );
        assert!(matches!(bad_model, RagError::ConfigError(_)));
        assert!(bad_model.to_string().contains("model 'x' not found"));
        assert!(status_error(StatusCode::UNAUTHORIZED, "no key").is_configuration());
    }

    /// Serve `/embeddings` on a local port, recording the batch size of each
    /// request and answering with vectors `[i, 1, 0]` in reverse order.
    async fn serve_embeddings() -> (String, Arc<Mutex<Vec<usize>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}/v1", listener.local_addr().unwrap());
        let batches = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&batches);

        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else { return };
                let batches = Arc::clone(&recorded);
                tokio::spawn(async move {
                    let mut buf = Vec::new();
                    let mut chunk = [0u8; 4096];
                    loop {
                        // Read one request: headers, then Content-Length bytes.
                        let (head_end, length) = loop {
                            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                                let head = String::from_utf8_lossy(&buf[..pos]).to_ascii_lowercase();
                                let length = head
                                    .lines()
                                    .find_map(|l| l.strip_prefix("content-length:"))
                                    .and_then(|v| v.trim().parse::<usize>().ok())
                                    .unwrap_or(0);
                                break (pos + 4, length);
                            }
                            let n = socket.read(&mut chunk).await.unwrap_or(0);
                            if n == 0 {
                                return;
                            }
                            buf.extend_from_slice(&chunk[..n]);
                        };
                        while buf.len() < head_end + length {
                            let n = socket.read(&mut chunk).await.unwrap_or(0);
                            if n == 0 {
                                return;
                            }
                            buf.extend_from_slice(&chunk[..n]);
                        }

                        let request: serde_json::Value =
                            serde_json::from_slice(&buf[head_end..head_end + length]).unwrap();
                        buf.drain(..head_end + length);
                        let inputs = request["input"].as_array().map_or(0, Vec::len);
                        batches.lock().unwrap().push(inputs);

                        let data: Vec<serde_json::Value> = (0..inputs)
                            .rev()
                            .map(|i| serde_json::json!({"index": i, "embedding": [i as f32, 1.0, 0.0]}))
                            .collect();
                        let payload = serde_json::json!({ "data": data }).to_string();
                        let response = format!(
                            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\n\r\n{payload}",
                            payload.len()
                        );
                        if socket.write_all(response.as_bytes()).await.is_err() {
                            return;
                        }
                    }
                });
            }
        });

        (base_url, batches)
    }

    #[tokio::test]
    async fn batches_are_split_and_reassembled_in_order() {
        let (base_url, batches) = serve_embeddings().await;
        let provider = OpenAIEmbeddingProvider::new(base_url, "m", 3)
            .unwrap()
            .with_batch_size(2)
            .with_retry(RetryPolicy::none());

        let texts = ["a", "b", "c", "d", "e"];
        let vectors = provider.embed_batch(&texts).await.unwrap();

        assert_eq!(*batches.lock().unwrap(), vec![2, 2, 1]);
        assert_eq!(vectors.len(), 5);
        let firsts: Vec<f32> = vectors.iter().map(|v| v[0]).collect();
        assert_eq!(firsts, vec![0.0, 1.0, 0.0, 1.0, 0.0]);
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_model_unavailable() {
        let provider = OpenAIEmbeddingProvider::new("http://127.0.0.1:9/v1", "m", 3)
            .unwrap()
            .with_retry(RetryPolicy::none())
            .with_timeout(Duration::from_secs(5));
        let err = provider.embed("hello").await.unwrap_err();
        assert!(err.is_transient(), "unexpected error: {err}");
    }
}
