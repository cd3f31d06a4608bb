//! Configuration for the RAG pipeline.
//!
//! A [`RagConfig`] can be built in code through [`RagConfig::builder()`],
//! read from a TOML file with [`RagConfig::from_toml_file`], and adjusted with
//! `ADMIT_*` environment variables through [`RagConfig::apply_env_overrides`].
//! Credentials are never part of the config; providers read them from the
//! environment.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Default Groq OpenAI-compatible API base.
pub const DEFAULT_COMPLETION_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Default completion model.
pub const DEFAULT_COMPLETION_MODEL: &str = "llama-3.1-8b-instant";

/// Default embedding dimensionality (matches `all-MiniLM-L6-v2`).
pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 384;

/// Model id prefix of the local feature-hashing embedder.
pub const LOCAL_EMBEDDING_MODEL_PREFIX: &str = "local/feature-hash";

/// Model requested from `embedding_base_url` when no remote model is named.
pub const DEFAULT_REMOTE_EMBEDDING_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";

/// How documents are split into chunks.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ChunkingStrategy {
    /// Fixed character windows with exact overlap.
    #[default]
    Fixed,
    /// Whole sentences packed into windows, overlapping by trailing sentences.
    Sentence,
}

impl FromStr for ChunkingStrategy {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fixed" => Ok(Self::Fixed),
            "sentence" => Ok(Self::Sentence),
            other => Err(RagError::ConfigError(format!(
                "unknown chunking strategy '{other}' (expected 'fixed' or 'sentence')"
            ))),
        }
    }
}

/// Configuration parameters for the RAG pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RagConfig {
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Number of overlapping characters between consecutive chunks.
    pub chunk_overlap: usize,
    /// Chunking strategy.
    pub chunking: ChunkingStrategy,
    /// Number of top results to retrieve per question.
    pub top_k: usize,
    /// Results scoring below this are dropped. `None` keeps every result.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity_threshold: Option<f32>,
    /// Identity of the embedding model.
    pub embedding_model_id: String,
    /// OpenAI-compatible embeddings endpoint. `None` selects the local
    /// feature-hashing embedder.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_base_url: Option<String>,
    /// Dimensionality of the embedding vectors.
    pub embedding_dimensions: usize,
    /// Maximum number of texts per embedding request.
    pub embedding_batch_size: usize,
    /// Identity of the completion model.
    pub completion_model_id: String,
    /// OpenAI-compatible chat completions API base.
    pub completion_base_url: String,
    /// Sampling temperature for answers.
    pub temperature: f32,
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
    /// Directory holding the corpus.
    pub corpus_path: PathBuf,
    /// File extensions read from the corpus directory.
    pub corpus_extensions: Vec<String>,
    /// Timeout applied to each network call, in seconds.
    pub request_timeout_secs: u64,
    /// Retries after the first attempt for transient failures.
    pub max_retries: u32,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 600,
            chunk_overlap: 80,
            chunking: ChunkingStrategy::Fixed,
            top_k: 3,
            similarity_threshold: None,
            embedding_model_id: format!(
                "{LOCAL_EMBEDDING_MODEL_PREFIX}-{DEFAULT_EMBEDDING_DIMENSIONS}"
            ),
            embedding_base_url: None,
            embedding_dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
            embedding_batch_size: 64,
            completion_model_id: DEFAULT_COMPLETION_MODEL.to_string(),
            completion_base_url: DEFAULT_COMPLETION_BASE_URL.to_string(),
            temperature: 0.0,
            max_tokens: 512,
            corpus_path: PathBuf::from("vit"),
            corpus_extensions: vec!["txt".to_string(), "md".to_string()],
            request_timeout_secs: 30,
            max_retries: 2,
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// The per-call network timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Whether `embedding_model_id` names the local hashing embedder.
    pub fn uses_local_embedding_model(&self) -> bool {
        self.embedding_model_id.starts_with(LOCAL_EMBEDDING_MODEL_PREFIX)
    }

    /// The model to request from `embedding_base_url`.
    ///
    /// A local model id (the default) cannot be served remotely, so it falls
    /// back to [`DEFAULT_REMOTE_EMBEDDING_MODEL`].
    pub fn remote_embedding_model_id(&self) -> &str {
        if self.uses_local_embedding_model() {
            DEFAULT_REMOTE_EMBEDDING_MODEL
        } else {
            &self.embedding_model_id
        }
    }

    /// Read a config from a TOML file. Missing keys take their defaults.
    ///
    /// The result is not validated; call [`RagConfig::validate`] once all
    /// overrides are applied.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            RagError::ConfigError(format!("failed to read {}: {e}", path.display()))
        })?;
        toml::from_str(&raw)
            .map_err(|e| RagError::ConfigError(format!("invalid TOML in {}: {e}", path.display())))
    }

    /// Apply `ADMIT_*` environment variable overrides.
    ///
    /// Recognised: `ADMIT_CORPUS_PATH`, `ADMIT_CHUNK_SIZE`, `ADMIT_CHUNK_OVERLAP`,
    /// `ADMIT_CHUNKING`, `ADMIT_TOP_K`, `ADMIT_EMBEDDING_MODEL`,
    /// `ADMIT_EMBEDDING_URL`, `ADMIT_EMBEDDING_DIMENSIONS`,
    /// `ADMIT_COMPLETION_MODEL`, `ADMIT_COMPLETION_URL`, `ADMIT_TEMPERATURE`,
    /// `ADMIT_MAX_TOKENS`, `ADMIT_REQUEST_TIMEOUT_SECS`, `ADMIT_MAX_RETRIES`.
    pub fn apply_env_overrides(self) -> Result<Self> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(v) = lookup("ADMIT_CORPUS_PATH") {
            self.corpus_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("ADMIT_CHUNK_SIZE") {
            self.chunk_size = parse_var("ADMIT_CHUNK_SIZE", &v)?;
        }
        if let Some(v) = lookup("ADMIT_CHUNK_OVERLAP") {
            self.chunk_overlap = parse_var("ADMIT_CHUNK_OVERLAP", &v)?;
        }
        if let Some(v) = lookup("ADMIT_CHUNKING") {
            self.chunking = v.parse()?;
        }
        if let Some(v) = lookup("ADMIT_TOP_K") {
            self.top_k = parse_var("ADMIT_TOP_K", &v)?;
        }
        if let Some(v) = lookup("ADMIT_EMBEDDING_MODEL") {
            self.embedding_model_id = v;
        }
        if let Some(v) = lookup("ADMIT_EMBEDDING_URL") {
            self.embedding_base_url = Some(v);
        }
        if let Some(v) = lookup("ADMIT_EMBEDDING_DIMENSIONS") {
            self.embedding_dimensions = parse_var("ADMIT_EMBEDDING_DIMENSIONS", &v)?;
        }
        if let Some(v) = lookup("ADMIT_COMPLETION_MODEL") {
            self.completion_model_id = v;
        }
        if let Some(v) = lookup("ADMIT_COMPLETION_URL") {
            self.completion_base_url = v;
        }
        if let Some(v) = lookup("ADMIT_TEMPERATURE") {
            self.temperature = parse_var("ADMIT_TEMPERATURE", &v)?;
        }
        if let Some(v) = lookup("ADMIT_MAX_TOKENS") {
            self.max_tokens = parse_var("ADMIT_MAX_TOKENS", &v)?;
        }
        if let Some(v) = lookup("ADMIT_REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs = parse_var("ADMIT_REQUEST_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("ADMIT_MAX_RETRIES") {
            self.max_retries = parse_var("ADMIT_MAX_RETRIES", &v)?;
        }
        Ok(self)
    }

    /// Check that the parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if:
    /// - `chunk_size == 0` or `chunk_overlap >= chunk_size`
    /// - `top_k == 0` or `max_tokens == 0`
    /// - `temperature` is negative or not finite
    /// - `embedding_dimensions`, `embedding_batch_size` or
    ///   `request_timeout_secs` is zero
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RagError::ConfigError("chunk_size must be greater than zero".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::ConfigError(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.top_k == 0 {
            return Err(RagError::ConfigError("top_k must be greater than zero".to_string()));
        }
        if self.max_tokens == 0 {
            return Err(RagError::ConfigError("max_tokens must be greater than zero".to_string()));
        }
        if !self.temperature.is_finite() || self.temperature < 0.0 {
            return Err(RagError::ConfigError(format!(
                "temperature ({}) must be a non-negative number",
                self.temperature
            )));
        }
        if self.embedding_dimensions == 0 {
            return Err(RagError::ConfigError(
                "embedding_dimensions must be greater than zero".to_string(),
            ));
        }
        if self.embedding_batch_size == 0 {
            return Err(RagError::ConfigError(
                "embedding_batch_size must be greater than zero".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(RagError::ConfigError(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// A stable key identifying everything that shapes the built index and
    /// the answers. Two configs with the same fingerprint share one pipeline.
    pub fn fingerprint(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{self:?}"))
    }
}

fn parse_var<T: FromStr>(name: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| RagError::ConfigError(format!("invalid value for {name} ('{value}'): {e}")))
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the maximum chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the chunking strategy.
    pub fn chunking(mut self, strategy: ChunkingStrategy) -> Self {
        self.config.chunking = strategy;
        self
    }

    /// Set the number of top results to retrieve.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the minimum similarity threshold for filtering results.
    pub fn similarity_threshold(mut self, threshold: f32) -> Self {
        self.config.similarity_threshold = Some(threshold);
        self
    }

    /// Set the embedding model identity.
    pub fn embedding_model_id(mut self, id: impl Into<String>) -> Self {
        self.config.embedding_model_id = id.into();
        self
    }

    /// Use a remote OpenAI-compatible embeddings endpoint.
    pub fn embedding_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.embedding_base_url = Some(url.into());
        self
    }

    /// Set the embedding dimensionality.
    pub fn embedding_dimensions(mut self, dims: usize) -> Self {
        self.config.embedding_dimensions = dims;
        self
    }

    /// Set the maximum number of texts per embedding request.
    pub fn embedding_batch_size(mut self, size: usize) -> Self {
        self.config.embedding_batch_size = size;
        self
    }

    /// Set the completion model identity.
    pub fn completion_model_id(mut self, id: impl Into<String>) -> Self {
        self.config.completion_model_id = id.into();
        self
    }

    /// Set the chat completions API base.
    pub fn completion_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.completion_base_url = url.into();
        self
    }

    /// Set the sampling temperature.
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = temperature;
        self
    }

    /// Set the maximum number of generated tokens.
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.config.max_tokens = max_tokens;
        self
    }

    /// Set the corpus directory.
    pub fn corpus_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.corpus_path = path.into();
        self
    }

    /// Set the file extensions read from the corpus.
    pub fn corpus_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.corpus_extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// Set the per-call network timeout in seconds.
    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    /// Set the number of retries for transient failures.
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] under the conditions listed on
    /// [`RagConfig::validate`].
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
