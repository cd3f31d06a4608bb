//! Embedding provider trait for generating vector embeddings from text.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::RagConfig;
use crate::error::Result;
use crate::hashing::HashingEmbeddingProvider;
use crate::openai::OpenAIEmbeddingProvider;

/// A provider that generates vector embeddings from text input.
///
/// Implementations wrap specific embedding backends (a local model, an
/// OpenAI-compatible endpoint, etc.) behind a unified async interface. The
/// same input must always produce the same vector for a given model. The
/// default [`embed_batch`](EmbeddingProvider::embed_batch) implementation
/// calls [`embed`](EmbeddingProvider::embed) sequentially; backends that
/// support native batching should override it.
///
/// # Example
///
/// ```rust,ignore
/// use admit_rag::EmbeddingProvider;
///
/// let provider = MyEmbeddingProvider::new();
/// let embedding = provider.embed("hello world").await?;
/// assert_eq!(embedding.len(), provider.dimensions());
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs.
    ///
    /// Output order matches input order. The default implementation calls
    /// [`embed`](EmbeddingProvider::embed) sequentially for each input.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;

    /// Return the identity of the embedding model.
    ///
    /// Vectors from different models are never mixed in one index.
    fn model_id(&self) -> &str;
}

/// Build the embedding provider selected by `config`.
///
/// With `embedding_base_url` set, an [`OpenAIEmbeddingProvider`] requesting
/// [`RagConfig::remote_embedding_model_id`]; otherwise the local
/// [`HashingEmbeddingProvider`], which only accepts its own model id.
///
/// # Errors
///
/// Returns [`RagError::ConfigError`](crate::RagError::ConfigError) if the
/// configured model cannot be served by the selected provider.
pub fn embedding_provider_for(config: &RagConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let provider: Arc<dyn EmbeddingProvider> = match config.embedding_base_url {
        Some(_) => Arc::new(OpenAIEmbeddingProvider::from_config(config)?),
        None => Arc::new(HashingEmbeddingProvider::from_config(config)?),
    };
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_REMOTE_EMBEDDING_MODEL;
    use crate::error::RagError;

    #[test]
    fn default_config_uses_local_hashing() {
        let provider = embedding_provider_for(&RagConfig::default()).unwrap();
        assert_eq!(provider.model_id(), "local/feature-hash-384");
        assert_eq!(provider.dimensions(), 384);
    }

    #[test]
    fn remote_url_requests_minilm_by_default() {
        let config =
            RagConfig::builder().embedding_base_url("http://localhost:8080/v1").build().unwrap();
        let provider = embedding_provider_for(&config).unwrap();
        assert_eq!(provider.model_id(), DEFAULT_REMOTE_EMBEDDING_MODEL);
    }

    #[test]
    fn remote_url_keeps_a_named_model() {
        let config = RagConfig::builder()
            .embedding_base_url("http://localhost:8080/v1")
            .embedding_model_id("BAAI/bge-small-en-v1.5")
            .build()
            .unwrap();
        assert_eq!(embedding_provider_for(&config).unwrap().model_id(), "BAAI/bge-small-en-v1.5");
    }

    #[test]
    fn remote_model_without_url_is_rejected() {
        let config = RagConfig::builder()
            .embedding_model_id("sentence-transformers/all-MiniLM-L6-v2")
            .build()
            .unwrap();
        let err = embedding_provider_for(&config).err().unwrap();
        assert!(matches!(err, RagError::ConfigError(_)), "unexpected error: {err}");
    }
}
