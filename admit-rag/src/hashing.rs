//! Local feature-hashing embedding provider.
//!
//! [`HashingEmbeddingProvider`] needs no model download and no network. Each
//! lowercased alphanumeric token is hashed into one of `D` buckets with a
//! hash-derived sign, and the resulting vector is L2-normalised. Texts that
//! share words therefore get a positive cosine similarity, which is enough
//! lexical signal for a small, keyword-heavy corpus.

use async_trait::async_trait;
use tracing::debug;

use crate::config::{LOCAL_EMBEDDING_MODEL_PREFIX, RagConfig};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

/// A deterministic, offline [`EmbeddingProvider`].
///
/// # Example
///
/// ```rust,ignore
/// use admit_rag::{EmbeddingProvider, HashingEmbeddingProvider};
///
/// let provider = HashingEmbeddingProvider::new(384)?;
/// let a = provider.embed("B.Tech fee").await?;
/// assert_eq!(a, provider.embed("b tech FEE").await?);
/// ```
#[derive(Debug, Clone)]
pub struct HashingEmbeddingProvider {
    dimensions: usize,
    model_id: String,
}

impl HashingEmbeddingProvider {
    /// Create a provider producing vectors of `dimensions` components.
    pub fn new(dimensions: usize) -> Result<Self> {
        if dimensions == 0 {
            return Err(RagError::ConfigError(
                "embedding dimensions must be greater than zero".to_string(),
            ));
        }
        Ok(Self { dimensions, model_id: format!("{LOCAL_EMBEDDING_MODEL_PREFIX}-{dimensions}") })
    }

    /// Create the provider described by `config`.
    ///
    /// `embedding_model_id` must name this provider: `local/feature-hash`,
    /// optionally followed by `-{embedding_dimensions}`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] for any other model id, or a
    /// dimension suffix that disagrees with `embedding_dimensions`.
    pub fn from_config(config: &RagConfig) -> Result<Self> {
        let provider = Self::new(config.embedding_dimensions)?;
        let id = config.embedding_model_id.as_str();
        if id != LOCAL_EMBEDDING_MODEL_PREFIX && id != provider.model_id {
            return Err(RagError::ConfigError(format!(
                "embedding model '{id}' is not available locally (expected '{}'); \
                 set embedding_base_url to use a remote model",
                provider.model_id
            )));
        }
        Ok(provider)
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut emb = vec![0.0f32; self.dimensions];
        for token in tokens(text) {
            let hash = token_hash(&token);
            let bucket = (hash % self.dimensions as u64) as usize;
            let sign = if (hash >> 63) == 0 { 1.0 } else { -1.0 };
            emb[bucket] += sign;
        }
        // L2-normalise so cosine similarity is just the dot product.
        let norm: f32 = emb.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            emb.iter_mut().for_each(|x| *x /= norm);
        }
        emb
    }
}

/// Lowercased runs of alphanumeric chars.
fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

/// FNV-1a, then a final avalanche so nearby tokens spread across buckets.
fn token_hash(token: &str) -> u64 {
    let mut hash = 0xcbf2_9ce4_8422_2325u64;
    for b in token.bytes() {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash ^= hash >> 33;
    hash = hash.wrapping_mul(0xff51_afd7_ed55_8ccd);
    hash ^= hash >> 33;
    hash
}

#[async_trait]
impl EmbeddingProvider for HashingEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.vectorize(text))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        debug!(provider = "FeatureHash", batch_size = texts.len(), "embedding batch");
        Ok(texts.iter().map(|t| self.vectorize(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}
