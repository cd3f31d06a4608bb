//! Query-time retrieval: embed the question, search the index.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error};

use crate::document::SearchResult;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::index::VectorIndex;
use crate::retry::with_timeout;

/// Composes an [`EmbeddingProvider`] with a [`VectorIndex`].
///
/// The embedder must be the one that built the index; the retriever checks
/// the model identity when it is created.
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<VectorIndex>,
    similarity_threshold: Option<f32>,
    timeout: Duration,
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("model_id", &self.index.model_id())
            .field("chunks", &self.index.len())
            .field("similarity_threshold", &self.similarity_threshold)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Retriever {
    /// Create a retriever over `index`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::VectorStoreError`] if the embedder's model or
    /// dimensionality differs from the index's.
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, index: Arc<VectorIndex>) -> Result<Self> {
        if embedder.model_id() != index.model_id() || embedder.dimensions() != index.dimensions()
        {
            return Err(RagError::VectorStoreError {
                message: format!(
                    "embedder '{}' ({} dims) does not match index '{}' ({} dims)",
                    embedder.model_id(),
                    embedder.dimensions(),
                    index.model_id(),
                    index.dimensions()
                ),
            });
        }
        Ok(Self { embedder, index, similarity_threshold: None, timeout: Duration::from_secs(30) })
    }

    /// Drop results scoring below `threshold`.
    pub fn with_similarity_threshold(mut self, threshold: Option<f32>) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    /// Bound the query embedding call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The index searched by this retriever.
    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    /// Retrieve up to `top_k` chunks for `question`, most similar first.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmptyQuery`] for an empty or whitespace-only
    /// question without calling the embedder. Embedding failures and
    /// timeouts are returned as-is.
    pub async fn retrieve(&self, question: &str, top_k: usize) -> Result<Vec<SearchResult>> {
        let question = question.trim();
        if question.is_empty() {
            return Err(RagError::EmptyQuery);
        }

        let query_embedding =
            with_timeout("query embedding", self.timeout, self.embedder.embed(question))
                .await
                .map_err(|e| {
                    error!(error = %e, "embedding failed during query");
                    e
                })?;

        let results = self.index.search(&query_embedding, top_k)?;

        let results: Vec<SearchResult> = match self.similarity_threshold {
            Some(threshold) => results.into_iter().filter(|r| r.score >= threshold).collect(),
            None => results,
        };

        debug!(result_count = results.len(), top_k, "retrieval completed");
        Ok(results)
    }
}
