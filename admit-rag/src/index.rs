//! Read-only vector index using cosine similarity.
//!
//! A [`VectorIndex`] is built once from the embedded corpus and never
//! modified afterwards, so any number of tasks can search it concurrently
//! through a shared reference without locking.

use tracing::info;

use crate::document::{Chunk, EmbeddedChunk, SearchResult};
use crate::error::{RagError, Result};

/// An exact nearest-neighbour index over embedded chunks.
///
/// Search is a linear scan scoring every entry with cosine similarity, so
/// recall is exact. Entries keep their insertion order, which decides ties.
///
/// # Example
///
/// ```rust,ignore
/// use admit_rag::VectorIndex;
///
/// let index = VectorIndex::build("local/feature-hash-384", 384, embedded_chunks)?;
/// let results = index.search(&query_embedding, 3)?;
/// ```
#[derive(Debug, Clone)]
pub struct VectorIndex {
    model_id: String,
    dimensions: usize,
    entries: Vec<EmbeddedChunk>,
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

impl VectorIndex {
    /// Build an index from embedded chunks produced by one embedding model.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::VectorStoreError`] if `dimensions` is zero or any
    /// embedding does not have exactly `dimensions` components.
    pub fn build(
        model_id: impl Into<String>,
        dimensions: usize,
        entries: Vec<EmbeddedChunk>,
    ) -> Result<Self> {
        let model_id = model_id.into();
        if dimensions == 0 {
            return Err(RagError::VectorStoreError {
                message: "index dimensionality must be greater than zero".to_string(),
            });
        }
        if let Some(bad) = entries.iter().find(|e| e.embedding.len() != dimensions) {
            return Err(RagError::VectorStoreError {
                message: format!(
                    "chunk '{}' has {} dimensions, index expects {dimensions} (model '{model_id}')",
                    bad.chunk.id,
                    bad.embedding.len()
                ),
            });
        }

        info!(model = %model_id, dimensions, chunk_count = entries.len(), "built vector index");
        Ok(Self { model_id, dimensions, entries })
    }

    /// Search for the `top_k` chunks most similar to `query`.
    ///
    /// Returns results ordered by descending cosine similarity; equal scores
    /// keep insertion order. An empty index or `top_k == 0` yields an empty
    /// `Vec`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::VectorStoreError`] if `query` does not match the
    /// index dimensionality.
    pub fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchResult>> {
        if query.len() != self.dimensions {
            return Err(RagError::VectorStoreError {
                message: format!(
                    "query has {} dimensions, index expects {}",
                    query.len(),
                    self.dimensions
                ),
            });
        }
        if top_k == 0 || self.entries.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (i, cosine_similarity(&entry.embedding, query)))
            .collect();

        // `sort_by` is stable, so ties stay in insertion order.
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .map(|(i, score)| SearchResult { chunk: self.entries[i].chunk.clone(), score })
            .collect())
    }

    /// Identity of the embedding model that produced every vector.
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Dimensionality shared by every vector.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Number of indexed chunks.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index holds no chunks.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Indexed chunks in insertion order.
    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.entries.iter().map(|e| &e.chunk)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn entry(id: &str, embedding: Vec<f32>) -> EmbeddedChunk {
        EmbeddedChunk {
            chunk: Chunk {
                id: id.to_string(),
                text: id.to_string(),
                document_id: "doc".to_string(),
                start_offset: 0,
                end_offset: id.chars().count(),
                sequence_index: 0,
                metadata: HashMap::new(),
            },
            embedding,
        }
    }

    #[test]
    fn cosine_of_zero_vector_is_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert!((cosine_similarity(&[2.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn search_orders_by_descending_similarity() {
        let index = VectorIndex::build(
            "test",
            2,
            vec![
                entry("far", vec![0.0, 1.0]),
                entry("near", vec![1.0, 0.1]),
                entry("mid", vec![1.0, 1.0]),
            ],
        )
        .unwrap();

        let results = index.search(&[1.0, 0.0], 3).unwrap();
        let ids: Vec<&str> = results.iter().map(|r| r.chunk.id.as_str()).collect();
        assert_eq!(ids, vec!["near", "mid", "far"]);

        let top1 = index.search(&[1.0, 0.0], 1).unwrap();
        assert_eq!(top1.len(), 1);
        assert_eq!(top1[0].chunk.id, "near");
    }

    #[test]
    fn ties_keep_insertion_order() {
        let index = VectorIndex::build(
            "test",
            2,
            vec![
                entry("a", vec![1.0, 0.0]),
                entry("b", vec![2.0, 0.0]),
                entry("c", vec![0.0, 1.0]),
                entry("d", vec![3.0, 0.0]),
            ],
        )
        .unwrap();

        let ids: Vec<String> =
            index.search(&[1.0, 0.0], 4).unwrap().into_iter().map(|r| r.chunk.id).collect();
        assert_eq!(ids, vec!["a", "b", "d", "c"]);
    }

    #[test]
    fn empty_index_returns_empty() {
        let index = VectorIndex::build("test", 3, Vec::new()).unwrap();
        assert!(index.is_empty());
        assert!(index.search(&[1.0, 0.0, 0.0], 3).unwrap().is_empty());
    }

    #[test]
    fn fewer_entries_than_k() {
        let index = VectorIndex::build("test", 2, vec![entry("only", vec![1.0, 0.0])]).unwrap();
        assert_eq!(index.search(&[0.5, 0.5], 10).unwrap().len(), 1);
        assert!(index.search(&[0.5, 0.5], 0).unwrap().is_empty());
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let err = VectorIndex::build(
            "test",
            2,
            vec![entry("ok", vec![1.0, 0.0]), entry("bad", vec![1.0, 0.0, 0.0])],
        )
        .unwrap_err();
        assert!(matches!(err, RagError::VectorStoreError { .. }));

        let index = VectorIndex::build("test", 2, vec![entry("ok", vec![1.0, 0.0])]).unwrap();
        assert!(index.search(&[1.0], 1).is_err());
    }
}
