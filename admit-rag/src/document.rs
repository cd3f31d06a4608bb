//! Data types for documents, chunks, and search results.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A source document containing text content and metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique identifier for the document (its path relative to the corpus root).
    pub id: String,
    /// The text content of the document.
    pub text: String,
    /// Key-value metadata associated with the document.
    pub metadata: HashMap<String, String>,
    /// Optional URI pointing to the original source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_uri: Option<String>,
}

impl Document {
    /// Create a document with no metadata.
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self { id: id.into(), text: text.into(), metadata: HashMap::new(), source_uri: None }
    }
}

/// A contiguous window of a [`Document`]'s text.
///
/// Offsets count `char`s and are half-open: the chunk text equals the
/// document's chars in `start_offset..end_offset`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Unique identifier for the chunk, `{document_id}#{sequence_index}`.
    pub id: String,
    /// The text content of the chunk.
    pub text: String,
    /// The ID of the parent [`Document`].
    pub document_id: String,
    /// First char of the window.
    pub start_offset: usize,
    /// One past the last char of the window.
    pub end_offset: usize,
    /// Position among the chunks of the same document.
    pub sequence_index: usize,
    /// Metadata inherited from the parent document plus `chunk_index`.
    pub metadata: HashMap<String, String>,
}

impl Chunk {
    /// Number of chars covered by this chunk.
    pub fn len(&self) -> usize {
        self.end_offset - self.start_offset
    }

    /// Whether the chunk covers no text.
    pub fn is_empty(&self) -> bool {
        self.start_offset == self.end_offset
    }
}

/// A [`Chunk`] paired with its vector embedding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddedChunk {
    /// The embedded chunk.
    pub chunk: Chunk,
    /// The vector embedding for the chunk's text.
    pub embedding: Vec<f32>,
}

/// A retrieved [`Chunk`] paired with a relevance score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// Cosine similarity to the query (higher is more relevant).
    pub score: f32,
}

/// The outcome of one question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Answer {
    /// The answer text, as returned by the completion service.
    pub text: String,
    /// The chunks the answer was grounded on, most similar first.
    pub sources: Vec<SearchResult>,
    /// `false` when no context was retrieved and the completion service was
    /// not consulted.
    pub grounded: bool,
}
