//! Document chunking strategies.
//!
//! This module provides the [`Chunker`] trait and two implementations:
//!
//! - [`FixedSizeChunker`] — sliding character window with exact overlap
//! - [`SentenceChunker`] — packs whole sentences, overlapping by trailing sentences
//!
//! Sizes and offsets count `char`s, never bytes, so a window cannot split a
//! multi-byte character.

use crate::config::{ChunkingStrategy, RagConfig};
use crate::document::{Chunk, Document};

/// A strategy for splitting documents into chunks.
///
/// Chunks carry text, offsets and metadata. Embeddings are attached later by
/// the pipeline.
pub trait Chunker: Send + Sync {
    /// Split a document into chunks.
    ///
    /// Returns an empty `Vec` if the document has empty text.
    fn chunk(&self, document: &Document) -> Vec<Chunk>;
}

/// Build the chunker selected by `config.chunking`.
pub fn chunker_for(config: &RagConfig) -> Box<dyn Chunker> {
    match config.chunking {
        ChunkingStrategy::Fixed => {
            Box::new(FixedSizeChunker::new(config.chunk_size, config.chunk_overlap))
        }
        ChunkingStrategy::Sentence => {
            Box::new(SentenceChunker::new(config.chunk_size, config.chunk_overlap))
        }
    }
}

/// Byte position of every char boundary in `text`, including `text.len()`.
fn char_boundaries(text: &str) -> Vec<usize> {
    let mut bounds: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    bounds.push(text.len());
    bounds
}

fn make_chunk(
    document: &Document,
    bounds: &[usize],
    sequence_index: usize,
    start: usize,
    end: usize,
) -> Chunk {
    let mut metadata = document.metadata.clone();
    metadata.insert("chunk_index".to_string(), sequence_index.to_string());
    Chunk {
        id: format!("{}#{sequence_index}", document.id),
        text: document.text[bounds[start]..bounds[end]].to_string(),
        document_id: document.id.clone(),
        start_offset: start,
        end_offset: end,
        sequence_index,
        metadata,
    }
}

/// Splits text into fixed-size windows by character count with a fixed overlap.
///
/// The window advances by `chunk_size - chunk_overlap` chars. The last window
/// may be shorter and is not padded; the sweep stops at the first window that
/// reaches the end of the text.
///
/// # Example
///
/// ```rust
/// use admit_rag::{Chunker, Document, FixedSizeChunker};
///
/// let chunker = FixedSizeChunker::new(10, 2);
/// let chunks = chunker.chunk(&Document::new("d", "abcdefghijklmnop"));
/// assert_eq!(chunks.len(), 2);
/// assert_eq!(chunks[1].text, "ijklmnop");
/// ```
#[derive(Debug, Clone)]
pub struct FixedSizeChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl FixedSizeChunker {
    /// Create a new `FixedSizeChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size` — maximum number of characters per chunk
    /// * `chunk_overlap` — number of overlapping characters between consecutive chunks
    ///
    /// [`RagConfig`] validation guarantees `chunk_overlap < chunk_size`; a
    /// chunker built from other values still terminates, advancing at least
    /// one char per window.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self { chunk_size, chunk_overlap }
    }

    fn step(&self) -> usize {
        self.chunk_size.saturating_sub(self.chunk_overlap).max(1)
    }

    /// Lazily iterate over the chunks of `document`.
    ///
    /// The iterator is `Clone`, so a saved copy restarts from the same point.
    pub fn windows<'a>(&self, document: &'a Document) -> ChunkWindows<'a> {
        let bounds = char_boundaries(&document.text);
        let next_start = if document.text.is_empty() { None } else { Some(0) };
        ChunkWindows {
            document,
            bounds,
            size: self.chunk_size.max(1),
            step: self.step(),
            next_start,
            sequence_index: 0,
        }
    }
}

impl Chunker for FixedSizeChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        self.windows(document).collect()
    }
}

/// Lazy sequence of fixed-size windows over one document.
#[derive(Debug, Clone)]
pub struct ChunkWindows<'a> {
    document: &'a Document,
    bounds: Vec<usize>,
    size: usize,
    step: usize,
    next_start: Option<usize>,
    sequence_index: usize,
}

impl Iterator for ChunkWindows<'_> {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        let start = self.next_start?;
        let len = self.bounds.len() - 1;
        let end = (start + self.size).min(len);

        self.next_start = if end == len { None } else { Some(start + self.step) };

        let chunk = make_chunk(self.document, &self.bounds, self.sequence_index, start, end);
        self.sequence_index += 1;
        Some(chunk)
    }
}

/// Splits text into chunks made of whole sentences.
///
/// Sentences end at `.`, `!` or `?` followed by whitespace, or at a newline;
/// trailing whitespace stays with the sentence so chunks are contiguous.
/// Sentences are packed greedily into chunks of at most `chunk_size` chars.
/// Each new chunk repeats the trailing sentences of the previous one whose
/// combined length fits in `chunk_overlap`. A sentence longer than
/// `chunk_size` is cut with [`FixedSizeChunker`] windows.
///
/// # Example
///
/// ```rust
/// use admit_rag::{Chunker, Document, SentenceChunker};
///
/// let chunker = SentenceChunker::new(30, 10);
/// let chunks = chunker.chunk(&Document::new("d", "Fees are due. Hostel is extra. Apply online."));
/// assert!(chunks.iter().all(|c| c.len() <= 30));
/// ```
#[derive(Debug, Clone)]
pub struct SentenceChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl SentenceChunker {
    /// Create a new `SentenceChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size` — maximum number of characters per chunk
    /// * `chunk_overlap` — maximum number of characters repeated from the previous chunk
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self { chunk_size: chunk_size.max(1), chunk_overlap }
    }
}

/// Sentence spans as `(start, end)` char offsets covering the whole text.
fn sentence_spans(text: &str) -> Vec<(usize, usize)> {
    let chars: Vec<char> = text.chars().collect();
    let n = chars.len();
    let mut spans = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < n {
        let c = chars[i];
        let boundary = c == '\n'
            || (matches!(c, '.' | '!' | '?') && (i + 1 == n || chars[i + 1].is_whitespace()));
        i += 1;
        if boundary {
            while i < n && chars[i].is_whitespace() {
                i += 1;
            }
            spans.push((start, i));
            start = i;
        }
    }

    if start < n {
        spans.push((start, n));
    }

    spans
}

impl Chunker for SentenceChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        if document.text.is_empty() {
            return Vec::new();
        }

        let bounds = char_boundaries(&document.text);
        let mut chunks = Vec::new();
        // Sentences in the chunk being packed, as (start, end) spans.
        let mut current: Vec<(usize, usize)> = Vec::new();
        let mut current_len = 0;

        let flush = |chunks: &mut Vec<Chunk>, current: &[(usize, usize)]| {
            if let (Some(first), Some(last)) = (current.first(), current.last()) {
                let index = chunks.len();
                chunks.push(make_chunk(document, &bounds, index, first.0, last.1));
            }
        };

        for (start, end) in sentence_spans(&document.text) {
            let len = end - start;

            if len > self.chunk_size {
                flush(&mut chunks, &current);
                current.clear();
                current_len = 0;

                let step = self.chunk_size.saturating_sub(self.chunk_overlap).max(1);
                let mut window = start;
                loop {
                    let window_end = (window + self.chunk_size).min(end);
                    let index = chunks.len();
                    chunks.push(make_chunk(document, &bounds, index, window, window_end));
                    if window_end == end {
                        break;
                    }
                    window += step;
                }
                continue;
            }

            if current_len + len > self.chunk_size && !current.is_empty() {
                flush(&mut chunks, &current);

                // Keep the longest tail that fits the overlap and leaves room
                // for the incoming sentence.
                let mut carry_len = 0;
                let mut keep = 0;
                for span in current.iter().rev() {
                    let span_len = span.1 - span.0;
                    if carry_len + span_len > self.chunk_overlap
                        || carry_len + span_len + len > self.chunk_size
                    {
                        break;
                    }
                    carry_len += span_len;
                    keep += 1;
                }
                current.drain(..current.len() - keep);
                current_len = carry_len;
            }

            current.push((start, end));
            current_len += len;
        }

        flush(&mut chunks, &current);
        chunks
    }
}
