//! Retrieval-augmented question answering over a corpus of admission documents.
//!
//! This crate provides:
//! - Corpus loading from a directory of text files
//! - Fixed-window and sentence-aware chunking with overlap
//! - Embedding providers (local feature hashing, OpenAI-compatible HTTP)
//! - An in-memory cosine-similarity index
//! - Grounded answer synthesis through a chat completion provider (Groq)
//! - A build-once pipeline cache shared by all callers
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use admit_rag::{GroqCompletionProvider, HashingEmbeddingProvider, PipelineCache, RagConfig};
//!
//! let config = RagConfig::default().apply_env_overrides()?;
//! let cache = PipelineCache::new(
//!     Arc::new(HashingEmbeddingProvider::new(config.embedding_dimensions)?),
//!     Arc::new(GroqCompletionProvider::from_config(&config)?),
//! );
//! let pipeline = cache.get_or_initialize(&config).await?;
//! println!("{}", pipeline.answer("What is the B.Tech fee?").await);
//! ```

pub mod chunking;
pub mod completion;
pub mod config;
pub mod corpus;
pub mod document;
pub mod embedding;
pub mod error;
pub mod groq;
pub mod hashing;
pub mod index;
pub mod openai;
pub mod pipeline;
pub mod retriever;
pub mod retry;
pub mod synthesis;

pub use chunking::{ChunkWindows, Chunker, FixedSizeChunker, SentenceChunker, chunker_for};
pub use completion::{CompletionProvider, GenerationOptions, Message, Role};
pub use config::{ChunkingStrategy, DEFAULT_REMOTE_EMBEDDING_MODEL, RagConfig, RagConfigBuilder};
pub use corpus::{discover_corpus_files, load_corpus};
pub use document::{Answer, Chunk, Document, EmbeddedChunk, SearchResult};
pub use embedding::{EmbeddingProvider, embedding_provider_for};
pub use error::{RagError, Result};
pub use groq::GroqCompletionProvider;
pub use hashing::HashingEmbeddingProvider;
pub use index::{VectorIndex, cosine_similarity};
pub use openai::OpenAIEmbeddingProvider;
pub use pipeline::{
    IndexStats, PipelineCache, PipelineHandle, PipelineState, RagPipeline, RagPipelineBuilder,
    user_message,
};
pub use retriever::Retriever;
pub use retry::RetryPolicy;
pub use synthesis::{AnswerSynthesizer, NO_CONTEXT_ANSWER};
