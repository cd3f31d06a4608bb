//! RAG pipeline orchestrator and its build-once cache.
//!
//! The [`RagPipeline`] owns everything built from the corpus: the read-only
//! [`VectorIndex`], the [`Retriever`] over it and the [`AnswerSynthesizer`].
//! Building it chunks and embeds the whole corpus, so a process builds it
//! once and shares the resulting [`PipelineHandle`] between all callers.
//! [`PipelineCache`] enforces that: concurrent first callers wait on a single
//! in-flight build.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use admit_rag::{GroqCompletionProvider, HashingEmbeddingProvider, PipelineCache, RagConfig};
//!
//! let config = RagConfig::builder().corpus_path("vit").build()?;
//! let cache = PipelineCache::new(
//!     Arc::new(HashingEmbeddingProvider::new(config.embedding_dimensions)?),
//!     Arc::new(GroqCompletionProvider::from_config(&config)?),
//! );
//!
//! let pipeline = cache.get_or_initialize(&config).await?;
//! println!("{}", pipeline.answer("What is the B.Tech fee?").await);
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{error, info, warn};

use crate::chunking::{Chunker, chunker_for};
use crate::completion::{CompletionProvider, GenerationOptions};
use crate::config::RagConfig;
use crate::corpus::load_corpus;
use crate::document::{Answer, Document, EmbeddedChunk, SearchResult};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::index::VectorIndex;
use crate::retriever::Retriever;
use crate::retry::RetryPolicy;
use crate::synthesis::AnswerSynthesizer;

/// Shared, immutable handle to a ready pipeline.
pub type PipelineHandle = Arc<RagPipeline>;

/// Message returned for an empty or whitespace-only question.
pub const EMPTY_QUERY_MESSAGE: &str = "Please enter a question.";

/// Message returned when a model service failed or timed out.
pub const UNAVAILABLE_MESSAGE: &str =
    "The admission assistant is temporarily unavailable. Please try again later.";

/// Message returned for any other per-question failure.
pub const FAILURE_MESSAGE: &str =
    "Sorry, something went wrong while answering your question. Please try again.";

/// Summary of a built index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexStats {
    /// Documents that produced at least one chunk.
    pub documents: usize,
    /// Indexed chunks.
    pub chunks: usize,
    /// Embedding dimensionality.
    pub dimensions: usize,
    /// Embedding model identity.
    pub model_id: String,
}

/// Wall-clock budget for one provider call including its retries.
fn call_budget(config: &RagConfig) -> Duration {
    let policy = RetryPolicy::new(config.max_retries);
    let attempts = config.max_retries.saturating_add(1);
    let backoff: Duration = (0..config.max_retries).map(|attempt| policy.backoff(attempt)).sum();
    config.request_timeout().saturating_mul(attempts).saturating_add(backoff)
}

/// Convert a per-question error into a message safe to show a user.
pub fn user_message(error: &RagError) -> &'static str {
    match error {
        RagError::EmptyQuery => EMPTY_QUERY_MESSAGE,
        RagError::ModelUnavailable { .. }
        | RagError::GenerationUnavailable { .. }
        | RagError::Timeout { .. } => UNAVAILABLE_MESSAGE,
        _ => FAILURE_MESSAGE,
    }
}

/// The RAG pipeline orchestrator.
///
/// Built once (chunk → embed → index) and read-only afterwards; answering
/// runs embed → search → synthesize. Construct one via
/// [`RagPipeline::initialize`], [`RagPipeline::builder()`] or a
/// [`PipelineCache`].
pub struct RagPipeline {
    config: RagConfig,
    retriever: Retriever,
    synthesizer: AnswerSynthesizer,
    stats: IndexStats,
}

impl std::fmt::Debug for RagPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RagPipeline").field("stats", &self.stats).finish_non_exhaustive()
    }
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Load `config.corpus_path` and build the pipeline over it.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] for an invalid config or a missing
    /// corpus directory, [`RagError::CorpusError`] if a file cannot be read,
    /// and the embedder's error (usually [`RagError::ModelUnavailable`]) if
    /// embedding fails. An empty corpus is not an error.
    pub async fn initialize(
        config: RagConfig,
        embedding_provider: Arc<dyn EmbeddingProvider>,
        completion_provider: Arc<dyn CompletionProvider>,
    ) -> Result<Self> {
        config.validate()?;
        let documents = load_corpus(&config.corpus_path, &config.corpus_extensions)?;
        Self::builder()
            .config(config)
            .embedding_provider(embedding_provider)
            .completion_provider(completion_provider)
            .documents(documents)
            .build()
            .await
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a summary of the built index.
    pub fn stats(&self) -> &IndexStats {
        &self.stats
    }

    /// Return the read-only index.
    pub fn index(&self) -> &VectorIndex {
        self.retriever.index()
    }

    /// Retrieve the `top_k` chunks most similar to `question`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmptyQuery`] for a blank question, and embedding
    /// or timeout errors from the embedder.
    pub async fn retrieve(&self, question: &str) -> Result<Vec<SearchResult>> {
        self.retriever.retrieve(question, self.config.top_k).await
    }

    /// Answer `question`, returning the answer with its sources.
    ///
    /// # Errors
    ///
    /// Returns retrieval errors (see [`RagPipeline::retrieve`]) and
    /// completion errors, typically [`RagError::GenerationUnavailable`].
    pub async fn try_answer(&self, question: &str) -> Result<Answer> {
        let results = self.retrieve(question).await?;
        info!(result_count = results.len(), "query completed");
        self.synthesizer.synthesize(question, results).await
    }

    /// Answer `question`, converting any failure into a user-facing message.
    ///
    /// This never fails: an empty question yields [`EMPTY_QUERY_MESSAGE`],
    /// an unavailable or slow model yields [`UNAVAILABLE_MESSAGE`].
    pub async fn answer(&self, question: &str) -> String {
        match self.try_answer(question).await {
            Ok(answer) => answer.text,
            Err(e) => {
                warn!(error = %e, "question failed");
                user_message(&e).to_string()
            }
        }
    }
}

/// Builder for constructing a [`RagPipeline`] from in-memory documents.
///
/// `config`, `embedding_provider` and `completion_provider` are required.
/// The chunker defaults to the one selected by the config.
///
/// # Example
///
/// ```rust,ignore
/// let pipeline = RagPipeline::builder()
///     .config(RagConfig::default())
///     .embedding_provider(Arc::new(embedder))
///     .completion_provider(Arc::new(llm))
///     .documents(vec![Document::new("fees.txt", "B.Tech fee is 500000 rupees per year.")])
///     .build()
///     .await?;
/// ```
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    completion_provider: Option<Arc<dyn CompletionProvider>>,
    chunker: Option<Box<dyn Chunker>>,
    documents: Vec<Document>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the completion provider.
    pub fn completion_provider(mut self, provider: Arc<dyn CompletionProvider>) -> Self {
        self.completion_provider = Some(provider);
        self
    }

    /// Override the chunker selected by the config.
    pub fn chunker(mut self, chunker: Box<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Set the documents to index.
    pub fn documents(mut self, documents: Vec<Document>) -> Self {
        self.documents = documents;
        self
    }

    /// Chunk, embed and index the documents.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if a required field is missing or
    /// the config is invalid, and the embedder's error if embedding fails.
    pub async fn build(self) -> Result<RagPipeline> {
        let config =
            self.config.ok_or_else(|| RagError::ConfigError("config is required".to_string()))?;
        config.validate()?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::ConfigError("embedding_provider is required".to_string()))?;
        let completion_provider = self
            .completion_provider
            .ok_or_else(|| RagError::ConfigError("completion_provider is required".to_string()))?;
        let chunker = self.chunker.unwrap_or_else(|| chunker_for(&config));

        // 1. Chunk every document; empty documents drop out here
        let mut chunks = Vec::new();
        let mut indexed_documents = 0;
        for document in &self.documents {
            let document_chunks = chunker.chunk(document);
            if document_chunks.is_empty() {
                info!(document.id = %document.id, "skipping document with no text");
                continue;
            }
            indexed_documents += 1;
            chunks.extend(document_chunks);
        }

        // 2. Embed all chunk texts in one batch
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let embeddings = if texts.is_empty() {
            Vec::new()
        } else {
            embedding_provider.embed_batch(&texts).await.map_err(|e| {
                error!(chunk_count = texts.len(), error = %e, "embedding failed during indexing");
                e
            })?
        };
        if embeddings.len() != chunks.len() {
            return Err(RagError::ModelUnavailable {
                provider: embedding_provider.model_id().to_string(),
                message: format!(
                    "expected {} embeddings, got {}",
                    chunks.len(),
                    embeddings.len()
                ),
            });
        }

        // 3. Build the read-only index
        let entries: Vec<EmbeddedChunk> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| EmbeddedChunk { chunk, embedding })
            .collect();
        let index = Arc::new(VectorIndex::build(
            embedding_provider.model_id(),
            embedding_provider.dimensions(),
            entries,
        )?);

        let stats = IndexStats {
            documents: indexed_documents,
            chunks: index.len(),
            dimensions: index.dimensions(),
            model_id: index.model_id().to_string(),
        };
        if stats.chunks == 0 {
            warn!("corpus produced no chunks; every question will report that nothing was found");
        }
        info!(documents = stats.documents, chunk_count = stats.chunks, "pipeline ready");

        let budget = call_budget(&config);
        let retriever = Retriever::new(embedding_provider, index)?
            .with_similarity_threshold(config.similarity_threshold)
            .with_timeout(budget);
        let synthesizer = AnswerSynthesizer::new(
            completion_provider,
            GenerationOptions { temperature: config.temperature, max_tokens: config.max_tokens },
        )
        .with_timeout(budget);

        Ok(RagPipeline { config, retriever, synthesizer, stats })
    }
}

/// Lifecycle of a cached pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// No build has been requested.
    Uninitialized,
    /// A build is in flight.
    Building,
    /// The pipeline is built and serving.
    Ready,
    /// The build failed; the error is returned to every caller.
    Failed,
}

#[derive(Default)]
struct Slot {
    cell: OnceCell<Result<PipelineHandle>>,
    building: AtomicBool,
}

/// Clears the building flag even if the build future is dropped.
struct BuildingGuard<'a>(&'a AtomicBool);

impl Drop for BuildingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Builds each pipeline at most once and hands out shared handles.
///
/// Pipelines are keyed by [`RagConfig::fingerprint`]. The first caller for a
/// key runs the build; concurrent callers await the same build. Success and
/// failure are both terminal: later callers get the same handle, or the same
/// error, without rebuilding.
pub struct PipelineCache {
    embedding_provider: Arc<dyn EmbeddingProvider>,
    completion_provider: Arc<dyn CompletionProvider>,
    slots: Mutex<HashMap<String, Arc<Slot>>>,
}

impl PipelineCache {
    /// Create a cache whose pipelines use the given providers.
    pub fn new(
        embedding_provider: Arc<dyn EmbeddingProvider>,
        completion_provider: Arc<dyn CompletionProvider>,
    ) -> Self {
        Self { embedding_provider, completion_provider, slots: Mutex::new(HashMap::new()) }
    }

    fn slot(&self, key: &str) -> Arc<Slot> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slots.entry(key.to_string()).or_default())
    }

    /// Return the pipeline for `config`, building it on first use.
    ///
    /// # Errors
    ///
    /// Returns the build error (see [`RagPipeline::initialize`]); once a
    /// build has failed the same error is returned on every call.
    pub async fn get_or_initialize(&self, config: &RagConfig) -> Result<PipelineHandle> {
        let slot = self.slot(&config.fingerprint());
        slot.cell
            .get_or_init(|| async {
                slot.building.store(true, Ordering::Release);
                let _guard = BuildingGuard(&slot.building);
                info!(corpus = %config.corpus_path.display(), "building pipeline");
                RagPipeline::initialize(
                    config.clone(),
                    Arc::clone(&self.embedding_provider),
                    Arc::clone(&self.completion_provider),
                )
                .await
                .map(Arc::new)
                .map_err(|e| {
                    error!(error = %e, "pipeline build failed");
                    e
                })
            })
            .await
            .clone()
    }

    /// Report where the pipeline for `config` is in its lifecycle.
    pub fn state(&self, config: &RagConfig) -> PipelineState {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(slot) = slots.get(&config.fingerprint()) else {
            return PipelineState::Uninitialized;
        };
        match slot.cell.get() {
            Some(Ok(_)) => PipelineState::Ready,
            Some(Err(_)) => PipelineState::Failed,
            None if slot.building.load(Ordering::Acquire) => PipelineState::Building,
            None => PipelineState::Uninitialized,
        }
    }
}
