//! Test doubles shared by the integration tests.
#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use admit_rag::{
    CompletionProvider, EmbeddingProvider, GenerationOptions, HashingEmbeddingProvider, Message,
    RagConfig, RagError, Result, Role,
};
use async_trait::async_trait;
use tokio::sync::Notify;

pub const DIMS: usize = 64;

/// Wraps [`HashingEmbeddingProvider`] and counts calls.
pub struct CountingEmbedder {
    inner: HashingEmbeddingProvider,
    pub embed_calls: AtomicUsize,
    pub batch_calls: AtomicUsize,
    gate: Option<Arc<Notify>>,
}

impl CountingEmbedder {
    pub fn new() -> Self {
        Self {
            inner: HashingEmbeddingProvider::new(DIMS).unwrap(),
            embed_calls: AtomicUsize::new(0),
            batch_calls: AtomicUsize::new(0),
            gate: None,
        }
    }

    /// Batch embedding blocks until `gate` is notified.
    pub fn gated(gate: Arc<Notify>) -> Self {
        Self { gate: Some(gate), ..Self::new() }
    }

    pub fn embeds(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst)
    }

    pub fn batches(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for CountingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.embed(text).await
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        } else {
            // Give concurrent callers a chance to pile up on the same build.
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        self.inner.embed_batch(texts).await
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn model_id(&self) -> &str {
        self.inner.model_id()
    }
}

/// An embedder whose model can never be reached.
pub struct UnreachableEmbedder {
    pub calls: AtomicUsize,
}

impl UnreachableEmbedder {
    pub fn new() -> Self {
        Self { calls: AtomicUsize::new(0) }
    }
}

#[async_trait]
impl EmbeddingProvider for UnreachableEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(RagError::ModelUnavailable {
            provider: "test".into(),
            message: "connection refused".into(),
        })
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        match texts.first() {
            Some(text) => Ok(vec![self.embed(text).await?]),
            None => Ok(Vec::new()),
        }
    }

    fn dimensions(&self) -> usize {
        DIMS
    }

    fn model_id(&self) -> &str {
        "test/unreachable"
    }
}

/// Behaviour of [`ScriptedCompletion`].
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Script {
    /// Reply with the user message, so the answer contains the context.
    Echo,
    /// Fail as an unreachable service.
    Unavailable,
    /// Never reply.
    Hang,
}

/// A completion provider with a fixed behaviour and a call counter.
pub struct ScriptedCompletion {
    script: Script,
    pub calls: AtomicUsize,
}

impl ScriptedCompletion {
    pub fn new(script: Script) -> Self {
        Self { script, calls: AtomicUsize::new(0) }
    }

    pub fn echo() -> Self {
        Self::new(Script::Echo)
    }

    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionProvider for ScriptedCompletion {
    async fn complete(&self, messages: &[Message], _options: &GenerationOptions) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.script {
            Script::Echo => Ok(messages
                .iter()
                .filter(|m| m.role == Role::User)
                .map(|m| m.content.clone())
                .collect::<Vec<_>>()
                .join("\n")),
            Script::Unavailable => Err(RagError::GenerationUnavailable {
                provider: "test".into(),
                message: "503 Service Unavailable".into(),
            }),
            Script::Hang => std::future::pending().await,
        }
    }

    fn model_id(&self) -> &str {
        "test/scripted"
    }
}

/// Config for a corpus at `root`, embedded with [`DIMS`] dimensions.
pub fn config_for(root: &Path) -> RagConfig {
    RagConfig::builder()
        .corpus_path(root)
        .embedding_dimensions(DIMS)
        .embedding_model_id(format!("local/feature-hash-{DIMS}"))
        .build()
        .unwrap()
}

/// Write `files` (relative path, contents) under a fresh temp dir.
pub fn corpus(files: &[(&str, &str)]) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (path, text) in files {
        let path = dir.path().join(path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, text).unwrap();
    }
    dir
}
