//! Retrieval behaviour: empty queries, ranking, thresholds.

mod common;

use std::sync::Arc;

use admit_rag::{
    Chunker, Document, EmbeddedChunk, EmbeddingProvider, FixedSizeChunker,
    HashingEmbeddingProvider, RagError, Retriever, VectorIndex,
};
use common::{CountingEmbedder, DIMS};

async fn index_of(embedder: &dyn EmbeddingProvider, documents: &[Document]) -> Arc<VectorIndex> {
    let chunker = FixedSizeChunker::new(600, 80);
    let chunks: Vec<_> = documents.iter().flat_map(|d| chunker.chunk(d)).collect();
    let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
    let embeddings = embedder.embed_batch(&texts).await.unwrap();
    let entries = chunks
        .into_iter()
        .zip(embeddings)
        .map(|(chunk, embedding)| EmbeddedChunk { chunk, embedding })
        .collect();
    Arc::new(VectorIndex::build(embedder.model_id(), embedder.dimensions(), entries).unwrap())
}

fn admission_docs() -> Vec<Document> {
    vec![
        Document::new("fees.txt", "The B.Tech tuition fee is 500000 rupees per year."),
        Document::new("hostel.txt", "Hostel rooms are double sharing with attached bathrooms."),
        Document::new("dates.txt", "Applications close on 31 March and counselling starts in May."),
    ]
}

#[tokio::test]
async fn empty_question_is_rejected_without_embedding() {
    let embedder = Arc::new(CountingEmbedder::new());
    let index = index_of(embedder.as_ref(), &admission_docs()).await;
    let retriever = Retriever::new(embedder.clone(), index).unwrap();

    for question in ["", "   ", "\t\n "] {
        let err = retriever.retrieve(question, 3).await.unwrap_err();
        assert_eq!(err, RagError::EmptyQuery);
    }
    assert_eq!(embedder.embeds(), 0);
}

#[tokio::test]
async fn most_relevant_document_ranks_first() {
    let embedder = Arc::new(CountingEmbedder::new());
    let index = index_of(embedder.as_ref(), &admission_docs()).await;
    let retriever = Retriever::new(embedder.clone(), index).unwrap();

    let results = retriever.retrieve("What is the B.Tech tuition fee?", 3).await.unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].chunk.document_id, "fees.txt");
    assert!(results[0].score > 0.0);
    assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
    assert_eq!(embedder.embeds(), 1);
}

#[tokio::test]
async fn top_k_bounds_results() {
    let embedder = Arc::new(CountingEmbedder::new());
    let index = index_of(embedder.as_ref(), &admission_docs()).await;
    let retriever = Retriever::new(embedder, index).unwrap();

    assert_eq!(retriever.retrieve("hostel rooms", 1).await.unwrap().len(), 1);
    assert!(retriever.retrieve("hostel rooms", 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn similarity_threshold_filters_weak_matches() {
    let embedder = Arc::new(CountingEmbedder::new());
    let index = index_of(embedder.as_ref(), &admission_docs()).await;
    let retriever =
        Retriever::new(embedder, index).unwrap().with_similarity_threshold(Some(0.2));

    let results = retriever.retrieve("hostel rooms double sharing", 3).await.unwrap();
    assert!(!results.is_empty());
    assert!(results.iter().all(|r| r.score >= 0.2));
    assert_eq!(results[0].chunk.document_id, "hostel.txt");
}

#[tokio::test]
async fn embedder_must_match_index_model() {
    let embedder = Arc::new(CountingEmbedder::new());
    let index = index_of(embedder.as_ref(), &admission_docs()).await;
    let other = Arc::new(HashingEmbeddingProvider::new(DIMS * 2).unwrap());

    let err = Retriever::new(other, index.clone()).unwrap_err();
    assert!(matches!(err, RagError::VectorStoreError { .. }));

    let retriever = Retriever::new(embedder, index).unwrap();
    let debug = format!("{retriever:?}");
    assert!(debug.contains("local/feature-hash-64"), "unexpected debug output: {debug}");
}
