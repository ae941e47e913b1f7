//! End-to-end lifecycle tests for the search stack.
//!
//! Each scenario drives the full create -> poll -> ready -> ingest -> query
//! flow through the public API, against both store backends. Tests use the
//! deterministic hash embedder so similarity rankings are stable.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use quiver_core::types::{DistanceMetric, Document, IndexStatus};
use quiver_search::embedding::DynEmbeddingProvider;
use quiver_search::{HashEmbedding, IngestionPipeline, InsertOutcome, SearchEngine};
use quiver_store::{DocumentStore, Filter, IndexProvisioning, MemoryStore, SqliteStore};

// =============================================================================
// Helpers
// =============================================================================

const DB: &str = "lifecycle_db";
const COLLECTION: &str = "articles";
const INDEX: &str = "articles_index";

fn make_doc(value: serde_json::Value) -> Document {
    value.as_object().unwrap().clone()
}

fn sample_documents() -> Vec<Document> {
    vec![
        make_doc(json!({"name": "cats", "content": "a cat sat on the mat"})),
        make_doc(json!({"name": "dogs", "content": "dogs chase the postman"})),
        make_doc(json!({"name": "birds", "content": "birds sing in the morning"})),
    ]
}

fn make_engine<S: DocumentStore>(store: Arc<S>) -> SearchEngine<S> {
    let embedder: Arc<dyn DynEmbeddingProvider> = Arc::new(HashEmbedding::new());
    SearchEngine::new(store, embedder, DB, COLLECTION, INDEX, "content")
}

fn make_pipeline<S: DocumentStore>(store: Arc<S>) -> IngestionPipeline<S, HashEmbedding> {
    IngestionPipeline::new(store, HashEmbedding::new(), DB, COLLECTION)
}

/// Drive one store through the whole lifecycle: index creation, readiness
/// polling, ingestion with the bulk guard, and all three query operations.
async fn run_full_lifecycle<S: DocumentStore>(store: Arc<S>, starts_pending: bool) {
    let engine = make_engine(Arc::clone(&store));
    let pipeline = make_pipeline(Arc::clone(&store));

    engine
        .manager()
        .create_index(DB, COLLECTION, INDEX, "content", DistanceMetric::Cosine)
        .await
        .unwrap();

    if starts_pending {
        assert_eq!(
            engine.manager().index_status(DB, COLLECTION, INDEX).await,
            IndexStatus::Pending
        );
    }
    assert!(
        engine
            .manager()
            .wait_until_ready(DB, COLLECTION, INDEX, 10, Duration::ZERO)
            .await
    );

    let outcome = pipeline
        .insert_documents(sample_documents(), &["content"])
        .await
        .unwrap();
    assert_eq!(
        outcome,
        InsertOutcome::Inserted {
            inserted: 3,
            dropped: 0
        }
    );

    // A second batch is refused outright once the collection has data.
    let outcome = pipeline
        .insert_documents(sample_documents(), &["content"])
        .await
        .unwrap();
    assert_eq!(outcome, InsertOutcome::SkippedExisting { existing: 3 });

    // Vector search: the exact source text is its own nearest neighbor.
    let hits = engine.vector_search("a cat sat on the mat", 1, None).await;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].document["name"], json!("cats"));
    assert!(hits[0].score.unwrap() > 0.999);
    assert!(!hits[0].document.contains_key("content_embedding"));

    // Keyword search: case-insensitive, unranked.
    let hits = engine.keyword_search("DOGS", 10).await;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].document["name"], json!("dogs"));
    assert!(hits[0].score.is_none());

    // Hybrid search: nearest neighbors restricted by keyword.
    let hits = engine
        .hybrid_search("a cat sat on the mat", "mat", 2, None)
        .await;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].document["name"], json!("cats"));
    assert!(hits[0].score.is_some());

    // Stripping is read-side only; stored documents keep their vectors.
    let raw = store
        .find(DB, COLLECTION, &Filter::new(), None)
        .await
        .unwrap();
    assert_eq!(raw.len(), 3);
    assert!(raw.iter().all(|doc| doc.contains_key("content_embedding")));
}

/// All three query operations must return empty while the index is pending.
async fn run_degraded_queries<S: DocumentStore>(store: Arc<S>) {
    let engine = make_engine(Arc::clone(&store));
    let pipeline = make_pipeline(Arc::clone(&store));

    engine
        .manager()
        .create_index(DB, COLLECTION, INDEX, "content", DistanceMetric::Cosine)
        .await
        .unwrap();
    pipeline
        .insert_documents(sample_documents(), &["content"])
        .await
        .unwrap();

    assert!(engine.vector_search("a cat sat on the mat", 5, None).await.is_empty());
    assert!(engine.keyword_search("cat", 5).await.is_empty());
    assert!(engine
        .hybrid_search("a cat sat on the mat", "cat", 5, None)
        .await
        .is_empty());
    assert!(
        !engine
            .manager()
            .wait_until_ready(DB, COLLECTION, INDEX, 3, Duration::ZERO)
            .await
    );

    // The data is there; only the readiness gate is holding queries back.
    assert_eq!(store.count_documents(DB, COLLECTION).await.unwrap(), 3);
}

// =============================================================================
// Full lifecycle
// =============================================================================

#[tokio::test]
async fn test_full_lifecycle_memory_backend() {
    let store = Arc::new(MemoryStore::with_provisioning(IndexProvisioning::AfterPolls(2)));
    run_full_lifecycle(store, true).await;
}

#[tokio::test]
async fn test_full_lifecycle_sqlite_backend() {
    let store = Arc::new(SqliteStore::in_memory_with_provisioning(2).unwrap());
    run_full_lifecycle(store, true).await;
}

#[tokio::test]
async fn test_full_lifecycle_immediately_ready() {
    run_full_lifecycle(Arc::new(MemoryStore::new()), false).await;
}

// =============================================================================
// Readiness gating
// =============================================================================

#[tokio::test]
async fn test_queries_degrade_while_pending_memory_backend() {
    let store = Arc::new(MemoryStore::with_provisioning(IndexProvisioning::Never));
    run_degraded_queries(store).await;
}

#[tokio::test]
async fn test_queries_degrade_while_pending_sqlite_backend() {
    let store = Arc::new(SqliteStore::in_memory_with_provisioning(1_000).unwrap());
    run_degraded_queries(store).await;
}

#[tokio::test]
async fn test_failed_index_stops_polling_early() {
    let store = Arc::new(MemoryStore::with_provisioning(IndexProvisioning::Failed));
    let engine = make_engine(Arc::clone(&store));

    engine
        .manager()
        .create_index(DB, COLLECTION, INDEX, "content", DistanceMetric::Cosine)
        .await
        .unwrap();

    let ready = engine
        .manager()
        .wait_until_ready(DB, COLLECTION, INDEX, 10, Duration::ZERO)
        .await;
    assert!(!ready);
    // A terminal FAILED report ends the wait on the first probe.
    assert_eq!(store.observed_polls(DB, COLLECTION, INDEX), 1);
}

// =============================================================================
// Persistence
// =============================================================================

#[tokio::test]
async fn test_index_and_embeddings_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("quiver.db");

    {
        let store = Arc::new(SqliteStore::open(&path, 0).unwrap());
        let engine = make_engine(Arc::clone(&store));
        engine
            .manager()
            .create_index(DB, COLLECTION, INDEX, "content", DistanceMetric::Cosine)
            .await
            .unwrap();
        make_pipeline(Arc::clone(&store))
            .insert_documents(sample_documents(), &["content"])
            .await
            .unwrap();
    }

    let store = Arc::new(SqliteStore::open(&path, 0).unwrap());
    let engine = make_engine(Arc::clone(&store));

    assert_eq!(
        engine.manager().index_status(DB, COLLECTION, INDEX).await,
        IndexStatus::Ready
    );
    let hits = engine.vector_search("dogs chase the postman", 1, None).await;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].document["name"], json!("dogs"));
}
