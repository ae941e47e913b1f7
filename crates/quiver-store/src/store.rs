//! The document store abstraction consumed by the index, search, and graph
//! layers.
//!
//! `DocumentStore` models the narrow slice of a document database that the
//! engine needs: lazily-created collections addressed by (database, collection)
//! name pairs, JSON documents keyed by an `_id` field, a managed search-index
//! administration surface, and a vector similarity query. Two implementations
//! are provided: [`crate::MemoryStore`] for tests and ephemeral runs, and
//! [`crate::SqliteStore`] for durable local storage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use quiver_core::error::Result;
use quiver_core::types::{DistanceMetric, Document};

use crate::filter::Filter;

/// Status string reported for an index that is queryable.
pub const STATUS_READY: &str = "READY";
/// Status string reported while an index is still building.
pub const STATUS_PENDING: &str = "PENDING";
/// Status string reported for an index whose build failed.
pub const STATUS_FAILED: &str = "FAILED";

/// Definition of a vector search index over one document field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDefinition {
    /// Index name, unique within its collection.
    pub name: String,
    /// Document field holding the vectors to index.
    pub path: String,
    /// Similarity metric used to score candidates.
    pub metric: DistanceMetric,
    /// Dimensionality of the indexed vectors.
    pub dimensions: usize,
}

/// A search index as reported by the store.
///
/// The `status` field is the store's raw status string. Stores report
/// `READY`, `PENDING`, or `FAILED`, but callers must interpret the value
/// case-insensitively since managed backends are not consistent about
/// casing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexDescriptor {
    pub name: String,
    pub status: String,
    pub definition: IndexDefinition,
    pub created_at: DateTime<Utc>,
}

/// A vector similarity query against a named search index.
#[derive(Debug, Clone)]
pub struct VectorQuery {
    pub database: String,
    pub collection: String,
    /// Name of the search index to query. The index definition supplies the
    /// vector field path and the similarity metric.
    pub index: String,
    pub vector: Vec<f32>,
    /// Maximum number of results to return.
    pub limit: usize,
    /// Size of the candidate pool an approximate index should rank before
    /// truncating to `limit`. Advisory: the exact-scan backends in this
    /// crate score every document and ignore it.
    pub num_candidates: usize,
}

/// A document returned from a vector query, with its similarity score.
#[derive(Debug, Clone)]
pub struct ScoredDocument {
    pub document: Document,
    /// Normalized similarity in `[0, 1]`, higher is more similar.
    pub score: f64,
}

/// Narrow document-database interface the engine is written against.
///
/// Collections come into existence on first insert, mirroring document
/// databases that create namespaces lazily. Documents are JSON objects; an
/// `_id` field is assigned on insert if absent. Iteration order for `find`
/// is insertion order. Readiness gating for search indexes is the caller's
/// concern: `vector_query` serves any index it can resolve.
pub trait DocumentStore: Send + Sync {
    /// List collection names in a database, in stable (sorted) order.
    fn list_collections(
        &self,
        database: &str,
    ) -> impl std::future::Future<Output = Result<Vec<String>>> + Send;

    /// Insert a single document, creating the collection if needed.
    ///
    /// Returns the document's `_id` (assigned if it was absent).
    fn insert_one(
        &self,
        database: &str,
        collection: &str,
        document: Document,
    ) -> impl std::future::Future<Output = Result<Value>> + Send;

    /// Insert a batch of documents in one operation.
    ///
    /// Returns the `_id` of each inserted document, in input order.
    fn insert_many(
        &self,
        database: &str,
        collection: &str,
        documents: Vec<Document>,
    ) -> impl std::future::Future<Output = Result<Vec<Value>>> + Send;

    /// Delete every document matching the filter. Returns the delete count.
    fn delete_many(
        &self,
        database: &str,
        collection: &str,
        filter: &Filter,
    ) -> impl std::future::Future<Output = Result<u64>> + Send;

    /// Return documents matching the filter, in insertion order, capped at
    /// `limit` when given. An unknown collection yields an empty result.
    fn find(
        &self,
        database: &str,
        collection: &str,
        filter: &Filter,
        limit: Option<usize>,
    ) -> impl std::future::Future<Output = Result<Vec<Document>>> + Send;

    /// Count documents in a collection. Unknown collections count 0.
    fn count_documents(
        &self,
        database: &str,
        collection: &str,
    ) -> impl std::future::Future<Output = Result<u64>> + Send;

    /// Register a search index on a collection.
    ///
    /// Errors if an index with the same name already exists on the
    /// collection.
    fn create_search_index(
        &self,
        database: &str,
        collection: &str,
        definition: IndexDefinition,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// List the search indexes on a collection with their current status.
    ///
    /// Each call counts as one readiness probe: stores that simulate
    /// asynchronous index builds advance their provisioning state here.
    fn list_search_indexes(
        &self,
        database: &str,
        collection: &str,
    ) -> impl std::future::Future<Output = Result<Vec<IndexDescriptor>>> + Send;

    /// Rank documents by similarity to `query.vector` and return the top
    /// `query.limit` with scores, descending. Documents lacking a vector at
    /// the indexed path are not candidates. Errors if the named index does
    /// not exist.
    fn vector_query(
        &self,
        query: VectorQuery,
    ) -> impl std::future::Future<Output = Result<Vec<ScoredDocument>>> + Send;
}
