//! Hybrid retrieval engine.
//!
//! `SearchEngine` is bound to one (database, collection, index) target and
//! offers three read operations: pure vector similarity, pure keyword
//! matching, and a hybrid of the two. All three gate on index readiness and
//! degrade to an empty result set on any failure, so read-heavy callers can
//! treat "not ready", "bad query", and "no matches" uniformly. Construction
//! paths (index creation, ingestion) surface errors instead; see
//! [`crate::IndexManager`] and [`crate::IngestionPipeline`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use quiver_core::types::{is_embedding_field, Document};
use quiver_store::{DocumentStore, Filter, ScoredDocument, VectorQuery};

use crate::embedding::DynEmbeddingProvider;
use crate::index::IndexManager;

/// Query input for the similarity-based operations.
///
/// Accepting a precomputed vector lets callers who already hold an
/// embedding skip a redundant provider call.
#[derive(Debug, Clone)]
pub enum QueryInput {
    /// Free text, embedded by the provider before querying.
    Text(String),
    /// A precomputed embedding vector, used as-is.
    Vector(Vec<f32>),
}

impl From<&str> for QueryInput {
    fn from(text: &str) -> Self {
        QueryInput::Text(text.to_string())
    }
}

impl From<String> for QueryInput {
    fn from(text: String) -> Self {
        QueryInput::Text(text)
    }
}

impl From<Vec<f32>> for QueryInput {
    fn from(vector: Vec<f32>) -> Self {
        QueryInput::Vector(vector)
    }
}

/// A single search result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// The matching document, with embedding vector fields removed.
    pub document: Document,
    /// Similarity score in `[0, 1]`; `None` for keyword-only results.
    pub score: Option<f64>,
}

/// Retrieval engine bound to one search index.
pub struct SearchEngine<S> {
    store: Arc<S>,
    embedder: Arc<dyn DynEmbeddingProvider>,
    manager: IndexManager<S>,
    database: String,
    collection: String,
    index: String,
    text_field: String,
}

impl<S: DocumentStore> SearchEngine<S> {
    pub fn new(
        store: Arc<S>,
        embedder: Arc<dyn DynEmbeddingProvider>,
        database: impl Into<String>,
        collection: impl Into<String>,
        index: impl Into<String>,
        text_field: impl Into<String>,
    ) -> Self {
        let manager = IndexManager::new(Arc::clone(&store), Arc::clone(&embedder));
        Self {
            store,
            embedder,
            manager,
            database: database.into(),
            collection: collection.into(),
            index: index.into(),
            text_field: text_field.into(),
        }
    }

    /// The lifecycle manager for this engine's store and provider.
    pub fn manager(&self) -> &IndexManager<S> {
        &self.manager
    }

    /// Rank documents by similarity to the query.
    ///
    /// Optional `filters` are applied to the returned candidates, so fewer
    /// than `limit` results may come back. Results carry their similarity
    /// score and are stripped of embedding fields.
    pub async fn vector_search(
        &self,
        query: impl Into<QueryInput>,
        limit: usize,
        filters: Option<&Filter>,
    ) -> Vec<SearchResult> {
        if !self.gate_ready().await {
            return Vec::new();
        }
        let Some(vector) = self.query_vector(query.into()).await else {
            return Vec::new();
        };
        let compiled = match filters.map(|f| f.compile()).transpose() {
            Ok(compiled) => compiled,
            Err(e) => {
                error!(error = %e, "Invalid search filter");
                return Vec::new();
            }
        };

        let scored = match self
            .store
            .vector_query(self.build_query(vector, limit, limit))
            .await
        {
            Ok(scored) => scored,
            Err(e) => {
                error!(error = %e, "Vector search against '{}' failed", self.index);
                return Vec::new();
            }
        };

        let results: Vec<SearchResult> = scored
            .into_iter()
            .filter(|hit| {
                compiled
                    .as_ref()
                    .map_or(true, |filter| filter.matches(&hit.document))
            })
            .map(into_scored_result)
            .collect();
        info!("Vector search returned {} results", results.len());
        results
    }

    /// Case-insensitive pattern match against the text field.
    ///
    /// No ranking: results keep store iteration order, capped at `limit`.
    pub async fn keyword_search(&self, pattern: &str, limit: usize) -> Vec<SearchResult> {
        if !self.gate_ready().await {
            return Vec::new();
        }
        let filter = Filter::new().regex(&self.text_field, pattern, true);
        match self
            .store
            .find(&self.database, &self.collection, &filter, Some(limit))
            .await
        {
            Ok(documents) => {
                let results: Vec<SearchResult> = documents
                    .into_iter()
                    .map(|document| SearchResult {
                        document: strip_embeddings(document),
                        score: None,
                    })
                    .collect();
                info!("Keyword search returned {} results", results.len());
                results
            }
            Err(e) => {
                error!(error = %e, "Keyword search on '{}.{}' failed", self.database, self.collection);
                Vec::new()
            }
        }
    }

    /// Similarity search restricted to documents matching a keyword.
    ///
    /// Over-fetches `2 * limit` nearest neighbors, keeps those whose text
    /// field matches `keyword` (case-insensitive) and any extra `filters`,
    /// re-sorts by descending score, and truncates to `limit`. The 2x
    /// buffer is best-effort: a matching document ranked below the
    /// over-fetch window is missed, and no re-fetch is attempted.
    pub async fn hybrid_search(
        &self,
        query: impl Into<QueryInput>,
        keyword: &str,
        limit: usize,
        filters: Option<&Filter>,
    ) -> Vec<SearchResult> {
        if !self.gate_ready().await {
            return Vec::new();
        }
        let Some(vector) = self.query_vector(query.into()).await else {
            return Vec::new();
        };
        let combined = filters
            .cloned()
            .unwrap_or_default()
            .regex(&self.text_field, keyword, true);
        let compiled = match combined.compile() {
            Ok(compiled) => compiled,
            Err(e) => {
                error!(error = %e, "Invalid keyword pattern '{}'", keyword);
                return Vec::new();
            }
        };

        let fetch = limit.saturating_mul(2);
        let scored = match self
            .store
            .vector_query(self.build_query(vector, fetch, fetch))
            .await
        {
            Ok(scored) => scored,
            Err(e) => {
                error!(error = %e, "Hybrid search against '{}' failed", self.index);
                return Vec::new();
            }
        };

        let mut matched: Vec<ScoredDocument> = scored
            .into_iter()
            .filter(|hit| compiled.matches(&hit.document))
            .collect();
        matched.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matched.truncate(limit);

        let results: Vec<SearchResult> = matched.into_iter().map(into_scored_result).collect();
        info!("Hybrid search returned {} results", results.len());
        results
    }

    fn build_query(&self, vector: Vec<f32>, limit: usize, num_candidates: usize) -> VectorQuery {
        VectorQuery {
            database: self.database.clone(),
            collection: self.collection.clone(),
            index: self.index.clone(),
            vector,
            limit,
            num_candidates,
        }
    }

    async fn gate_ready(&self) -> bool {
        if self
            .manager
            .is_index_ready(&self.database, &self.collection, &self.index)
            .await
        {
            true
        } else {
            warn!(
                "Search index '{}' on '{}.{}' is absent or not ready; returning no results",
                self.index, self.database, self.collection
            );
            false
        }
    }

    async fn query_vector(&self, input: QueryInput) -> Option<Vec<f32>> {
        match input {
            QueryInput::Vector(vector) => Some(vector),
            QueryInput::Text(text) => match self.embedder.embed_boxed(&text).await {
                Ok(vector) => Some(vector),
                Err(e) => {
                    error!(error = %e, "Failed to embed query text");
                    None
                }
            },
        }
    }
}

fn into_scored_result(hit: ScoredDocument) -> SearchResult {
    SearchResult {
        document: strip_embeddings(hit.document),
        score: Some(hit.score),
    }
}

fn strip_embeddings(mut document: Document) -> Document {
    document.retain(|key, _| !is_embedding_field(key));
    document
}
