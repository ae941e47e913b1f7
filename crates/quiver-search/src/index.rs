//! Search index lifecycle management.
//!
//! `IndexManager` drives the create / poll / ready state machine for vector
//! search indexes. Index builds are asynchronous on managed stores: creation
//! registers the index, after which it reports PENDING until the build
//! completes, so callers gate queries on [`IndexManager::wait_until_ready`]
//! or [`IndexManager::is_index_ready`].

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, error, info, warn};

use quiver_core::error::Result;
use quiver_core::types::{
    embedding_field, DistanceMetric, Document, IndexStatus, DIMENSION_PROBE_TEXT, ID_FIELD,
};
use quiver_store::{DocumentStore, Filter, IndexDefinition};

use crate::embedding::DynEmbeddingProvider;

/// Manages vector search indexes on a document store.
pub struct IndexManager<S> {
    store: Arc<S>,
    embedder: Arc<dyn DynEmbeddingProvider>,
}

impl<S> Clone for IndexManager<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            embedder: Arc::clone(&self.embedder),
        }
    }
}

impl<S: DocumentStore> IndexManager<S> {
    pub fn new(store: Arc<S>, embedder: Arc<dyn DynEmbeddingProvider>) -> Self {
        Self { store, embedder }
    }

    /// Make sure a collection exists, bootstrapping it if necessary.
    ///
    /// Stores create collections lazily on first insert, but a search index
    /// can only be created on an existing collection. A placeholder document
    /// is inserted and immediately deleted to force the collection into
    /// existence; the two steps are not atomic, which is fine because a
    /// racing caller performing the same bootstrap is harmless.
    pub async fn ensure_collection(&self, database: &str, collection: &str) -> Result<()> {
        let existing = self.store.list_collections(database).await?;
        if existing.iter().any(|name| name == collection) {
            debug!("Collection '{}.{}' already exists", database, collection);
            return Ok(());
        }

        let mut placeholder = Document::new();
        placeholder.insert(ID_FIELD.to_string(), Value::from(0));
        placeholder.insert("placeholder".to_string(), Value::Bool(true));
        self.store
            .insert_one(database, collection, placeholder)
            .await?;
        self.store
            .delete_many(database, collection, &Filter::new().eq(ID_FIELD, 0))
            .await?;
        info!("Collection '{}.{}' created", database, collection);
        Ok(())
    }

    /// Create a vector search index over `<text_field>_embedding`.
    ///
    /// Idempotent: if an index of that name already exists on the
    /// collection, the call logs and returns without touching the store.
    /// The index dimensionality is probed by embedding a sample string, so
    /// it always matches whatever provider is configured. Errors from the
    /// provider or the store are fatal to the caller.
    pub async fn create_index(
        &self,
        database: &str,
        collection: &str,
        index: &str,
        text_field: &str,
        metric: DistanceMetric,
    ) -> Result<()> {
        self.ensure_collection(database, collection).await?;

        if self.index_exists(database, collection, index).await {
            info!(
                "Search index '{}' already exists on '{}.{}'; skipping creation",
                index, database, collection
            );
            return Ok(());
        }

        let probe = self.embedder.embed_boxed(DIMENSION_PROBE_TEXT).await?;
        let dimensions = probe.len();
        let definition = IndexDefinition {
            name: index.to_string(),
            path: embedding_field(text_field),
            metric,
            dimensions,
        };
        self.store
            .create_search_index(database, collection, definition)
            .await?;
        info!(
            "Search index '{}' created on '{}.{}' ({} dimensions, {} metric)",
            index, database, collection, dimensions, metric
        );
        Ok(())
    }

    /// Current status of the named index.
    ///
    /// Store failures are logged and reported as [`IndexStatus::Absent`],
    /// keeping status checks non-throwing.
    pub async fn index_status(
        &self,
        database: &str,
        collection: &str,
        index: &str,
    ) -> IndexStatus {
        match self.store.list_search_indexes(database, collection).await {
            Ok(descriptors) => descriptors
                .iter()
                .find(|descriptor| descriptor.name == index)
                .map(|descriptor| IndexStatus::from_report(&descriptor.status))
                .unwrap_or(IndexStatus::Absent),
            Err(e) => {
                error!(error = %e, "Failed to list search indexes on '{}.{}'", database, collection);
                IndexStatus::Absent
            }
        }
    }

    /// True if the named index exists, in any status.
    pub async fn index_exists(&self, database: &str, collection: &str, index: &str) -> bool {
        self.index_status(database, collection, index).await != IndexStatus::Absent
    }

    /// True if the named index is queryable.
    pub async fn is_index_ready(&self, database: &str, collection: &str, index: &str) -> bool {
        self.index_status(database, collection, index).await.is_ready()
    }

    /// Poll until the index reports READY, at most `max_attempts` times with
    /// `interval` between probes.
    ///
    /// Returns `false` once attempts are exhausted or the store reports the
    /// build FAILED. There is no internal timeout beyond the attempt count;
    /// callers wanting wall-clock or shutdown cancellation race this future
    /// against a timer or signal, which cancels it at the next probe or
    /// sleep point.
    pub async fn wait_until_ready(
        &self,
        database: &str,
        collection: &str,
        index: &str,
        max_attempts: u32,
        interval: Duration,
    ) -> bool {
        for attempt in 1..=max_attempts {
            match self.index_status(database, collection, index).await {
                IndexStatus::Ready => {
                    info!(attempt, "Search index '{}' is ready", index);
                    return true;
                }
                IndexStatus::Failed => {
                    warn!(attempt, "Search index '{}' build failed", index);
                    return false;
                }
                IndexStatus::Pending | IndexStatus::Absent => {
                    debug!(
                        attempt,
                        max_attempts, "Search index '{}' not ready yet", index
                    );
                }
            }
            if attempt < max_attempts {
                tokio::time::sleep(interval).await;
            }
        }
        warn!(
            "Search index '{}' not ready after {} attempts",
            index, max_attempts
        );
        false
    }
}
