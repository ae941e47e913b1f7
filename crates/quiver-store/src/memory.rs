//! In-memory document store.
//!
//! Backs tests and ephemeral runs. Index readiness is simulated through
//! [`IndexProvisioning`] so lifecycle code can be exercised against builds
//! that complete after a configurable number of status probes, never
//! complete, or fail outright.

use std::collections::BTreeMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde_json::Value;

use quiver_core::error::{QuiverError, Result};
use quiver_core::types::{document_vector, ensure_document_id, Document};

use crate::filter::Filter;
use crate::scoring::similarity_score;
use crate::store::{
    DocumentStore, IndexDefinition, IndexDescriptor, ScoredDocument, VectorQuery, STATUS_FAILED,
    STATUS_PENDING, STATUS_READY,
};

/// How new search indexes transition out of PENDING.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexProvisioning {
    /// Indexes are queryable as soon as they are created.
    Immediate,
    /// Indexes report PENDING for the first `n` listing calls, then READY.
    AfterPolls(u32),
    /// Indexes stay PENDING forever.
    Never,
    /// Index builds fail; indexes report FAILED.
    Failed,
}

fn report_status(provisioning: IndexProvisioning, polls: u32) -> &'static str {
    match provisioning {
        IndexProvisioning::Immediate => STATUS_READY,
        IndexProvisioning::AfterPolls(n) if polls >= n => STATUS_READY,
        IndexProvisioning::AfterPolls(_) => STATUS_PENDING,
        IndexProvisioning::Never => STATUS_PENDING,
        IndexProvisioning::Failed => STATUS_FAILED,
    }
}

#[derive(Debug)]
struct IndexState {
    definition: IndexDefinition,
    created_at: DateTime<Utc>,
    /// Number of times this index has appeared in a listing call.
    polls: u32,
}

#[derive(Debug, Default)]
struct CollectionState {
    documents: Vec<Document>,
    indexes: Vec<IndexState>,
}

type DatabaseState = BTreeMap<String, CollectionState>;

/// Volatile document store holding everything behind one RwLock.
///
/// Collections are created lazily on first insert, documents keep their
/// insertion order, and collection listings are sorted by name.
#[derive(Debug)]
pub struct MemoryStore {
    provisioning: IndexProvisioning,
    databases: RwLock<BTreeMap<String, DatabaseState>>,
}

impl MemoryStore {
    /// Create a store whose indexes are READY immediately.
    pub fn new() -> Self {
        Self::with_provisioning(IndexProvisioning::Immediate)
    }

    /// Create a store with the given index provisioning behavior.
    pub fn with_provisioning(provisioning: IndexProvisioning) -> Self {
        Self {
            provisioning,
            databases: RwLock::new(BTreeMap::new()),
        }
    }

    /// Number of listing calls that have observed the given index.
    pub fn observed_polls(&self, database: &str, collection: &str, index: &str) -> u32 {
        self.databases
            .read()
            .ok()
            .and_then(|dbs| {
                dbs.get(database)?
                    .get(collection)?
                    .indexes
                    .iter()
                    .find(|state| state.definition.name == index)
                    .map(|state| state.polls)
            })
            .unwrap_or(0)
    }

    fn read(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, BTreeMap<String, DatabaseState>>> {
        self.databases
            .read()
            .map_err(|e| QuiverError::Store(format!("Store lock poisoned: {}", e)))
    }

    fn write(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, BTreeMap<String, DatabaseState>>> {
        self.databases
            .write()
            .map_err(|e| QuiverError::Store(format!("Store lock poisoned: {}", e)))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStore for MemoryStore {
    async fn list_collections(&self, database: &str) -> Result<Vec<String>> {
        let databases = self.read()?;
        Ok(databases
            .get(database)
            .map(|db| db.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn insert_one(
        &self,
        database: &str,
        collection: &str,
        mut document: Document,
    ) -> Result<Value> {
        let mut databases = self.write()?;
        let state = databases
            .entry(database.to_string())
            .or_default()
            .entry(collection.to_string())
            .or_default();
        let id = ensure_document_id(&mut document);
        state.documents.push(document);
        Ok(id)
    }

    async fn insert_many(
        &self,
        database: &str,
        collection: &str,
        documents: Vec<Document>,
    ) -> Result<Vec<Value>> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }
        let mut databases = self.write()?;
        let state = databases
            .entry(database.to_string())
            .or_default()
            .entry(collection.to_string())
            .or_default();
        let mut ids = Vec::with_capacity(documents.len());
        for mut document in documents {
            ids.push(ensure_document_id(&mut document));
            state.documents.push(document);
        }
        Ok(ids)
    }

    async fn delete_many(
        &self,
        database: &str,
        collection: &str,
        filter: &Filter,
    ) -> Result<u64> {
        let compiled = filter.compile()?;
        let mut databases = self.write()?;
        let Some(state) = databases
            .get_mut(database)
            .and_then(|db| db.get_mut(collection))
        else {
            return Ok(0);
        };
        let before = state.documents.len();
        state.documents.retain(|doc| !compiled.matches(doc));
        Ok((before - state.documents.len()) as u64)
    }

    async fn find(
        &self,
        database: &str,
        collection: &str,
        filter: &Filter,
        limit: Option<usize>,
    ) -> Result<Vec<Document>> {
        let compiled = filter.compile()?;
        let databases = self.read()?;
        let Some(state) = databases.get(database).and_then(|db| db.get(collection)) else {
            return Ok(Vec::new());
        };
        let mut matches = Vec::new();
        for doc in &state.documents {
            if compiled.matches(doc) {
                matches.push(doc.clone());
                if limit.is_some_and(|n| matches.len() >= n) {
                    break;
                }
            }
        }
        Ok(matches)
    }

    async fn count_documents(&self, database: &str, collection: &str) -> Result<u64> {
        let databases = self.read()?;
        Ok(databases
            .get(database)
            .and_then(|db| db.get(collection))
            .map(|state| state.documents.len() as u64)
            .unwrap_or(0))
    }

    async fn create_search_index(
        &self,
        database: &str,
        collection: &str,
        definition: IndexDefinition,
    ) -> Result<()> {
        let mut databases = self.write()?;
        let Some(state) = databases
            .get_mut(database)
            .and_then(|db| db.get_mut(collection))
        else {
            return Err(QuiverError::Store(format!(
                "Cannot create search index on unknown collection '{}.{}'",
                database, collection
            )));
        };
        if state
            .indexes
            .iter()
            .any(|existing| existing.definition.name == definition.name)
        {
            return Err(QuiverError::Store(format!(
                "Search index '{}' already exists on '{}.{}'",
                definition.name, database, collection
            )));
        }
        state.indexes.push(IndexState {
            definition,
            created_at: Utc::now(),
            polls: 0,
        });
        Ok(())
    }

    async fn list_search_indexes(
        &self,
        database: &str,
        collection: &str,
    ) -> Result<Vec<IndexDescriptor>> {
        let mut databases = self.write()?;
        let Some(state) = databases
            .get_mut(database)
            .and_then(|db| db.get_mut(collection))
        else {
            return Ok(Vec::new());
        };
        let mut descriptors = Vec::with_capacity(state.indexes.len());
        for index in &mut state.indexes {
            descriptors.push(IndexDescriptor {
                name: index.definition.name.clone(),
                status: report_status(self.provisioning, index.polls).to_string(),
                definition: index.definition.clone(),
                created_at: index.created_at,
            });
            index.polls += 1;
        }
        Ok(descriptors)
    }

    async fn vector_query(&self, query: VectorQuery) -> Result<Vec<ScoredDocument>> {
        let databases = self.read()?;
        let state = databases
            .get(&query.database)
            .and_then(|db| db.get(&query.collection));
        let Some(index) = state.and_then(|s| {
            s.indexes
                .iter()
                .find(|index| index.definition.name == query.index)
        }) else {
            return Err(QuiverError::Store(format!(
                "Unknown search index '{}' on '{}.{}'",
                query.index, query.database, query.collection
            )));
        };
        let definition = &index.definition;

        let mut scored: Vec<ScoredDocument> = state
            .map(|s| s.documents.as_slice())
            .unwrap_or_default()
            .iter()
            .filter_map(|doc| {
                let vector = document_vector(doc, &definition.path)?;
                Some(ScoredDocument {
                    document: doc.clone(),
                    score: similarity_score(definition.metric, &query.vector, &vector),
                })
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(query.limit);
        Ok(scored)
    }
}
