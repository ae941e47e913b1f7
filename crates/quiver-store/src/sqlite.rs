//! Durable document store on SQLite.
//!
//! Documents are JSON rows ordered by rowid, so `find` iteration order is
//! insertion order just like the in-memory backend. Filters and vector
//! scoring run in Rust over the loaded rows; this is an exact scan, not an
//! approximate index, which is the honest implementation at local scale.
//!
//! Search index readiness is simulated: each index row carries a poll
//! counter, and the index reports PENDING until the counter reaches the
//! store's `ready_after_polls`.

use std::path::Path;

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{Connection, OptionalExtension};
use serde_json::Value;

use quiver_core::error::{QuiverError, Result};
use quiver_core::types::{document_vector, ensure_document_id, Document};

use crate::db::Database;
use crate::filter::Filter;
use crate::scoring::similarity_score;
use crate::store::{
    DocumentStore, IndexDefinition, IndexDescriptor, ScoredDocument, VectorQuery, STATUS_PENDING,
    STATUS_READY,
};

/// SQLite-backed [`DocumentStore`].
pub struct SqliteStore {
    db: Database,
    ready_after_polls: u32,
}

impl SqliteStore {
    /// Open (or create) a store at the given path.
    ///
    /// `ready_after_polls` controls simulated index provisioning: new
    /// search indexes report PENDING for that many listing calls before
    /// turning READY. 0 means READY immediately.
    pub fn open(path: &Path, ready_after_polls: u32) -> Result<Self> {
        Ok(Self {
            db: Database::open(path)?,
            ready_after_polls,
        })
    }

    /// Open an in-memory store with immediately-ready indexes.
    pub fn in_memory() -> Result<Self> {
        Self::in_memory_with_provisioning(0)
    }

    /// Open an in-memory store with the given provisioning delay.
    pub fn in_memory_with_provisioning(ready_after_polls: u32) -> Result<Self> {
        Ok(Self {
            db: Database::in_memory()?,
            ready_after_polls,
        })
    }
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("ready_after_polls", &self.ready_after_polls)
            .finish()
    }
}

fn collection_id(conn: &Connection, database: &str, collection: &str) -> Result<Option<i64>> {
    conn.query_row(
        "SELECT id FROM collections WHERE db_name = ?1 AND name = ?2",
        rusqlite::params![database, collection],
        |row| row.get(0),
    )
    .optional()
    .map_err(|e| QuiverError::Store(format!("Failed to resolve collection: {}", e)))
}

fn ensure_collection(conn: &Connection, database: &str, collection: &str) -> Result<i64> {
    conn.execute(
        "INSERT OR IGNORE INTO collections (db_name, name) VALUES (?1, ?2)",
        rusqlite::params![database, collection],
    )
    .map_err(|e| QuiverError::Store(format!("Failed to create collection: {}", e)))?;
    collection_id(conn, database, collection)?.ok_or_else(|| {
        QuiverError::Store(format!(
            "Collection '{}.{}' missing after creation",
            database, collection
        ))
    })
}

fn insert_document(conn: &Connection, collection_id: i64, document: &Document) -> Result<()> {
    let body = serde_json::to_string(document)?;
    conn.execute(
        "INSERT INTO documents (collection_id, body) VALUES (?1, ?2)",
        rusqlite::params![collection_id, body],
    )
    .map_err(|e| QuiverError::Store(format!("Failed to insert document: {}", e)))?;
    Ok(())
}

/// Load every document in a collection, in insertion (rowid) order.
fn load_documents(conn: &Connection, collection_id: i64) -> Result<Vec<(i64, Document)>> {
    let mut stmt = conn
        .prepare("SELECT id, body FROM documents WHERE collection_id = ?1 ORDER BY id ASC")
        .map_err(|e| QuiverError::Store(e.to_string()))?;
    let rows = stmt
        .query_map([collection_id], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })
        .map_err(|e| QuiverError::Store(e.to_string()))?;

    let mut documents = Vec::new();
    for row in rows {
        let (rowid, body) = row.map_err(|e| QuiverError::Store(e.to_string()))?;
        let doc: Document = serde_json::from_str(&body)
            .map_err(|e| QuiverError::Store(format!("Corrupt document row {}: {}", rowid, e)))?;
        documents.push((rowid, doc));
    }
    Ok(documents)
}

impl DocumentStore for SqliteStore {
    async fn list_collections(&self, database: &str) -> Result<Vec<String>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT name FROM collections WHERE db_name = ?1 ORDER BY name ASC")
                .map_err(|e| QuiverError::Store(e.to_string()))?;
            let rows = stmt
                .query_map([database], |row| row.get::<_, String>(0))
                .map_err(|e| QuiverError::Store(e.to_string()))?;
            let mut names = Vec::new();
            for row in rows {
                names.push(row.map_err(|e| QuiverError::Store(e.to_string()))?);
            }
            Ok(names)
        })
    }

    async fn insert_one(
        &self,
        database: &str,
        collection: &str,
        mut document: Document,
    ) -> Result<Value> {
        self.db.with_conn(|conn| {
            let cid = ensure_collection(conn, database, collection)?;
            let id = ensure_document_id(&mut document);
            insert_document(conn, cid, &document)?;
            Ok(id)
        })
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
        self.db.with_conn(|conn| {
            let cid = ensure_collection(conn, database, collection)?;
            let mut ids = Vec::with_capacity(documents.len());
            for mut document in documents {
                ids.push(ensure_document_id(&mut document));
                insert_document(conn, cid, &document)?;
            }
            Ok(ids)
        })
    }

    async fn delete_many(
        &self,
        database: &str,
        collection: &str,
        filter: &Filter,
    ) -> Result<u64> {
        let compiled = filter.compile()?;
        self.db.with_conn(|conn| {
            let Some(cid) = collection_id(conn, database, collection)? else {
                return Ok(0);
            };
            if filter.is_empty() {
                let deleted = conn
                    .execute("DELETE FROM documents WHERE collection_id = ?1", [cid])
                    .map_err(|e| QuiverError::Store(format!("Failed to delete: {}", e)))?;
                return Ok(deleted as u64);
            }

            let matching: Vec<i64> = load_documents(conn, cid)?
                .into_iter()
                .filter(|(_, doc)| compiled.matches(doc))
                .map(|(rowid, _)| rowid)
                .collect();
            let mut stmt = conn
                .prepare("DELETE FROM documents WHERE id = ?1")
                .map_err(|e| QuiverError::Store(e.to_string()))?;
            for rowid in &matching {
                stmt.execute([rowid])
                    .map_err(|e| QuiverError::Store(format!("Failed to delete: {}", e)))?;
            }
            Ok(matching.len() as u64)
        })
    }

    async fn find(
        &self,
        database: &str,
        collection: &str,
        filter: &Filter,
        limit: Option<usize>,
    ) -> Result<Vec<Document>> {
        let compiled = filter.compile()?;
        self.db.with_conn(|conn| {
            let Some(cid) = collection_id(conn, database, collection)? else {
                return Ok(Vec::new());
            };
            let mut matches = Vec::new();
            for (_, doc) in load_documents(conn, cid)? {
                if compiled.matches(&doc) {
                    matches.push(doc);
                    if limit.is_some_and(|n| matches.len() >= n) {
                        break;
                    }
                }
            }
            Ok(matches)
        })
    }

    async fn count_documents(&self, database: &str, collection: &str) -> Result<u64> {
        self.db.with_conn(|conn| {
            let Some(cid) = collection_id(conn, database, collection)? else {
                return Ok(0);
            };
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM documents WHERE collection_id = ?1",
                    [cid],
                    |row| row.get(0),
                )
                .map_err(|e| QuiverError::Store(format!("Failed to count: {}", e)))?;
            Ok(count as u64)
        })
    }

    async fn create_search_index(
        &self,
        database: &str,
        collection: &str,
        definition: IndexDefinition,
    ) -> Result<()> {
        self.db.with_conn(|conn| {
            let Some(cid) = collection_id(conn, database, collection)? else {
                return Err(QuiverError::Store(format!(
                    "Cannot create search index on unknown collection '{}.{}'",
                    database, collection
                )));
            };
            let existing: Option<i64> = conn
                .query_row(
                    "SELECT id FROM search_indexes WHERE collection_id = ?1 AND name = ?2",
                    rusqlite::params![cid, definition.name],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|e| QuiverError::Store(e.to_string()))?;
            if existing.is_some() {
                return Err(QuiverError::Store(format!(
                    "Search index '{}' already exists on '{}.{}'",
                    definition.name, database, collection
                )));
            }

            let body = serde_json::to_string(&definition)?;
            conn.execute(
                "INSERT INTO search_indexes (collection_id, name, definition, ready_after_polls)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![cid, definition.name, body, self.ready_after_polls],
            )
            .map_err(|e| QuiverError::Store(format!("Failed to create search index: {}", e)))?;
            Ok(())
        })
    }

    async fn list_search_indexes(
        &self,
        database: &str,
        collection: &str,
    ) -> Result<Vec<IndexDescriptor>> {
        self.db.with_conn(|conn| {
            let Some(cid) = collection_id(conn, database, collection)? else {
                return Ok(Vec::new());
            };

            let rows: Vec<(i64, String, i64, i64, i64)> = {
                let mut stmt = conn
                    .prepare(
                        "SELECT id, definition, ready_after_polls, polls, created_at
                         FROM search_indexes WHERE collection_id = ?1 ORDER BY id ASC",
                    )
                    .map_err(|e| QuiverError::Store(e.to_string()))?;
                let mapped = stmt
                    .query_map([cid], |row| {
                        Ok((
                            row.get(0)?,
                            row.get(1)?,
                            row.get(2)?,
                            row.get(3)?,
                            row.get(4)?,
                        ))
                    })
                    .map_err(|e| QuiverError::Store(e.to_string()))?;
                let mut collected = Vec::new();
                for row in mapped {
                    collected.push(row.map_err(|e| QuiverError::Store(e.to_string()))?);
                }
                collected
            };

            let mut descriptors = Vec::with_capacity(rows.len());
            for (row_id, body, ready_after, polls, created_secs) in rows {
                let definition: IndexDefinition = serde_json::from_str(&body)
                    .map_err(|e| QuiverError::Store(format!("Corrupt index row {}: {}", row_id, e)))?;
                let status = if polls >= ready_after {
                    STATUS_READY
                } else {
                    STATUS_PENDING
                };
                conn.execute(
                    "UPDATE search_indexes SET polls = polls + 1 WHERE id = ?1",
                    [row_id],
                )
                .map_err(|e| QuiverError::Store(e.to_string()))?;
                descriptors.push(IndexDescriptor {
                    name: definition.name.clone(),
                    status: status.to_string(),
                    definition,
                    created_at: created_at_from_secs(created_secs),
                });
            }
            Ok(descriptors)
        })
    }

    async fn vector_query(&self, query: VectorQuery) -> Result<Vec<ScoredDocument>> {
        self.db.with_conn(|conn| {
            let Some(cid) = collection_id(conn, &query.database, &query.collection)? else {
                return Err(unknown_index(&query));
            };
            let body: Option<String> = conn
                .query_row(
                    "SELECT definition FROM search_indexes WHERE collection_id = ?1 AND name = ?2",
                    rusqlite::params![cid, query.index],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|e| QuiverError::Store(e.to_string()))?;
            let Some(body) = body else {
                return Err(unknown_index(&query));
            };
            let definition: IndexDefinition = serde_json::from_str(&body)
                .map_err(|e| QuiverError::Store(format!("Corrupt index definition: {}", e)))?;

            let mut scored: Vec<ScoredDocument> = load_documents(conn, cid)?
                .into_iter()
                .filter_map(|(_, doc)| {
                    let vector = document_vector(&doc, &definition.path)?;
                    Some(ScoredDocument {
                        score: similarity_score(definition.metric, &query.vector, &vector),
                        document: doc,
                    })
                })
                .collect();

            scored.sort_by(|a, b| {
                b.score
                    .partial_cmp(&a.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            scored.truncate(query.limit);
            Ok(scored)
        })
    }
}

fn unknown_index(query: &VectorQuery) -> QuiverError {
    QuiverError::Store(format!(
        "Unknown search index '{}' on '{}.{}'",
        query.index, query.database, query.collection
    ))
}

fn created_at_from_secs(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap_or_else(Utc::now)
}
