//! Embedding ingestion pipeline.
//!
//! Takes raw JSON documents, embeds nominated text fields, and bulk-inserts
//! the survivors into one target collection. Documents that cannot be fully
//! embedded are dropped individually; the batch as a whole only aborts when
//! the collection already holds data.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use quiver_core::error::Result;
use quiver_core::types::{embedding_field, Document};
use quiver_store::DocumentStore;

use crate::embedding::EmbeddingProvider;

/// Result of a bulk ingestion attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InsertOutcome {
    /// The target collection already held documents; nothing was inserted.
    SkippedExisting { existing: u64 },
    /// The surviving batch was inserted. `dropped` counts documents removed
    /// for a missing embed field or a failed embedding call.
    Inserted { inserted: usize, dropped: usize },
}

/// Ingestion pipeline bound to one target collection.
pub struct IngestionPipeline<S, E> {
    store: Arc<S>,
    embedder: E,
    database: String,
    collection: String,
}

impl<S: DocumentStore, E: EmbeddingProvider> IngestionPipeline<S, E> {
    pub fn new(
        store: Arc<S>,
        embedder: E,
        database: impl Into<String>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            store,
            embedder,
            database: database.into(),
            collection: collection.into(),
        }
    }

    /// Embed `fields_to_embed` on every document and insert the survivors.
    ///
    /// One-shot seeding guard: if the target collection already contains any
    /// document, the entire call is a no-op. This is not a dedup mechanism;
    /// re-running against a non-empty collection silently inserts nothing.
    ///
    /// Per-document skip semantics: a document missing one of the nominated
    /// fields (or holding a non-text value there), or whose embedding call
    /// fails, is dropped from the batch without affecting the others. Each
    /// surviving document gains a `<field>_embedding` sibling per embedded
    /// field. Store and batch-level failures are returned as errors;
    /// per-document drops are not.
    pub async fn insert_documents(
        &self,
        documents: Vec<Document>,
        fields_to_embed: &[&str],
    ) -> Result<InsertOutcome> {
        let existing = self
            .store
            .count_documents(&self.database, &self.collection)
            .await?;
        if existing > 0 {
            info!(
                "Collection '{}.{}' already contains {} documents; skipping insert",
                self.database, self.collection, existing
            );
            return Ok(InsertOutcome::SkippedExisting { existing });
        }

        let total = documents.len();
        let mut survivors = Vec::with_capacity(total);
        for mut document in documents {
            if self.embed_fields(&mut document, fields_to_embed).await {
                survivors.push(document);
            }
        }

        let dropped = total - survivors.len();
        if survivors.is_empty() {
            warn!(
                "No documents inserted into '{}.{}'; all {} dropped",
                self.database, self.collection, total
            );
            return Ok(InsertOutcome::Inserted {
                inserted: 0,
                dropped,
            });
        }

        let ids = self
            .store
            .insert_many(&self.database, &self.collection, survivors)
            .await?;
        info!(
            "Inserted {} documents into '{}.{}' ({} dropped)",
            ids.len(),
            self.database,
            self.collection,
            dropped
        );
        Ok(InsertOutcome::Inserted {
            inserted: ids.len(),
            dropped,
        })
    }

    /// Embed each nominated field in place. Returns false if the document
    /// should be dropped.
    async fn embed_fields(&self, document: &mut Document, fields: &[&str]) -> bool {
        for field in fields {
            let Some(text) = document.get(*field).and_then(|v| v.as_str()).map(String::from)
            else {
                warn!(
                    "Field '{}' missing or not text in document '{}'; dropping document",
                    field,
                    document_label(document)
                );
                return false;
            };
            match self.embedder.embed(&text).await {
                Ok(vector) => {
                    document.insert(embedding_field(field), Value::from(vector));
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        "Embedding failed for field '{}' in document '{}'; dropping document",
                        field,
                        document_label(document)
                    );
                    return false;
                }
            }
        }
        true
    }
}

/// Human-readable label for log lines about a document.
fn document_label(document: &Document) -> String {
    if let Some(name) = document.get("name").and_then(|v| v.as_str()) {
        return name.to_string();
    }
    if let Some(id) = document.get(quiver_core::types::ID_FIELD) {
        return id.to_string();
    }
    "unnamed".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbedding;
    use quiver_core::error::QuiverError;
    use quiver_store::{Filter, MemoryStore};
    use serde_json::json;

    fn make_doc(value: Value) -> Document {
        value.as_object().unwrap().clone()
    }

    fn make_pipeline(store: Arc<MemoryStore>) -> IngestionPipeline<MemoryStore, HashEmbedding> {
        IngestionPipeline::new(store, HashEmbedding::new(), "db", "docs")
    }

    /// Provider that fails on texts containing a marker substring.
    struct FlakyEmbedding;

    impl EmbeddingProvider for FlakyEmbedding {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            if text.contains("poison") {
                return Err(QuiverError::Provider("refusing poisoned text".to_string()));
            }
            HashEmbedding::new().embed(text).await
        }
        fn dimensions(&self) -> usize {
            384
        }
    }

    #[tokio::test]
    async fn test_insert_embeds_nominated_field() {
        let store = Arc::new(MemoryStore::new());
        let pipeline = make_pipeline(Arc::clone(&store));

        let outcome = pipeline
            .insert_documents(
                vec![
                    make_doc(json!({"name": "one", "content": "cats"})),
                    make_doc(json!({"name": "two", "content": "dogs"})),
                ],
                &["content"],
            )
            .await
            .unwrap();

        assert_eq!(
            outcome,
            InsertOutcome::Inserted {
                inserted: 2,
                dropped: 0
            }
        );
        let docs = store.find("db", "docs", &Filter::new(), None).await.unwrap();
        assert_eq!(docs.len(), 2);
        for doc in &docs {
            let vector = doc["content_embedding"].as_array().unwrap();
            assert_eq!(vector.len(), 384);
            assert!(doc.contains_key("_id"));
        }
    }

    #[tokio::test]
    async fn test_bulk_guard_skips_non_empty_collection() {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_one("db", "docs", make_doc(json!({"name": "existing"})))
            .await
            .unwrap();
        let pipeline = make_pipeline(Arc::clone(&store));

        let outcome = pipeline
            .insert_documents(vec![make_doc(json!({"content": "new"}))], &["content"])
            .await
            .unwrap();

        assert_eq!(outcome, InsertOutcome::SkippedExisting { existing: 1 });
        assert_eq!(store.count_documents("db", "docs").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_missing_field_drops_only_that_document() {
        let store = Arc::new(MemoryStore::new());
        let pipeline = make_pipeline(Arc::clone(&store));

        let outcome = pipeline
            .insert_documents(
                vec![
                    make_doc(json!({"name": "keep", "content": "has text"})),
                    make_doc(json!({"name": "drop-me", "title": "no content field"})),
                    make_doc(json!({"name": "keep-too", "content": "also text"})),
                ],
                &["content"],
            )
            .await
            .unwrap();

        assert_eq!(
            outcome,
            InsertOutcome::Inserted {
                inserted: 2,
                dropped: 1
            }
        );
        let docs = store.find("db", "docs", &Filter::new(), None).await.unwrap();
        let names: Vec<&str> = docs.iter().map(|d| d["name"].as_str().unwrap()).collect();
        assert_eq!(names, vec!["keep", "keep-too"]);
    }

    #[tokio::test]
    async fn test_non_text_field_drops_document() {
        let store = Arc::new(MemoryStore::new());
        let pipeline = make_pipeline(Arc::clone(&store));

        let outcome = pipeline
            .insert_documents(
                vec![make_doc(json!({"name": "numeric", "content": 42}))],
                &["content"],
            )
            .await
            .unwrap();

        assert_eq!(
            outcome,
            InsertOutcome::Inserted {
                inserted: 0,
                dropped: 1
            }
        );
    }

    #[tokio::test]
    async fn test_failed_embedding_drops_only_that_document() {
        let store = Arc::new(MemoryStore::new());
        let pipeline = IngestionPipeline::new(Arc::clone(&store), FlakyEmbedding, "db", "docs");

        let outcome = pipeline
            .insert_documents(
                vec![
                    make_doc(json!({"name": "good", "content": "fine text"})),
                    make_doc(json!({"name": "bad", "content": "poison pill"})),
                ],
                &["content"],
            )
            .await
            .unwrap();

        assert_eq!(
            outcome,
            InsertOutcome::Inserted {
                inserted: 1,
                dropped: 1
            }
        );
        let docs = store.find("db", "docs", &Filter::new(), None).await.unwrap();
        assert_eq!(docs[0]["name"], json!("good"));
    }

    #[tokio::test]
    async fn test_wholly_dropped_batch_is_not_an_error() {
        let store = Arc::new(MemoryStore::new());
        let pipeline = make_pipeline(Arc::clone(&store));

        let outcome = pipeline
            .insert_documents(
                vec![make_doc(json!({"name": "no-field"}))],
                &["content"],
            )
            .await
            .unwrap();

        assert_eq!(
            outcome,
            InsertOutcome::Inserted {
                inserted: 0,
                dropped: 1
            }
        );
        assert_eq!(store.count_documents("db", "docs").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_multiple_embed_fields_gain_siblings() {
        let store = Arc::new(MemoryStore::new());
        let pipeline = make_pipeline(Arc::clone(&store));

        pipeline
            .insert_documents(
                vec![make_doc(
                    json!({"name": "both", "content": "body text", "title": "headline"}),
                )],
                &["content", "title"],
            )
            .await
            .unwrap();

        let docs = store.find("db", "docs", &Filter::new(), None).await.unwrap();
        assert!(docs[0].contains_key("content_embedding"));
        assert!(docs[0].contains_key("title_embedding"));
    }

    #[tokio::test]
    async fn test_empty_batch_is_noop() {
        let store = Arc::new(MemoryStore::new());
        let pipeline = make_pipeline(Arc::clone(&store));

        let outcome = pipeline.insert_documents(vec![], &["content"]).await.unwrap();
        assert_eq!(
            outcome,
            InsertOutcome::Inserted {
                inserted: 0,
                dropped: 0
            }
        );
        // The no-op does not create the collection either.
        assert!(store.list_collections("db").await.unwrap().is_empty());
    }
}
