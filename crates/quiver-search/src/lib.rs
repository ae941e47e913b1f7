//! Quiver Search crate - index lifecycle, embedding providers, ingestion, and retrieval.
//!
//! Provides the search index creation and readiness polling state machine,
//! an embedding provider trait with a deterministic hashing implementation,
//! the document ingestion pipeline, and the hybrid retrieval engine.

pub mod embedding;
pub mod index;
pub mod pipeline;
pub mod search;

pub use embedding::{DynEmbeddingProvider, EmbeddingProvider, HashEmbedding};
pub use index::IndexManager;
pub use pipeline::{IngestionPipeline, InsertOutcome};
pub use search::{QueryInput, SearchEngine, SearchResult};
