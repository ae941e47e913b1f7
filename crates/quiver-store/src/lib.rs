//! Quiver store crate - document store trait and backends.
//!
//! Defines the narrow [`DocumentStore`] interface the engine is written
//! against, plus two implementations: a volatile [`MemoryStore`] with
//! configurable index provisioning for tests, and a WAL-mode SQLite
//! [`SqliteStore`] for durable local storage. Filters and similarity
//! scoring are shared between backends so both report identical query
//! semantics.

pub mod db;
pub mod filter;
pub mod memory;
pub mod migrations;
pub mod scoring;
pub mod sqlite;
pub mod store;

pub use db::Database;
pub use filter::{CompiledFilter, Condition, Filter};
pub use memory::{IndexProvisioning, MemoryStore};
pub use scoring::similarity_score;
pub use sqlite::SqliteStore;
pub use store::{
    DocumentStore, IndexDefinition, IndexDescriptor, ScoredDocument, VectorQuery, STATUS_FAILED,
    STATUS_PENDING, STATUS_READY,
};
