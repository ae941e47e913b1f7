//! Schema migrations for the SQLite store backend.

use rusqlite::Connection;
use tracing::info;

use quiver_core::error::{QuiverError, Result};

/// Apply all pending migrations.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| QuiverError::Store(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| QuiverError::Store(format!("Failed to query migration version: {}", e)))?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: initial_schema");
    }

    Ok(())
}

/// Version 1: collections, documents, and search index registry.
///
/// Documents are stored as JSON text in insertion order (rowid). Search
/// index rows carry the poll counter that drives simulated readiness.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS collections (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            db_name     TEXT NOT NULL,
            name        TEXT NOT NULL,
            created_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
            UNIQUE (db_name, name)
        );

        CREATE INDEX IF NOT EXISTS idx_collections_db
            ON collections (db_name, name);

        CREATE TABLE IF NOT EXISTS documents (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            collection_id   INTEGER NOT NULL,
            body            TEXT NOT NULL,
            created_at      INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
            FOREIGN KEY (collection_id) REFERENCES collections(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_documents_collection
            ON documents (collection_id, id ASC);

        CREATE TABLE IF NOT EXISTS search_indexes (
            id                  INTEGER PRIMARY KEY AUTOINCREMENT,
            collection_id       INTEGER NOT NULL,
            name                TEXT NOT NULL,
            definition          TEXT NOT NULL,
            ready_after_polls   INTEGER NOT NULL DEFAULT 0,
            polls               INTEGER NOT NULL DEFAULT 0,
            created_at          INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
            UNIQUE (collection_id, name),
            FOREIGN KEY (collection_id) REFERENCES collections(id) ON DELETE CASCADE
        );

        INSERT OR IGNORE INTO schema_migrations (version, name) VALUES (1, 'initial_schema');
        ",
    )
    .map_err(|e| QuiverError::Store(format!("Failed to apply migration v1: {}", e)))?;

    Ok(())
}
