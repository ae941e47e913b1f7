use thiserror::Error;

/// Top-level error type for the Quiver workspace.
///
/// Variants carry a rendered message per subsystem. Store backends and the
/// embedding seam map their native failures into `Store` / `Provider` so the
/// `?` operator works across crate boundaries without leaking driver types.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuiverError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Embedding provider error: {0}")]
    Provider(String),

    #[error("Store operation error: {0}")]
    Store(String),

    #[error("Graph error: {0}")]
    Graph(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for QuiverError {
    fn from(err: toml::de::Error) -> Self {
        QuiverError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for QuiverError {
    fn from(err: toml::ser::Error) -> Self {
        QuiverError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for QuiverError {
    fn from(err: serde_json::Error) -> Self {
        QuiverError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Quiver operations.
pub type Result<T> = std::result::Result<T, QuiverError>;
