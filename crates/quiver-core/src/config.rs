use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{QuiverError, Result};
use crate::types::DistanceMetric;

/// Top-level configuration for the Quiver engine.
///
/// Loaded from `~/.quiver/config.toml` by default. Each section covers one
/// concern: store backend, index lifecycle, search defaults, graph traversal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QuiverConfig {
    pub general: GeneralConfig,
    pub store: StoreConfig,
    pub index: IndexConfig,
    pub search: SearchConfig,
    pub graph: GraphConfig,
}

impl QuiverConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: QuiverConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| QuiverError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory for the SQLite store file.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.quiver/data".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Document store backend selection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// Volatile in-memory store.
    Memory,
    /// Durable SQLite-backed store.
    #[default]
    Sqlite,
}

/// Document store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Which backend to run against.
    pub backend: StoreBackend,
    /// SQLite file name, resolved under `general.data_dir`.
    pub file: String,
    /// Number of status polls a new index stays PENDING before the store
    /// reports it READY. 0 means indexes are queryable immediately.
    pub ready_after_polls: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Sqlite,
            file: "quiver.db".to_string(),
            ready_after_polls: 0,
        }
    }
}

/// Vector index lifecycle configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Distance metric for new indexes.
    pub metric: DistanceMetric,
    /// Maximum readiness probes before `wait_until_ready` gives up.
    pub poll_max_attempts: u32,
    /// Seconds to sleep between readiness probes.
    pub poll_interval_secs: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            metric: DistanceMetric::Cosine,
            poll_max_attempts: 10,
            poll_interval_secs: 1,
        }
    }
}

/// Search defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Document field searched by keyword and embedded at ingest.
    pub text_field: String,
    /// Default number of results.
    pub default_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            text_field: "content".to_string(),
            default_limit: 5,
        }
    }
}

/// Knowledge-graph traversal configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Maximum traversal depth for `find_related`. Unset means unbounded;
    /// traversal still terminates on cycles via per-node dedup.
    pub max_depth: Option<u32>,
}
