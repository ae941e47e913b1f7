//! CLI argument definitions for the Quiver application.
//!
//! Uses `clap` with derive macros for ergonomic argument parsing.
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

use quiver_core::config::StoreBackend;

/// Quiver: hybrid vector/keyword retrieval and graph traversal over a document store.
#[derive(Parser, Debug)]
#[command(name = "quiver", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Data directory for the SQLite store file.
    #[arg(short = 'd', long = "data-dir")]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Store backend (memory, sqlite).
    #[arg(short = 'b', long = "backend")]
    pub backend: Option<String>,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > QUIVER_CONFIG env var > ~/.quiver/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("QUIVER_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the data directory path.
    ///
    /// Priority: --data-dir flag > config file value.
    /// Returns `None` if not overridden (use config default).
    pub fn resolve_data_dir(&self) -> Option<String> {
        self.data_dir
            .as_ref()
            .map(|p| p.to_string_lossy().to_string())
    }

    /// Resolve the log level.
    ///
    /// Priority: --log-level flag > config file value. The RUST_LOG env var,
    /// when set, overrides both.
    pub fn resolve_log_level(&self) -> Option<String> {
        self.log_level.clone()
    }

    /// Resolve the store backend.
    ///
    /// Priority: --backend flag > config file value. An unrecognized flag
    /// value falls back to the configured backend.
    pub fn resolve_backend(&self, config_backend: StoreBackend) -> StoreBackend {
        match self.backend.as_deref().map(str::to_ascii_lowercase).as_deref() {
            Some("memory") => StoreBackend::Memory,
            Some("sqlite") => StoreBackend::Sqlite,
            Some(other) => {
                tracing::warn!("Unknown backend '{}', using configured backend", other);
                config_backend
            }
            None => config_backend,
        }
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".quiver").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".quiver").join("config.toml");
    }
    PathBuf::from("config.toml")
}
