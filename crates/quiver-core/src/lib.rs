pub mod config;
pub mod error;
pub mod types;

pub use config::QuiverConfig;
pub use error::{QuiverError, Result};
pub use types::*;
