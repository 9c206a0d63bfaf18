//! PatternWatch Common Library
//!
//! Data model, pattern repository and artifact store shared by the
//! comparison engine and the CLI.

pub mod cas;
pub mod db;
pub mod error;
pub mod types;

pub use cas::{ArtifactStore, GcStats};
pub use db::Database;
pub use error::{Error, Result};
pub use types::*;

/// PatternWatch version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default store path
pub fn default_store_path() -> std::path::PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join(".patternwatch")
}

/// Default configuration file path
pub fn default_config_path() -> std::path::PathBuf {
    default_store_path().join("config.toml")
}

/// Home directory helper
mod dirs {
    pub fn home_dir() -> Option<std::path::PathBuf> {
        std::env::var_os("HOME").map(std::path::PathBuf::from)
    }
}
