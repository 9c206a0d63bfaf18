//! CLI Commands

pub mod case;
pub mod category;
pub mod compare;
pub mod gc;
pub mod pattern;
pub mod run;
pub mod session;

use anyhow::{Context as _, Result};
use patternwatch_common::{ArtifactStore, Category, Database};
use tracing::debug;

use crate::config::PatternWatchConfig;

/// Opened stores shared by every command
pub struct Context {
    pub config: PatternWatchConfig,
    pub db: Database,
}

impl Context {
    pub fn open(config: PatternWatchConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.store_path).with_context(|| {
            format!("creating store directory {}", config.store_path.display())
        })?;
        let db = Database::open(config.db_path())?;
        debug!("Using store at {}", config.store_path.display());
        Ok(Self { config, db })
    }

    pub async fn artifacts(&self) -> Result<ArtifactStore> {
        Ok(ArtifactStore::new(self.config.artifacts_path()).await?)
    }

    /// Look a category up by name, then by id
    pub fn category(&self, name_or_id: &str) -> Result<Category> {
        if let Some(category) = self.db.find_category_by_name(name_or_id)? {
            return Ok(category);
        }
        self.db
            .get_category(name_or_id)?
            .with_context(|| format!("category '{}' not found", name_or_id))
    }
}
