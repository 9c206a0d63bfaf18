//! CLI configuration

use patternwatch_visual::{ComparisonSettings, RunnerConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// PatternWatch configuration, read from `config.toml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternWatchConfig {
    /// Store directory path
    pub store_path: PathBuf,

    /// Pixel comparison tunables
    pub comparison: ComparisonSettings,

    /// Screenshot source configuration
    pub camera: CameraConfig,

    /// Comparison run configuration
    pub runner: RunSettings,
}

impl Default for PatternWatchConfig {
    fn default() -> Self {
        Self {
            store_path: patternwatch_common::default_store_path(),
            comparison: ComparisonSettings::default(),
            camera: CameraConfig::default(),
            runner: RunSettings::default(),
        }
    }
}

/// Where captured screenshots come from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// File name prefix the browser driver puts before the test case name
    pub prefix: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    /// Turn captures without a pattern into new patterns
    pub auto_accept_missing: bool,

    /// Comparisons running at once
    pub parallelism: usize,
}

impl Default for RunSettings {
    fn default() -> Self {
        let defaults = RunnerConfig::default();
        Self {
            auto_accept_missing: defaults.auto_accept_missing,
            parallelism: defaults.parallelism,
        }
    }
}

impl PatternWatchConfig {
    /// Load configuration from file, falling back to defaults when it is absent
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self) -> anyhow::Result<()> {
        let limit = self.comparison.max_diff_percent;
        if !(0.0..=100.0).contains(&limit) {
            anyhow::bail!("comparison.max_diff_percent must be within 0..=100, got {}", limit);
        }
        if self.runner.parallelism == 0 {
            anyhow::bail!("runner.parallelism must be at least 1");
        }
        Ok(())
    }

    /// Get the database path
    pub fn db_path(&self) -> PathBuf {
        self.store_path.join("patterns.db")
    }

    /// Get the artifact store path
    pub fn artifacts_path(&self) -> PathBuf {
        self.store_path.join("artifacts")
    }

    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            comparison: self.comparison,
            auto_accept_missing: self.runner.auto_accept_missing,
            parallelism: self.runner.parallelism,
        }
    }
}
