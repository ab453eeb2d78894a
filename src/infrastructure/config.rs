//! Configuration loading with hierarchical merging.

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;

use crate::domain::errors::ScoreError;
use crate::domain::models::config::ScoreConfig;

/// Configuration loader.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging.
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults
    /// 2. `devis-score.yaml` in the working directory (optional)
    /// 3. Environment variables (`DEVIS_SCORE_*` prefix)
    pub fn load() -> Result<ScoreConfig> {
        let config: ScoreConfig = Figment::new()
            .merge(Serialized::defaults(ScoreConfig::default()))
            .merge(Yaml::file("devis-score.yaml"))
            .merge(Env::prefixed("DEVIS_SCORE_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<ScoreConfig> {
        let config: ScoreConfig = Figment::new()
            .merge(Serialized::defaults(ScoreConfig::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context("Failed to extract configuration from file")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate invariants the serde defaults cannot express.
    pub fn validate(config: &ScoreConfig) -> Result<(), ScoreError> {
        let weights = &config.scoring.weights;
        if (weights.sum() - 1.0).abs() > 1e-9 {
            return Err(ScoreError::Configuration(format!(
                "pillar weights must sum to 1.0, got {}",
                weights.sum()
            )));
        }

        if config.resilience.timeout_ms == 0 {
            return Err(ScoreError::Configuration(
                "resilience timeout_ms must be positive".to_string(),
            ));
        }

        if config.resilience.success_threshold == 0 {
            return Err(ScoreError::Configuration(
                "resilience success_threshold must be at least 1".to_string(),
            ));
        }

        if config.resilience.failure_threshold == 0 {
            return Err(ScoreError::Configuration(
                "resilience failure_threshold must be at least 1".to_string(),
            ));
        }

        let level = config.logging.level.as_str();
        if !matches!(level, "trace" | "debug" | "info" | "warn" | "error") {
            return Err(ScoreError::Configuration(format!(
                "invalid log level: {level}"
            )));
        }

        Ok(())
    }
}
