//! Configuration loading with hierarchical merging.
//!
//! Precedence, lowest to highest: programmatic defaults, project YAML
//! (`.mindvalve/config.yaml`), local overrides (`.mindvalve/local.yaml`),
//! then `MINDVALVE_`-prefixed environment variables. The extracted record
//! is clamped and validated before anything else sees it.

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::Config;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".mindvalve/config.yaml"))
            .merge(Yaml::file(".mindvalve/local.yaml"))
            .merge(Env::prefixed("MINDVALVE_"))
            .extract()
            .context("failed to extract configuration")?;

        Self::finish(config)
    }

    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .with_context(|| format!("failed to load config from {}", path.as_ref().display()))?;

        Self::finish(config)
    }

    fn finish(config: Config) -> Result<Config> {
        let config = config.normalized();
        config
            .validate()
            .map_err(ConfigError::ValidationFailed)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn file_values_override_defaults_and_get_clamped() {
        let mut file = tempfile::Builder::new()
            .suffix(".yaml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            "llm_model: test-model\nevolution_population_size: 99\ncognitive_max_cycles: 7"
        )
        .unwrap();

        let config = ConfigLoader::load_from_file(file.path()).unwrap();
        assert_eq!(config.llm_model, "test-model");
        assert_eq!(config.evolution_population_size, 10);
        assert_eq!(config.cognitive_max_cycles, 7);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut file = tempfile::Builder::new()
            .suffix(".yaml")
            .tempfile()
            .unwrap();
        writeln!(file, "llm_timeout: -1.0").unwrap();

        assert!(ConfigLoader::load_from_file(file.path()).is_err());
    }
}
