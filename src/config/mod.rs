mod defaults;
mod types;

pub use types::*;

use crate::error::ConfigError;
use defaults::default_config_path;
use std::path::Path;
use tracing::debug;

impl Config {
    /// Load config from a YAML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load an explicit path, or `triviagen.yaml` if present, or built-in defaults
    pub fn discover(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::load(p),
            None => {
                let fallback = default_config_path();
                if fallback.exists() {
                    Self::load(&fallback)
                } else {
                    debug!("No config file found, using defaults");
                    Ok(Self::default())
                }
            }
        }
    }

    /// Validate the config
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.provider.models.iter().all(|m| m.trim().is_empty()) {
            return Err(ConfigError::NoModels(self.provider.name.clone()));
        }

        if self.provider.timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout);
        }

        let generation = &self.generation;
        if generation.min_answers < 2 || generation.min_answers > generation.max_answers {
            return Err(ConfigError::InvalidAnswerRange {
                min: generation.min_answers,
                max: generation.max_answers,
            });
        }

        if !(generation.min_answers..=generation.max_answers).contains(&generation.default_answers)
        {
            return Err(ConfigError::DefaultAnswersOutOfRange {
                default: generation.default_answers,
                min: generation.min_answers,
                max: generation.max_answers,
            });
        }

        if generation.concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }

        Ok(())
    }
}
