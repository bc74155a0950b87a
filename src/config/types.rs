use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use super::defaults::*;

#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
pub struct Config {
    #[serde(default)]
    pub provider: ProviderSettings,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub generation: GenerationConfig,
}

/// Chat-completion backend settings
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct ProviderSettings {
    #[serde(default = "default_provider_name")]
    pub name: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Name of the environment variable holding the bearer token
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Upper bound for a single request attempt
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_models")]
    pub models: Vec<String>,

    /// Extra headers sent with every request
    #[serde(default)]
    pub headers: HashMap<String, String>,

    #[serde(default = "default_temperature")]
    pub temperature: f64,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            name: default_provider_name(),
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            timeout_ms: default_timeout_ms(),
            models: default_models(),
            headers: HashMap::new(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            system_prompt: default_system_prompt(),
        }
    }
}

impl ProviderSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct RetryConfig {
    /// Additional attempts after the first one
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct GenerationConfig {
    #[serde(default = "default_min_answers")]
    pub min_answers: usize,

    #[serde(default = "default_max_answers")]
    pub max_answers: usize,

    #[serde(default = "default_answers")]
    pub default_answers: usize,

    #[serde(default = "default_difficulty")]
    pub default_difficulty: String,

    /// Max questions generated in parallel by a batch
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            min_answers: default_min_answers(),
            max_answers: default_max_answers(),
            default_answers: default_answers(),
            default_difficulty: default_difficulty(),
            concurrency: default_concurrency(),
        }
    }
}

impl GenerationConfig {
    pub fn clamp_answers(&self, requested: usize) -> usize {
        requested.clamp(self.min_answers, self.max_answers)
    }
}
