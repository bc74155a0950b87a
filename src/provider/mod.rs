mod client;
mod models;
mod types;

pub use client::ApiClient;
pub use types::{ChatCompletion, Completion};

use crate::config::Config;
use crate::error::{ConfigError, ProviderError, RetryError};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A backend that turns a prompt into a raw chat completion
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Perform one logical request, with retries handled internally
    async fn complete(
        &self,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<Completion, RetryError<ProviderError>>;
}

/// Create the configured provider, reading its API key from the environment
pub fn create_provider(config: &Config) -> Result<Arc<dyn CompletionProvider>, ConfigError> {
    let client = ApiClient::from_env(&config.provider, &config.retry)?;
    Ok(Arc::new(client))
}
