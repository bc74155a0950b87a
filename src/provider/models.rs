use crate::error::ConfigError;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Round-robin rotation over the eligible models.
///
/// The cursor is advanced with a single atomic update, so one selector can be
/// shared by concurrent requests without skipping or repeating a slot. The
/// position is process-local and starts over on restart.
#[derive(Debug)]
pub struct ModelSelector {
    models: Vec<String>,
    cursor: AtomicUsize,
}

impl ModelSelector {
    pub fn new(provider: &str, models: &[String]) -> Result<Self, ConfigError> {
        let models: Vec<String> = models
            .iter()
            .map(|m| m.trim())
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .collect();

        if models.is_empty() {
            return Err(ConfigError::NoModels(provider.to_string()));
        }

        Ok(Self {
            models,
            cursor: AtomicUsize::new(0),
        })
    }

    /// Return the current model and advance the cursor
    pub fn next(&self) -> &str {
        let len = self.models.len();
        // The closure never returns None, so both arms carry the previous index
        let idx = match self
            .cursor
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |i| Some((i + 1) % len))
        {
            Ok(prev) | Err(prev) => prev,
        };
        &self.models[idx]
    }
}
