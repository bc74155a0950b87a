use crate::config::RetryConfig;
use crate::error::{ProviderError, RetryError};
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Closed classification of an attempt's failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Auth,
    RateLimit { retry_after: Option<Duration> },
    Server { status: u16 },
    Network,
    Other,
}

/// Errors the retry loop knows how to classify
pub trait Retryable: std::error::Error + Sized + 'static {
    fn failure_kind(&self) -> FailureKind;

    /// Error for an attempt that exceeded the per-attempt timeout
    fn timed_out(limit: Duration) -> Self;
}

impl Retryable for ProviderError {
    fn failure_kind(&self) -> FailureKind {
        match self {
            ProviderError::Auth { .. } => FailureKind::Auth,
            ProviderError::RateLimited { retry_after } => FailureKind::RateLimit {
                retry_after: *retry_after,
            },
            ProviderError::Server { status, .. } => FailureKind::Server { status: *status },
            ProviderError::Network(_) | ProviderError::Timeout(_) => FailureKind::Network,
            ProviderError::UnexpectedStatus { .. } | ProviderError::Decode(_) => FailureKind::Other,
        }
    }

    fn timed_out(limit: Duration) -> Self {
        ProviderError::Timeout(limit)
    }
}

type Classifier<E> = Box<dyn Fn(&E) -> bool + Send + Sync>;
type RetryHook<E> = Box<dyn Fn(u32, &E, Duration) + Send + Sync>;
type FinalHook<E> = Box<dyn Fn(&E, u32) + Send + Sync>;

/// How failures are classified, delayed and reported.
///
/// Authentication failures are never retried; there is no flag for it.
pub struct RetryPolicy<E> {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub per_attempt_timeout: Duration,
    pub jitter: bool,
    pub retry_on_rate_limit: bool,
    pub retry_on_server_error: bool,
    pub retry_on_network_error: bool,
    classify: Option<Classifier<E>>,
    on_retry: Option<RetryHook<E>>,
    on_final_error: Option<FinalHook<E>>,
}

impl<E: Retryable> RetryPolicy<E> {
    pub fn new(max_retries: u32, base_delay: Duration, per_attempt_timeout: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay: Duration::from_secs(30),
            per_attempt_timeout,
            jitter: false,
            retry_on_rate_limit: true,
            retry_on_server_error: true,
            retry_on_network_error: true,
            classify: None,
            on_retry: None,
            on_final_error: None,
        }
    }

    pub fn from_config(config: &RetryConfig, per_attempt_timeout: Duration) -> Self {
        let mut policy = Self::new(
            config.max_retries,
            Duration::from_millis(config.base_delay_ms),
            per_attempt_timeout,
        );
        policy.max_delay = Duration::from_millis(config.max_delay_ms);
        policy.jitter = config.jitter;
        policy
    }

    /// Decide retryability for `FailureKind::Other` errors
    #[allow(dead_code)]
    pub fn with_classifier(mut self, classify: impl Fn(&E) -> bool + Send + Sync + 'static) -> Self {
        self.classify = Some(Box::new(classify));
        self
    }

    /// Called with (failed attempt, error, delay) before each retry
    pub fn on_retry(mut self, hook: impl Fn(u32, &E, Duration) + Send + Sync + 'static) -> Self {
        self.on_retry = Some(Box::new(hook));
        self
    }

    /// Called once with (error, attempts) when the loop gives up
    pub fn on_final_error(mut self, hook: impl Fn(&E, u32) + Send + Sync + 'static) -> Self {
        self.on_final_error = Some(Box::new(hook));
        self
    }

    fn should_retry(&self, error: &E) -> bool {
        match error.failure_kind() {
            FailureKind::Auth => false,
            FailureKind::RateLimit { .. } => self.retry_on_rate_limit,
            FailureKind::Server { status } => self.retry_on_server_error && status >= 500,
            FailureKind::Network => self.retry_on_network_error,
            FailureKind::Other => self.classify.as_ref().is_some_and(|c| c(error)),
        }
    }

    /// Exponential delay before retry number `retry` (1-based)
    fn backoff_delay(&self, retry: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as u64;
        let factor = 1u64.checked_shl(retry.saturating_sub(1)).unwrap_or(u64::MAX);
        let capped = Duration::from_millis(base_ms.saturating_mul(factor)).min(self.max_delay);

        if self.jitter && base_ms > 0 {
            capped + Duration::from_millis(rand::random::<u64>() % base_ms)
        } else {
            capped
        }
    }

    fn next_delay(&self, error: &E, retry: u32) -> Duration {
        match error.failure_kind() {
            // Server hint replaces the exponential value but never exceeds max_delay
            FailureKind::RateLimit {
                retry_after: Some(after),
            } => after.min(self.max_delay),
            _ => self.backoff_delay(retry),
        }
    }
}

/// Execute an async operation, retrying classified transient failures.
///
/// Each attempt is bounded by `per_attempt_timeout`; the total wall-clock time is
/// the sum of attempt durations plus backoff delays. Cancelling `cancel` aborts
/// both an in-flight attempt and a pending backoff.
pub async fn retry_with_backoff<F, Fut, T, E>(
    policy: &RetryPolicy<E>,
    cancel: &CancellationToken,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable,
{
    let mut attempts = 0u32;

    loop {
        attempts += 1;

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RetryError::Cancelled { attempts }),
            result = timeout(policy.per_attempt_timeout, operation()) => result,
        };

        let error = match outcome {
            Ok(Ok(value)) => {
                if attempts > 1 {
                    info!(attempts, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Ok(Err(e)) => e,
            Err(_) => E::timed_out(policy.per_attempt_timeout),
        };

        let retryable = policy.should_retry(&error);
        if !retryable || attempts > policy.max_retries {
            if retryable {
                warn!(error = %error, attempts, "All attempts failed");
            } else {
                warn!(error = %error, attempts, "Operation failed with non-retryable error");
            }
            if let Some(hook) = &policy.on_final_error {
                hook(&error, attempts);
            }
            return Err(RetryError::Failed {
                attempts,
                source: error,
            });
        }

        let delay = policy.next_delay(&error, attempts);
        warn!(
            error = %error,
            attempt = attempts,
            max_retries = policy.max_retries,
            delay_ms = delay.as_millis() as u64,
            "Attempt failed, retrying"
        );
        if let Some(hook) = &policy.on_retry {
            hook(attempts, &error, delay);
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RetryError::Cancelled { attempts }),
            _ = sleep(delay) => {}
        }
    }
}
