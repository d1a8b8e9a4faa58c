//! Exponential backoff retry logic for catalog operations.

use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{CatalogError, CatalogResult};

/// Retry policy configuration.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total number of attempts including the first (1 = no retries).
    pub max_attempts: u32,
    /// Base delay in seconds for exponential backoff.
    pub base_delay_secs: u64,
    /// Maximum delay cap in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_secs: 1,
            max_delay_secs: 60,
        }
    }
}

impl RetryPolicy {
    /// Create a policy with the given attempt budget and base delay.
    /// The delay cap defaults to 60 seconds.
    #[must_use]
    pub fn new(max_attempts: u32, base_delay_secs: u64) -> Self {
        Self {
            max_attempts,
            base_delay_secs,
            max_delay_secs: 60,
        }
    }

    /// Whether the error should be retried after the given zero-based
    /// attempt.
    #[must_use]
    pub fn should_retry(&self, attempt: u32, error: &CatalogError) -> bool {
        attempt + 1 < self.max_attempts && error.is_transient()
    }

    /// Delay before the next attempt.
    ///
    /// A rate-limit response carrying `Retry-After` is honored directly
    /// (capped at `max_delay_secs`); everything else backs off as
    /// `base_delay_secs * 2^attempt`, capped.
    #[must_use]
    pub fn delay_for(&self, attempt: u32, error: &CatalogError) -> Duration {
        let secs = if let CatalogError::RateLimited {
            retry_after_secs: Some(retry_after),
        } = error
        {
            (*retry_after).min(self.max_delay_secs)
        } else {
            self.base_delay_secs
                .saturating_mul(2u64.saturating_pow(attempt))
                .min(self.max_delay_secs)
        };
        Duration::from_secs(secs)
    }

    /// Execute an async operation with retry.
    ///
    /// The closure is called until it succeeds, a permanent error is
    /// encountered, or the attempt budget is exhausted. Retries are logged
    /// at debug level; exhaustion at warn.
    pub async fn execute<F, Fut, T>(&self, operation_name: &str, mut f: F) -> CatalogResult<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = CatalogResult<T>>,
    {
        let mut attempt: u32 = 0;
        loop {
            match f().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(
                            operation = operation_name,
                            attempt = attempt + 1,
                            "Operation succeeded after retries"
                        );
                    }
                    return Ok(value);
                }
                Err(error) => {
                    if !self.should_retry(attempt, &error) {
                        if error.is_transient() {
                            warn!(
                                operation = operation_name,
                                attempts = attempt + 1,
                                error = %error,
                                "Retry budget exhausted"
                            );
                            return Err(CatalogError::MaxRetriesExceeded {
                                attempts: attempt + 1,
                                message: format!(
                                    "{operation_name} failed after {} attempt(s): {error}",
                                    attempt + 1
                                ),
                            });
                        }
                        // Permanent error, return immediately.
                        return Err(error);
                    }

                    let delay = self.delay_for(attempt, &error);
                    debug!(
                        operation = operation_name,
                        attempt = attempt + 1,
                        max_attempts = self.max_attempts,
                        delay_secs = delay.as_secs(),
                        error = %error,
                        "Retrying after transient error"
                    );

                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
