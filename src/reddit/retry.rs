//! Bounded retry with exponential backoff for listing requests.

use super::error::FetchError;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// How hard to retry a failing request.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    /// Extra random delay as a fraction of the computed delay (0.0 to 1.0).
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            jitter_factor: 0.2,
        }
    }
}

impl RetryPolicy {
    /// A policy that never sleeps. Handy for tests.
    #[cfg(test)]
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            jitter_factor: 0.0,
        }
    }

    /// Delay before retry number `attempt` (0-based), jittered and capped.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let multiplier = self.backoff_multiplier.powi(attempt as i32);
        let base_ms = self.base_delay.as_millis() as f64 * multiplier;
        let max_ms = self.max_delay.as_millis() as f64;
        let exp_ms = base_ms.min(max_ms) as u64;

        let jitter_range = (exp_ms as f64 * self.jitter_factor) as u64;
        let jitter = if jitter_range > 0 {
            fastrand::u64(0..=jitter_range)
        } else {
            0
        };

        Duration::from_millis(exp_ms + jitter).min(self.max_delay)
    }

    /// Delay to use after `error` on retry number `attempt`.
    fn wait_after(&self, error: &FetchError, attempt: u32) -> Duration {
        match error.retry_after() {
            Some(requested) => requested.min(self.max_delay),
            None => self.delay_for(attempt),
        }
    }
}

/// Run `operation` until it succeeds, fails permanently, or attempts run out.
pub async fn with_retry<F, Fut, T>(
    policy: &RetryPolicy,
    operation_name: &str,
    mut operation: F,
) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!("{} succeeded after {} retries", operation_name, attempt);
                }
                return Ok(value);
            }
            Err(error) if !error.is_retryable() => return Err(error),
            Err(error) if attempt + 1 == attempts => {
                warn!(
                    "{} failed on final attempt {}/{}: {}",
                    operation_name,
                    attempt + 1,
                    attempts,
                    error
                );
                return Err(FetchError::RetriesExhausted {
                    attempts,
                    last_error: Box::new(error),
                });
            }
            Err(error) => {
                let wait = policy.wait_after(&error, attempt);
                warn!(
                    "{} failed (attempt {}/{}): {}. Retrying in {:?}",
                    operation_name,
                    attempt + 1,
                    attempts,
                    error,
                    wait
                );
                sleep(wait).await;
            }
        }
        attempt += 1;
    }
}
