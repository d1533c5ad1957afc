//! Classified retry: retries transient provider errors with capped
//! exponential backoff, and gives up immediately on anything terminal.

use std::future::Future;
use std::time::Duration;

use verdict_types::Result;

/// Backoff schedule for [`retry_with_classification`].
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: usize,
    pub base_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            multiplier: 2.0,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay before re-running after `attempt` failures (0-based).
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        let millis = self.base_delay.as_millis() as f64 * self.multiplier.powi(attempt as i32);
        Duration::from_millis(millis as u64).min(self.max_delay)
    }
}

/// Run `f` until it succeeds, the error is classified terminal, or the
/// attempt budget runs out. Only errors whose `is_retryable()` is true are
/// retried; the last error is returned verbatim.
pub async fn retry_with_classification<T, F, Fut>(policy: &RetryPolicy, mut f: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0usize;
    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let last_attempt = attempt + 1 >= policy.max_attempts.max(1);
                if !err.is_retryable() || last_attempt {
                    return Err(err);
                }
                let delay = policy.delay_for_attempt(attempt);
                tracing::warn!(
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient error, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
