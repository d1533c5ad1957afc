//! Composition layers: a provider caller wrapping breaker + limiter +
//! classified retry, and the gate loop that regenerates a phase until its
//! score clears the threshold or the retry budget runs out.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use verdict_retry::RetryManager;
use verdict_scoring::{
    build_concise_retry_feedback, build_retry_feedback, get_threshold, passes_threshold,
    ThresholdConfig,
};
use verdict_types::{PhaseScore, Result, VerdictError};

use crate::breaker::CircuitBreaker;
use crate::limiter::RateLimiter;
use crate::retry::{retry_with_classification, RetryPolicy};

/// Wraps every provider call in rate limiting, circuit breaking, and
/// transient-error retry, in that order: tokens are only spent once the
/// window has room, and an open breaker short-circuits before any retry.
#[derive(Debug, Clone)]
pub struct ResilientCaller {
    breaker: Arc<CircuitBreaker>,
    limiter: Arc<RateLimiter>,
    retry_policy: RetryPolicy,
}

impl ResilientCaller {
    pub fn new(
        breaker: Arc<CircuitBreaker>,
        limiter: Arc<RateLimiter>,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            breaker,
            limiter,
            retry_policy,
        }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Run one provider call budgeted at `estimated_tokens`.
    pub async fn call<T, F, Fut>(&self, estimated_tokens: u64, f: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.limiter.acquire(estimated_tokens).await;
        retry_with_classification(&self.retry_policy, || self.breaker.call(&f)).await
    }
}

/// Generate-score-retry loop for one phase.
///
/// `generate` receives the feedback text built from the previous failing
/// score (None on the first attempt); `validate` scores its output. The
/// loop ends when the score clears the phase threshold, or when the retry
/// budget is spent: then the run aborts with `RetriesExhausted` if the
/// global policy says so, and otherwise the best-known output is returned
/// with its failing score for the report to record.
pub async fn run_with_validation<O, G, GFut, V>(
    phase_id: &str,
    thresholds: &ThresholdConfig,
    retries: &RetryManager,
    mut generate: G,
    validate: V,
) -> Result<(O, PhaseScore)>
where
    G: FnMut(Option<String>) -> GFut,
    GFut: Future<Output = Result<O>>,
    V: Fn(&O) -> PhaseScore,
{
    let threshold = get_threshold(phase_id, thresholds);
    let mut feedback: Option<String> = None;

    loop {
        let output = generate(feedback.take()).await?;
        let score = validate(&output);

        if passes_threshold(phase_id, &score, thresholds) {
            tracing::info!(phase = phase_id, total = score.total, "phase passed gate");
            return Ok((output, score));
        }

        if !retries.can_retry(phase_id) {
            let attempts = retries.record(phase_id).map(|r| r.attempts).unwrap_or(0);
            tracing::warn!(
                phase = phase_id,
                total = score.total,
                attempts,
                "retry budget exhausted below threshold"
            );
            if retries.should_abort_on_max_retries() {
                return Err(VerdictError::RetriesExhausted {
                    phase: phase_id.to_string(),
                    attempts,
                });
            }
            return Ok((output, score));
        }

        let delay = retries.backoff_delay(phase_id);
        let reason = score
            .failure_reason
            .clone()
            .unwrap_or_else(|| format!("score {:.1} below threshold {threshold:.1}", score.total));
        retries.record_retry(phase_id, reason, Some(score.total));

        feedback = Some(if retries.enhanced_feedback() {
            build_retry_feedback(&score, threshold)
        } else {
            build_concise_retry_feedback(&score, threshold)
        });

        if delay > Duration::ZERO {
            tokio::time::sleep(delay).await;
        }
    }
}
