//! Circuit breaker guarding a single provider.
//!
//! Consecutive failures trip the breaker open; while open, calls are
//! rejected immediately without touching the provider. After the reset
//! timeout one probe call is let through, and its outcome decides whether
//! the breaker closes again or re-opens.

use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use verdict_types::{Result, VerdictError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
enum Inner {
    Closed { consecutive_failures: u32 },
    Open { opened_at: Instant },
    /// One probe is in flight; everyone else is still rejected.
    HalfOpen,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    provider: String,
    failure_threshold: u32,
    reset_timeout: Duration,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(provider: impl Into<String>, failure_threshold: u32, reset_timeout: Duration) -> Self {
        Self {
            provider: provider.into(),
            failure_threshold: failure_threshold.max(1),
            reset_timeout,
            inner: Mutex::new(Inner::Closed {
                consecutive_failures: 0,
            }),
        }
    }

    /// Defaults tuned for LLM providers: 5 consecutive failures, 30s reset.
    pub fn with_defaults(provider: impl Into<String>) -> Self {
        Self::new(provider, 5, Duration::from_secs(30))
    }

    pub fn state(&self) -> BreakerState {
        let inner = self.inner.lock().expect("breaker state poisoned");
        match *inner {
            Inner::Closed { .. } => BreakerState::Closed,
            Inner::Open { .. } => BreakerState::Open,
            Inner::HalfOpen => BreakerState::HalfOpen,
        }
    }

    /// Decide whether a call may proceed right now. Flips Open to HalfOpen
    /// when the reset timeout has elapsed, claiming the probe slot.
    fn admit(&self) -> Result<()> {
        let mut inner = self.inner.lock().expect("breaker state poisoned");
        match *inner {
            Inner::Closed { .. } => Ok(()),
            Inner::Open { opened_at } => {
                if opened_at.elapsed() >= self.reset_timeout {
                    tracing::info!(provider = %self.provider, "circuit half-open, probing");
                    *inner = Inner::HalfOpen;
                    Ok(())
                } else {
                    Err(VerdictError::CircuitOpen {
                        provider: self.provider.clone(),
                    })
                }
            }
            Inner::HalfOpen => Err(VerdictError::CircuitOpen {
                provider: self.provider.clone(),
            }),
        }
    }

    fn on_success(&self) {
        let mut inner = self.inner.lock().expect("breaker state poisoned");
        if matches!(*inner, Inner::HalfOpen) {
            tracing::info!(provider = %self.provider, "circuit closed after successful probe");
        }
        *inner = Inner::Closed {
            consecutive_failures: 0,
        };
    }

    fn on_failure(&self) {
        let mut inner = self.inner.lock().expect("breaker state poisoned");
        match *inner {
            Inner::Closed {
                consecutive_failures,
            } => {
                let failures = consecutive_failures + 1;
                if failures >= self.failure_threshold {
                    tracing::warn!(
                        provider = %self.provider,
                        failures,
                        "circuit opened"
                    );
                    *inner = Inner::Open {
                        opened_at: Instant::now(),
                    };
                } else {
                    *inner = Inner::Closed {
                        consecutive_failures: failures,
                    };
                }
            }
            Inner::HalfOpen => {
                tracing::warn!(provider = %self.provider, "probe failed, circuit re-opened");
                *inner = Inner::Open {
                    opened_at: Instant::now(),
                };
            }
            Inner::Open { .. } => {}
        }
    }

    /// Run `f` under the breaker. While open, `f` is never invoked and the
    /// call fails fast with `CircuitOpen`.
    pub async fn call<T, F, Fut>(&self, f: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.admit()?;
        match f().await {
            Ok(value) => {
                self.on_success();
                Ok(value)
            }
            Err(err) => {
                self.on_failure();
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn provider_failure() -> VerdictError {
        VerdictError::ProviderError {
            provider: "mock".into(),
            message: "boom".into(),
            retryable: false,
        }
    }

    // 1. Healthy calls pass straight through
    #[tokio::test]
    async fn closed_breaker_passes_calls() {
        let breaker = CircuitBreaker::new("mock", 3, Duration::from_secs(30));
        let out: i32 = breaker.call(|| async { Ok(7) }).await.unwrap();
        assert_eq!(out, 7);
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    // 2. Threshold consecutive failures open the circuit
    #[tokio::test]
    async fn opens_after_consecutive_failures() {
        let breaker = CircuitBreaker::new("mock", 3, Duration::from_secs(30));
        for _ in 0..3 {
            let _ = breaker
                .call(|| async { Err::<(), _>(provider_failure()) })
                .await;
        }
        assert_eq!(breaker.state(), BreakerState::Open);
    }

    // 3. Open breaker rejects without invoking the function
    #[tokio::test]
    async fn open_breaker_rejects_without_invoking() {
        let breaker = CircuitBreaker::new("mock", 1, Duration::from_secs(30));
        let _ = breaker
            .call(|| async { Err::<(), _>(provider_failure()) })
            .await;
        assert_eq!(breaker.state(), BreakerState::Open);

        let invoked = AtomicU32::new(0);
        let result = breaker
            .call(|| async {
                invoked.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(VerdictError::CircuitOpen { .. })));
        assert_eq!(invoked.load(Ordering::SeqCst), 0);
    }

    // 4. A success resets the consecutive-failure count
    #[tokio::test]
    async fn success_resets_failure_count() {
        let breaker = CircuitBreaker::new("mock", 2, Duration::from_secs(30));
        let _ = breaker
            .call(|| async { Err::<(), _>(provider_failure()) })
            .await;
        breaker.call(|| async { Ok(()) }).await.unwrap();
        let _ = breaker
            .call(|| async { Err::<(), _>(provider_failure()) })
            .await;
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    // 5. After the reset timeout exactly one probe runs; success closes
    #[tokio::test]
    async fn probe_after_timeout_closes_on_success() {
        let breaker = CircuitBreaker::new("mock", 1, Duration::from_millis(10));
        let _ = breaker
            .call(|| async { Err::<(), _>(provider_failure()) })
            .await;
        assert_eq!(breaker.state(), BreakerState::Open);

        tokio::time::sleep(Duration::from_millis(20)).await;
        breaker.call(|| async { Ok(()) }).await.unwrap();
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    // 6. A failed probe re-opens the circuit
    #[tokio::test]
    async fn failed_probe_reopens() {
        let breaker = CircuitBreaker::new("mock", 1, Duration::from_millis(10));
        let _ = breaker
            .call(|| async { Err::<(), _>(provider_failure()) })
            .await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        let _ = breaker
            .call(|| async { Err::<(), _>(provider_failure()) })
            .await;
        assert_eq!(breaker.state(), BreakerState::Open);
    }

    // 7. CircuitOpen rejections themselves are not retryable
    #[tokio::test]
    async fn rejection_is_not_retryable() {
        let breaker = CircuitBreaker::new("mock", 1, Duration::from_secs(30));
        let _ = breaker
            .call(|| async { Err::<(), _>(provider_failure()) })
            .await;
        let err = breaker.call(|| async { Ok(()) }).await.unwrap_err();
        assert!(!err.is_retryable());
    }
}
