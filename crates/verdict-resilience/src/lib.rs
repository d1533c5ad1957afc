//! Network-resilience layer for provider calls: circuit breaking, sliding
//! window rate limiting, transient-error retry, and the gate loop that
//! drives regeneration from failing scores.

pub mod breaker;
pub mod caller;
pub mod limiter;
pub mod retry;

pub use breaker::{BreakerState, CircuitBreaker};
pub use caller::{run_with_validation, ResilientCaller};
pub use limiter::RateLimiter;
pub use retry::{retry_with_classification, RetryPolicy};
