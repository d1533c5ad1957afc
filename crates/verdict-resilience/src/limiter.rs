//! Request/token rate limiter over a sliding one-minute window.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

/// Window length all ceilings are expressed against.
const WINDOW: Duration = Duration::from_secs(60);

/// Limits requests per sliding minute, and optionally total tokens too.
/// `acquire` waits until both ceilings have room rather than failing.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: usize,
    max_tokens: Option<u64>,
    grants: Mutex<VecDeque<(Instant, u64)>>,
}

impl RateLimiter {
    pub fn new(max_requests: usize, max_tokens: Option<u64>) -> Self {
        Self {
            max_requests: max_requests.max(1),
            max_tokens,
            grants: Mutex::new(VecDeque::new()),
        }
    }

    /// Requests admitted within the current window.
    pub fn requests_used(&self) -> usize {
        let mut grants = self.grants.lock().expect("limiter state poisoned");
        Self::prune(&mut grants);
        grants.len()
    }

    /// Tokens admitted within the current window.
    pub fn tokens_used(&self) -> u64 {
        let mut grants = self.grants.lock().expect("limiter state poisoned");
        Self::prune(&mut grants);
        grants.iter().map(|(_, t)| t).sum()
    }

    fn prune(grants: &mut VecDeque<(Instant, u64)>) {
        let now = Instant::now();
        while grants
            .front()
            .is_some_and(|(at, _)| now.duration_since(*at) >= WINDOW)
        {
            grants.pop_front();
        }
    }

    /// Try to admit one request carrying `tokens` now. On success records
    /// the grant; on refusal returns how long until the oldest grant ages out.
    fn try_acquire(&self, tokens: u64) -> std::result::Result<(), Duration> {
        let mut grants = self.grants.lock().expect("limiter state poisoned");
        Self::prune(&mut grants);

        let requests_ok = grants.len() < self.max_requests;
        let tokens_ok = match self.max_tokens {
            Some(max) => grants.iter().map(|(_, t)| t).sum::<u64>() + tokens <= max,
            None => true,
        };
        if requests_ok && tokens_ok {
            grants.push_back((Instant::now(), tokens));
            return Ok(());
        }

        let wait = grants
            .front()
            .map(|(at, _)| WINDOW.saturating_sub(at.elapsed()))
            .unwrap_or(WINDOW)
            .max(Duration::from_millis(50));
        Err(wait)
    }

    /// Admit one request carrying `tokens`, sleeping until the sliding
    /// window has room under both ceilings.
    ///
    /// A token count larger than the whole budget is clamped to it so the
    /// call can still make progress on an empty window.
    pub async fn acquire(&self, tokens: u64) {
        let tokens = match self.max_tokens {
            Some(max) => tokens.min(max),
            None => tokens,
        };
        loop {
            match self.try_acquire(tokens) {
                Ok(()) => return,
                Err(wait) => {
                    tracing::debug!(tokens, wait_ms = wait.as_millis() as u64, "rate limit wait");
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }
}
