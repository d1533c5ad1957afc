//! Retry manager: bounds how often a phase may be regenerated.
//!
//! Limits are loaded from a declarative JSON source keyed by phase id, with a
//! hard-coded default table when the source is unavailable, so the manager is
//! always operable. All counters live behind a mutex inside the manager: the
//! global retry budget must stay accurate even if two phases consult it
//! concurrently.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use verdict_types::{BackoffStrategy, RetryHistoryEntry, RetryRecord, RetryStats};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Retry limits for one phase.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PhaseRetryLimits {
    pub max_retries: usize,
    pub backoff_strategy: BackoffStrategy,
    pub backoff_delay_ms: u64,
}

/// Run-wide limits shared across all phases.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GlobalRetryLimits {
    pub max_total_retries: usize,
    /// When a phase exhausts its retries, abort the whole run rather than
    /// proceed with a known-bad output.
    pub abort_on_max_retries: bool,
    /// Feed full (rather than concise) feedback text into retry prompts.
    pub enhanced_feedback: bool,
}

/// The declarative retry-limits source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryLimitsConfig {
    #[serde(default)]
    pub phases: HashMap<String, PhaseRetryLimits>,
    pub global: GlobalRetryLimits,
}

impl Default for RetryLimitsConfig {
    /// Hard-coded fallback table used when no external source is available.
    fn default() -> Self {
        let mut phases = HashMap::new();
        for (id, max_retries, strategy, delay_ms) in [
            ("concept", 2, BackoffStrategy::Linear, 1_000),
            ("context", 2, BackoffStrategy::Linear, 1_000),
            ("case_design", 3, BackoffStrategy::Exponential, 2_000),
            ("clue_plan", 3, BackoffStrategy::Exponential, 2_000),
            ("prose", 2, BackoffStrategy::Exponential, 5_000),
            ("review", 1, BackoffStrategy::None, 0),
        ] {
            phases.insert(
                id.to_string(),
                PhaseRetryLimits {
                    max_retries,
                    backoff_strategy: strategy,
                    backoff_delay_ms: delay_ms,
                },
            );
        }
        Self {
            phases,
            global: GlobalRetryLimits {
                max_total_retries: 10,
                abort_on_max_retries: true,
                enhanced_feedback: true,
            },
        }
    }
}

impl RetryLimitsConfig {
    /// Read limits from a JSON file.
    pub fn load(path: &Path) -> verdict_types::Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&data)?;
        Ok(config)
    }

    /// Read limits from a JSON file, falling back to the built-in table when
    /// the file is missing or malformed. The fallback is logged, never an error.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "retry limits source unavailable; using built-in defaults"
                );
                Self::default()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// RetryManager
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct RetryState {
    records: HashMap<String, RetryRecord>,
    total_retries: usize,
}

/// Tracks retry budgets for one run. Owned by the run's driver; safe to share
/// behind an `Arc` if phases retry concurrently.
#[derive(Debug)]
pub struct RetryManager {
    config: RetryLimitsConfig,
    state: Mutex<RetryState>,
}

impl RetryManager {
    pub fn new(config: RetryLimitsConfig) -> Self {
        Self {
            config,
            state: Mutex::new(RetryState::default()),
        }
    }

    /// Construct with the built-in default limits.
    pub fn with_defaults() -> Self {
        Self::new(RetryLimitsConfig::default())
    }

    fn limits_for(&self, phase_id: &str) -> Option<&PhaseRetryLimits> {
        self.config.phases.get(phase_id)
    }

    /// A phase may retry iff its own attempt count is below its configured
    /// maximum AND the run-wide budget has headroom. An unknown phase id fails
    /// closed: no config entry, no retries.
    pub fn can_retry(&self, phase_id: &str) -> bool {
        let Some(limits) = self.limits_for(phase_id) else {
            return false;
        };
        let state = self.state.lock().expect("retry state poisoned");
        let attempts = state
            .records
            .get(phase_id)
            .map(|r| r.attempts)
            .unwrap_or(0);
        attempts < limits.max_retries && state.total_retries < self.config.global.max_total_retries
    }

    /// Record one regeneration attempt: bumps the phase and global counters
    /// and appends a history entry carrying the backoff that was applied.
    pub fn record_retry(&self, phase_id: &str, reason: impl Into<String>, score_before: Option<f64>) {
        let backoff_ms = self.backoff_delay(phase_id).as_millis() as u64;
        let mut state = self.state.lock().expect("retry state poisoned");
        let record = state.records.entry(phase_id.to_string()).or_default();
        record.attempts += 1;
        let attempt = record.attempts;
        record.history.push(RetryHistoryEntry {
            attempt,
            timestamp: chrono::Utc::now(),
            reason: reason.into(),
            score_before,
            backoff_ms,
        });
        state.total_retries += 1;
        tracing::info!(
            phase = phase_id,
            attempt,
            total = state.total_retries,
            backoff_ms,
            "retry recorded"
        );
    }

    /// Backoff before the next attempt, as a pure function of the phase's
    /// current attempt count and its configured strategy.
    pub fn backoff_delay(&self, phase_id: &str) -> Duration {
        let Some(limits) = self.limits_for(phase_id) else {
            return Duration::ZERO;
        };
        let attempts = {
            let state = self.state.lock().expect("retry state poisoned");
            state
                .records
                .get(phase_id)
                .map(|r| r.attempts)
                .unwrap_or(0)
        };
        let base = limits.backoff_delay_ms;
        let millis = match limits.backoff_strategy {
            BackoffStrategy::Exponential => {
                base.saturating_mul(2u64.saturating_pow(attempts as u32))
            }
            BackoffStrategy::Linear => base.saturating_mul(attempts as u64 + 1),
            BackoffStrategy::None => 0,
        };
        Duration::from_millis(millis)
    }

    /// Global policy flag consulted by the pipeline driver when a phase
    /// exhausts its retries.
    pub fn should_abort_on_max_retries(&self) -> bool {
        self.config.global.abort_on_max_retries
    }

    /// Whether retry prompts should carry full rather than concise feedback.
    pub fn enhanced_feedback(&self) -> bool {
        self.config.global.enhanced_feedback
    }

    /// Snapshot of a phase's retry record.
    pub fn record(&self, phase_id: &str) -> Option<RetryRecord> {
        let state = self.state.lock().expect("retry state poisoned");
        state.records.get(phase_id).cloned()
    }

    /// Run-level summary for the generation report.
    pub fn stats(&self) -> RetryStats {
        let state = self.state.lock().expect("retry state poisoned");
        RetryStats {
            total_retries: state.total_retries,
            retried_phases: state
                .records
                .iter()
                .filter(|(_, r)| r.attempts > 0)
                .map(|(id, r)| (id.clone(), r.attempts))
                .collect(),
        }
    }
}
