//! Threshold policy: the authoritative pass/fail decision.
//!
//! Resolution for a phase's composite threshold walks a fallback chain, in
//! the same spirit as a retry-target lookup: explicit per-phase override →
//! mode-specific phase table → mode default → configurable global fallback.
//! Passing requires BOTH the composite threshold and every component minimum
//! simultaneously; a phase can never average its way past one badly broken
//! dimension.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use verdict_types::{PhaseScore, TestCategory};

/// Named bundle of per-phase pass thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdMode {
    Strict,
    Standard,
    Lenient,
}

impl ThresholdMode {
    /// Composite default for phases without a table entry.
    pub fn default_threshold(self) -> f64 {
        match self {
            ThresholdMode::Strict => 85.0,
            ThresholdMode::Standard => 75.0,
            ThresholdMode::Lenient => 65.0,
        }
    }

    /// Phase-specific composite thresholds. Entries move in lockstep across
    /// modes: for every phase listed in all three tables,
    /// strict ≥ standard ≥ lenient.
    pub fn phase_table(self) -> &'static [(&'static str, f64)] {
        match self {
            ThresholdMode::Strict => &[
                ("case_design", 90.0),
                ("clue_plan", 85.0),
                ("context", 75.0),
                ("prose", 80.0),
                ("review", 85.0),
            ],
            ThresholdMode::Standard => &[
                ("case_design", 85.0),
                ("clue_plan", 80.0),
                ("context", 70.0),
                ("prose", 70.0),
                ("review", 80.0),
            ],
            ThresholdMode::Lenient => &[
                ("case_design", 75.0),
                ("clue_plan", 70.0),
                ("context", 60.0),
                ("prose", 60.0),
                ("review", 70.0),
            ],
        }
    }

    fn table_lookup(self, phase_id: &str) -> Option<f64> {
        self.phase_table()
            .iter()
            .find(|(id, _)| *id == phase_id)
            .map(|(_, t)| *t)
    }
}

/// Global fallback used when a phase is unknown to the mode tables and the
/// mode default has been disabled. Historically hard-coded; kept configurable.
pub const GLOBAL_FALLBACK_THRESHOLD: f64 = 75.0;

/// Threshold configuration for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdConfig {
    pub mode: ThresholdMode,
    /// Explicit per-phase overrides, consulted before any table.
    #[serde(default)]
    pub overrides: HashMap<String, f64>,
    /// Mode-level default composite. `None` drops unknown phases straight to
    /// `fallback_threshold`.
    #[serde(default)]
    pub mode_default: Option<f64>,
    /// Last-resort composite threshold.
    #[serde(default = "default_fallback")]
    pub fallback_threshold: f64,
}

fn default_fallback() -> f64 {
    GLOBAL_FALLBACK_THRESHOLD
}

impl ThresholdConfig {
    /// Standard configuration for a mode, with the mode's composite default
    /// and the historical global fallback of 75.
    pub fn for_mode(mode: ThresholdMode) -> Self {
        Self {
            mode,
            overrides: HashMap::new(),
            mode_default: Some(mode.default_threshold()),
            fallback_threshold: GLOBAL_FALLBACK_THRESHOLD,
        }
    }

    pub fn with_override(mut self, phase_id: impl Into<String>, threshold: f64) -> Self {
        self.overrides.insert(phase_id.into(), threshold);
        self
    }
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self::for_mode(ThresholdMode::Standard)
    }
}

/// Resolve the composite threshold a phase must reach.
pub fn get_threshold(phase_id: &str, config: &ThresholdConfig) -> f64 {
    if let Some(t) = config.overrides.get(phase_id) {
        return *t;
    }
    if let Some(t) = config.mode.table_lookup(phase_id) {
        return t;
    }
    config.mode_default.unwrap_or(config.fallback_threshold)
}

/// Categories of a score sitting below their mode-independent minimums.
pub fn get_failed_components(score: &PhaseScore) -> Vec<TestCategory> {
    score.failed_components()
}

/// The single most important invariant of the engine: a phase passes only if
/// its composite clears the resolved threshold AND every component clears its
/// fixed minimum. This is a conjunction, never an either/or.
pub fn passes_threshold(phase_id: &str, score: &PhaseScore, config: &ThresholdConfig) -> bool {
    let threshold = get_threshold(phase_id, config);
    score.total >= threshold && get_failed_components(score).is_empty()
}
