//! Shared types, errors, and data model for the Verdict quality-gate engine.
//!
//! This crate provides the foundational types used across all other Verdict crates:
//! - `VerdictError` — unified error taxonomy with transient/permanent classification
//! - `TestResult` / `PhaseScore` — per-phase rubric scoring model
//! - `RetryRecord` / `RetryStats` — regeneration bookkeeping
//! - `CaseSpec` / `Scene` — typed case-specification and prose inputs consumed
//!   by the guardrail validators

use serde::{Deserialize, Serialize};

/// Unified error type for all Verdict subsystems.
#[derive(Debug, thiserror::Error)]
pub enum VerdictError {
    // === Provider transport errors ===
    #[error("Circuit breaker open for provider {provider}; failing fast")]
    CircuitOpen { provider: String },

    #[error("Rate limited by {provider}, retry after {retry_after_ms}ms")]
    RateLimited {
        provider: String,
        retry_after_ms: u64,
    },

    #[error("Provider {provider} error: {message}")]
    ProviderError {
        provider: String,
        message: String,
        retryable: bool,
    },

    #[error("Request to {provider} timed out after {timeout_ms}ms")]
    RequestTimeout { provider: String, timeout_ms: u64 },

    // === Gate errors ===
    #[error("Max retries exhausted for phase '{phase}' after {attempts} attempts")]
    RetriesExhausted { phase: String, attempts: usize },

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    // === Generic ===
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// Substrings that mark an error message as a transient provider condition.
///
/// Used by the classified-retry loop to decide whether an opaque error from an
/// injected generation function is worth retrying.
pub const TRANSIENT_INDICATORS: &[&str] = &[
    "rate limit",
    "rate_limit",
    "429",
    "502",
    "503",
    "timeout",
    "timed out",
    "overloaded",
    "connection reset",
    "econnreset",
    "socket hang up",
];

impl VerdictError {
    /// Returns `true` if the error is transient and the operation may succeed on retry.
    ///
    /// `CircuitOpen` is deliberately not retryable here: the breaker owns its own
    /// recovery timing, and retry loops spinning against an open breaker would
    /// defeat the fast-fail.
    pub fn is_retryable(&self) -> bool {
        match self {
            VerdictError::RateLimited { .. } | VerdictError::RequestTimeout { .. } => true,
            VerdictError::ProviderError {
                retryable, message, ..
            } => *retryable || Self::is_transient_message(message),
            VerdictError::Other(message) => Self::is_transient_message(message),
            _ => false,
        }
    }

    /// Classify a raw error message against the transient allow-list.
    pub fn is_transient_message(message: &str) -> bool {
        let lower = message.to_lowercase();
        TRANSIENT_INDICATORS.iter().any(|ind| lower.contains(ind))
    }
}

/// A convenience alias for `Result<T, VerdictError>`.
pub type Result<T> = std::result::Result<T, VerdictError>;

// ---------------------------------------------------------------------------
// Scoring rubric — TestResult, component scores, grades
// ---------------------------------------------------------------------------

/// The four rubric categories every phase evaluation is grouped into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestCategory {
    Validation,
    Quality,
    Completeness,
    Consistency,
}

impl TestCategory {
    /// All categories, in blend order.
    pub const ALL: [TestCategory; 4] = [
        TestCategory::Validation,
        TestCategory::Quality,
        TestCategory::Completeness,
        TestCategory::Consistency,
    ];

    /// Mode-independent floor this category must clear regardless of the
    /// composite score. A phase can never pass by trading one weak component
    /// against the others.
    pub fn minimum(self) -> f64 {
        match self {
            TestCategory::Validation => 60.0,
            TestCategory::Quality => 50.0,
            TestCategory::Completeness => 60.0,
            TestCategory::Consistency => 50.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TestCategory::Validation => "validation",
            TestCategory::Quality => "quality",
            TestCategory::Completeness => "completeness",
            TestCategory::Consistency => "consistency",
        }
    }
}

impl std::fmt::Display for TestCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How badly a failing test should weigh on the phase outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    Major,
    Minor,
}

/// One rubric check run against a phase's output. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    pub category: TestCategory,
    pub passed: bool,
    /// 0–100.
    pub score: f64,
    pub weight: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl TestResult {
    /// A passing check at full score.
    pub fn pass(name: impl Into<String>, category: TestCategory, weight: f64) -> Self {
        Self {
            name: name.into(),
            category,
            passed: true,
            score: 100.0,
            weight,
            severity: None,
            message: None,
        }
    }

    /// A failing check with an explicit partial score and severity.
    pub fn fail(
        name: impl Into<String>,
        category: TestCategory,
        weight: f64,
        score: f64,
        severity: Severity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            category,
            passed: false,
            score: score.clamp(0.0, 100.0),
            weight,
            severity: Some(severity),
            message: Some(message.into()),
        }
    }

    /// Attach an informational message to a passing result.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// The four per-category weighted averages a phase evaluation produces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentScores {
    pub validation: f64,
    pub quality: f64,
    pub completeness: f64,
    pub consistency: f64,
}

impl ComponentScores {
    pub fn get(&self, category: TestCategory) -> f64 {
        match category {
            TestCategory::Validation => self.validation,
            TestCategory::Quality => self.quality,
            TestCategory::Completeness => self.completeness,
            TestCategory::Consistency => self.consistency,
        }
    }

    pub fn set(&mut self, category: TestCategory, score: f64) {
        match category {
            TestCategory::Validation => self.validation = score,
            TestCategory::Quality => self.quality = score,
            TestCategory::Completeness => self.completeness = score,
            TestCategory::Consistency => self.consistency = score,
        }
    }
}

/// Blend weights for combining component scores into a composite total.
///
/// Defaults to validation 0.4 / quality 0.3 / completeness 0.2 /
/// consistency 0.1; phases with different priorities override per scorer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComponentWeights {
    pub validation: f64,
    pub quality: f64,
    pub completeness: f64,
    pub consistency: f64,
}

impl Default for ComponentWeights {
    fn default() -> Self {
        Self {
            validation: 0.4,
            quality: 0.3,
            completeness: 0.2,
            consistency: 0.1,
        }
    }
}

impl ComponentWeights {
    /// Weighted blend of the four component scores, rounded to the nearest
    /// whole point.
    pub fn blend(&self, components: &ComponentScores) -> f64 {
        let raw = components.validation * self.validation
            + components.quality * self.quality
            + components.completeness * self.completeness
            + components.consistency * self.consistency;
        raw.round()
    }
}

/// Letter grade bands shared by phase scores and run reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    /// Band lookup, inclusive at the lower edge: 90.0 is an A, 89.9 a B.
    pub fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            Grade::A
        } else if score >= 80.0 {
            Grade::B
        } else if score >= 70.0 {
            Grade::C
        } else if score >= 60.0 {
            Grade::D
        } else {
            Grade::F
        }
    }
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        };
        f.write_str(s)
    }
}

/// Aggregated result of scoring one phase. Created fresh per scoring call.
///
/// The `passed` flag here is a scorer-local sanity check (no critical failures
/// and total ≥ 60). The authoritative pass/fail used downstream is always
/// recomputed by the threshold policy, which knows the configured mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseScore {
    pub components: ComponentScores,
    pub total: f64,
    pub grade: Grade,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub component_failures: Vec<TestCategory>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tests: Vec<TestResult>,
}

impl PhaseScore {
    /// Categories currently sitting below their mode-independent floors.
    pub fn failed_components(&self) -> Vec<TestCategory> {
        TestCategory::ALL
            .into_iter()
            .filter(|c| self.components.get(*c) < c.minimum())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Retry bookkeeping
// ---------------------------------------------------------------------------

/// How backoff delay grows with the attempt count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// `base * 2^attempts`
    Exponential,
    /// `base * (attempts + 1)`
    Linear,
    /// Always zero.
    None,
}

/// One recorded regeneration attempt for a phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryHistoryEntry {
    pub attempt: usize,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score_before: Option<f64>,
    pub backoff_ms: u64,
}

/// Per-phase retry state. Lives only for the duration of one run; its summary
/// survives into the report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetryRecord {
    pub attempts: usize,
    pub history: Vec<RetryHistoryEntry>,
}

/// Run-level retry summary handed verbatim into the generation report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryStats {
    pub total_retries: usize,
    /// phase id → attempts for every phase that retried at least once.
    pub retried_phases: std::collections::HashMap<String, usize>,
}

// ---------------------------------------------------------------------------
// Case specification — typed inputs to the guardrail validators
// ---------------------------------------------------------------------------

/// How an evidence item supports the reasoning chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceType {
    Observation,
    Contradiction,
    Elimination,
}

/// A discrete clue tied to one inference step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceItem {
    pub id: String,
    pub description: String,
    /// 1-based index of the inference step this clue supports.
    pub supports_inference_step: usize,
    pub evidence_type: EvidenceType,
}

/// One ordered reasoning claim in the case's logical design.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceStep {
    /// 1-based position in the chain.
    pub index: usize,
    /// Natural-language observation the reader should be able to make.
    pub observation: String,
    #[serde(default)]
    pub required_evidence: Vec<String>,
    /// Whether the reader can observe this step on the page.
    #[serde(default)]
    pub reader_visible: bool,
}

/// A member of the case's cast.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CastMember {
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub is_culprit: bool,
    /// Whether this member is a plausible suspect at all.
    #[serde(default = "default_true")]
    pub eligible: bool,
}

fn default_true() -> bool {
    true
}

/// The designed procedure that should uniquely implicate the true culprit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscriminatingTest {
    pub design: String,
    #[serde(default)]
    pub expected_outcome: String,
}

/// Category of a constraint item used by failure classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintCategory {
    Time,
    Access,
    Physical,
}

/// One constraint narrowing the space of possible explanations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseConstraint {
    pub category: ConstraintCategory,
    pub description: String,
}

/// The structured logical design of the mystery, produced upstream by the
/// logic-design phase. Read-only input; the engine never mutates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseSpec {
    #[serde(default)]
    pub inference_steps: Vec<InferenceStep>,
    #[serde(default)]
    pub false_assumption: String,
    #[serde(default)]
    pub discriminating_test: Option<DiscriminatingTest>,
    #[serde(default)]
    pub cast: Vec<CastMember>,
    #[serde(default)]
    pub evidence: Vec<EvidenceItem>,
    #[serde(default)]
    pub constraints: Vec<CaseConstraint>,
}

impl CaseSpec {
    /// Evidence items supporting a given 1-based step index.
    pub fn evidence_for_step(&self, step: usize) -> impl Iterator<Item = &EvidenceItem> {
        self.evidence
            .iter()
            .filter(move |e| e.supports_inference_step == step)
    }

    pub fn culprits(&self) -> impl Iterator<Item = &CastMember> {
        self.cast.iter().filter(|m| m.is_culprit)
    }

    pub fn non_culprit_suspects(&self) -> impl Iterator<Item = &CastMember> {
        self.cast.iter().filter(|m| !m.is_culprit && m.eligible)
    }
}

/// One generated prose scene.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scene {
    /// 0-based position in the narrative.
    pub index: usize,
    #[serde(default)]
    pub title: String,
    /// Optional upstream annotation ("disappearance", "confession", ...).
    #[serde(default)]
    pub kind: Option<String>,
    pub text: String,
}
