//! Run-level reporting: aggregate phase outcomes into a [`GenerationReport`]
//! and persist one JSON document per `(projectId, runId)`.

use serde::{Deserialize, Serialize};
use verdict_scoring::ThresholdConfig;
use verdict_types::{Grade, PhaseScore, RetryHistoryEntry, RetryStats};

pub mod aggregator;
pub mod repository;

pub use aggregator::{PhaseOutcome, ScoreAggregator};
pub use repository::{AggregateStats, PhaseFailureCount, ReportRepository};

/// One phase's outcome within a run. At most one per phase id under upsert
/// semantics; plain add may hold several for conceptually repeated phases.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseReport {
    pub phase_id: String,
    pub phase_name: String,
    pub score: PhaseScore,
    pub duration_ms: u64,
    pub cost: f64,
    /// Composite threshold this phase was gated against.
    pub threshold: f64,
    /// Authoritative pass flag, recomputed by the threshold policy.
    pub passed: bool,
    pub retry_count: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub retry_history: Vec<RetryHistoryEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

/// Run summary block embedded in the generation report.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub phases_passed: usize,
    pub phases_failed: usize,
    /// 0.0–1.0; 1.0 for an empty run.
    pub pass_rate: f64,
    /// Human-readable name of the lowest-scoring phase.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weakest_phase: Option<String>,
    /// Human-readable name of the highest-scoring phase.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strongest_phase: Option<String>,
    pub retry_stats: RetryStats,
    pub total_cost: f64,
}

/// The run-level artifact. Immutable once generated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationReport {
    pub project_id: String,
    pub run_id: String,
    pub generated_at: chrono::DateTime<chrono::Utc>,
    pub total_duration_ms: u64,
    pub total_cost: f64,
    /// Arithmetic mean of phase totals; 0 for an empty run.
    pub overall_score: f64,
    pub overall_grade: Grade,
    /// AND over all phase passed flags; vacuously true for an empty run.
    pub passed: bool,
    pub phases: Vec<PhaseReport>,
    pub summary: ReportSummary,
    /// The threshold configuration the run was gated against.
    pub threshold_config: ThresholdConfig,
}
