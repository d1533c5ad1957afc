//! Score aggregator: collects phase outcomes for one run and emits the
//! generation report.

use verdict_scoring::{get_threshold, passes_threshold, ThresholdConfig};
use verdict_types::{Grade, PhaseScore, RetryStats};

use crate::{GenerationReport, PhaseReport, ReportSummary};

/// Per-run collector of phase reports.
///
/// The authoritative `passed` flag on every stored [`PhaseReport`] is
/// recomputed through the threshold policy against the configured mode, even
/// when the incoming [`PhaseScore`] disagrees, so the report and the live
/// scorer can never contradict each other.
#[derive(Debug)]
pub struct ScoreAggregator {
    project_id: String,
    run_id: String,
    config: ThresholdConfig,
    phases: Vec<PhaseReport>,
    started_at: chrono::DateTime<chrono::Utc>,
}

/// Inputs for one recorded phase outcome.
#[derive(Debug, Clone)]
pub struct PhaseOutcome {
    pub phase_id: String,
    pub phase_name: String,
    pub score: PhaseScore,
    pub duration_ms: u64,
    pub cost: f64,
    pub errors: Vec<String>,
}

impl ScoreAggregator {
    pub fn new(
        config: ThresholdConfig,
        project_id: impl Into<String>,
        run_id: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            run_id: run_id.into(),
            config,
            phases: Vec::new(),
            started_at: chrono::Utc::now(),
        }
    }

    /// Construct with a generated v4 run id.
    pub fn with_generated_run_id(config: ThresholdConfig, project_id: impl Into<String>) -> Self {
        Self::new(config, project_id, uuid::Uuid::new_v4().to_string())
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    fn build_phase_report(&self, outcome: PhaseOutcome, retry_count: usize) -> PhaseReport {
        let threshold = get_threshold(&outcome.phase_id, &self.config);
        // Never trust the scorer-local flag; the policy owns the decision.
        let passed = passes_threshold(&outcome.phase_id, &outcome.score, &self.config);
        let mut score = outcome.score;
        score.passed = passed;
        PhaseReport {
            phase_id: outcome.phase_id,
            phase_name: outcome.phase_name,
            score,
            duration_ms: outcome.duration_ms,
            cost: outcome.cost,
            threshold,
            passed,
            retry_count,
            retry_history: Vec::new(),
            errors: outcome.errors,
        }
    }

    /// Append a phase outcome. Used when a phase is conceptually repeated
    /// (e.g., per-chapter prose scoring that needs distinct entries).
    pub fn add_phase_score(&mut self, outcome: PhaseOutcome) {
        let report = self.build_phase_report(outcome, 0);
        tracing::debug!(phase = %report.phase_id, passed = report.passed, "phase outcome added");
        self.phases.push(report);
    }

    /// Insert or replace the outcome for a phase id, keeping exactly one
    /// entry per phase across internal re-scoring.
    pub fn upsert_phase_score(&mut self, outcome: PhaseOutcome) {
        let report = self.build_phase_report(outcome, 0);
        match self
            .phases
            .iter_mut()
            .find(|p| p.phase_id == report.phase_id)
        {
            Some(existing) => {
                // Preserve retry bookkeeping accumulated on the earlier entry.
                let retry_count = existing.retry_count;
                let retry_history = std::mem::take(&mut existing.retry_history);
                *existing = PhaseReport {
                    retry_count,
                    retry_history,
                    ..report
                };
            }
            None => self.phases.push(report),
        }
    }

    /// Attach retry bookkeeping from the retry manager to a stored phase.
    pub fn set_phase_retries(
        &mut self,
        phase_id: &str,
        retry_count: usize,
        retry_history: Vec<verdict_types::RetryHistoryEntry>,
    ) {
        if let Some(phase) = self.phases.iter_mut().find(|p| p.phase_id == phase_id) {
            phase.retry_count = retry_count;
            phase.retry_history = retry_history;
        }
    }

    pub fn phases(&self) -> &[PhaseReport] {
        &self.phases
    }

    /// Roll all recorded phases into the run-level report.
    ///
    /// An empty run yields `overall_score = 0` and `passed = true` (vacuous
    /// AND): recording nothing is not a failure.
    pub fn generate_report(&self, retry_stats: RetryStats) -> GenerationReport {
        let count = self.phases.len();
        let overall_score = if count == 0 {
            0.0
        } else {
            self.phases.iter().map(|p| p.score.total).sum::<f64>() / count as f64
        };
        let passed = self.phases.iter().all(|p| p.passed);

        let weakest_phase = self
            .phases
            .iter()
            .min_by(|a, b| a.score.total.total_cmp(&b.score.total))
            .map(|p| p.phase_name.clone());
        let strongest_phase = self
            .phases
            .iter()
            .max_by(|a, b| a.score.total.total_cmp(&b.score.total))
            .map(|p| p.phase_name.clone());

        let phases_passed = self.phases.iter().filter(|p| p.passed).count();
        let phases_failed = count - phases_passed;
        let pass_rate = if count == 0 {
            1.0
        } else {
            phases_passed as f64 / count as f64
        };
        let total_cost: f64 = self.phases.iter().map(|p| p.cost).sum();
        let total_duration_ms: u64 = self.phases.iter().map(|p| p.duration_ms).sum();

        let generated_at = chrono::Utc::now();
        tracing::info!(
            project = %self.project_id,
            run = %self.run_id,
            phases = count,
            overall_score,
            passed,
            "generation report assembled"
        );

        GenerationReport {
            project_id: self.project_id.clone(),
            run_id: self.run_id.clone(),
            generated_at,
            total_duration_ms: total_duration_ms.max(
                (generated_at - self.started_at).num_milliseconds().max(0) as u64,
            ),
            total_cost,
            overall_score,
            overall_grade: Grade::from_score(overall_score),
            passed,
            phases: self.phases.clone(),
            summary: ReportSummary {
                phases_passed,
                phases_failed,
                pass_rate,
                weakest_phase,
                strongest_phase,
                retry_stats,
                total_cost,
            },
            threshold_config: self.config.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use verdict_scoring::ThresholdMode;
    use verdict_types::ComponentScores;

    fn healthy_score(total: f64) -> PhaseScore {
        PhaseScore {
            components: ComponentScores {
                validation: total,
                quality: total,
                completeness: total,
                consistency: total,
            },
            total,
            grade: Grade::from_score(total),
            passed: false, // deliberately wrong; the aggregator must recompute
            failure_reason: None,
            component_failures: vec![],
            tests: vec![],
        }
    }

    fn outcome(phase_id: &str, name: &str, total: f64) -> PhaseOutcome {
        PhaseOutcome {
            phase_id: phase_id.into(),
            phase_name: name.into(),
            score: healthy_score(total),
            duration_ms: 1_000,
            cost: 0.25,
            errors: vec![],
        }
    }

    fn lenient_aggregator() -> ScoreAggregator {
        ScoreAggregator::new(
            ThresholdConfig::for_mode(ThresholdMode::Lenient),
            "proj",
            "run-1",
        )
    }

    // 1. Empty run: vacuous pass, zero score
    #[test]
    fn empty_run_is_vacuously_passed() {
        let report = lenient_aggregator().generate_report(RetryStats::default());
        assert_eq!(report.overall_score, 0.0);
        assert!(report.phases.is_empty());
        assert!(report.passed);
        assert_eq!(report.summary.pass_rate, 1.0);
        assert!(report.summary.weakest_phase.is_none());
    }

    // 2. Mean of phase totals
    #[test]
    fn overall_score_is_arithmetic_mean() {
        let mut agg = lenient_aggregator();
        agg.add_phase_score(outcome("context", "Context", 80.0));
        agg.add_phase_score(outcome("prose", "Prose", 60.0));
        let report = agg.generate_report(RetryStats::default());
        assert_eq!(report.overall_score, 70.0);
        assert_eq!(report.overall_grade, Grade::C);
    }

    // 3. passed flag is recomputed via the threshold policy
    #[test]
    fn passed_flag_recomputed_from_policy() {
        let mut agg = lenient_aggregator();
        // healthy 80 against lenient prose threshold (60): passes even though
        // the incoming score said failed.
        agg.add_phase_score(outcome("prose", "Prose", 80.0));
        let report = agg.generate_report(RetryStats::default());
        assert!(report.phases[0].passed);
        assert!(report.phases[0].score.passed, "stored score normalized too");
        assert!(report.passed);
    }

    // 4. One failing phase fails the run
    #[test]
    fn failing_phase_fails_run() {
        let mut agg = lenient_aggregator();
        agg.add_phase_score(outcome("prose", "Prose", 90.0));
        agg.add_phase_score(outcome("case_design", "Case Design", 50.0));
        let report = agg.generate_report(RetryStats::default());
        assert!(!report.passed);
        assert_eq!(report.summary.phases_passed, 1);
        assert_eq!(report.summary.phases_failed, 1);
        assert_eq!(report.summary.pass_rate, 0.5);
    }

    // 5. Upsert keeps one entry per phase
    #[test]
    fn upsert_replaces_existing_entry() {
        let mut agg = lenient_aggregator();
        agg.upsert_phase_score(outcome("prose", "Prose", 55.0));
        agg.upsert_phase_score(outcome("prose", "Prose", 85.0));
        assert_eq!(agg.phases().len(), 1);
        assert_eq!(agg.phases()[0].score.total, 85.0);
    }

    // 6. Plain add appends duplicates
    #[test]
    fn add_appends_repeated_phases() {
        let mut agg = lenient_aggregator();
        agg.add_phase_score(outcome("prose", "Prose ch.1", 70.0));
        agg.add_phase_score(outcome("prose", "Prose ch.2", 90.0));
        assert_eq!(agg.phases().len(), 2);
    }

    // 7. Weakest/strongest carry the phase name
    #[test]
    fn weakest_and_strongest_by_total_carry_names() {
        let mut agg = lenient_aggregator();
        agg.add_phase_score(outcome("context", "Context", 95.0));
        agg.add_phase_score(outcome("prose", "Prose", 62.0));
        agg.add_phase_score(outcome("review", "Review", 88.0));
        let report = agg.generate_report(RetryStats::default());
        assert_eq!(report.summary.weakest_phase.as_deref(), Some("Prose"));
        assert_eq!(report.summary.strongest_phase.as_deref(), Some("Context"));
    }

    // 8. Upsert preserves retry bookkeeping from the earlier entry
    #[test]
    fn upsert_preserves_retry_bookkeeping() {
        let mut agg = lenient_aggregator();
        agg.upsert_phase_score(outcome("prose", "Prose", 55.0));
        agg.set_phase_retries("prose", 2, vec![]);
        agg.upsert_phase_score(outcome("prose", "Prose", 85.0));
        assert_eq!(agg.phases()[0].retry_count, 2);
    }

    // 9. Retry stats are embedded verbatim
    #[test]
    fn retry_stats_pass_through() {
        let mut stats = RetryStats::default();
        stats.total_retries = 4;
        stats.retried_phases.insert("prose".into(), 3);
        let report = lenient_aggregator().generate_report(stats);
        assert_eq!(report.summary.retry_stats.total_retries, 4);
        assert_eq!(report.summary.retry_stats.retried_phases.get("prose"), Some(&3));
    }

    // 10. Costs and durations accumulate
    #[test]
    fn totals_accumulate_across_phases() {
        let mut agg = lenient_aggregator();
        agg.add_phase_score(outcome("context", "Context", 80.0));
        agg.add_phase_score(outcome("prose", "Prose", 80.0));
        let report = agg.generate_report(RetryStats::default());
        assert_eq!(report.total_cost, 0.5);
        assert!(report.total_duration_ms >= 2_000);
        assert_eq!(report.summary.total_cost, 0.5);
    }
}
