//! The `PhaseScorer` trait and the shared score-assembly driver.

use std::collections::HashMap;

use verdict_types::{
    ComponentScores, ComponentWeights, Grade, PhaseScore, Severity, TestCategory, TestResult,
};

/// Scorer-local sanity floor: independent of the threshold policy, a phase
/// whose composite falls under this can never be considered internally passed.
const SANITY_FLOOR: f64 = 60.0;

/// Cross-phase context handed to a scorer.
///
/// `previous_phases` carries the scores of already-completed phases;
/// `previous_outputs` their raw structured outputs, for completeness checks
/// that need to compare payloads across phases.
#[derive(Debug, Default)]
pub struct ScoreContext {
    pub previous_phases: HashMap<String, PhaseScore>,
    pub previous_outputs: HashMap<String, serde_json::Value>,
}

impl ScoreContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn previous_output(&self, phase_id: &str) -> Option<&serde_json::Value> {
        self.previous_outputs.get(phase_id)
    }
}

/// A concrete per-phase scorer: runs a fixed battery of rubric checks.
///
/// Implementors supply `run_tests`; the provided [`score`](PhaseScorer::score)
/// driver does the category math, grading, and failure-reason assembly the
/// same way for every phase. Scoring is a pure function of its inputs.
pub trait PhaseScorer: Send + Sync {
    /// Stable identifier of the phase this scorer evaluates.
    fn phase_id(&self) -> &str;

    /// Blend weights; override for phases with non-default priorities.
    fn weights(&self) -> ComponentWeights {
        ComponentWeights::default()
    }

    /// Run the rubric battery against a phase's input and output.
    fn run_tests(
        &self,
        input: &serde_json::Value,
        output: &serde_json::Value,
        ctx: &ScoreContext,
    ) -> Vec<TestResult>;

    /// Assemble a [`PhaseScore`] from the battery.
    fn score(
        &self,
        input: &serde_json::Value,
        output: &serde_json::Value,
        ctx: &ScoreContext,
    ) -> PhaseScore {
        let tests = self.run_tests(input, output, ctx);

        let mut components = ComponentScores::default();
        for category in TestCategory::ALL {
            let in_category: Vec<&TestResult> =
                tests.iter().filter(|t| t.category == category).collect();
            components.set(category, calculate_category_score(&in_category));
        }

        let total = self.weights().blend(&components);
        let grade = Grade::from_score(total);

        let critical_failures: Vec<&TestResult> = tests
            .iter()
            .filter(|t| !t.passed && t.severity == Some(Severity::Critical))
            .collect();
        let passed = critical_failures.is_empty() && total >= SANITY_FLOOR;

        let component_failures: Vec<TestCategory> = TestCategory::ALL
            .into_iter()
            .filter(|c| components.get(*c) < c.minimum())
            .collect();

        let failure_reason = if passed && component_failures.is_empty() {
            None
        } else {
            Some(build_failure_reason(
                &critical_failures,
                &component_failures,
                &components,
                total,
            ))
        };

        tracing::debug!(
            phase = self.phase_id(),
            total,
            grade = %grade,
            passed,
            tests = tests.len(),
            "phase scored"
        );

        PhaseScore {
            components,
            total,
            grade,
            passed,
            failure_reason,
            component_failures,
            tests,
        }
    }
}

/// Weighted average of a category's test scores; 0 when the category ran no
/// tests (an un-exercised category is not presumed healthy).
pub fn calculate_category_score(results: &[&TestResult]) -> f64 {
    let total_weight: f64 = results.iter().map(|t| t.weight).sum();
    if total_weight <= 0.0 {
        return 0.0;
    }
    let weighted: f64 = results.iter().map(|t| t.score * t.weight).sum();
    weighted / total_weight
}

fn build_failure_reason(
    critical: &[&TestResult],
    component_failures: &[TestCategory],
    components: &ComponentScores,
    total: f64,
) -> String {
    let mut parts = Vec::new();
    if !critical.is_empty() {
        let names: Vec<&str> = critical.iter().map(|t| t.name.as_str()).collect();
        parts.push(format!("critical checks failed: {}", names.join(", ")));
    }
    for category in component_failures {
        parts.push(format!(
            "{} component at {:.0} is below its floor of {:.0}",
            category,
            components.get(*category),
            category.minimum()
        ));
    }
    if total < SANITY_FLOOR {
        parts.push(format!("composite {total:.0} is below the sanity floor of 60"));
    }
    parts.join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedScorer {
        tests: Vec<TestResult>,
        weights: ComponentWeights,
    }

    impl PhaseScorer for FixedScorer {
        fn phase_id(&self) -> &str {
            "fixed"
        }
        fn weights(&self) -> ComponentWeights {
            self.weights
        }
        fn run_tests(
            &self,
            _input: &serde_json::Value,
            _output: &serde_json::Value,
            _ctx: &ScoreContext,
        ) -> Vec<TestResult> {
            self.tests.clone()
        }
    }

    fn score_of(tests: Vec<TestResult>) -> PhaseScore {
        let scorer = FixedScorer {
            tests,
            weights: ComponentWeights::default(),
        };
        scorer.score(
            &serde_json::Value::Null,
            &serde_json::Value::Null,
            &ScoreContext::new(),
        )
    }

    // 1. Empty category contributes zero, not a free pass
    #[test]
    fn empty_category_scores_zero() {
        let score = score_of(vec![TestResult::pass(
            "only_validation",
            TestCategory::Validation,
            1.0,
        )]);
        assert_eq!(score.components.validation, 100.0);
        assert_eq!(score.components.quality, 0.0);
        assert_eq!(score.components.consistency, 0.0);
        // 100*0.4 = 40
        assert_eq!(score.total, 40.0);
        assert!(!score.passed);
    }

    // 2. Weighted average within a category
    #[test]
    fn category_score_is_weighted_average() {
        let results = [
            TestResult::pass("a", TestCategory::Quality, 3.0),
            TestResult::fail(
                "b",
                TestCategory::Quality,
                1.0,
                60.0,
                Severity::Minor,
                "meh",
            ),
        ];
        let refs: Vec<&TestResult> = results.iter().collect();
        // (100*3 + 60*1) / 4 = 90
        assert_eq!(calculate_category_score(&refs), 90.0);
    }

    // 3. Zero or negative total weight yields zero
    #[test]
    fn zero_weight_category_scores_zero() {
        let results = [TestResult::pass("a", TestCategory::Quality, 0.0)];
        let refs: Vec<&TestResult> = results.iter().collect();
        assert_eq!(calculate_category_score(&refs), 0.0);
        assert_eq!(calculate_category_score(&[]), 0.0);
    }

    // 4. Critical failure forces internal fail even with high total
    #[test]
    fn critical_failure_forces_internal_fail() {
        let mut tests = vec![
            TestResult::pass("v", TestCategory::Validation, 1.0),
            TestResult::pass("q", TestCategory::Quality, 1.0),
            TestResult::pass("c", TestCategory::Completeness, 1.0),
        ];
        tests.push(TestResult::fail(
            "broken_chain",
            TestCategory::Consistency,
            0.1,
            90.0,
            Severity::Critical,
            "chain break",
        ));

        let score = score_of(tests);
        assert!(score.total > 90.0);
        assert!(!score.passed);
        let reason = score.failure_reason.unwrap();
        assert!(reason.contains("broken_chain"));
    }

    // 5. Component failures recorded even when composite passes
    #[test]
    fn component_failures_recorded_on_pass() {
        let tests = vec![
            TestResult::pass("v", TestCategory::Validation, 1.0),
            TestResult::pass("q", TestCategory::Quality, 1.0),
            TestResult::pass("c", TestCategory::Completeness, 1.0),
            TestResult::fail(
                "soft_consistency",
                TestCategory::Consistency,
                1.0,
                45.0,
                Severity::Minor,
                "weak pairing",
            ),
        ];
        let score = score_of(tests);
        // 40 + 30 + 20 + 4.5 = 94.5 -> 95 after rounding
        assert_eq!(score.total, 95.0);
        assert!(score.passed, "minor failure must not block the sanity pass");
        assert_eq!(score.component_failures, vec![TestCategory::Consistency]);
        assert!(score
            .failure_reason
            .unwrap()
            .contains("consistency component"));
    }

    // 6. Clean battery produces no failure reason
    #[test]
    fn clean_battery_has_no_failure_reason() {
        let tests = vec![
            TestResult::pass("v", TestCategory::Validation, 1.0),
            TestResult::pass("q", TestCategory::Quality, 1.0),
            TestResult::pass("c", TestCategory::Completeness, 1.0),
            TestResult::pass("s", TestCategory::Consistency, 1.0),
        ];
        let score = score_of(tests);
        assert_eq!(score.total, 100.0);
        assert_eq!(score.grade, Grade::A);
        assert!(score.passed);
        assert!(score.failure_reason.is_none());
        assert!(score.component_failures.is_empty());
    }

    // 7. Custom weights shift the blend
    #[test]
    fn custom_weights_change_total() {
        let scorer = FixedScorer {
            tests: vec![
                TestResult::pass("v", TestCategory::Validation, 1.0),
                TestResult::fail(
                    "q",
                    TestCategory::Quality,
                    1.0,
                    0.0,
                    Severity::Minor,
                    "flat prose",
                ),
            ],
            weights: ComponentWeights {
                validation: 0.5,
                quality: 0.5,
                completeness: 0.0,
                consistency: 0.0,
            },
        };
        let score = scorer.score(
            &serde_json::Value::Null,
            &serde_json::Value::Null,
            &ScoreContext::new(),
        );
        assert_eq!(score.total, 50.0);
    }
}
