//! Concrete scorer for the logic-design phase.
//!
//! Validation and completeness checks look at the case specification's shape;
//! the consistency component is fed by the guardrail fair-play audit. Other
//! phases follow the same pattern with their own batteries.

use verdict_guardrails::{audit_case, Finding};
use verdict_types::{CaseSpec, ComponentWeights, Severity, TestCategory, TestResult};

use crate::scorer::{PhaseScorer, ScoreContext};

/// Scores the `case_design` phase output (a serialized [`CaseSpec`]).
#[derive(Debug, Default)]
pub struct CaseDesignScorer;

/// Minimum inference steps for a solvable chain.
const MIN_INFERENCE_STEPS: usize = 3;
/// Constraint items needed to discriminate between suspects.
const MIN_CONSTRAINTS: usize = 4;

impl PhaseScorer for CaseDesignScorer {
    fn phase_id(&self) -> &str {
        "case_design"
    }

    fn weights(&self) -> ComponentWeights {
        // Logic-critical phase: validation and consistency carry more weight
        // than prose-style quality.
        ComponentWeights {
            validation: 0.35,
            quality: 0.15,
            completeness: 0.2,
            consistency: 0.3,
        }
    }

    fn run_tests(
        &self,
        _input: &serde_json::Value,
        output: &serde_json::Value,
        ctx: &ScoreContext,
    ) -> Vec<TestResult> {
        let case: CaseSpec = match serde_json::from_value(output.clone()) {
            Ok(case) => case,
            Err(e) => {
                return vec![TestResult::fail(
                    "parseable_case_spec",
                    TestCategory::Validation,
                    2.0,
                    0.0,
                    Severity::Critical,
                    format!("output is not a case specification: {e}"),
                )];
            }
        };

        let mut tests = vec![TestResult::pass(
            "parseable_case_spec",
            TestCategory::Validation,
            2.0,
        )];
        tests.extend(validation_tests(&case));
        tests.extend(quality_tests(&case));
        tests.extend(completeness_tests(&case, ctx));
        tests.extend(consistency_tests(&case));
        tests
    }
}

fn validation_tests(case: &CaseSpec) -> Vec<TestResult> {
    let mut tests = Vec::new();

    tests.push(if case.inference_steps.len() >= MIN_INFERENCE_STEPS {
        TestResult::pass("inference_chain_present", TestCategory::Validation, 2.0)
    } else {
        TestResult::fail(
            "inference_chain_present",
            TestCategory::Validation,
            2.0,
            0.0,
            Severity::Critical,
            format!(
                "{} inference steps; at least {} are needed for a solvable chain",
                case.inference_steps.len(),
                MIN_INFERENCE_STEPS
            ),
        )
    });

    tests.push(if case.culprits().count() >= 1 {
        TestResult::pass("has_culprit", TestCategory::Validation, 1.5)
    } else {
        TestResult::fail(
            "has_culprit",
            TestCategory::Validation,
            1.5,
            0.0,
            Severity::Critical,
            "no cast member is flagged as the culprit",
        )
    });

    tests.push(if !case.false_assumption.trim().is_empty() {
        TestResult::pass("false_assumption_stated", TestCategory::Validation, 1.0)
    } else {
        TestResult::fail(
            "false_assumption_stated",
            TestCategory::Validation,
            1.0,
            0.0,
            Severity::Critical,
            "the false assumption is empty",
        )
    });

    tests.push(if !case.evidence.is_empty() {
        TestResult::pass("evidence_present", TestCategory::Validation, 1.0)
    } else {
        TestResult::fail(
            "evidence_present",
            TestCategory::Validation,
            1.0,
            0.0,
            Severity::Critical,
            "the case has no evidence items at all",
        )
    });

    tests
}

fn quality_tests(case: &CaseSpec) -> Vec<TestResult> {
    let mut tests = Vec::new();

    let total = case.inference_steps.len();
    let visible = case
        .inference_steps
        .iter()
        .filter(|s| s.reader_visible)
        .count();
    let visible_ratio = if total == 0 {
        0.0
    } else {
        visible as f64 / total as f64
    };
    tests.push(if visible_ratio >= 0.6 {
        TestResult::pass("reader_visible_steps", TestCategory::Quality, 1.0)
    } else {
        TestResult::fail(
            "reader_visible_steps",
            TestCategory::Quality,
            1.0,
            visible_ratio * 100.0,
            Severity::Major,
            format!("only {visible}/{total} inference steps are observable by the reader"),
        )
    });

    let thin = case
        .evidence
        .iter()
        .filter(|e| e.description.chars().count() < 20)
        .count();
    tests.push(if thin == 0 {
        TestResult::pass("evidence_descriptions", TestCategory::Quality, 1.0)
    } else {
        let score = if case.evidence.is_empty() {
            0.0
        } else {
            (1.0 - thin as f64 / case.evidence.len() as f64) * 100.0
        };
        TestResult::fail(
            "evidence_descriptions",
            TestCategory::Quality,
            1.0,
            score,
            Severity::Minor,
            format!("{thin} evidence descriptions are too thin to stage in prose"),
        )
    });

    tests
}

fn completeness_tests(case: &CaseSpec, ctx: &ScoreContext) -> Vec<TestResult> {
    let mut tests = Vec::new();

    tests.push(if case.discriminating_test.is_some() {
        TestResult::pass("discriminating_test_declared", TestCategory::Completeness, 1.5)
    } else {
        TestResult::fail(
            "discriminating_test_declared",
            TestCategory::Completeness,
            1.5,
            0.0,
            Severity::Major,
            "no discriminating test is declared",
        )
    });

    tests.push(if case.constraints.len() >= MIN_CONSTRAINTS {
        TestResult::pass("constraint_space", TestCategory::Completeness, 1.0)
    } else {
        TestResult::fail(
            "constraint_space",
            TestCategory::Completeness,
            1.0,
            (case.constraints.len() as f64 / MIN_CONSTRAINTS as f64) * 100.0,
            Severity::Major,
            format!(
                "only {} constraint items across time/access/physical; at least {} needed",
                case.constraints.len(),
                MIN_CONSTRAINTS
            ),
        )
    });

    // Cross-phase check: every cast member promised by the concept phase must
    // survive into the case design.
    if let Some(concept) = ctx.previous_output("concept") {
        if let Some(promised) = concept.get("cast").and_then(|c| c.as_array()) {
            let designed: Vec<String> =
                case.cast.iter().map(|m| m.name.to_lowercase()).collect();
            let missing: Vec<&str> = promised
                .iter()
                .filter_map(|v| v.as_str())
                .filter(|name| !designed.iter().any(|d| d == &name.to_lowercase()))
                .collect();
            tests.push(if missing.is_empty() {
                TestResult::pass("concept_cast_covered", TestCategory::Completeness, 1.0)
            } else {
                TestResult::fail(
                    "concept_cast_covered",
                    TestCategory::Completeness,
                    1.0,
                    0.0,
                    Severity::Major,
                    format!(
                        "cast members from the concept phase are missing: {}",
                        missing.join(", ")
                    ),
                )
            });
        }
    }

    tests
}

fn consistency_tests(case: &CaseSpec) -> Vec<TestResult> {
    let audit = audit_case(case);

    let mut tests = Vec::new();
    tests.push(if audit.uncovered_steps.is_empty() {
        TestResult::pass("steps_covered_by_clues", TestCategory::Consistency, 2.0)
    } else {
        TestResult::fail(
            "steps_covered_by_clues",
            TestCategory::Consistency,
            2.0,
            coverage_score(case, &audit.uncovered_steps),
            Severity::Critical,
            format!(
                "inference steps without observation clues: {}",
                audit
                    .uncovered_steps
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        )
    });

    for (code, name, weight) in [
        ("false_assumption_uncontradicted", "false_assumption_contradicted", 1.5),
        ("test_unreachable", "discriminating_test_reachable", 1.5),
    ] {
        let finding = audit.findings.iter().find(|f| f.code == code);
        tests.push(match finding {
            None => TestResult::pass(name, TestCategory::Consistency, weight),
            Some(f) => TestResult::fail(
                name,
                TestCategory::Consistency,
                weight,
                0.0,
                Severity::Critical,
                f.message.clone(),
            ),
        });
    }

    let weak: Vec<&Finding> = audit
        .findings
        .iter()
        .filter(|f| f.code == "weak_support")
        .collect();
    tests.push(if weak.is_empty() {
        TestResult::pass("evidence_pairing", TestCategory::Consistency, 1.0)
    } else {
        let total = case.inference_steps.len().max(1);
        TestResult::fail(
            "evidence_pairing",
            TestCategory::Consistency,
            1.0,
            (1.0 - weak.len() as f64 / total as f64) * 100.0,
            Severity::Minor,
            format!("{} steps lack an observation/contradiction pairing", weak.len()),
        )
    });

    tests
}

fn coverage_score(case: &CaseSpec, uncovered: &[usize]) -> f64 {
    let total = case.inference_steps.len();
    if total == 0 {
        return 0.0;
    }
    (1.0 - uncovered.len() as f64 / total as f64) * 100.0
}
