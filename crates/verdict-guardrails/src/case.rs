//! Case-level guardrails: fair-play audit of the structured case specification.
//!
//! These checks enforce that the logical design of a mystery is sound before
//! prose generation is allowed to build on it: every inference step must be
//! anchored to on-page evidence, the false assumption must actually be
//! contradicted, and the discriminating test must be reachable from the clue
//! set.

use std::collections::HashSet;

use verdict_types::{CaseSpec, EvidenceType, Severity};

use crate::{has_critical, Finding};

/// Result of the inference-coverage check.
#[derive(Debug, Clone)]
pub struct CoverageReport {
    pub findings: Vec<Finding>,
    /// 1-based indices of steps with no supporting observation evidence.
    pub uncovered_steps: Vec<usize>,
    pub has_critical_gaps: bool,
}

/// Require at least one `observation` evidence item per inference step.
///
/// A step without any observation clue is a critical gap: the reader has no
/// on-page path to that claim. Missing disconfirming evidence (contradiction
/// or elimination) is only a minor warning. A case with zero steps at all is
/// an immediate critical failure.
pub fn check_inference_coverage(case: &CaseSpec) -> CoverageReport {
    let mut findings = Vec::new();
    let mut uncovered = Vec::new();

    if case.inference_steps.is_empty() {
        findings.push(Finding::new(
            "no_inference_steps",
            Severity::Critical,
            "case specification has no inference steps",
        ));
        return CoverageReport {
            findings,
            uncovered_steps: uncovered,
            has_critical_gaps: true,
        };
    }

    for step in &case.inference_steps {
        let items: Vec<_> = case.evidence_for_step(step.index).collect();
        let observations = items
            .iter()
            .filter(|e| e.evidence_type == EvidenceType::Observation)
            .count();
        let disconfirming = items.iter().any(|e| {
            matches!(
                e.evidence_type,
                EvidenceType::Contradiction | EvidenceType::Elimination
            )
        });

        if observations == 0 {
            uncovered.push(step.index);
            findings.push(
                Finding::new(
                    "uncovered_step",
                    Severity::Critical,
                    format!(
                        "inference step {} ({:?}) has no supporting observation evidence",
                        step.index,
                        truncate(&step.observation, 60)
                    ),
                )
                .at_step(step.index),
            );
        }
        if !disconfirming {
            findings.push(
                Finding::new(
                    "no_disconfirming_evidence",
                    Severity::Minor,
                    format!(
                        "inference step {} has no contradiction or elimination evidence",
                        step.index
                    ),
                )
                .at_step(step.index),
            );
        }
    }

    let has_critical_gaps = has_critical(&findings);
    CoverageReport {
        findings,
        uncovered_steps: uncovered,
        has_critical_gaps,
    }
}

/// A step is well-supported only when at least two evidence items span an
/// observation plus a contradiction or elimination. Fewer is a warning, not a
/// hard failure.
pub fn check_contradiction_pairing(case: &CaseSpec) -> Vec<Finding> {
    let mut findings = Vec::new();
    for step in &case.inference_steps {
        let items: Vec<_> = case.evidence_for_step(step.index).collect();
        let has_observation = items
            .iter()
            .any(|e| e.evidence_type == EvidenceType::Observation);
        let has_disconfirming = items.iter().any(|e| {
            matches!(
                e.evidence_type,
                EvidenceType::Contradiction | EvidenceType::Elimination
            )
        });
        let well_supported = items.len() >= 2 && has_observation && has_disconfirming;
        if !well_supported {
            findings.push(
                Finding::new(
                    "weak_support",
                    Severity::Minor,
                    format!(
                        "inference step {} is not paired: needs an observation plus a \
                         contradiction or elimination ({} items present)",
                        step.index,
                        items.len()
                    ),
                )
                .at_step(step.index),
            );
        }
    }
    findings
}

/// The false assumption must be stated, and at least one evidence item must be
/// typed `contradiction` so the reader can see the assumption break.
pub fn check_false_assumption(case: &CaseSpec) -> Vec<Finding> {
    let mut findings = Vec::new();
    if case.false_assumption.trim().is_empty() {
        findings.push(Finding::new(
            "missing_false_assumption",
            Severity::Critical,
            "case specification declares no false assumption",
        ));
    }
    let has_contradiction = case
        .evidence
        .iter()
        .any(|e| e.evidence_type == EvidenceType::Contradiction);
    if !has_contradiction {
        findings.push(Finding::new(
            "false_assumption_uncontradicted",
            Severity::Critical,
            "no evidence item is typed contradiction; the false assumption can never be broken on the page",
        ));
    }
    findings
}

/// Minimum token-overlap ratio for the discriminating test to count as
/// reachable from some evidence item.
const REACHABILITY_OVERLAP: f64 = 0.2;

/// Tokenize prose into lowercase significant words (longer than 4 chars).
pub(crate) fn significant_tokens(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > 4)
        .map(|w| w.to_lowercase())
        .collect()
}

/// The discriminating test must be reachable: some evidence item's significant
/// tokens must overlap the test design's tokens by at least 20%. A declared
/// but unreachable test is a critical gap. No declared test yields no finding
/// here; the prose realization check reports that case.
pub fn check_test_reachability(case: &CaseSpec) -> Vec<Finding> {
    let Some(test) = &case.discriminating_test else {
        return Vec::new();
    };
    let design_tokens = significant_tokens(&test.design);
    if design_tokens.is_empty() {
        return vec![Finding::new(
            "test_unreachable",
            Severity::Critical,
            "discriminating test design has no significant vocabulary to anchor evidence against",
        )];
    }

    let reachable = case.evidence.iter().any(|e| {
        let evidence_tokens = significant_tokens(&e.description);
        let overlap = design_tokens.intersection(&evidence_tokens).count();
        overlap as f64 / design_tokens.len() as f64 >= REACHABILITY_OVERLAP
    });

    if reachable {
        Vec::new()
    } else {
        vec![Finding::new(
            "test_unreachable",
            Severity::Critical,
            format!(
                "no evidence item shares at least {:.0}% of the discriminating test's vocabulary",
                REACHABILITY_OVERLAP * 100.0
            ),
        )]
    }
}

/// Every eligible non-culprit cast member should be touched by the evidence:
/// at least one name token must appear somewhere in the evidence text. This is
/// a completeness signal, not a correctness failure, so gaps only warn.
pub fn check_suspect_elimination(case: &CaseSpec) -> Vec<Finding> {
    let evidence_text = case
        .evidence
        .iter()
        .map(|e| e.description.to_lowercase())
        .collect::<Vec<_>>()
        .join("\n");

    let mut findings = Vec::new();
    for suspect in case.non_culprit_suspects() {
        let mentioned = name_tokens(&suspect.name)
            .any(|token| evidence_text.contains(&token));
        if !mentioned {
            findings.push(Finding::new(
                "suspect_unaddressed",
                Severity::Minor,
                format!(
                    "suspect {} is never referenced by any evidence item",
                    suspect.name
                ),
            ));
        }
    }
    findings
}

fn name_tokens(name: &str) -> impl Iterator<Item = String> + '_ {
    name.split_whitespace()
        .filter(|t| t.chars().count() > 2)
        .map(|t| t.to_lowercase())
}

/// Root-cause classification for a failed fair-play audit, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// The reasoning chain itself is too thin to ground clues against.
    InferencePathAbstract,
    /// Too few time/access/physical constraints to discriminate suspects.
    ConstraintSpaceInsufficient,
    /// The chain is sound but steps lack covering clues.
    ClueCoverage,
    /// Only clue-level repair is needed.
    ClueOnly,
}

/// Observation text shorter than this is considered abstract.
const ABSTRACT_OBSERVATION_CHARS: usize = 30;
/// Below this many constraint items the constraint space cannot discriminate.
const MIN_CONSTRAINT_ITEMS: usize = 4;

/// Classify why the fair-play audit failed, checked in priority order:
/// abstract inference path, then insufficient constraint space, then
/// unresolved coverage gaps, then clue-only.
pub fn classify_failure(case: &CaseSpec, coverage: &CoverageReport) -> FailureClass {
    let total = case.inference_steps.len();
    let abstract_steps = case
        .inference_steps
        .iter()
        .filter(|s| {
            s.observation.chars().count() < ABSTRACT_OBSERVATION_CHARS
                || s.required_evidence.is_empty()
        })
        .count();
    if total == 0 || abstract_steps * 2 >= total {
        return FailureClass::InferencePathAbstract;
    }
    if case.constraints.len() < MIN_CONSTRAINT_ITEMS {
        return FailureClass::ConstraintSpaceInsufficient;
    }
    if !coverage.uncovered_steps.is_empty() {
        return FailureClass::ClueCoverage;
    }
    FailureClass::ClueOnly
}

/// Aggregate result of running every case-level guardrail.
#[derive(Debug, Clone)]
pub struct FairPlayAudit {
    pub findings: Vec<Finding>,
    pub uncovered_steps: Vec<usize>,
    pub has_critical_gaps: bool,
    /// No critical findings across any check.
    pub passed: bool,
    /// Root-cause classification, present only when the audit failed.
    pub failure_class: Option<FailureClass>,
}

/// Run the full case-level battery: coverage, pairing, false assumption,
/// test reachability, suspect elimination.
pub fn audit_case(case: &CaseSpec) -> FairPlayAudit {
    let coverage = check_inference_coverage(case);
    let mut findings = coverage.findings.clone();
    findings.extend(check_contradiction_pairing(case));
    findings.extend(check_false_assumption(case));
    findings.extend(check_test_reachability(case));
    findings.extend(check_suspect_elimination(case));

    let passed = !has_critical(&findings);
    let failure_class = if passed {
        None
    } else {
        Some(classify_failure(case, &coverage))
    };

    if !passed {
        tracing::debug!(
            findings = findings.len(),
            class = ?failure_class,
            "fair-play audit failed"
        );
    }

    FairPlayAudit {
        findings,
        uncovered_steps: coverage.uncovered_steps,
        has_critical_gaps: coverage.has_critical_gaps,
        passed,
        failure_class,
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max).collect();
        format!("{cut}...")
    }
}
