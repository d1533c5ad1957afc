//! Guardrail validators: deterministic consistency checks over case
//! specifications and generated prose scenes.
//!
//! All validators are pure functions over read-only inputs. Each returns a
//! list of [`Finding`]s with severity; none mutate the case or the scenes, and
//! none panic on malformed input. The prose-level discriminating-test check
//! optionally consults an injected [`SemanticJudge`] when the cheap regex tier
//! cannot confirm realization.

use serde::{Deserialize, Serialize};
use verdict_types::Severity;

pub mod case;
pub mod prose;

pub use case::{
    audit_case, check_contradiction_pairing, check_false_assumption, check_inference_coverage,
    check_suspect_elimination, check_test_reachability, classify_failure, CoverageReport,
    FailureClass, FairPlayAudit,
};
pub use prose::{
    check_narrative_continuity, check_suspect_closure, check_test_realization, Confidence,
    JudgeVerdict, SemanticJudge,
};

/// One issue raised by a guardrail validator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    /// Machine-stable code, e.g. `uncovered_step` or `identity_continuity_break`.
    pub code: String,
    pub severity: Severity,
    pub message: String,
    /// 1-based inference-step index, when the finding is tied to a step.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<usize>,
    /// 0-based scene index, when the finding is tied to a scene.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scene: Option<usize>,
}

impl Finding {
    pub fn new(code: impl Into<String>, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            severity,
            message: message.into(),
            step: None,
            scene: None,
        }
    }

    pub fn at_step(mut self, step: usize) -> Self {
        self.step = Some(step);
        self
    }

    pub fn at_scene(mut self, scene: usize) -> Self {
        self.scene = Some(scene);
        self
    }

    pub fn is_critical(&self) -> bool {
        self.severity == Severity::Critical
    }
}

/// True when any finding in the slice is critical.
pub fn has_critical(findings: &[Finding]) -> bool {
    findings.iter().any(Finding::is_critical)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finding_builders_attach_locations() {
        let f = Finding::new("uncovered_step", Severity::Critical, "step 3 has no clue")
            .at_step(3);
        assert_eq!(f.step, Some(3));
        assert!(f.scene.is_none());
        assert!(f.is_critical());
    }

    #[test]
    fn has_critical_scans_severities() {
        let findings = vec![
            Finding::new("a", Severity::Minor, "m"),
            Finding::new("b", Severity::Major, "m"),
        ];
        assert!(!has_critical(&findings));

        let with_critical = [
            findings,
            vec![Finding::new("c", Severity::Critical, "m")],
        ]
        .concat();
        assert!(has_critical(&with_critical));
    }
}
