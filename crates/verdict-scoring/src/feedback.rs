//! Retry-feedback rendering: turn a failed `PhaseScore` into guidance text.
//!
//! This text is the one artifact the engine hands back upstream into prompt
//! construction for the next generation attempt, so it has to be readable by
//! both a human operator and a language model.

use std::fmt::Write as _;

use verdict_types::{PhaseScore, Severity, TestCategory};

fn severity_marker(severity: Option<Severity>) -> &'static str {
    match severity {
        Some(Severity::Critical) => "[CRITICAL]",
        Some(Severity::Major) => "[MAJOR]",
        Some(Severity::Minor) => "[minor]",
        None => "[minor]",
    }
}

/// Full guidance: every failing check grouped by category, component floors
/// missed, and the composite gap against the configured threshold.
pub fn build_retry_feedback(score: &PhaseScore, threshold: f64) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "The previous attempt scored {:.0}/100 (grade {}), below the required {:.0}. \
         Address the following before regenerating:",
        score.total, score.grade, threshold
    );

    for category in TestCategory::ALL {
        let failing: Vec<_> = score
            .tests
            .iter()
            .filter(|t| !t.passed && t.category == category)
            .collect();
        if failing.is_empty() {
            continue;
        }
        let _ = writeln!(
            out,
            "\n{} ({:.0}/100):",
            category,
            score.components.get(category)
        );
        for test in failing {
            let _ = writeln!(
                out,
                "  {} {}: {}",
                severity_marker(test.severity),
                test.name,
                test.message.as_deref().unwrap_or("failed")
            );
        }
    }

    if !score.component_failures.is_empty() {
        let _ = writeln!(out);
        for category in &score.component_failures {
            let _ = writeln!(
                out,
                "The {} component ({:.0}) must reach at least {:.0} regardless of the overall score.",
                category,
                score.components.get(*category),
                category.minimum()
            );
        }
    }

    if let Some(reason) = &score.failure_reason {
        let _ = writeln!(out, "\nSummary: {reason}");
    }

    out.trim_end().to_string()
}

/// One-paragraph form: only critical and major failures, for tight prompt
/// budgets on later retry attempts.
pub fn build_concise_retry_feedback(score: &PhaseScore, threshold: f64) -> String {
    let issues: Vec<String> = score
        .tests
        .iter()
        .filter(|t| {
            !t.passed && matches!(t.severity, Some(Severity::Critical) | Some(Severity::Major))
        })
        .map(|t| {
            format!(
                "{} ({})",
                t.message.as_deref().unwrap_or(&t.name),
                t.category
            )
        })
        .collect();

    if issues.is_empty() {
        format!(
            "Scored {:.0}/100 against a required {:.0}. Raise the weakest components; \
             no single blocking issue was found.",
            score.total, threshold
        )
    } else {
        format!(
            "Scored {:.0}/100 against a required {:.0}. Fix: {}.",
            score.total,
            threshold,
            issues.join("; ")
        )
    }
}
