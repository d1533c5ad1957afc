//! Phase scoring and threshold gating.
//!
//! A [`PhaseScorer`] runs a fixed battery of rubric checks and folds them into
//! a [`verdict_types::PhaseScore`]. The [`threshold`] module owns the
//! authoritative pass/fail decision: scorers have no mode context, so their
//! local `passed` flag is only a sanity floor and is always recomputed
//! downstream by [`threshold::passes_threshold`].

pub mod case_design;
pub mod feedback;
pub mod scorer;
pub mod threshold;

pub use case_design::CaseDesignScorer;
pub use feedback::{build_concise_retry_feedback, build_retry_feedback};
pub use scorer::{calculate_category_score, PhaseScorer, ScoreContext};
pub use threshold::{
    get_failed_components, get_threshold, passes_threshold, ThresholdConfig, ThresholdMode,
};
