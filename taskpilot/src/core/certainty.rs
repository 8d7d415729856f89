//! Certainty clamping and the threshold gate.
//!
//! Every step list the model produces (initial plan, splice, replan,
//! clarification revision) passes through [`prepare_step`] before the
//! controller looks at it: certainty is clamped into range, placeholders are
//! detected, placeholder-carrying steps are clamped below the threshold, and
//! the step is gated to `Ready` or `NeedsClarification`.

use crate::core::placeholder;
use crate::core::types::{Step, StepState};

/// Clamp a model-reported certainty into [0.0, 1.0].
pub fn clamp_unit(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

/// Certainty ceiling for a step that carries placeholder text. With the
/// default threshold of 0.8 this is 0.7, so the step can never pass the
/// gate unresolved.
pub fn placeholder_ceiling(threshold: f64) -> f64 {
    threshold - 0.1
}

/// Run placeholder detection, apply the clamp, and gate the step.
pub fn prepare_step(step: &mut Step, threshold: f64) {
    step.certainty = clamp_unit(step.certainty);
    step.placeholders = placeholder::detect(&step.command);
    step.description_placeholders = placeholder::detect(&step.description);
    if step.has_placeholders() {
        step.certainty = step.certainty.min(placeholder_ceiling(threshold));
    }
    gate(step, threshold);
}

/// Apply [`prepare_step`] to every step in a freshly parsed list.
pub fn prepare_steps(steps: &mut [Step], threshold: f64) {
    for step in steps.iter_mut() {
        prepare_step(step, threshold);
    }
}

/// Move a `Pending` step to `Ready` or `NeedsClarification` based on the
/// threshold. Other states are left alone.
pub fn gate(step: &mut Step, threshold: f64) {
    if step.state != StepState::Pending {
        return;
    }
    step.state = if step.certainty < threshold {
        StepState::NeedsClarification
    } else {
        StepState::Ready
    };
}
