//! Outcome verification and the remaining-plan check.

use anyhow::{Context, Result};
use tracing::{debug, instrument};

use crate::core::types::{
    ExecutionResult, MalformedReplyError, Plan, PlanValidation, Step, VerificationResult,
};
use crate::extract::extract_json;
use crate::io::completion::{CompletionClient, CompletionRequest};
use crate::io::prompt::PromptEngine;
use crate::validate::{validate_remainder_check, validate_verification};

/// Judge whether an executed step's result matches its intent.
///
/// Skips and failures resolve without a model call. For succeeded steps the
/// model judges the output; when it verifies and steps remain, the
/// remainder check runs and its outcome is attached as `plan_validation`.
#[allow(clippy::too_many_arguments)]
#[instrument(skip_all, fields(index, success = result.success))]
pub fn verify_step(
    client: &dyn CompletionClient,
    prompts: &PromptEngine,
    plan: &Plan,
    index: usize,
    step: &Step,
    result: &ExecutionResult,
    context_str: &str,
    remainder_recently_revised: bool,
) -> Result<VerificationResult> {
    // Fast paths: nothing to judge without a successful execution.
    if result.skipped {
        return Ok(VerificationResult {
            verified: false,
            reason: "Step was skipped by the user".to_string(),
            suggestion: None,
            plan_validation: None,
        });
    }
    if !result.success {
        return Ok(VerificationResult {
            verified: false,
            reason: "Step execution failed".to_string(),
            suggestion: result.error.clone(),
            plan_validation: None,
        });
    }

    let system = prompts.render_verify(plan, step, result, context_str)?;
    let reply = client
        .generate(&CompletionRequest {
            system,
            user: "Verify the step now.".to_string(),
        })
        .context("generate verification")?;

    let value = extract_json(&reply)?;
    validate_verification(&value)?;
    let mut verification: VerificationResult = serde_json::from_value(value).map_err(|err| {
        MalformedReplyError::new(format!("verification did not deserialize: {err}"))
    })?;

    let remaining = &plan.steps[index + 1..];
    if verification.verified && !remaining.is_empty() {
        verification.plan_validation = Some(validate_remaining(
            client,
            prompts,
            plan,
            context_str,
            remaining,
            remainder_recently_revised,
        )?);
    }
    debug!(verified = verification.verified, "step verified");
    Ok(verification)
}

/// Ask whether already-observed output invalidates the pending remainder.
///
/// No-op when nothing remains. Never mutates the remaining steps; a
/// replacement list comes back in the returned value for the controller to
/// splice.
pub fn validate_remaining(
    client: &dyn CompletionClient,
    prompts: &PromptEngine,
    plan: &Plan,
    context_str: &str,
    remaining: &[Step],
    recently_revised: bool,
) -> Result<PlanValidation> {
    if remaining.is_empty() {
        return Ok(PlanValidation {
            needs_update: false,
            reason: "no steps remain".to_string(),
            updated_steps: Vec::new(),
        });
    }

    let system =
        prompts.render_remainder_check(plan, context_str, remaining, recently_revised)?;
    let reply = client
        .generate(&CompletionRequest {
            system,
            user: "Check the remaining steps now.".to_string(),
        })
        .context("generate remainder check")?;

    let value = extract_json(&reply)?;
    validate_remainder_check(&value)?;
    let validation: PlanValidation = serde_json::from_value(value).map_err(|err| {
        MalformedReplyError::new(format!("remainder check did not deserialize: {err}"))
    })?;
    Ok(validation)
}
