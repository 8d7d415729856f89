//! Replanning after a hard failure.

use anyhow::{Context, Result};
use tracing::{debug, instrument};

use crate::core::types::{ExecutionResult, Plan, Step};
use crate::io::completion::{CompletionClient, CompletionRequest};
use crate::io::config::EngineConfig;
use crate::io::prompt::PromptEngine;
use crate::plan::parse_step_list;

/// Ask the model for a brand-new plan toward the original request after a
/// step failed hard. The reply goes through the same pipeline as the
/// initial plan, so malformed output is fatal and the new steps come back
/// placeholder-detected, clamped, and gated.
#[instrument(skip_all, fields(failed_index))]
pub fn replan_after_failure(
    client: &dyn CompletionClient,
    prompts: &PromptEngine,
    cfg: &EngineConfig,
    plan: &Plan,
    failed_index: usize,
    result: &ExecutionResult,
    context_str: &str,
) -> Result<Vec<Step>> {
    let system = prompts.render_replan(
        plan,
        &plan.steps[failed_index],
        result,
        context_str,
        cfg.certainty_threshold,
        cfg.max_plan_steps,
    )?;
    let reply = client
        .generate(&CompletionRequest {
            system,
            user: "Produce the new plan now.".to_string(),
        })
        .context("generate replacement plan")?;

    let steps = parse_step_list(&reply, cfg)?;
    debug!(steps = steps.len(), "replacement plan created");
    Ok(steps)
}
