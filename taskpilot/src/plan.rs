//! Plan creation: one completion call turned into a gated step list.

use anyhow::{Context, Result};
use tracing::{debug, instrument};

use crate::core::certainty::prepare_steps;
use crate::core::types::{MalformedReplyError, Plan, Step};
use crate::extract::{extract_json, normalize_plan_shape};
use crate::io::completion::{CompletionClient, CompletionRequest};
use crate::io::config::EngineConfig;
use crate::io::prompt::PromptEngine;
use crate::validate::validate_plan;

/// Ask the model for a plan and prepare it for the controller loop.
///
/// Malformed output at any stage is fatal for the run; there is no internal
/// retry and no silent fallback plan.
#[instrument(skip_all, fields(request_len = request.len()))]
pub fn create_plan(
    client: &dyn CompletionClient,
    prompts: &PromptEngine,
    cfg: &EngineConfig,
    request: &str,
) -> Result<Plan> {
    let system = prompts.render_plan(cfg.certainty_threshold, cfg.max_plan_steps)?;
    let reply = client
        .generate(&CompletionRequest {
            system,
            user: request.to_string(),
        })
        .context("generate plan")?;

    let steps = parse_step_list(&reply, cfg)?;
    debug!(steps = steps.len(), "plan created");
    Ok(Plan {
        request: request.to_string(),
        steps,
    })
}

/// Shared reply pipeline for plan-shaped output (initial plan and replan):
/// extract, normalize, schema-validate, deserialize, cap-check, prepare.
pub(crate) fn parse_step_list(reply: &str, cfg: &EngineConfig) -> Result<Vec<Step>> {
    let value = normalize_plan_shape(extract_json(reply)?);
    validate_plan(&value)?;

    let mut steps: Vec<Step> = serde_json::from_value(value["steps"].clone())
        .map_err(|err| MalformedReplyError::new(format!("steps did not deserialize: {err}")))?;

    if steps.is_empty() {
        return Err(MalformedReplyError::new("plan has zero steps").into());
    }
    if steps.len() > cfg.max_plan_steps {
        return Err(MalformedReplyError::new(format!(
            "plan has {} steps, max is {}",
            steps.len(),
            cfg.max_plan_steps
        ))
        .into());
    }

    prepare_steps(&mut steps, cfg.certainty_threshold);
    Ok(steps)
}
