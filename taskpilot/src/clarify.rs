//! Bounded clarification loop for steps below the certainty threshold.
//!
//! Each round asks the model for one targeted question, collects the user's
//! answer, and asks the model for a revised step. The loop ends when the
//! revision passes the gate, the user skips, or the rounds run out (the
//! step then proceeds to the execution gate with a visible warning).

use anyhow::{Context, Result};
use tracing::{instrument, warn};

use crate::core::certainty::prepare_step;
use crate::core::types::{ExecutionResult, MalformedReplyError, Plan, Step, StepState};
use crate::extract::extract_json;
use crate::io::completion::{CompletionClient, CompletionRequest};
use crate::io::config::EngineConfig;
use crate::io::console::Console;
use crate::io::prompt::PromptEngine;
use crate::validate::validate_clarified_step;

/// Resolve a `NeedsClarification` step. Returns the revised step; its state
/// is `Ready`, or `Skipped` when the user answered `skip`.
#[allow(clippy::too_many_arguments)]
#[instrument(skip_all, fields(index))]
pub fn clarify_step(
    client: &dyn CompletionClient,
    prompts: &PromptEngine,
    console: &dyn Console,
    cfg: &EngineConfig,
    plan: &Plan,
    index: usize,
    context_str: &str,
    prior_partial: Option<&ExecutionResult>,
) -> Result<Step> {
    let mut step = plan.steps[index].clone();

    for round in 1..=cfg.max_clarify_rounds {
        let question = ask_question(client, prompts, plan, &step, context_str);
        console.say(&format!(
            "\nStep {} needs clarification (certainty {:.0}%):",
            index + 1,
            step.certainty * 100.0
        ));
        console.say(&format!("  {}", step.description));
        let answer = console.input(&format!("{question}\n> "))?;
        if answer.eq_ignore_ascii_case("skip") {
            step.state = StepState::Skipped;
            return Ok(step);
        }

        step = revise_step(
            client, prompts, cfg, plan, &step, &question, &answer, context_str, prior_partial,
        )?;
        if step.state == StepState::Ready {
            return Ok(step);
        }
        warn!(round, certainty = step.certainty, "revision still below threshold");
    }

    console.say(&format!(
        "Still uncertain after {} rounds (certainty {:.0}%). \
         You can decline the command at the next prompt.",
        cfg.max_clarify_rounds,
        step.certainty * 100.0
    ));
    step.state = StepState::Ready;
    Ok(step)
}

/// One question call. The question is conversational, not structural, so a
/// transport failure degrades to a canned question instead of aborting.
fn ask_question(
    client: &dyn CompletionClient,
    prompts: &PromptEngine,
    plan: &Plan,
    step: &Step,
    context_str: &str,
) -> String {
    let rendered = match prompts.render_clarify_question(plan, step, context_str) {
        Ok(rendered) => rendered,
        Err(err) => {
            warn!(err = %err, "clarify question render failed, using fallback");
            return fallback_question(step);
        }
    };
    match client.generate(&CompletionRequest {
        system: rendered,
        user: "Ask your clarification question now.".to_string(),
    }) {
        Ok(question) => question.trim().to_string(),
        Err(err) => {
            warn!(err = %err, "clarify question call failed, using fallback");
            fallback_question(step)
        }
    }
}

fn fallback_question(step: &Step) -> String {
    let mut tokens = step.placeholders.clone();
    tokens.extend(step.description_placeholders.iter().cloned());
    tokens.dedup();
    if tokens.is_empty() {
        format!(
            "What detail should this step use? (step: {})",
            step.description
        )
    } else {
        format!(
            "What real value(s) should replace {} in this step?",
            tokens
                .iter()
                .map(|t| format!("`{t}`"))
                .collect::<Vec<_>>()
                .join(", ")
        )
    }
}

/// One revise call. Malformed output here is fatal, matching planner
/// semantics.
#[allow(clippy::too_many_arguments)]
fn revise_step(
    client: &dyn CompletionClient,
    prompts: &PromptEngine,
    cfg: &EngineConfig,
    plan: &Plan,
    step: &Step,
    question: &str,
    answer: &str,
    context_str: &str,
    prior_partial: Option<&ExecutionResult>,
) -> Result<Step> {
    let system =
        prompts.render_clarify_revise(plan, step, question, answer, context_str, prior_partial)?;
    let reply = client
        .generate(&CompletionRequest {
            system,
            user: "Produce the updated step now.".to_string(),
        })
        .context("generate revised step")?;

    let value = extract_json(&reply)?;
    validate_clarified_step(&value)?;
    let mut revised: Step = serde_json::from_value(value).map_err(|err| {
        MalformedReplyError::new(format!("revised step did not deserialize: {err}"))
    })?;

    revised.clarified = true;
    revised.state = StepState::Pending;
    prepare_step(&mut revised, cfg.certainty_threshold);
    Ok(revised)
}
