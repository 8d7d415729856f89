//! Prompt templates for every model call the engine makes.
//!
//! Templates are markdown files embedded at compile time and rendered
//! through minijinja. Each template states its JSON reply contract inline;
//! the schemas in `schemas/` enforce the same contract on the way back in.
//! Rendering failures indicate a template bug, not user error.

use anyhow::{Context, Result};
use minijinja::{Environment, context};

use crate::core::types::{ExecutionResult, Plan, Step, StepState};

const PLAN_TEMPLATE: &str = include_str!("prompts/plan.md");
const CLARIFY_QUESTION_TEMPLATE: &str = include_str!("prompts/clarify_question.md");
const CLARIFY_REVISE_TEMPLATE: &str = include_str!("prompts/clarify_revise.md");
const VERIFY_TEMPLATE: &str = include_str!("prompts/verify.md");
const REMAINDER_CHECK_TEMPLATE: &str = include_str!("prompts/remainder_check.md");
const REPLAN_TEMPLATE: &str = include_str!("prompts/replan.md");

/// Template engine wrapper around minijinja.
pub struct PromptEngine {
    env: Environment<'static>,
}

impl Default for PromptEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptEngine {
    pub fn new() -> Self {
        let mut env = Environment::new();
        for (name, source) in [
            ("plan", PLAN_TEMPLATE),
            ("clarify_question", CLARIFY_QUESTION_TEMPLATE),
            ("clarify_revise", CLARIFY_REVISE_TEMPLATE),
            ("verify", VERIFY_TEMPLATE),
            ("remainder_check", REMAINDER_CHECK_TEMPLATE),
            ("replan", REPLAN_TEMPLATE),
        ] {
            env.add_template(name, source)
                .expect("embedded template should be valid");
        }
        Self { env }
    }

    /// System prompt for initial plan generation.
    pub fn render_plan(&self, threshold: f64, max_steps: usize) -> Result<String> {
        let template = self.env.get_template("plan").context("get plan template")?;
        let rendered = template
            .render(context! {
                threshold,
                max_steps,
            })
            .context("render plan template")?;
        Ok(rendered)
    }

    /// System prompt asking for one targeted clarification question.
    pub fn render_clarify_question(
        &self,
        plan: &Plan,
        step: &Step,
        context_str: &str,
    ) -> Result<String> {
        let template = self
            .env
            .get_template("clarify_question")
            .context("get clarify_question template")?;
        let rendered = template
            .render(context! {
                request => plan.request,
                plan_listing => plan_listing(plan),
                step,
                placeholders => all_placeholders(step),
                context => non_empty(context_str),
            })
            .context("render clarify_question template")?;
        Ok(rendered)
    }

    /// System prompt asking for a revised step incorporating the answer.
    pub fn render_clarify_revise(
        &self,
        plan: &Plan,
        step: &Step,
        question: &str,
        answer: &str,
        context_str: &str,
        prior_partial: Option<&ExecutionResult>,
    ) -> Result<String> {
        let template = self
            .env
            .get_template("clarify_revise")
            .context("get clarify_revise template")?;
        let rendered = template
            .render(context! {
                request => plan.request,
                step,
                question,
                answer,
                context => non_empty(context_str),
                partial_command => prior_partial.map(|r| r.command.clone()),
                partial_output => prior_partial.map(partial_output),
            })
            .context("render clarify_revise template")?;
        Ok(rendered)
    }

    /// System prompt judging whether an executed step met its intent.
    pub fn render_verify(
        &self,
        plan: &Plan,
        step: &Step,
        result: &ExecutionResult,
        context_str: &str,
    ) -> Result<String> {
        let template = self
            .env
            .get_template("verify")
            .context("get verify template")?;
        let rendered = template
            .render(context! {
                request => plan.request,
                step,
                command => result.command,
                output => result.output,
                context => non_empty(context_str),
            })
            .context("render verify template")?;
        Ok(rendered)
    }

    /// System prompt asking whether the pending remainder still applies.
    pub fn render_remainder_check(
        &self,
        plan: &Plan,
        completed_summary: &str,
        remaining: &[Step],
        recently_revised: bool,
    ) -> Result<String> {
        let template = self
            .env
            .get_template("remainder_check")
            .context("get remainder_check template")?;
        let rendered = template
            .render(context! {
                request => plan.request,
                completed => completed_summary,
                remaining => steps_listing(remaining),
                recently_revised,
            })
            .context("render remainder_check template")?;
        Ok(rendered)
    }

    /// System prompt asking for a fresh plan after a hard failure.
    pub fn render_replan(
        &self,
        plan: &Plan,
        failed_step: &Step,
        result: &ExecutionResult,
        context_str: &str,
        threshold: f64,
        max_steps: usize,
    ) -> Result<String> {
        let template = self
            .env
            .get_template("replan")
            .context("get replan template")?;
        let rendered = template
            .render(context! {
                request => plan.request,
                plan_listing => plan_listing_with_states(plan),
                failed_step,
                error => result.error.clone().unwrap_or_default(),
                output => result.output,
                context => non_empty(context_str),
                threshold,
                max_steps,
            })
            .context("render replan template")?;
        Ok(rendered)
    }
}

fn non_empty(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

fn all_placeholders(step: &Step) -> Vec<String> {
    let mut tokens = step.placeholders.clone();
    for token in &step.description_placeholders {
        if !tokens.contains(token) {
            tokens.push(token.clone());
        }
    }
    tokens
}

fn partial_output(result: &ExecutionResult) -> String {
    match (&result.error, result.output.is_empty()) {
        (Some(error), true) => error.clone(),
        (Some(error), false) => format!("{error}\n{}", result.output),
        (None, _) => result.output.clone(),
    }
}

fn plan_listing(plan: &Plan) -> String {
    steps_listing(&plan.steps)
}

fn steps_listing(steps: &[Step]) -> String {
    steps
        .iter()
        .enumerate()
        .map(|(i, step)| {
            if step.command.is_empty() {
                format!("{}. {}", i + 1, step.description)
            } else {
                format!("{}. {}: `{}`", i + 1, step.description, step.command)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn plan_listing_with_states(plan: &Plan) -> String {
    plan.steps
        .iter()
        .enumerate()
        .map(|(i, step)| {
            let state = match step.state {
                StepState::Pending => "pending",
                StepState::NeedsClarification => "needs clarification",
                StepState::Ready => "ready",
                StepState::Executing => "executing",
                StepState::Succeeded => "succeeded",
                StepState::Failed => "failed",
                StepState::Skipped => "skipped",
            };
            format!("{}. [{}] {}: `{}`", i + 1, state, step.description, step.command)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_plan() -> Plan {
        Plan {
            request: "set up a git repo and commit".to_string(),
            steps: vec![
                Step {
                    description: "initialize the repository".to_string(),
                    command: "git init".to_string(),
                    certainty: 0.95,
                    state: StepState::Ready,
                    placeholders: Vec::new(),
                    description_placeholders: Vec::new(),
                    clarified: false,
                },
                Step {
                    description: "clone the project".to_string(),
                    command: "git clone path/to/repo".to_string(),
                    certainty: 0.7,
                    state: StepState::NeedsClarification,
                    placeholders: vec!["path/to/repo".to_string()],
                    description_placeholders: Vec::new(),
                    clarified: false,
                },
            ],
        }
    }

    #[test]
    fn plan_template_states_contract_and_caps() {
        let prompt = PromptEngine::new().render_plan(0.8, 20).expect("render");
        assert!(prompt.contains(r#""steps""#));
        assert!(prompt.contains("20"));
        assert!(prompt.contains("0.8"));
        assert!(prompt.contains("&&"));
    }

    #[test]
    fn clarify_question_includes_placeholders() {
        let plan = sample_plan();
        let prompt = PromptEngine::new()
            .render_clarify_question(&plan, &plan.steps[1], "")
            .expect("render");
        assert!(prompt.contains("path/to/repo"));
        assert!(prompt.contains(&plan.request));
    }

    #[test]
    fn clarify_revise_carries_partial_result_when_present() {
        let plan = sample_plan();
        let partial = ExecutionResult {
            success: false,
            skipped: false,
            error: Some("exit status 128".to_string()),
            command: "git clone bad-url".to_string(),
            output: "fatal: repository not found".to_string(),
        };
        let engine = PromptEngine::new();
        let with = engine
            .render_clarify_revise(&plan, &plan.steps[1], "Which repo?", "my-app", "", Some(&partial))
            .expect("render");
        assert!(with.contains("repository not found"));
        let without = engine
            .render_clarify_revise(&plan, &plan.steps[1], "Which repo?", "my-app", "", None)
            .expect("render");
        assert!(!without.contains("repository not found"));
    }

    #[test]
    fn verify_template_includes_output_and_context() {
        let plan = sample_plan();
        let result = ExecutionResult {
            success: true,
            skipped: false,
            error: None,
            command: "git init".to_string(),
            output: "Initialized empty Git repository".to_string(),
        };
        let prompt = PromptEngine::new()
            .render_verify(&plan, &plan.steps[0], &result, "Step 1 Result: ok\nCommand: ls")
            .expect("render");
        assert!(prompt.contains("Initialized empty Git repository"));
        assert!(prompt.contains("Step 1 Result: ok"));
    }

    #[test]
    fn remainder_check_mentions_recent_revision() {
        let plan = sample_plan();
        let engine = PromptEngine::new();
        let revised = engine
            .render_remainder_check(&plan, "step 1 done", &plan.steps[1..], true)
            .expect("render");
        assert!(revised.contains("just been revised"));
        let fresh = engine
            .render_remainder_check(&plan, "step 1 done", &plan.steps[1..], false)
            .expect("render");
        assert!(!fresh.contains("just been revised"));
    }

    #[test]
    fn replan_template_shows_states_and_failure() {
        let plan = sample_plan();
        let result = ExecutionResult {
            success: false,
            skipped: false,
            error: Some("exit status 1".to_string()),
            command: "git init".to_string(),
            output: "permission denied".to_string(),
        };
        let prompt = PromptEngine::new()
            .render_replan(&plan, &plan.steps[0], &result, "", 0.8, 20)
            .expect("render");
        assert!(prompt.contains("exit status 1"));
        assert!(prompt.contains("permission denied"));
        assert!(prompt.contains("[ready]"));
    }
}
