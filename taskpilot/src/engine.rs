//! The controller: owns the plan and the record ledger, drives the
//! clarify/execute/verify/replan loop, and applies every user decision.

use anyhow::Result;
use tracing::{debug, info, instrument};

use crate::clarify::clarify_step;
use crate::core::certainty::prepare_steps;
use crate::core::context::{context_string, find_duplicate};
use crate::core::types::{
    ExecutionResult, Plan, RunOutcome, RunRecord, Step, StepState, VerificationResult,
};
use crate::execute::execute_step;
use crate::io::completion::CompletionClient;
use crate::io::config::EngineConfig;
use crate::io::console::Console;
use crate::io::process::CommandRunner;
use crate::io::prompt::PromptEngine;
use crate::plan::create_plan;
use crate::revise::replan_after_failure;
use crate::verify::verify_step;

/// Drives one user request from plan generation to a terminal outcome.
///
/// The controller is the only component that mutates the plan or the
/// record ledger; everything else receives read-only views and returns new
/// values.
pub struct Controller<'a> {
    client: &'a dyn CompletionClient,
    runner: &'a dyn CommandRunner,
    console: &'a dyn Console,
    prompts: PromptEngine,
    config: EngineConfig,
    records: Vec<RunRecord>,
}

impl<'a> Controller<'a> {
    pub fn new(
        client: &'a dyn CompletionClient,
        runner: &'a dyn CommandRunner,
        console: &'a dyn Console,
        config: EngineConfig,
    ) -> Self {
        Self {
            client,
            runner,
            console,
            prompts: PromptEngine::new(),
            config,
            records: Vec::new(),
        }
    }

    /// Run the whole engine for one request.
    #[instrument(skip_all)]
    pub fn run(&mut self, request: &str) -> Result<RunOutcome> {
        let mut plan = create_plan(self.client, &self.prompts, &self.config, request)?;

        self.console.say("\nProposed plan:");
        self.show_steps(&plan.steps);
        if !self.console.confirm("Proceed with this plan?", true)? {
            info!("plan declined before start");
            return Ok(RunOutcome::CancelledBeforeStart);
        }

        let mut index = 0;
        // True for exactly one verification after a splice, so the next
        // remainder check knows the remainder was just revised.
        let mut remainder_revised = false;

        while index < plan.steps.len() {
            let context_str = context_string(&self.records, self.config.context_window_records);

            // Identical already-succeeded-and-verified work is never re-run.
            if let Some(duplicate) = find_duplicate(&self.records, &plan.steps[index]) {
                let original = duplicate.index + 1;
                debug!(index, original, "dedup hit, skipping re-execution");
                self.console.say(&format!(
                    "\nStep {}: already done (identical to verified step {}), skipping.",
                    index + 1,
                    original
                ));
                plan.steps[index].state = StepState::Skipped;
                self.push_record(
                    index,
                    &plan.steps[index],
                    ExecutionResult {
                        success: true,
                        skipped: true,
                        error: None,
                        command: plan.steps[index].command.clone(),
                        output: String::new(),
                    },
                    VerificationResult {
                        verified: true,
                        reason: format!("Duplicate of verified step {original}"),
                        suggestion: None,
                        plan_validation: None,
                    },
                );
                index += 1;
                continue;
            }

            if plan.steps[index].state == StepState::NeedsClarification {
                plan.steps[index] = clarify_step(
                    self.client,
                    &self.prompts,
                    self.console,
                    &self.config,
                    &plan,
                    index,
                    &context_str,
                    None,
                )?;
            }

            // User opted out during clarification.
            if plan.steps[index].state == StepState::Skipped {
                let result = ExecutionResult::skipped(&plan.steps[index].command);
                let verification = self.verify(&plan, index, &result, &context_str, false)?;
                self.push_record(index, &plan.steps[index], result, verification);
                index += 1;
                continue;
            }

            let mut step = plan.steps[index].clone();
            let result = execute_step(&mut step, self.runner, self.console, &self.config, index)?;
            plan.steps[index] = step;

            let verification =
                self.verify(&plan, index, &result, &context_str, remainder_revised)?;
            remainder_revised = false;
            self.push_record(index, &plan.steps[index], result.clone(), verification.clone());

            if result.is_hard_failure() {
                self.console.say(&format!(
                    "Step {} failed: {}",
                    index + 1,
                    result.error.as_deref().unwrap_or("unknown error")
                ));

                // A step the user already clarified gets one more shot at
                // clarification with the failing output as context.
                if plan.steps[index].clarified
                    && self
                        .console
                        .confirm("Clarify this step again and retry it?", false)?
                {
                    plan.steps[index] = clarify_step(
                        self.client,
                        &self.prompts,
                        self.console,
                        &self.config,
                        &plan,
                        index,
                        &context_str,
                        Some(&result),
                    )?;
                    continue;
                }

                if self
                    .console
                    .confirm("Generate a new plan from here?", false)?
                {
                    let steps = replan_after_failure(
                        self.client,
                        &self.prompts,
                        &self.config,
                        &plan,
                        index,
                        &result,
                        &context_str,
                    )?;
                    self.console.say("\nProposed new plan:");
                    self.show_steps(&steps);
                    if self.console.confirm("Use this plan?", true)? {
                        info!(steps = steps.len(), "plan replaced after failure");
                        plan.steps = steps;
                        self.records.clear();
                        index = 0;
                        continue;
                    }
                }
                self.console.say("Stopping here; the plan is unchanged.");
                return Ok(RunOutcome::StoppedEarly);
            }

            if verification.verified {
                if let Some(validation) = verification.plan_validation.as_ref()
                    && validation.needs_update
                    && !validation.updated_steps.is_empty()
                {
                    self.console.say(&format!(
                        "\nThe remaining steps may be stale: {}",
                        validation.reason
                    ));
                    self.console.say("Proposed replacement for the remaining steps:");
                    let mut updated = validation.updated_steps.clone();
                    prepare_steps(&mut updated, self.config.certainty_threshold);
                    self.show_steps(&updated);
                    if self
                        .console
                        .confirm("Apply the updated remaining steps?", true)?
                    {
                        info!(
                            kept = index + 1,
                            replaced = updated.len(),
                            "spliced remaining steps"
                        );
                        plan.steps.truncate(index + 1);
                        plan.steps.extend(updated);
                        remainder_revised = true;
                    }
                }
                index += 1;
                continue;
            }

            // Unverified success or a skipped step: the user decides whether
            // the run goes on. Default is to stop.
            self.console
                .say(&format!("Not verified: {}", verification.reason));
            if let Some(suggestion) = &verification.suggestion {
                self.console.say(&format!("Suggestion: {suggestion}"));
            }
            if self
                .console
                .confirm("Continue with the remaining steps anyway?", false)?
            {
                index += 1;
            } else {
                return Ok(RunOutcome::StoppedEarly);
            }
        }

        info!(steps = plan.steps.len(), "run completed");
        Ok(RunOutcome::Completed)
    }

    fn verify(
        &self,
        plan: &Plan,
        index: usize,
        result: &ExecutionResult,
        context_str: &str,
        remainder_revised: bool,
    ) -> Result<VerificationResult> {
        verify_step(
            self.client,
            &self.prompts,
            plan,
            index,
            &plan.steps[index],
            result,
            context_str,
            remainder_revised,
        )
    }

    fn push_record(
        &mut self,
        index: usize,
        step: &Step,
        result: ExecutionResult,
        verification: VerificationResult,
    ) {
        self.records.push(RunRecord {
            index,
            description: step.description.clone(),
            command: result.command.clone(),
            result,
            verification,
        });
    }

    fn show_steps(&self, steps: &[Step]) {
        for (i, step) in steps.iter().enumerate() {
            let marker = if step.has_placeholders() {
                "  [placeholders]"
            } else {
                ""
            };
            let command = if step.command.is_empty() {
                "(no command)".to_string()
            } else {
                format!("$ {}", step.command)
            };
            self.console.say(&format!(
                "  {}. [{:>3.0}%] {}{}\n     {}",
                i + 1,
                step.certainty * 100.0,
                step.description,
                marker,
                command
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::process::CommandOutput;
    use crate::test_support::{ScriptedCompletion, ScriptedConsole, ScriptedRunner};

    fn exit(code: i32, stdout: &str) -> CommandOutput {
        CommandOutput {
            status: Some(code),
            stdout: stdout.to_string(),
            ..CommandOutput::default()
        }
    }

    fn plan_reply(commands: &[&str]) -> String {
        let steps: Vec<String> = commands
            .iter()
            .map(|command| {
                format!(
                    r#"{{"description": "run {command}", "certainty": 0.9, "command": "{command}"}}"#
                )
            })
            .collect();
        format!(r#"{{"steps": [{}]}}"#, steps.join(","))
    }

    const VERIFIED: &str = r#"{"verified": true, "reason": "looks right"}"#;
    const UNVERIFIED: &str =
        r#"{"verified": false, "reason": "output is empty", "suggestion": "check the path"}"#;
    const NO_UPDATE: &str = r#"{"needsUpdate": false, "reason": "remainder still applies"}"#;

    #[test]
    fn declining_the_plan_cancels_before_start() {
        let client = ScriptedCompletion::with_replies(vec![plan_reply(&["git init"])]);
        let runner = ScriptedRunner::new(Vec::new());
        let console = ScriptedConsole::new().with_confirms(vec![false]);

        let outcome = Controller::new(&client, &runner, &console, EngineConfig::default())
            .run("set up a repo")
            .expect("run");

        assert_eq!(outcome, RunOutcome::CancelledBeforeStart);
        assert!(runner.requests().is_empty());
    }

    #[test]
    fn single_verified_step_completes() {
        let client = ScriptedCompletion::with_replies(vec![
            plan_reply(&["git init"]),
            VERIFIED.to_string(),
        ]);
        let runner = ScriptedRunner::new(vec![exit(0, "Initialized\n")]);
        // plan gate, execute, edit.
        let console = ScriptedConsole::new().with_confirms(vec![true, true, false]);

        let outcome = Controller::new(&client, &runner, &console, EngineConfig::default())
            .run("set up a repo")
            .expect("run");

        assert_eq!(outcome, RunOutcome::Completed);
        assert_eq!(runner.requests().len(), 1);
    }

    #[test]
    fn duplicate_step_is_not_re_executed() {
        let client = ScriptedCompletion::with_replies(vec![
            plan_reply(&["git init", "git init"]),
            VERIFIED.to_string(),
            NO_UPDATE.to_string(),
        ]);
        let runner = ScriptedRunner::new(vec![exit(0, "Initialized\n")]);
        let console = ScriptedConsole::new().with_confirms(vec![true, true, false]);

        let outcome = Controller::new(&client, &runner, &console, EngineConfig::default())
            .run("set up a repo")
            .expect("run");

        assert_eq!(outcome, RunOutcome::Completed);
        // The runner ran exactly once; the second identical step was a
        // dedup hit.
        assert_eq!(runner.requests().len(), 1);
        assert!(
            console
                .said()
                .iter()
                .any(|line| line.contains("identical to verified step 1"))
        );
    }

    #[test]
    fn failed_step_with_declined_replan_stops_early_and_keeps_plan() {
        let client = ScriptedCompletion::with_replies(vec![plan_reply(&["false"])]);
        let runner = ScriptedRunner::new(vec![exit(1, "")]);
        // plan gate, execute, edit, replan offer (declined).
        let console = ScriptedConsole::new().with_confirms(vec![true, true, false, false]);

        let outcome = Controller::new(&client, &runner, &console, EngineConfig::default())
            .run("do something risky")
            .expect("run");

        assert_eq!(outcome, RunOutcome::StoppedEarly);
        // Verification fast path ran before the replan offer.
        assert!(
            console
                .said()
                .iter()
                .any(|line| line.contains("Step 1 failed"))
        );
        // Only the plan call hit the model: failed steps verify without it.
        assert_eq!(client.calls().len(), 1);
    }

    #[test]
    fn accepted_replan_replaces_the_plan_and_restarts() {
        let client = ScriptedCompletion::with_replies(vec![
            plan_reply(&["false"]),
            plan_reply(&["true"]),
            VERIFIED.to_string(),
        ]);
        let runner = ScriptedRunner::new(vec![exit(1, ""), exit(0, "")]);
        // plan gate, execute, edit, replan offer, use plan, execute, edit.
        let console = ScriptedConsole::new()
            .with_confirms(vec![true, true, false, true, true, true, false]);

        let outcome = Controller::new(&client, &runner, &console, EngineConfig::default())
            .run("do something")
            .expect("run");

        assert_eq!(outcome, RunOutcome::Completed);
        assert_eq!(runner.requests().len(), 2);
        assert_eq!(runner.requests()[1].command, "true");
    }

    #[test]
    fn unverified_step_with_declined_continue_stops_early() {
        let client = ScriptedCompletion::with_replies(vec![
            plan_reply(&["git init", "git add -A"]),
            UNVERIFIED.to_string(),
        ]);
        let runner = ScriptedRunner::new(vec![exit(0, "")]);
        // plan gate, execute, edit, continue gate (declined).
        let console = ScriptedConsole::new().with_confirms(vec![true, true, false, false]);

        let outcome = Controller::new(&client, &runner, &console, EngineConfig::default())
            .run("set up a repo")
            .expect("run");

        assert_eq!(outcome, RunOutcome::StoppedEarly);
        assert_eq!(runner.requests().len(), 1);
        assert!(
            console
                .said()
                .iter()
                .any(|line| line.contains("check the path"))
        );
    }

    #[test]
    fn stale_remainder_is_spliced_on_approval() {
        let needs_update = r#"{
            "needsUpdate": true,
            "reason": "the directory already exists",
            "updatedSteps": [
                {"description": "reuse the directory", "certainty": 0.9, "command": "true"}
            ]
        }"#;
        let client = ScriptedCompletion::with_replies(vec![
            plan_reply(&["mkdir app", "ls app"]),
            VERIFIED.to_string(),
            needs_update.to_string(),
            VERIFIED.to_string(),
        ]);
        let runner = ScriptedRunner::new(vec![exit(0, ""), exit(0, "")]);
        // plan gate, execute, edit, apply splice, execute, edit.
        let console = ScriptedConsole::new()
            .with_confirms(vec![true, true, false, true, true, false]);

        let outcome = Controller::new(&client, &runner, &console, EngineConfig::default())
            .run("make an app dir")
            .expect("run");

        assert_eq!(outcome, RunOutcome::Completed);
        assert_eq!(runner.requests().len(), 2);
        // The spliced step ran instead of the original remainder.
        assert_eq!(runner.requests()[1].command, "true");
    }

    #[test]
    fn low_certainty_step_routes_through_clarification_before_running() {
        let plan = r#"{"steps": [
            {"description": "install deps", "certainty": 0.5, "command": "npm install"}
        ]}"#;
        let client = ScriptedCompletion::with_replies(vec![
            plan.to_string(),
            "Which package manager does the project use?".to_string(),
            r#"{"description": "install deps with npm", "certainty": 0.95, "command": "npm install"}"#
                .to_string(),
            VERIFIED.to_string(),
        ]);
        let runner = ScriptedRunner::new(vec![exit(0, "added 120 packages\n")]);
        // plan gate, execute, edit.
        let console = ScriptedConsole::new()
            .with_confirms(vec![true, true, false])
            .with_inputs(vec!["npm".to_string()]);

        let outcome = Controller::new(&client, &runner, &console, EngineConfig::default())
            .run("install dependencies")
            .expect("run");

        assert_eq!(outcome, RunOutcome::Completed);
        // The clarification question reached the user before any execution.
        assert!(
            console
                .prompts()
                .iter()
                .any(|p| p.contains("Which package manager"))
        );
        assert_eq!(runner.requests().len(), 1);
    }

    #[test]
    fn skip_during_clarification_records_and_moves_on() {
        let plan = r#"{"steps": [
            {"description": "install deps", "certainty": 0.5, "command": "npm install"},
            {"description": "list files", "certainty": 0.9, "command": "ls"}
        ]}"#;
        let client = ScriptedCompletion::with_replies(vec![
            plan.to_string(),
            "Which package manager?".to_string(),
            VERIFIED.to_string(),
        ]);
        let runner = ScriptedRunner::new(vec![exit(0, "src\n")]);
        // plan gate, execute (step 2), edit.
        let console = ScriptedConsole::new()
            .with_confirms(vec![true, true, false])
            .with_inputs(vec!["skip".to_string()]);

        let outcome = Controller::new(&client, &runner, &console, EngineConfig::default())
            .run("install and list")
            .expect("run");

        assert_eq!(outcome, RunOutcome::Completed);
        // Only the second step ran.
        assert_eq!(runner.requests().len(), 1);
        assert_eq!(runner.requests()[0].command, "ls");
    }
}
