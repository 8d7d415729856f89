//! Confirmation-gated execution of a single ready step.

use std::time::Duration;

use anyhow::Result;
use tracing::{debug, instrument, warn};

use crate::core::classify::is_interactive;
use crate::core::types::{ExecutionResult, Step, StepState};
use crate::io::config::EngineConfig;
use crate::io::console::Console;
use crate::io::process::{CommandRunner, RunRequest};

/// Present, confirm, optionally edit, and run one step.
///
/// A user declination is a skip, never an error. A spawn failure or nonzero
/// exit is reported in the result, not as an `Err`: command failures are
/// recoverable and drive the replan offer upstream.
#[instrument(skip_all, fields(index))]
pub fn execute_step(
    step: &mut Step,
    runner: &dyn CommandRunner,
    console: &dyn Console,
    cfg: &EngineConfig,
    index: usize,
) -> Result<ExecutionResult> {
    // Informational step: nothing to run, vacuously succeeded.
    if step.command.trim().is_empty() {
        console.say(&format!("\nStep {}: {} (no command)", index + 1, step.description));
        step.state = StepState::Succeeded;
        return Ok(ExecutionResult {
            success: true,
            skipped: false,
            error: None,
            command: String::new(),
            output: String::new(),
        });
    }

    console.say(&format!(
        "\nStep {}: {} (certainty {:.0}%)\n  $ {}",
        index + 1,
        step.description,
        step.certainty * 100.0,
        step.command
    ));

    if !console.confirm("Execute this command?", true)? {
        step.state = StepState::Skipped;
        return Ok(ExecutionResult::skipped(&step.command));
    }

    if console.confirm("Edit command before running?", false)? {
        let edited = console.input("New command: ")?;
        step.command = edited;
    }
    let command = step.command.clone();

    let interactive = is_interactive(&command);
    if interactive {
        console.say("(interactive command: attaching your terminal)");
    }

    step.state = StepState::Executing;
    let request = RunRequest {
        command: command.clone(),
        interactive,
        timeout: cfg.command_timeout_secs.map(Duration::from_secs),
        output_limit_bytes: cfg.output_limit_bytes,
    };

    let result = match runner.run(&request) {
        Ok(output) => {
            let merged = output.merged();
            match (output.timed_out, output.status) {
                (true, _) => failure(
                    &command,
                    merged,
                    format!(
                        "timed out after {}s",
                        cfg.command_timeout_secs.unwrap_or_default()
                    ),
                ),
                (false, Some(0)) => ExecutionResult {
                    success: true,
                    skipped: false,
                    error: None,
                    command: command.clone(),
                    output: merged,
                },
                (false, Some(code)) => failure(&command, merged, format!("exit status {code}")),
                (false, None) => failure(&command, merged, "terminated by signal".to_string()),
            }
        }
        // Spawn error: a command failure, not an engine failure.
        Err(err) => {
            warn!(err = %err, "command could not be run");
            failure(&command, String::new(), format!("{err:#}"))
        }
    };

    step.state = if result.success {
        StepState::Succeeded
    } else {
        StepState::Failed
    };
    debug!(success = result.success, "step executed");
    Ok(result)
}

fn failure(command: &str, output: String, error: String) -> ExecutionResult {
    ExecutionResult {
        success: false,
        skipped: false,
        error: Some(error),
        command: command.to_string(),
        output,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ScriptedConsole, ScriptedRunner};
    use crate::io::process::CommandOutput;

    fn ready_step(command: &str) -> Step {
        Step {
            description: format!("run {command}"),
            command: command.to_string(),
            certainty: 0.9,
            state: StepState::Ready,
            placeholders: Vec::new(),
            description_placeholders: Vec::new(),
            clarified: false,
        }
    }

    fn exit(code: i32, stdout: &str) -> CommandOutput {
        CommandOutput {
            status: Some(code),
            stdout: stdout.to_string(),
            ..CommandOutput::default()
        }
    }

    #[test]
    fn command_with_exit_zero_succeeds() {
        let runner = ScriptedRunner::new(vec![exit(0, "hello\n")]);
        let console = ScriptedConsole::new().with_confirms(vec![true, false]);
        let mut step = ready_step("echo hello");

        let result =
            execute_step(&mut step, &runner, &console, &EngineConfig::default(), 0).expect("run");

        assert!(result.success);
        assert_eq!(result.output, "hello");
        assert_eq!(step.state, StepState::Succeeded);
        assert!(!runner.requests()[0].interactive);
    }

    #[test]
    fn nonzero_exit_fails_with_status_error() {
        let runner = ScriptedRunner::new(vec![exit(2, "")]);
        let console = ScriptedConsole::new().with_confirms(vec![true, false]);
        let mut step = ready_step("false");

        let result =
            execute_step(&mut step, &runner, &console, &EngineConfig::default(), 0).expect("run");

        assert!(result.is_hard_failure());
        assert_eq!(result.error.as_deref(), Some("exit status 2"));
        assert_eq!(step.state, StepState::Failed);
    }

    #[test]
    fn declining_skips_without_running() {
        let runner = ScriptedRunner::new(Vec::new());
        let console = ScriptedConsole::new().with_confirms(vec![false]);
        let mut step = ready_step("rm -rf build");

        let result =
            execute_step(&mut step, &runner, &console, &EngineConfig::default(), 0).expect("run");

        assert!(result.skipped);
        assert!(!result.success);
        assert_eq!(step.state, StepState::Skipped);
        assert!(runner.requests().is_empty());
    }

    #[test]
    fn edit_replaces_the_command_for_this_run() {
        let runner = ScriptedRunner::new(vec![exit(0, "")]);
        let console = ScriptedConsole::new()
            .with_confirms(vec![true, true])
            .with_inputs(vec!["echo edited".to_string()]);
        let mut step = ready_step("echo original");

        let result =
            execute_step(&mut step, &runner, &console, &EngineConfig::default(), 0).expect("run");

        assert_eq!(result.command, "echo edited");
        assert_eq!(step.command, "echo edited");
        assert_eq!(runner.requests()[0].command, "echo edited");
    }

    #[test]
    fn empty_command_is_vacuously_successful() {
        let runner = ScriptedRunner::new(Vec::new());
        let console = ScriptedConsole::new();
        let mut step = ready_step("");

        let result =
            execute_step(&mut step, &runner, &console, &EngineConfig::default(), 0).expect("run");

        assert!(result.success);
        assert_eq!(step.state, StepState::Succeeded);
        assert!(runner.requests().is_empty());
    }

    #[test]
    fn interactive_command_is_flagged_for_passthrough() {
        let runner = ScriptedRunner::new(vec![exit(0, "")]);
        let console = ScriptedConsole::new().with_confirms(vec![true, false]);
        let mut step = ready_step("vim notes.txt");

        execute_step(&mut step, &runner, &console, &EngineConfig::default(), 0).expect("run");

        assert!(runner.requests()[0].interactive);
    }

    #[test]
    fn spawn_error_is_a_failed_result_not_an_err() {
        let runner = ScriptedRunner::failing("no such file or directory");
        let console = ScriptedConsole::new().with_confirms(vec![true, false]);
        let mut step = ready_step("definitely-not-a-binary");

        let result =
            execute_step(&mut step, &runner, &console, &EngineConfig::default(), 0).expect("run");

        assert!(result.is_hard_failure());
        assert!(result.error.as_deref().unwrap_or("").contains("no such file"));
    }

    #[test]
    fn timeout_is_reported_as_failure() {
        let runner = ScriptedRunner::new(vec![CommandOutput {
            status: None,
            timed_out: true,
            ..CommandOutput::default()
        }]);
        let console = ScriptedConsole::new().with_confirms(vec![true, false]);
        let cfg = EngineConfig {
            command_timeout_secs: Some(30),
            ..EngineConfig::default()
        };
        let mut step = ready_step("sleep 600");

        let result = execute_step(&mut step, &runner, &console, &cfg, 0).expect("run");

        assert!(result.is_hard_failure());
        assert_eq!(result.error.as_deref(), Some("timed out after 30s"));
    }
}
