//! Autonomous multi-step task execution from the terminal.
//!
//! `taskpilot run "..."` asks the configured LLM for a shell-command plan,
//! then executes it step by step with user confirmation, clarification of
//! uncertain steps, and outcome verification.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};

use taskpilot::core::types::RunOutcome;
use taskpilot::engine::Controller;
use taskpilot::exit_codes;
use taskpilot::io::completion::build_client;
use taskpilot::io::config::{EngineConfig, config_path, load_config, write_config};
use taskpilot::io::console::StdConsole;
use taskpilot::io::process::ShellRunner;
use taskpilot::logging;

#[derive(Parser)]
#[command(
    name = "taskpilot",
    version,
    about = "Plan and execute multi-step shell tasks with an LLM copilot"
)]
struct Cli {
    /// Config file path (default: ~/.config/taskpilot/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Plan and execute a task described in natural language.
    Run {
        /// The task, e.g. "set up a python venv and install requests".
        request: Vec<String>,
        /// Override the configured model for this run.
        #[arg(long)]
        model: Option<String>,
        /// Override the certainty threshold for this run (0.0 to 1.0].
        #[arg(long)]
        threshold: Option<f64>,
    },
    /// Write a default config file.
    Init {
        /// Overwrite an existing config file.
        #[arg(short, long)]
        force: bool,
    },
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::ERROR);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let path = match &cli.config {
        Some(path) => path.clone(),
        None => config_path()?,
    };
    match cli.command {
        Command::Run {
            request,
            model,
            threshold,
        } => cmd_run(&path, &request, model, threshold),
        Command::Init { force } => {
            cmd_init(&path, force)?;
            Ok(exit_codes::OK)
        }
    }
}

fn cmd_run(
    path: &std::path::Path,
    request: &[String],
    model: Option<String>,
    threshold: Option<f64>,
) -> Result<i32> {
    let request = request.join(" ");
    if request.trim().is_empty() {
        bail!("empty request: describe the task to run");
    }

    let mut cfg = load_config(path)?;
    if let Some(model) = model {
        cfg.model = model;
    }
    if let Some(threshold) = threshold {
        cfg.certainty_threshold = threshold;
    }
    cfg.validate()?;

    let client = build_client(&cfg)?;
    let runner = ShellRunner;
    let console = StdConsole;

    let outcome = Controller::new(client.as_ref(), &runner, &console, cfg).run(&request)?;
    Ok(match outcome {
        RunOutcome::Completed => {
            println!("\nAll steps completed.");
            exit_codes::OK
        }
        RunOutcome::CancelledBeforeStart => {
            println!("\nPlan cancelled; nothing was run.");
            exit_codes::CANCELLED
        }
        RunOutcome::StoppedEarly => {
            println!("\nStopped before the plan finished.");
            exit_codes::STOPPED_EARLY
        }
    })
}

fn cmd_init(path: &std::path::Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "config already exists at {} (use --force to overwrite)",
            path.display()
        );
    }
    write_config(path, &EngineConfig::default())
        .with_context(|| format!("write {}", path.display()))?;
    println!("wrote {}", path.display());
    Ok(())
}
