//! User interaction surface.
//!
//! The [`Console`] trait decouples the engine from stdin/stdout so the
//! orchestration is testable with scripted answers. All user-facing
//! conversation goes through this seam, never through tracing.

use std::io::{BufRead, Write};

use anyhow::{Context, Result, anyhow};

/// Blocking user-interaction seam.
pub trait Console {
    /// Yes/no question. Empty input takes the default.
    fn confirm(&self, prompt: &str, default_yes: bool) -> Result<bool>;
    /// Free-text input, trimmed. Reprompts on empty.
    fn input(&self, prompt: &str) -> Result<String>;
    /// Plain line to stdout.
    fn say(&self, text: &str);
}

/// Console backed by process stdin/stdout.
pub struct StdConsole;

impl Console for StdConsole {
    fn confirm(&self, prompt: &str, default_yes: bool) -> Result<bool> {
        let hint = if default_yes { "[Y/n]" } else { "[y/N]" };
        loop {
            let line = read_line(&format!("{prompt} {hint} "))?;
            let answer = line.trim().to_ascii_lowercase();
            match answer.as_str() {
                "" => return Ok(default_yes),
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => self.say("Please answer y or n."),
            }
        }
    }

    fn input(&self, prompt: &str) -> Result<String> {
        loop {
            let line = read_line(prompt)?;
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                return Ok(trimmed.to_string());
            }
            self.say("Please enter a non-empty answer.");
        }
    }

    fn say(&self, text: &str) {
        println!("{text}");
    }
}

fn read_line(prompt: &str) -> Result<String> {
    let mut stdout = std::io::stdout();
    write!(stdout, "{prompt}").context("write prompt")?;
    stdout.flush().context("flush prompt")?;

    let mut line = String::new();
    let read = std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("read stdin")?;
    if read == 0 {
        return Err(anyhow!("stdin closed while waiting for input"));
    }
    Ok(line)
}
