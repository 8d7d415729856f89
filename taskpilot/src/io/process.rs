//! Shell command execution with bounded capture and optional timeout.
//!
//! The [`CommandRunner`] trait decouples step execution from the actual
//! process facility. Tests use scripted runners that return predetermined
//! outputs without spawning processes.

use std::io::Read;
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument, warn};
use wait_timeout::ChildExt;

/// Parameters for one command invocation.
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// Shell command line, run via `sh -c`.
    pub command: String,
    /// Full terminal passthrough instead of capture.
    pub interactive: bool,
    /// Optional wall-clock limit for captured commands.
    pub timeout: Option<Duration>,
    /// Truncate each captured stream beyond this many bytes.
    pub output_limit_bytes: usize,
}

/// Captured (or passthrough) child process outcome.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// Exit code; None when the child was terminated by a signal.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub stdout_truncated: bool,
    pub stderr_truncated: bool,
    pub timed_out: bool,
}

impl CommandOutput {
    /// Merged stdout+stderr for results and context, with truncation markers.
    pub fn merged(&self) -> String {
        let mut buf = String::new();
        buf.push_str(self.stdout.trim_end());
        if self.stdout_truncated {
            buf.push_str("\n[stdout truncated]");
        }
        let err = self.stderr.trim_end();
        if !err.is_empty() {
            if !buf.is_empty() {
                buf.push('\n');
            }
            buf.push_str(err);
        }
        if self.stderr_truncated {
            buf.push_str("\n[stderr truncated]");
        }
        buf
    }
}

/// Abstraction over shell execution backends.
pub trait CommandRunner {
    fn run(&self, request: &RunRequest) -> Result<CommandOutput>;
}

/// Runner that spawns `sh -c <command>`.
pub struct ShellRunner;

impl CommandRunner for ShellRunner {
    #[instrument(skip_all, fields(interactive = request.interactive))]
    fn run(&self, request: &RunRequest) -> Result<CommandOutput> {
        if request.interactive {
            run_interactive(request)
        } else {
            run_captured(request)
        }
    }
}

/// Inherit all stdio so the user converses with the command directly.
/// Only the exit status comes back; no capture, no timeout.
fn run_interactive(request: &RunRequest) -> Result<CommandOutput> {
    debug!(command = %request.command, "spawning interactive command");
    let status = Command::new("sh")
        .arg("-c")
        .arg(&request.command)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .context("spawn interactive command")?;
    Ok(CommandOutput {
        status: status.code(),
        ..CommandOutput::default()
    })
}

/// Capture stdout/stderr on reader threads so the pipes cannot deadlock,
/// honoring the byte limit and the optional timeout.
fn run_captured(request: &RunRequest) -> Result<CommandOutput> {
    debug!(command = %request.command, "spawning captured command");
    let mut child = Command::new("sh")
        .arg("-c")
        .arg(&request.command)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .context("spawn command")?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let limit = request.output_limit_bytes;
    let stdout_handle = thread::spawn(move || read_stream_limited(stdout, limit));
    let stderr_handle = thread::spawn(move || read_stream_limited(stderr, limit));

    let mut timed_out = false;
    let status = match request.timeout {
        Some(timeout) => match child.wait_timeout(timeout).context("wait for command")? {
            Some(status) => status,
            None => {
                warn!(timeout_secs = timeout.as_secs(), "command timed out, killing");
                timed_out = true;
                child.kill().context("kill command")?;
                child.wait().context("wait command after kill")?
            }
        },
        None => child.wait().context("wait for command")?,
    };

    let (stdout, stdout_truncated) = join_output(stdout_handle).context("join stdout")?;
    let (stderr, stderr_truncated) = join_output(stderr_handle).context("join stderr")?;

    if stdout_truncated || stderr_truncated {
        warn!(stdout_truncated, stderr_truncated, "output truncated");
    }

    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(CommandOutput {
        status: status.code(),
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
        stdout_truncated,
        stderr_truncated,
        timed_out,
    })
}

fn join_output(handle: thread::JoinHandle<Result<(Vec<u8>, bool)>>) -> Result<(Vec<u8>, bool)> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}

fn read_stream_limited<R: Read>(mut reader: R, limit: usize) -> Result<(Vec<u8>, bool)> {
    let mut buf = Vec::new();
    let mut truncated = false;
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let remaining = limit.saturating_sub(buf.len());
        if remaining > 0 {
            let keep = n.min(remaining);
            buf.extend_from_slice(&chunk[..keep]);
            if keep < n {
                truncated = true;
            }
        } else {
            truncated = true;
        }
    }

    Ok((buf, truncated))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(command: &str) -> RunRequest {
        RunRequest {
            command: command.to_string(),
            interactive: false,
            timeout: None,
            output_limit_bytes: 10_000,
        }
    }

    #[test]
    fn captures_stdout_and_exit_code() {
        let output = ShellRunner.run(&request("echo hello")).expect("run");
        assert_eq!(output.status, Some(0));
        assert_eq!(output.stdout.trim(), "hello");
        assert!(!output.timed_out);
    }

    #[test]
    fn nonzero_exit_is_reported_not_an_error() {
        let output = ShellRunner.run(&request("exit 3")).expect("run");
        assert_eq!(output.status, Some(3));
    }

    #[test]
    fn stderr_is_captured_separately() {
        let output = ShellRunner
            .run(&request("echo oops >&2"))
            .expect("run");
        assert_eq!(output.stderr.trim(), "oops");
        assert!(output.stdout.is_empty());
    }

    #[test]
    fn output_beyond_limit_is_truncated() {
        let output = ShellRunner
            .run(&RunRequest {
                output_limit_bytes: 64,
                ..request("yes x | head -c 4096")
            })
            .expect("run");
        assert_eq!(output.stdout.len(), 64);
        assert!(output.stdout_truncated);
    }

    #[test]
    fn timeout_kills_and_flags() {
        let output = ShellRunner
            .run(&RunRequest {
                timeout: Some(Duration::from_millis(100)),
                ..request("sleep 5")
            })
            .expect("run");
        assert!(output.timed_out);
    }

    #[test]
    fn merged_output_joins_streams_with_newline() {
        let output = CommandOutput {
            status: Some(0),
            stdout: "out\n".to_string(),
            stderr: "err\n".to_string(),
            ..CommandOutput::default()
        };
        assert_eq!(output.merged(), "out\nerr");
    }
}
