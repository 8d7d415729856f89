//! Heuristic classification of commands that need a live terminal.
//!
//! Interactive commands run with inherited stdio so the user converses with
//! them directly; everything else is captured. The heuristic is coarse:
//! program name, `-i`/`--interactive` flags, and a few known editor
//! invocations.

/// Programs that talk to the terminal when invoked without `-c`.
const INTERACTIVE_PROGRAMS: &[&str] = &[
    "vi", "vim", "nvim", "nano", "emacs", "less", "more", "top", "htop", "ssh", "python",
    "python3", "node", "irb", "psql", "mysql", "bash", "zsh", "sh", "fish",
];

/// Decide whether `command` should get full terminal passthrough.
pub fn is_interactive(command: &str) -> bool {
    let tokens: Vec<&str> = command.split_whitespace().collect();
    let Some(first) = tokens.first() else {
        return false;
    };

    if tokens.iter().any(|t| *t == "-i" || *t == "--interactive") {
        return true;
    }

    let program = first.rsplit('/').next().unwrap_or(first);
    if INTERACTIVE_PROGRAMS.contains(&program) && !tokens.iter().any(|t| *t == "-c") {
        return true;
    }

    is_editor_invocation(&tokens)
}

fn is_editor_invocation(tokens: &[&str]) -> bool {
    match tokens {
        ["git", "commit", rest @ ..] => !rest
            .iter()
            .any(|t| *t == "-m" || *t == "--message" || t.starts_with("--message=")),
        ["crontab", rest @ ..] => rest.contains(&"-e"),
        ["visudo", ..] => true,
        _ => false,
    }
}
