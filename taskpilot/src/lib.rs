//! Autonomous multi-step task execution from a natural-language request.
//!
//! Taskpilot turns a request into a shell-command plan via an LLM, then
//! walks the plan step by step: clarifying low-certainty steps with the
//! user, confirming every command before it runs, verifying outcomes, and
//! revising the remainder when earlier output invalidates it. The
//! architecture enforces a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (step states, placeholder
//!   detection, certainty gating, context assembly). No I/O, fully
//!   testable in isolation.
//! - **[`io`]**: Side-effecting seams (LLM transport, process execution,
//!   terminal interaction, config). Each behind a trait to enable
//!   scripted fakes in tests.
//!
//! Orchestration modules ([`plan`], [`clarify`], [`execute`], [`verify`],
//! [`revise`]) coordinate core logic with I/O; [`engine`] drives the whole
//! run.

pub mod clarify;
pub mod core;
pub mod engine;
pub mod execute;
pub mod exit_codes;
pub mod extract;
pub mod io;
pub mod logging;
pub mod plan;
pub mod revise;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod validate;
pub mod verify;
