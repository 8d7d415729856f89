//! Side-effecting seams: LLM transport, process execution, console,
//! configuration, and prompt rendering. Each seam is a trait so the
//! orchestration can be exercised with scripted fakes.

pub mod completion;
pub mod config;
pub mod console;
pub mod process;
pub mod prompt;
