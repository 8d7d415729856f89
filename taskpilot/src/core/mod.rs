//! Pure, deterministic engine logic. No I/O; fully testable in isolation.

pub mod certainty;
pub mod classify;
pub mod context;
pub mod placeholder;
pub mod types;
