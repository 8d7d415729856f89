//! Stable exit codes for taskpilot CLI commands.

/// Every plan step ran and verified (or the command had nothing to run).
pub const OK: i32 = 0;
/// Invalid config, unreachable provider, malformed model reply, or other
/// engine error.
pub const ERROR: i32 = 1;
/// The user declined the proposed plan before any step ran.
pub const CANCELLED: i32 = 2;
/// The run stopped partway: a failed or unverified step with no accepted
/// recovery.
pub const STOPPED_EARLY: i32 = 3;
