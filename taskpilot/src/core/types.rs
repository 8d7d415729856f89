//! Shared data model for plans, steps, and per-step records.
//!
//! These types define the stable contracts between the engine components and
//! the JSON shapes the model is asked to produce. Wire names are camelCase to
//! match the reply contracts stated in the prompt templates.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a single plan step.
///
/// Legal transitions:
/// `Pending -> NeedsClarification | Ready`,
/// `NeedsClarification -> Ready | Skipped`,
/// `Ready -> Executing | Skipped`,
/// `Executing -> Succeeded | Failed`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    #[default]
    Pending,
    NeedsClarification,
    Ready,
    Executing,
    Succeeded,
    Failed,
    Skipped,
}

/// One shell step proposed by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub description: String,
    /// Shell command line. Empty means the step is informational (no-op).
    #[serde(default)]
    pub command: String,
    /// Model-reported confidence in [0.0, 1.0] that the step is correct and
    /// free of invented detail.
    pub certainty: f64,
    /// Engine-owned, never read from the model.
    #[serde(skip)]
    pub state: StepState,
    /// Placeholder tokens found in `command`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub placeholders: Vec<String>,
    /// Placeholder tokens found in `description`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub description_placeholders: Vec<String>,
    /// Set once the clarification loop has revised this step.
    #[serde(default)]
    pub clarified: bool,
}

impl Step {
    /// True when any placeholder was detected in command or description.
    pub fn has_placeholders(&self) -> bool {
        !self.placeholders.is_empty() || !self.description_placeholders.is_empty()
    }
}

/// The ordered plan for one user request. Owned exclusively by the
/// controller; other components receive read-only views.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub request: String,
    pub steps: Vec<Step>,
}

/// Outcome of running (or declining to run) a single step.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionResult {
    pub success: bool,
    /// True when the user declined to run the command. Distinct from a
    /// runtime failure: `skipped && !success` is not an error.
    pub skipped: bool,
    pub error: Option<String>,
    /// The command actually run (post-edit). Empty for no-op steps.
    pub command: String,
    /// Merged stdout+stderr capture. Empty when skipped or interactive.
    pub output: String,
}

impl ExecutionResult {
    pub fn skipped(command: &str) -> Self {
        Self {
            success: false,
            skipped: true,
            error: None,
            command: command.to_string(),
            output: String::new(),
        }
    }

    /// A hard failure, as opposed to a user skip.
    pub fn is_hard_failure(&self) -> bool {
        !self.success && !self.skipped
    }
}

/// Post-execution judgment of whether a step met its intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    pub verified: bool,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_validation: Option<PlanValidation>,
}

/// Whether observed output invalidates the not-yet-executed remainder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanValidation {
    pub needs_update: bool,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub updated_steps: Vec<Step>,
}

/// Ledger entry for one processed step. Append-only within a plan
/// generation; replanning clears the ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRecord {
    /// Zero-based plan index at execution time.
    pub index: usize,
    pub description: String,
    /// The command actually run (post-edit).
    pub command: String,
    pub result: ExecutionResult,
    pub verification: VerificationResult,
}

/// Terminal state of a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every step was processed.
    Completed,
    /// The user stopped at a gate after at least reaching the loop.
    StoppedEarly,
    /// The user declined the plan before any step ran.
    CancelledBeforeStart,
}

/// Fatal protocol violation: the model reply could not be turned into the
/// contracted JSON shape. Carried inside `anyhow::Error` so the controller
/// can `downcast_ref` and distinguish it from recoverable command failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedReplyError {
    pub message: String,
}

impl MalformedReplyError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for MalformedReplyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "malformed model reply: {}", self.message)
    }
}

impl std::error::Error for MalformedReplyError {}
