//! Schema validation of extracted model JSON.
//!
//! Every structural reply is checked against an embedded draft-07 schema
//! before serde deserialization, so shape violations surface as
//! [`MalformedReplyError`] with the validator's message instead of an
//! opaque serde error.

use std::sync::LazyLock;

use anyhow::Result;
use jsonschema::{Draft, Validator};
use serde_json::Value;

use crate::core::types::MalformedReplyError;

const PLAN_SCHEMA: &str = include_str!("../schemas/plan.json");
const CLARIFIED_STEP_SCHEMA: &str = include_str!("../schemas/clarified_step.json");
const VERIFICATION_SCHEMA: &str = include_str!("../schemas/verification.json");
const REMAINDER_CHECK_SCHEMA: &str = include_str!("../schemas/remainder_check.json");

static PLAN: LazyLock<Validator> = LazyLock::new(|| compile(PLAN_SCHEMA));
static CLARIFIED_STEP: LazyLock<Validator> = LazyLock::new(|| compile(CLARIFIED_STEP_SCHEMA));
static VERIFICATION: LazyLock<Validator> = LazyLock::new(|| compile(VERIFICATION_SCHEMA));
static REMAINDER_CHECK: LazyLock<Validator> = LazyLock::new(|| compile(REMAINDER_CHECK_SCHEMA));

fn compile(raw: &str) -> Validator {
    let schema: Value = serde_json::from_str(raw).expect("embedded schema should be valid json");
    jsonschema::options()
        .with_draft(Draft::Draft7)
        .build(&schema)
        .expect("embedded schema should compile")
}

pub fn validate_plan(instance: &Value) -> Result<()> {
    validate(&PLAN, instance, "plan")
}

pub fn validate_clarified_step(instance: &Value) -> Result<()> {
    validate(&CLARIFIED_STEP, instance, "clarified step")
}

pub fn validate_verification(instance: &Value) -> Result<()> {
    validate(&VERIFICATION, instance, "verification")
}

pub fn validate_remainder_check(instance: &Value) -> Result<()> {
    validate(&REMAINDER_CHECK, instance, "remainder check")
}

fn validate(validator: &Validator, instance: &Value, label: &str) -> Result<()> {
    let messages: Vec<String> = validator
        .iter_errors(instance)
        .map(|err| err.to_string())
        .collect();
    if messages.is_empty() {
        return Ok(());
    }
    Err(MalformedReplyError::new(format!(
        "{label} reply failed schema validation: {}",
        messages.join("; ")
    ))
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn well_formed_plan_passes() {
        let instance = json!({
            "steps": [
                {"description": "init repo", "certainty": 0.95, "command": "git init"},
                {"description": "explain", "certainty": 0.9}
            ]
        });
        validate_plan(&instance).expect("valid");
    }

    #[test]
    fn plan_missing_certainty_fails_as_malformed() {
        let instance = json!({"steps": [{"description": "init repo"}]});
        let err = validate_plan(&instance).unwrap_err();
        let inner = err.downcast_ref::<MalformedReplyError>().expect("downcast");
        assert!(inner.message.contains("certainty"));
    }

    #[test]
    fn plan_with_non_numeric_certainty_fails() {
        let instance = json!({"steps": [{"description": "a", "certainty": "high"}]});
        assert!(validate_plan(&instance).is_err());
    }

    #[test]
    fn verification_requires_verified_and_reason() {
        validate_verification(&json!({"verified": false, "reason": "no output"}))
            .expect("valid");
        assert!(validate_verification(&json!({"verified": true})).is_err());
    }

    #[test]
    fn remainder_check_accepts_updated_steps() {
        let instance = json!({
            "needsUpdate": true,
            "reason": "directory already exists",
            "updatedSteps": [{"description": "skip mkdir", "certainty": 0.9, "command": ""}]
        });
        validate_remainder_check(&instance).expect("valid");
    }

    #[test]
    fn clarified_step_requires_description() {
        assert!(validate_clarified_step(&json!({"certainty": 0.9})).is_err());
        validate_clarified_step(&json!({"description": "x", "certainty": 0.9})).expect("valid");
    }
}
