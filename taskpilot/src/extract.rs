//! JSON extraction from model replies.
//!
//! Replies may wrap the contracted JSON in prose or code fences. Extraction
//! strips fences first, then falls back to the outermost brace (or bracket)
//! block. Shape normalization turns the tolerated variants (bare array,
//! bare step object) into the canonical `{"steps": [...]}` envelope.

use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;
use serde_json::{Value, json};

use crate::core::types::MalformedReplyError;

static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:json)?\s*(.*?)```").expect("fence pattern should be valid")
});

/// Pull the first JSON value out of a model reply.
///
/// Failure is a [`MalformedReplyError`]: it is fatal for the call and is
/// never retried here.
pub fn extract_json(reply: &str) -> Result<Value> {
    let trimmed = reply.trim();

    if let Some(caps) = FENCE_RE.captures(trimmed)
        && let Ok(value) = serde_json::from_str(caps[1].trim())
    {
        return Ok(value);
    }

    if let Ok(value) = serde_json::from_str(trimmed) {
        return Ok(value);
    }

    for (open, close) in [('{', '}'), ('[', ']')] {
        if let Some(candidate) = outermost_block(trimmed, open, close)
            && let Ok(value) = serde_json::from_str(candidate)
        {
            return Ok(value);
        }
    }

    Err(MalformedReplyError::new(format!(
        "no JSON found in reply: {}",
        snippet(trimmed)
    ))
    .into())
}

/// First `open` to last `close`, inclusive.
fn outermost_block(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

fn snippet(text: &str) -> String {
    let short: String = text.chars().take(120).collect();
    if short.len() < text.len() {
        format!("{short}...")
    } else {
        short
    }
}

/// Normalize tolerated plan shapes into `{"steps": [...]}`.
///
/// A bare array becomes the steps list; a bare object without a `steps` key
/// becomes a single-step list. Anything already carrying `steps` passes
/// through untouched.
pub fn normalize_plan_shape(value: Value) -> Value {
    match value {
        Value::Array(steps) => json!({ "steps": steps }),
        Value::Object(ref map) if !map.contains_key("steps") => json!({ "steps": [value] }),
        other => other,
    }
}
