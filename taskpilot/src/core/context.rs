//! Context string assembly and the dedup lookup over prior run records.

use crate::core::types::{RunRecord, Step};

/// Render prior records as the continuity context fed back to the model.
///
/// The exact shape is part of the contract the prompts are tuned against:
/// `"Step N Result: <output>\nCommand: <command>"` blocks, 1-based index,
/// joined by blank lines, most recent last. Only the last `window` records
/// are included to bound prompt growth on long plans.
pub fn context_string(records: &[RunRecord], window: usize) -> String {
    let start = records.len().saturating_sub(window);
    records[start..]
        .iter()
        .map(|record| {
            let output = if record.result.skipped {
                "(skipped)"
            } else {
                record.result.output.as_str()
            };
            format!(
                "Step {} Result: {}\nCommand: {}",
                record.index + 1,
                output,
                record.command
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Find a prior record that makes `step` a duplicate: identical description
/// and command, executed successfully, and verified. Duplicates must not be
/// re-executed.
pub fn find_duplicate<'a>(records: &'a [RunRecord], step: &Step) -> Option<&'a RunRecord> {
    records.iter().find(|record| {
        record.description == step.description
            && record.command == step.command
            && record.result.success
            && record.verification.verified
    })
}
