//! Accumulated history of a repair loop.

use crate::database::ExecutionFailure;
use serde::Serialize;

/// Failed queries, errors and model messages across repair attempts.
///
/// Each field starts with the first failure and grows by concatenation, one
/// `"\n[Attempt n] ..."` segment per attempt. Nothing is overwritten.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepairHistory {
    pub failed_queries: String,
    pub errors: String,
    pub messages: String,
    /// Highest repair attempt recorded
    pub attempts: u32,
}

impl RepairHistory {
    /// Start a history from the failure that triggered repair.
    pub fn new(initial: &ExecutionFailure) -> Self {
        Self {
            failed_queries: initial.failed_query.clone(),
            errors: initial.message.clone(),
            messages: String::new(),
            attempts: 0,
        }
    }

    /// Record the failure of a repaired statement.
    pub fn record_failure(&mut self, attempt: u32, failure: &ExecutionFailure) {
        append(&mut self.failed_queries, attempt, &failure.failed_query);
        append(&mut self.errors, attempt, &failure.message);
        self.attempts = self.attempts.max(attempt);
    }

    /// Record a model explanation returned instead of a corrected query.
    pub fn record_message(&mut self, attempt: u32, message: &str) {
        append(&mut self.messages, attempt, message);
        self.attempts = self.attempts.max(attempt);
    }
}

fn append(buffer: &mut String, attempt: u32, text: &str) {
    if !text.is_empty() {
        buffer.push_str(&format!("\n[Attempt {}] {}", attempt, text));
    }
}
