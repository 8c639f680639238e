//! Per-run trace of everything each stage produced.
//!
//! The trace is owned by exactly one run, only ever appended to, and ordered
//! by execution. Later stages read earlier outputs from it (the repair stage
//! takes the original question from here, the summarize stage takes the
//! final statement and rows).

use crate::database::ExecutionOutcome;
use crate::llm::{sanitize, strip_markdown, ValidationVerdict};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// One generated or repaired SQL statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SqlCandidate {
    /// Text as produced by the model (or extracted from a repair response)
    pub raw_text: String,
    /// Unfenced, backslash-free text that is actually executed
    pub sanitized_text: String,
}

impl SqlCandidate {
    /// Derive a candidate from model text.
    pub fn from_text(raw: impl Into<String>) -> Self {
        let raw_text = raw.into();
        let sanitized_text = sanitize(&strip_markdown(&raw_text));
        Self {
            raw_text,
            sanitized_text,
        }
    }
}

/// What a trace step recorded.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TracePayload {
    Question {
        text: String,
    },
    RowPayload {
        columns: Vec<String>,
        row_count: usize,
    },
    Verdict(ValidationVerdict),
    RetrievedContext {
        chunks: Vec<String>,
    },
    ModelOutput {
        stage: String,
        text: String,
    },
    Candidate {
        attempt: u32,
        candidate: SqlCandidate,
    },
    Execution {
        attempt: u32,
        outcome: ExecutionOutcome,
    },
    RepairExplanation {
        attempt: u32,
        text: String,
    },
    Insight {
        text: String,
    },
}

impl TracePayload {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Question { .. } => "question",
            Self::RowPayload { .. } => "row_payload",
            Self::Verdict(_) => "validation_verdict",
            Self::RetrievedContext { .. } => "retrieved_context",
            Self::ModelOutput { .. } => "model_output",
            Self::Candidate { .. } => "sql_candidate",
            Self::Execution { .. } => "execution",
            Self::RepairExplanation { .. } => "repair_explanation",
            Self::Insight { .. } => "insight",
        }
    }
}

/// A single trace entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceStep {
    pub seq: usize,
    pub name: &'static str,
    pub at: DateTime<Utc>,
    pub payload: TracePayload,
}

/// Append-only record of one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunTrace {
    run_id: Uuid,
    steps: Vec<TraceStep>,
}

impl RunTrace {
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            steps: Vec::new(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Append a step.
    pub fn record(&mut self, payload: TracePayload) {
        let seq = self.steps.len();
        tracing::trace!(seq, step = payload.name(), "Trace step recorded");
        self.steps.push(TraceStep {
            seq,
            name: payload.name(),
            at: Utc::now(),
            payload,
        });
    }

    pub fn steps(&self) -> &[TraceStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// The question the run started with.
    pub fn question(&self) -> Option<&str> {
        self.steps.iter().find_map(|s| match &s.payload {
            TracePayload::Question { text } => Some(text.as_str()),
            _ => None,
        })
    }

    /// All candidates, in the order they were produced.
    pub fn candidates(&self) -> Vec<&SqlCandidate> {
        self.steps
            .iter()
            .filter_map(|s| match &s.payload {
                TracePayload::Candidate { candidate, .. } => Some(candidate),
                _ => None,
            })
            .collect()
    }

    /// All execution outcomes, in order.
    pub fn executions(&self) -> Vec<&ExecutionOutcome> {
        self.steps
            .iter()
            .filter_map(|s| match &s.payload {
                TracePayload::Execution { outcome, .. } => Some(outcome),
                _ => None,
            })
            .collect()
    }

    /// Most recent successful execution with the candidate that produced it.
    pub fn last_success(&self) -> Option<(&SqlCandidate, &ExecutionOutcome)> {
        let (attempt, outcome) = self.steps.iter().rev().find_map(|s| match &s.payload {
            TracePayload::Execution { attempt, outcome } if outcome.is_success() => Some((*attempt, outcome)),
            _ => None,
        })?;

        let candidate = self.steps.iter().rev().find_map(|s| match &s.payload {
            TracePayload::Candidate { attempt: a, candidate } if *a == attempt => Some(candidate),
            _ => None,
        })?;

        Some((candidate, outcome))
    }

    /// Insight text, once summarized.
    pub fn insight(&self) -> Option<&str> {
        self.steps.iter().find_map(|s| match &s.payload {
            TracePayload::Insight { text } => Some(text.as_str()),
            _ => None,
        })
    }
}
