//! Question → SQL → result → insight state machine.
//!
//! ```text
//! Validate ─▶ Retrieve ─▶ Generate ─▶ Execute ─┬─▶ Summarize ─▶ Done
//!    │                                  ▲      │
//!    ▼                                  │      ▼
//! Rejected                              └── Repair ──(budget spent)──▶ Failed
//! ```
//!
//! Stages run strictly in sequence; each records its output in the run's
//! [`RunTrace`] before the next one starts. Expected endings (rejected
//! question, repair budget spent) are [`RunOutcome`] values. Only conditions
//! that make the run meaningless (index unavailable, model unreachable after
//! rate-limit retries, unserializable values) are returned as errors.

use crate::database::{ErrorKind, ExecutionFailure, ExecutionOutcome, QueryExecutor};
use crate::index::{SchemaRetriever, DEFAULT_TOP_N};
use crate::llm::prompts::{self, DEFAULT_ROW_LIMIT};
use crate::llm::{extract_corrected_sql, parse_verdict, LanguageModelClient, RepairResponse, ValidationVerdict};
use crate::otel::{record_run_outcome, run_span, stage_span};
use crate::pipeline::payload::RowPayload;
use crate::pipeline::repair::RepairHistory;
use crate::pipeline::trace::{RunTrace, SqlCandidate, TracePayload};
use crate::types::{normalize_row, PipelineError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

/// Prefix of the message returned for questions the model deems unanswerable.
pub const REJECTION_PREFIX: &str = "Not a valid question for generating an SQL query. Reason: ";

/// Message returned when the repair budget is spent.
pub const REPAIR_EXHAUSTED_MESSAGE: &str = "Sorry, I couldn't generate the query. Would you rephrase your question?";

/// Message returned when the database is unreachable and fail-fast is on.
pub const CONNECTION_FAILED_MESSAGE: &str = "The database is unavailable right now. Please try again later.";

/// Pipeline tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Repair attempts after the first failed execution
    pub max_repair_attempts: u32,

    /// Schema chunks retrieved per question
    pub top_n: usize,

    /// Rows rendered into the insight prompt
    pub insight_row_limit: usize,

    /// End the run on a connection error instead of asking the model to repair it
    pub fail_fast_on_connection_error: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_repair_attempts: 3,
            top_n: DEFAULT_TOP_N,
            insight_row_limit: DEFAULT_ROW_LIMIT,
            fail_fast_on_connection_error: false,
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Statement executed and summarized
    Done {
        final_sql: String,
        execution: ExecutionOutcome,
        insight: String,
    },
    /// Question is not answerable from the database
    Rejected {
        message: String,
        verdict: ValidationVerdict,
    },
    /// No statement succeeded within the repair budget
    Failed {
        message: String,
        history: RepairHistory,
    },
}

impl RunOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Done { .. } => "done",
            Self::Rejected { .. } => "rejected",
            Self::Failed { .. } => "failed",
        }
    }

    /// Text to show the user: the insight, or the rejection/failure message.
    pub fn message(&self) -> &str {
        match self {
            Self::Done { insight, .. } => insight,
            Self::Rejected { message, .. } | Self::Failed { message, .. } => message,
        }
    }
}

/// Result payload of a [`PipelineResponse`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ResponseResult {
    Rows(Vec<Vec<JsonValue>>),
    Status(String),
    None,
}

/// Caller-facing summary of a run with every value JSON-normalized.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineResponse {
    pub final_sql: Option<String>,
    pub columns: Vec<String>,
    pub result: ResponseResult,
    pub insight: String,
}

/// Outcome plus the full trace of one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub outcome: RunOutcome,
    pub trace: RunTrace,
}

impl RunReport {
    /// Build the caller-facing response.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::UnsupportedType` if a result value has no JSON form
    pub fn response(&self) -> Result<PipelineResponse> {
        match &self.outcome {
            RunOutcome::Done {
                final_sql,
                execution,
                insight,
            } => {
                let (columns, result) = match execution {
                    ExecutionOutcome::Rows { columns, rows } => {
                        let rows = rows
                            .iter()
                            .map(|row| normalize_row(row))
                            .collect::<Result<Vec<_>>>()?;
                        (columns.clone(), ResponseResult::Rows(rows))
                    }
                    ExecutionOutcome::Mutation { status, .. } => (Vec::new(), ResponseResult::Status(status.clone())),
                    ExecutionOutcome::Failure(_) => (Vec::new(), ResponseResult::None),
                };

                Ok(PipelineResponse {
                    final_sql: Some(final_sql.clone()),
                    columns,
                    result,
                    insight: insight.clone(),
                })
            }
            RunOutcome::Rejected { message, .. } | RunOutcome::Failed { message, .. } => Ok(PipelineResponse {
                final_sql: None,
                columns: Vec::new(),
                result: ResponseResult::None,
                insight: message.clone(),
            }),
        }
    }
}

/// Which chain a run follows.
enum RunMode {
    /// Answer a question (validation first)
    Query,
    /// Apply supplied rows (no validation)
    Modification { payload: String, rows: RowPayload },
}

impl RunMode {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Modification { .. } => "modification",
        }
    }
}

/// Pipeline state. `attempt` is 0 for the generated statement and `n` for
/// the n-th repair.
enum Stage {
    Validate,
    Retrieve,
    Generate { context: String },
    Execute { candidate: SqlCandidate, attempt: u32 },
    Repair { failure: ExecutionFailure, attempt: u32 },
    Summarize,
    Finished(RunOutcome),
}

impl Stage {
    fn name(&self) -> &'static str {
        match self {
            Self::Validate => "validate",
            Self::Retrieve => "retrieve",
            Self::Generate { .. } => "generate",
            Self::Execute { .. } => "execute",
            Self::Repair { .. } => "repair",
            Self::Summarize => "summarize",
            Self::Finished(_) => "finished",
        }
    }

    fn attempt(&self) -> u32 {
        match self {
            Self::Execute { attempt, .. } | Self::Repair { attempt, .. } => *attempt,
            _ => 0,
        }
    }
}

/// Mutable state of one run, threaded through the stages.
struct RunState {
    question: String,
    mode: RunMode,
    trace: RunTrace,
    history: Option<RepairHistory>,
}

/// Drives questions through validation, retrieval, generation, execution,
/// repair and summarization.
///
/// Holds no per-run state; share it behind an `Arc` to serve concurrent runs.
pub struct PipelineOrchestrator {
    retriever: Arc<dyn SchemaRetriever>,
    model: Arc<dyn LanguageModelClient>,
    executor: Arc<dyn QueryExecutor>,
    config: PipelineConfig,
}

impl PipelineOrchestrator {
    /// Create an orchestrator.
    ///
    /// # Arguments
    ///
    /// * `retriever` - Schema context source
    /// * `model` - Language model (wrap in [`crate::llm::RateLimitRetry`] for quota handling)
    /// * `executor` - Target database
    /// * `config` - Repair budget, retrieval size, insight row limit
    pub fn new(
        retriever: Arc<dyn SchemaRetriever>,
        model: Arc<dyn LanguageModelClient>,
        executor: Arc<dyn QueryExecutor>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            retriever,
            model,
            executor,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Answer a natural-language question.
    ///
    /// # Arguments
    ///
    /// * `question` - Question about the database
    ///
    /// # Returns
    ///
    /// Report with a `Done`, `Rejected` or `Failed` outcome and the run trace
    ///
    /// # Errors
    ///
    /// - `MissingSlot` if the question is empty
    /// - `IndexUnavailable` if schema retrieval fails
    /// - `ModelError` if the model fails (rate limits already retried)
    pub async fn run(&self, question: &str) -> Result<RunReport> {
        self.start(question, RunMode::Query).await
    }

    /// Apply tabular rows as described by a request (insert/delete style).
    ///
    /// Skips validation. Schema retrieval uses `"{question} + {payload}"`.
    ///
    /// # Arguments
    ///
    /// * `question` - What to do with the rows
    /// * `payload` - CSV text, header first
    ///
    /// # Errors
    ///
    /// As [`run`](Self::run), plus `InvalidPayload` if the rows cannot be parsed
    pub async fn run_with_data(&self, question: &str, payload: &str) -> Result<RunReport> {
        let rows = RowPayload::parse(payload)?;
        let canonical = rows.to_csv()?;

        self.start(
            question,
            RunMode::Modification {
                payload: canonical.trim_end().to_string(),
                rows,
            },
        )
        .await
    }

    async fn start(&self, question: &str, mode: RunMode) -> Result<RunReport> {
        let question = question.trim();
        if question.is_empty() {
            return Err(PipelineError::MissingSlot("question"));
        }

        let run_id = Uuid::new_v4();
        let span = run_span(run_id, mode.as_str());

        let mut state = RunState {
            question: question.to_string(),
            mode,
            trace: RunTrace::new(run_id),
            history: None,
        };
        state.trace.record(TracePayload::Question {
            text: question.to_string(),
        });
        if let RunMode::Modification { rows, .. } = &state.mode {
            state.trace.record(TracePayload::RowPayload {
                columns: rows.columns.clone(),
                row_count: rows.rows.len(),
            });
        }

        let result = self.drive(&mut state).instrument(span.clone()).await;

        match result {
            Ok(outcome) => {
                record_run_outcome(&span, outcome.as_str(), state.trace.candidates().len());
                span.in_scope(|| tracing::info!(outcome = outcome.as_str(), steps = state.trace.len(), "Run finished"));
                Ok(RunReport {
                    run_id,
                    outcome,
                    trace: state.trace,
                })
            }
            Err(e) => {
                record_run_outcome(&span, "error", state.trace.candidates().len());
                span.in_scope(|| {
                    tracing::error!(error = %e, "Run aborted");
                    tracing::debug!(trace = %serde_json::to_string(&state.trace).unwrap_or_default(), "Trace at abort");
                });
                Err(e)
            }
        }
    }

    async fn drive(&self, state: &mut RunState) -> Result<RunOutcome> {
        let mut stage = match state.mode {
            RunMode::Query => Stage::Validate,
            RunMode::Modification { .. } => Stage::Retrieve,
        };

        loop {
            if let Stage::Finished(outcome) = stage {
                return Ok(outcome);
            }

            let span = stage_span(stage.name(), stage.attempt());
            stage = self.step(stage, state).instrument(span).await?;
        }
    }

    async fn step(&self, stage: Stage, state: &mut RunState) -> Result<Stage> {
        match stage {
            Stage::Validate => self.validate(state).await,
            Stage::Retrieve => self.retrieve(state).await,
            Stage::Generate { context } => self.generate(state, &context).await,
            Stage::Execute { candidate, attempt } => Ok(self.execute(state, candidate, attempt).await),
            Stage::Repair { failure, attempt } => self.repair(state, failure, attempt).await,
            Stage::Summarize => self.summarize(state).await,
            Stage::Finished(outcome) => Ok(Stage::Finished(outcome)),
        }
    }

    async fn validate(&self, state: &mut RunState) -> Result<Stage> {
        let prompt = prompts::validation_prompt(&state.question)?;
        let response = self.model.complete(&prompt).await?;

        let verdict = parse_verdict(&response);
        state.trace.record(TracePayload::Verdict(verdict.clone()));

        if verdict.is_valid {
            return Ok(Stage::Retrieve);
        }

        tracing::info!(rationale = %verdict.rationale, "Question rejected");
        Ok(Stage::Finished(RunOutcome::Rejected {
            message: format!("{}{}", REJECTION_PREFIX, verdict.rationale),
            verdict,
        }))
    }

    async fn retrieve(&self, state: &mut RunState) -> Result<Stage> {
        let query = match &state.mode {
            RunMode::Query => state.question.clone(),
            RunMode::Modification { payload, .. } => format!("{} + {}", state.question, payload),
        };

        let chunks = self.retriever.retrieve(&query, self.config.top_n).await?;
        let context = chunks.join("\n\n");
        state.trace.record(TracePayload::RetrievedContext { chunks });

        Ok(Stage::Generate { context })
    }

    async fn generate(&self, state: &mut RunState, context: &str) -> Result<Stage> {
        let prompt = match &state.mode {
            RunMode::Query => prompts::generation_prompt(context, &state.question)?,
            RunMode::Modification { payload, .. } => prompts::modification_prompt(context, &state.question, payload)?,
        };

        let response = self.model.complete(&prompt).await?;
        state.trace.record(TracePayload::ModelOutput {
            stage: "generate".to_string(),
            text: response.clone(),
        });

        let candidate = SqlCandidate::from_text(response);
        tracing::debug!(sql = %candidate.sanitized_text, "Generated SQL");
        state.trace.record(TracePayload::Candidate {
            attempt: 0,
            candidate: candidate.clone(),
        });

        Ok(Stage::Execute { candidate, attempt: 0 })
    }

    async fn execute(&self, state: &mut RunState, candidate: SqlCandidate, attempt: u32) -> Stage {
        let outcome = self.executor.execute(&candidate.sanitized_text).await;
        state.trace.record(TracePayload::Execution {
            attempt,
            outcome: outcome.clone(),
        });

        let failure = match outcome {
            ExecutionOutcome::Failure(failure) => failure,
            _ => return Stage::Summarize,
        };

        tracing::warn!(attempt, error.kind = %failure.kind, error = %failure.message, "Execution failed");

        match state.history.as_mut() {
            Some(history) => history.record_failure(attempt, &failure),
            None => state.history = Some(RepairHistory::new(&failure)),
        }

        if failure.kind == ErrorKind::Connection && self.config.fail_fast_on_connection_error {
            return self.fail(state, CONNECTION_FAILED_MESSAGE);
        }

        self.next_repair(state, failure, attempt)
    }

    async fn repair(&self, state: &mut RunState, failure: ExecutionFailure, attempt: u32) -> Result<Stage> {
        let prompt = prompts::repair_prompt(state.trace.question(), &failure.failed_query, &failure.message)?;
        let response = self.model.complete(&prompt).await?;
        state.trace.record(TracePayload::ModelOutput {
            stage: "repair".to_string(),
            text: response.clone(),
        });

        match extract_corrected_sql(&response) {
            RepairResponse::Corrected(sql) => {
                let candidate = SqlCandidate::from_text(sql);
                tracing::debug!(attempt, sql = %candidate.sanitized_text, "Corrected SQL");
                state.trace.record(TracePayload::Candidate {
                    attempt,
                    candidate: candidate.clone(),
                });
                Ok(Stage::Execute { candidate, attempt })
            }
            RepairResponse::Explanation(text) => {
                tracing::info!(attempt, "Repair returned an explanation instead of SQL");
                state.trace.record(TracePayload::RepairExplanation {
                    attempt,
                    text: text.clone(),
                });
                if let Some(history) = state.history.as_mut() {
                    history.record_message(attempt, &text);
                }
                Ok(self.next_repair(state, failure, attempt))
            }
        }
    }

    /// Schedule repair `attempt + 1`, or fail if the budget is spent.
    fn next_repair(&self, state: &mut RunState, failure: ExecutionFailure, attempt: u32) -> Stage {
        if attempt < self.config.max_repair_attempts {
            Stage::Repair {
                failure,
                attempt: attempt + 1,
            }
        } else {
            tracing::warn!(attempts = attempt, "Repair budget exhausted");
            self.fail(state, REPAIR_EXHAUSTED_MESSAGE)
        }
    }

    fn fail(&self, state: &mut RunState, message: &str) -> Stage {
        Stage::Finished(RunOutcome::Failed {
            message: message.to_string(),
            history: state.history.take().unwrap_or_default(),
        })
    }

    async fn summarize(&self, state: &mut RunState) -> Result<Stage> {
        // The trace is the source of truth for what ran last
        let (candidate, outcome) = state
            .trace
            .last_success()
            .map(|(candidate, outcome)| (candidate.clone(), outcome.clone()))
            .ok_or_else(|| PipelineError::InternalError("No successful execution in trace".to_string()))?;

        let result = render_result(&outcome, self.config.insight_row_limit)?;
        let question = state.trace.question().unwrap_or(&state.question);
        let prompt = prompts::insight_prompt(question, &candidate.sanitized_text, &result, outcome.columns())?;

        let insight = self.model.complete(&prompt).await?;
        state.trace.record(TracePayload::Insight { text: insight.clone() });

        Ok(Stage::Finished(RunOutcome::Done {
            final_sql: candidate.sanitized_text,
            execution: outcome,
            insight,
        }))
    }
}

/// Render an execution result for the insight prompt.
///
/// Rows become a JSON array of arrays, capped at `row_limit` with a note when
/// truncated; mutations render their status line.
fn render_result(outcome: &ExecutionOutcome, row_limit: usize) -> Result<String> {
    match outcome {
        ExecutionOutcome::Rows { rows, .. } => {
            let shown = rows
                .iter()
                .take(row_limit)
                .map(|row| normalize_row(row))
                .collect::<Result<Vec<_>>>()?;

            let mut text = serde_json::to_string(&shown)?;
            if rows.len() > row_limit {
                text.push_str(&format!(" (first {} of {} rows)", row_limit, rows.len()));
            }
            Ok(text)
        }
        ExecutionOutcome::Mutation { status, rows_affected } => Ok(match rows_affected {
            Some(n) => format!("{} Rows affected: {}", status, n),
            None => status.clone(),
        }),
        ExecutionOutcome::Failure(failure) => Ok(failure.message.clone()),
    }
}
