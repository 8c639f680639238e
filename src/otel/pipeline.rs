//! Pipeline stage and model call instrumentation.

use tracing::{field, span, Level, Span};
use uuid::Uuid;

/// Create a span covering one pipeline run.
pub fn run_span(run_id: Uuid, mode: &str) -> Span {
    span!(
        Level::INFO,
        "pipeline.run",
        otel.name = format!("pipeline {}", mode),
        otel.kind = "internal",
        run.id = %run_id,
        run.mode = mode,
        run.outcome = field::Empty,
        run.candidates = field::Empty,
    )
}

/// Create a span for a single stage inside a run.
pub fn stage_span(stage: &str, attempt: u32) -> Span {
    span!(
        Level::INFO,
        "pipeline.stage",
        otel.name = stage,
        otel.kind = "internal",
        stage.name = stage,
        stage.attempt = attempt,
    )
}

/// Create a span for a language model call.
///
/// Follows the GenAI semantic conventions (`gen_ai.*`).
pub fn llm_span(provider: &str, model: &str) -> Span {
    span!(
        Level::INFO,
        "gen_ai.request",
        otel.name = format!("chat {}", model),
        otel.kind = "client",
        gen_ai.system = provider,
        gen_ai.request.model = model,
        http.response.status_code = field::Empty,
    )
}

/// Record terminal state attributes on a run span.
pub fn record_run_outcome(span: &Span, outcome: &str, candidates: usize) {
    span.record("run.outcome", outcome);
    span.record("run.candidates", candidates);
}
