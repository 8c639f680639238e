//! Database operation instrumentation.
//!
//! Implements OpenTelemetry semantic conventions for SQL execution.

use crate::database::{ExecutionOutcome, StatementKind};
use tracing::{field, span, Level, Span};

/// Create database query span with semantic conventions.
///
/// # Arguments
///
/// * `query_text` - SQL statement as submitted
/// * `kind` - Read or mutation (maps to `db.operation.name`)
/// * `namespace` - Database path or name
///
/// # Returns
///
/// Tracing span with OpenTelemetry semantic attributes. Response attributes
/// are declared empty and filled in by [`record_db_outcome`].
///
/// # Example
///
/// ```rust,ignore
/// let span = db_query_span("SELECT COUNT(*) FROM film", StatementKind::Read, "sakila.db");
/// let outcome = run().instrument(span.clone()).await;
/// record_db_outcome(&span, &outcome);
/// ```
pub fn db_query_span(query_text: &str, kind: StatementKind, namespace: &str) -> Span {
    span!(
        Level::INFO,
        "db.query",
        otel.name = format!("{} {}", kind.as_str(), namespace),
        otel.kind = "client",
        db.system.name = "sqlite",
        db.operation.name = kind.as_str(),
        db.namespace = namespace,
        db.query.text = query_text,
        db.response.returned_rows = field::Empty,
        db.response.affected_rows = field::Empty,
        error.type = field::Empty,
    )
}

/// Record execution result attributes on a query span.
pub fn record_db_outcome(span: &Span, outcome: &ExecutionOutcome) {
    match outcome {
        ExecutionOutcome::Rows { rows, .. } => {
            span.record("db.response.returned_rows", rows.len());
        }
        ExecutionOutcome::Mutation { rows_affected, .. } => {
            if let Some(affected) = rows_affected {
                span.record("db.response.affected_rows", *affected);
            }
        }
        ExecutionOutcome::Failure(failure) => {
            span.record("error.type", failure.kind.as_str());
        }
    }
}
