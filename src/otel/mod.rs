//! OpenTelemetry-style instrumentation for the NL-to-SQL pipeline.
//!
//! Spans follow OpenTelemetry semantic conventions so they can be exported by
//! any `tracing` layer:
//! - https://opentelemetry.io/docs/specs/semconv/database/database-spans/
//! - https://opentelemetry.io/docs/specs/semconv/gen-ai/
//!
//! # Span naming
//!
//! - `pipeline.run`: one per question (`run.id`, `run.mode`, `run.outcome`)
//! - `pipeline.stage`: one per stage visit (`stage.name`, `stage.attempt`)
//! - `gen_ai.request`: one per model HTTP call (rate-limit retries included)
//! - `db.query`: one per statement (`db.system.name = "sqlite"`, `db.query.text`)
//! - `index.job`: schema index build/load
//!
//! # Example
//!
//! ```rust,ignore
//! use percolate_nl2sql::otel::{init_tracing, LogFormat};
//!
//! init_tracing(LogFormat::Json, "percolate_nl2sql=debug");
//! ```

pub mod background;
pub mod db;
pub mod pipeline;
pub mod subscriber;

pub use background::{index_job_span, record_index_job, IndexJobType};
pub use db::{db_query_span, record_db_outcome};
pub use pipeline::{llm_span, record_run_outcome, run_span, stage_span};
pub use subscriber::{init_tracing, LogFormat};
