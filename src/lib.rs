//! Percolate NL2SQL - natural-language questions answered over a relational database
//!
//! A staged pipeline:
//! - Validation: is the question answerable from the database at all?
//! - Retrieval: nearest schema descriptions via HNSW over embeddings
//! - Generation: model writes one SQL statement from question + schema context
//! - Execution: statement runs against SQLite, one connection per call
//! - Repair: failed statements go back to the model with the driver error (bounded)
//! - Summarization: model turns the result rows into a short insight
//!
//! Can be used as:
//! - Library (`PipelineOrchestrator`, with your own retriever/model/executor)
//! - CLI (`nl2sql ask "How many films are there?"`)

pub mod config;
pub mod database;
pub mod embeddings;
pub mod index;
pub mod llm;
pub mod otel;
pub mod pipeline;
pub mod schema;
pub mod types;

pub use config::Config;
pub use database::{ExecutionOutcome, QueryExecutor, SqliteExecutor};
pub use index::{SchemaIndex, SchemaRetriever};
pub use llm::{HttpLlmClient, LanguageModelClient, LlmError, RateLimitRetry};
pub use pipeline::{PipelineConfig, PipelineOrchestrator, PipelineResponse, RunOutcome, RunReport};
pub use types::{PipelineError, Result};
