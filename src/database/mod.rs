//! SQL execution against the target relational database.
//!
//! The pipeline only depends on [`QueryExecutor`]; [`SqliteExecutor`] is the
//! bundled backend.

pub mod executor;
pub mod sqlite;

pub use executor::{ErrorKind, ExecutionFailure, ExecutionOutcome, QueryExecutor, StatementKind, MUTATION_STATUS};
pub use sqlite::SqliteExecutor;
