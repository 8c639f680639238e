//! Query executor contract and execution outcomes.

use crate::types::SqlValue;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;

/// Status message reported for successful mutating statements.
pub const MUTATION_STATUS: &str = "Query executed successfully.";

/// Statement classification by leading keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    /// Returns rows (SELECT, SHOW, WITH, ...)
    Read,
    /// Changes data or schema; committed, no rows returned
    Mutation,
}

impl StatementKind {
    /// Classify a statement by its first keyword (case-insensitive).
    ///
    /// # Examples
    ///
    /// - "select count(*) from film" → Read
    /// - "  SHOW TABLES" → Read
    /// - "INSERT INTO staff ..." → Mutation
    /// - "" → Mutation
    pub fn classify(sql: &str) -> Self {
        let keyword = sql
            .trim_start()
            .trim_start_matches('(')
            .split(|c: char| c.is_whitespace() || c == '(' || c == ';')
            .next()
            .unwrap_or("")
            .to_ascii_lowercase();

        match keyword.as_str() {
            "select" | "show" | "with" | "explain" | "describe" | "desc" | "values" => Self::Read,
            _ => Self::Mutation,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Mutation => "mutation",
        }
    }
}

/// Failure categories the repair prompt can discriminate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed SQL, unknown table/column/function
    SqlSyntax,
    /// Constraint violation (unique, foreign key, not null, check)
    IntegrityViolation,
    /// Any other error reported by the database engine
    Database,
    /// Database could not be reached or opened
    Connection,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SqlSyntax => "sql_syntax_error",
            Self::IntegrityViolation => "integrity_violation",
            Self::Database => "database_error",
            Self::Connection => "connection_error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed execution, carrying everything the repair stage needs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionFailure {
    pub kind: ErrorKind,
    /// Driver error text, passed verbatim to the repair prompt
    pub message: String,
    /// The statement exactly as it was submitted
    pub failed_query: String,
}

/// Result of executing one statement.
///
/// Either success (rows or a mutation status) or failure, never both.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    Rows {
        columns: Vec<String>,
        rows: Vec<Vec<SqlValue>>,
    },
    Mutation {
        status: String,
        rows_affected: Option<u64>,
    },
    Failure(ExecutionFailure),
}

impl ExecutionOutcome {
    /// Build a failure outcome.
    pub fn failure(kind: ErrorKind, message: impl Into<String>, failed_query: impl Into<String>) -> Self {
        Self::Failure(ExecutionFailure {
            kind,
            message: message.into(),
            failed_query: failed_query.into(),
        })
    }

    /// Build the fixed success outcome for mutating statements.
    pub fn mutation(rows_affected: Option<u64>) -> Self {
        Self::Mutation {
            status: MUTATION_STATUS.to_string(),
            rows_affected,
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failure(_))
    }

    /// Failure details, if this outcome is a failure.
    pub fn as_failure(&self) -> Option<&ExecutionFailure> {
        match self {
            Self::Failure(failure) => Some(failure),
            _ => None,
        }
    }

    /// Column names (empty for mutations and failures).
    pub fn columns(&self) -> &[String] {
        match self {
            Self::Rows { columns, .. } => columns,
            _ => &[],
        }
    }

    /// Number of rows returned (0 for mutations and failures).
    pub fn row_count(&self) -> usize {
        match self {
            Self::Rows { rows, .. } => rows.len(),
            _ => 0,
        }
    }
}

/// Executes SQL against the target database.
///
/// Implementations never return an error: every failure path is reported as
/// [`ExecutionOutcome::Failure`] carrying the submitted statement. Each call
/// acquires and releases its own connection.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Execute a single SQL statement (or batch for mutations).
    async fn execute(&self, sql: &str) -> ExecutionOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_read_statements() {
        assert_eq!(StatementKind::classify("SELECT COUNT(*) FROM film;"), StatementKind::Read);
        assert_eq!(StatementKind::classify("  select * from actor"), StatementKind::Read);
        assert_eq!(StatementKind::classify("SHOW TABLES"), StatementKind::Read);
        assert_eq!(StatementKind::classify("WITH t AS (SELECT 1) SELECT * FROM t"), StatementKind::Read);
        assert_eq!(StatementKind::classify("\n\tSeLeCt 1"), StatementKind::Read);
        assert_eq!(StatementKind::classify("(SELECT 1) UNION (SELECT 2)"), StatementKind::Read);
    }

    #[test]
    fn test_classify_mutations() {
        assert_eq!(
            StatementKind::classify("INSERT INTO staff (first_name) VALUES ('looza')"),
            StatementKind::Mutation
        );
        assert_eq!(StatementKind::classify("delete from rental where rental_id = 1"), StatementKind::Mutation);
        assert_eq!(StatementKind::classify("UPDATE film SET length = 90"), StatementKind::Mutation);
        assert_eq!(StatementKind::classify(""), StatementKind::Mutation);
        // Leading keyword only: a column called "select_count" is not a read
        assert_eq!(StatementKind::classify("selected"), StatementKind::Mutation);
    }

    #[test]
    fn test_outcome_accessors() {
        let ok = ExecutionOutcome::Rows {
            columns: vec!["count".to_string()],
            rows: vec![vec![SqlValue::Integer(1000)]],
        };
        assert!(ok.is_success());
        assert_eq!(ok.columns(), ["count".to_string()]);
        assert_eq!(ok.row_count(), 1);
        assert!(ok.as_failure().is_none());

        let failed = ExecutionOutcome::failure(ErrorKind::SqlSyntax, "no such column: titel", "SELECT titel FROM film");
        assert!(!failed.is_success());
        assert_eq!(failed.as_failure().unwrap().failed_query, "SELECT titel FROM film");
        assert!(failed.columns().is_empty());

        let status = ExecutionOutcome::mutation(Some(3));
        assert!(status.is_success());
        assert_eq!(status.row_count(), 0);
    }
}
