//! SQLite query executor.
//!
//! Every execution opens its own connection on a blocking worker thread and
//! drops it before returning, on success and on every error path. Nothing is
//! shared between concurrent executions.

use crate::database::executor::{ErrorKind, ExecutionOutcome, QueryExecutor, StatementKind};
use crate::otel::{db_query_span, record_db_outcome};
use crate::types::SqlValue;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use regex::Regex;
use rusqlite::types::ValueRef;
use rusqlite::{Batch, Connection, ErrorCode, OpenFlags};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use sqlparser::dialect::SQLiteDialect;
use sqlparser::parser::Parser;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::Instrument;
use uuid::Uuid;

/// SQLite-backed [`QueryExecutor`].
#[derive(Debug, Clone)]
pub struct SqliteExecutor {
    /// Database file (must already exist; never created implicitly)
    path: PathBuf,

    /// How long a connection waits on a locked database
    busy_timeout: Duration,
}

impl SqliteExecutor {
    /// Create executor for an existing database file.
    ///
    /// # Arguments
    ///
    /// * `path` - SQLite database file
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout: Duration::from_secs(5),
        }
    }

    /// Override the busy timeout.
    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Database file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl QueryExecutor for SqliteExecutor {
    async fn execute(&self, sql: &str) -> ExecutionOutcome {
        let kind = StatementKind::classify(sql);
        let span = db_query_span(sql, kind, &self.path.display().to_string());

        let path = self.path.clone();
        let busy_timeout = self.busy_timeout;
        let statement = sql.to_string();

        let task = tokio::task::spawn_blocking(move || run_statement(&path, busy_timeout, &statement, kind));

        let outcome = match task.instrument(span.clone()).await {
            Ok(outcome) => outcome,
            Err(e) => ExecutionOutcome::failure(
                ErrorKind::Database,
                format!("Executor task failed: {}", e),
                sql,
            ),
        };

        record_db_outcome(&span, &outcome);
        outcome
    }
}

/// Open, run and close. The connection is dropped when this returns.
fn run_statement(path: &Path, busy_timeout: Duration, sql: &str, kind: StatementKind) -> ExecutionOutcome {
    if trim_statement(sql).is_empty() {
        return ExecutionOutcome::failure(ErrorKind::SqlSyntax, "Empty SQL statement", sql);
    }

    let mut conn = match open_connection(path, busy_timeout) {
        Ok(conn) => conn,
        Err(e) => {
            return ExecutionOutcome::failure(ErrorKind::Connection, format!("SQLite error: {}", e), sql)
        }
    };

    let result = match kind {
        StatementKind::Read => run_read(&conn, sql),
        StatementKind::Mutation => run_mutation(&mut conn, sql),
    };

    match result {
        Ok(outcome) => outcome,
        Err(e) => {
            let kind = classify_error(&e, sql);
            tracing::debug!(error.kind = %kind, error = %e, "Statement failed");
            ExecutionOutcome::failure(kind, failure_message(&e), sql)
        }
    }
}

/// Driver message without the statement text, which the failure already carries.
fn failure_message(e: &rusqlite::Error) -> String {
    match e {
        rusqlite::Error::SqlInputError { msg, .. } => format!("SQLite error: {}", msg),
        other => format!("SQLite error: {}", other),
    }
}

fn open_connection(path: &Path, busy_timeout: Duration) -> rusqlite::Result<Connection> {
    // No SQLITE_OPEN_CREATE: a missing file is a connection error, not a new empty database
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX | OpenFlags::SQLITE_OPEN_URI,
    )?;
    conn.busy_timeout(busy_timeout)?;
    Ok(conn)
}

fn run_read(conn: &Connection, sql: &str) -> rusqlite::Result<ExecutionOutcome> {
    let mut stmt = conn.prepare(trim_statement(sql))?;

    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let decl_types: Vec<Option<String>> = stmt
        .columns()
        .iter()
        .map(|c| c.decl_type().map(str::to_ascii_uppercase))
        .collect();

    let mut rows = stmt.query([])?;
    let mut result = Vec::new();
    while let Some(row) = rows.next()? {
        let mut values = Vec::with_capacity(columns.len());
        for (i, decl) in decl_types.iter().enumerate() {
            values.push(convert_value(row.get_ref(i)?, decl.as_deref()));
        }
        result.push(values);
    }

    Ok(ExecutionOutcome::Rows { columns, rows: result })
}

fn run_mutation(conn: &mut Connection, sql: &str) -> rusqlite::Result<ExecutionOutcome> {
    let tx = conn.transaction()?;

    // Every statement in the text runs, in order, inside one transaction
    let mut rows_affected = 0u64;
    {
        let mut batch = Batch::new(&tx, sql);
        while let Some(mut stmt) = batch.next()? {
            rows_affected += stmt.execute([])? as u64;
        }
    }

    tx.commit()?;
    Ok(ExecutionOutcome::mutation(Some(rows_affected)))
}

/// Strip surrounding whitespace and trailing semicolons.
fn trim_statement(sql: &str) -> &str {
    sql.trim().trim_end_matches(';').trim_end()
}

fn syntax_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)syntax error|no such (column|table|function)|unrecognized token|incomplete input|ambiguous column|has no column named")
            .unwrap_or_else(|e| unreachable!("static regex is valid: {}", e))
    })
}

/// Map a driver error onto the failure categories used by the repair stage.
pub(crate) fn classify_error(err: &rusqlite::Error, sql: &str) -> ErrorKind {
    match err {
        rusqlite::Error::SqliteFailure(failure, message) => {
            classify_failure(failure.code, message.as_deref().unwrap_or_default(), sql)
        }
        // Prepare-time errors (unknown column/function, syntax) carry the offending input
        rusqlite::Error::SqlInputError { error, msg, .. } => classify_failure(error.code, msg, sql),
        rusqlite::Error::InvalidPath(_) => ErrorKind::Connection,
        _ => ErrorKind::Database,
    }
}

fn classify_failure(code: ErrorCode, message: &str, sql: &str) -> ErrorKind {
    match code {
        ErrorCode::ConstraintViolation => ErrorKind::IntegrityViolation,
        ErrorCode::CannotOpen
        | ErrorCode::DatabaseBusy
        | ErrorCode::DatabaseLocked
        | ErrorCode::NotADatabase
        | ErrorCode::SystemIoFailure
        | ErrorCode::PermissionDenied => ErrorKind::Connection,
        _ => {
            if syntax_pattern().is_match(message) || Parser::parse_sql(&SQLiteDialect {}, sql).is_err() {
                ErrorKind::SqlSyntax
            } else {
                ErrorKind::Database
            }
        }
    }
}

fn is_decimal(decl: &str) -> bool {
    decl.contains("DECIMAL") || decl.contains("NUMERIC")
}

/// Convert a raw SQLite value, using the declared column type as a hint.
///
/// SQLite stores dates as text and decimals as reals; the declared type is the
/// only place the richer type survives.
fn convert_value(value: ValueRef<'_>, decl: Option<&str>) -> SqlValue {
    let decl = decl.unwrap_or("");
    match value {
        ValueRef::Null => SqlValue::Null,
        ValueRef::Integer(i) => {
            if is_decimal(decl) {
                SqlValue::Decimal(Decimal::from(i))
            } else if decl.contains("BOOL") {
                SqlValue::Bool(i != 0)
            } else {
                SqlValue::Integer(i)
            }
        }
        ValueRef::Real(f) => {
            if is_decimal(decl) {
                Decimal::from_f64(f).map(SqlValue::Decimal).unwrap_or(SqlValue::Real(f))
            } else {
                SqlValue::Real(f)
            }
        }
        ValueRef::Text(bytes) => match std::str::from_utf8(bytes) {
            Ok(text) => convert_text(text, decl),
            Err(_) => SqlValue::Blob(bytes.to_vec()),
        },
        ValueRef::Blob(bytes) => {
            if decl.contains("UUID") {
                if let Ok(id) = Uuid::from_slice(bytes) {
                    return SqlValue::Uuid(id);
                }
            }
            SqlValue::Blob(bytes.to_vec())
        }
    }
}

fn convert_text(text: &str, decl: &str) -> SqlValue {
    let typed = if decl.contains("UUID") {
        Uuid::parse_str(text).ok().map(SqlValue::Uuid)
    } else if is_decimal(decl) {
        Decimal::from_str(text).ok().map(SqlValue::Decimal)
    } else if decl.contains("TIMESTAMP") || decl.contains("DATETIME") {
        parse_datetime(text)
    } else if decl.contains("DATE") {
        NaiveDate::parse_from_str(text, "%Y-%m-%d").ok().map(SqlValue::Date)
    } else if decl.contains("TIME") {
        NaiveTime::parse_from_str(text, "%H:%M:%S%.f").ok().map(SqlValue::Time)
    } else {
        None
    };

    typed.unwrap_or_else(|| SqlValue::Text(text.to_string()))
}

fn parse_datetime(text: &str) -> Option<SqlValue> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(SqlValue::Timestamp(ts.with_timezone(&Utc)));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(SqlValue::DateTime)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, SqliteExecutor) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rental.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE film (
                film_id INTEGER PRIMARY KEY,
                title VARCHAR(128) NOT NULL,
                rental_rate DECIMAL(4,2),
                last_update TIMESTAMP
            );
            INSERT INTO film VALUES (1, 'ACADEMY DINOSAUR', 0.99, '2006-02-15 05:03:42');
            INSERT INTO film VALUES (2, 'ACE GOLDFINGER', 4.99, '2006-02-15 05:03:42');
            INSERT INTO film VALUES (3, 'ADAPTATION HOLES', 2.99, '2006-02-15 05:03:42');",
        )
        .unwrap();
        (dir, SqliteExecutor::new(path))
    }

    #[tokio::test]
    async fn test_read_returns_columns_and_rows_in_engine_order() {
        let (_dir, executor) = fixture();
        let outcome = executor
            .execute("SELECT film_id, title FROM film ORDER BY film_id DESC;")
            .await;

        match outcome {
            ExecutionOutcome::Rows { columns, rows } => {
                assert_eq!(columns, vec!["film_id", "title"]);
                assert_eq!(rows.len(), 3);
                assert!(rows.iter().all(|r| r.len() == columns.len()));
                assert_eq!(rows[0][0], SqlValue::Integer(3));
                assert_eq!(rows[2][1], SqlValue::Text("ACADEMY DINOSAUR".to_string()));
            }
            other => panic!("expected rows, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_declared_types_drive_conversion() {
        let (_dir, executor) = fixture();
        let outcome = executor
            .execute("SELECT rental_rate, last_update FROM film WHERE film_id = 2")
            .await;

        let ExecutionOutcome::Rows { rows, .. } = outcome else {
            panic!("expected rows");
        };
        assert_eq!(rows[0][0], SqlValue::Decimal(Decimal::from_str("4.99").unwrap()));
        assert!(matches!(rows[0][1], SqlValue::DateTime(_)));
    }

    #[tokio::test]
    async fn test_mutation_commits_and_reports_status() {
        let (_dir, executor) = fixture();
        let outcome = executor
            .execute("UPDATE film SET rental_rate = 1.99 WHERE film_id IN (1, 2);")
            .await;
        assert_eq!(outcome, ExecutionOutcome::mutation(Some(2)));

        let check = executor.execute("SELECT COUNT(*) FROM film WHERE rental_rate = 1.99").await;
        let ExecutionOutcome::Rows { rows, .. } = check else {
            panic!("expected rows");
        };
        assert_eq!(rows[0][0], SqlValue::Integer(2));
    }

    #[tokio::test]
    async fn test_multi_statement_mutation_runs_as_batch() {
        let (_dir, executor) = fixture();
        let outcome = executor
            .execute("INSERT INTO film (title) VALUES ('A'); INSERT INTO film (title) VALUES ('B');")
            .await;
        assert_eq!(outcome, ExecutionOutcome::mutation(Some(2)));
    }

    async fn film_count(executor: &SqliteExecutor) -> SqlValue {
        let ExecutionOutcome::Rows { rows, .. } = executor.execute("SELECT COUNT(*) FROM film").await else {
            panic!("expected rows");
        };
        rows[0][0].clone()
    }

    #[tokio::test]
    async fn test_batch_with_sqlite_only_syntax_runs_every_statement() {
        let (_dir, executor) = fixture();
        let outcome = executor
            .execute("DELETE FROM film WHERE title GLOB 'Z*'; INSERT INTO film (title) VALUES ('ZORRO');")
            .await;

        assert_eq!(outcome, ExecutionOutcome::mutation(Some(1)));
        assert_eq!(film_count(&executor).await, SqlValue::Integer(4));
    }

    #[tokio::test]
    async fn test_failed_statement_rolls_back_whole_batch() {
        let (_dir, executor) = fixture();
        let outcome = executor
            .execute("INSERT INTO film (title) VALUES ('NEW'); INSERT INTO film (film_id, title) VALUES (1, 'DUP');")
            .await;

        assert_eq!(outcome.as_failure().unwrap().kind, ErrorKind::IntegrityViolation);
        assert_eq!(film_count(&executor).await, SqlValue::Integer(3));
    }

    #[tokio::test]
    async fn test_prepare_errors_are_syntax_errors() {
        let (_dir, executor) = fixture();
        for sql in [
            "SELEC title FROM film",
            "SELECT foo(title) FROM film",
            "SELECT title FROM films",
            "UPDATE film SET titel = 'X'",
        ] {
            let outcome = executor.execute(sql).await;
            assert_eq!(outcome.as_failure().unwrap().kind, ErrorKind::SqlSyntax, "{}", sql);
        }
    }

    #[tokio::test]
    async fn test_empty_statement_is_rejected() {
        let (_dir, executor) = fixture();
        let outcome = executor.execute("  ;  ").await;
        assert_eq!(outcome.as_failure().unwrap().kind, ErrorKind::SqlSyntax);
    }

    #[tokio::test]
    async fn test_unknown_column_is_syntax_error() {
        let (_dir, executor) = fixture();
        let sql = "SELECT titel FROM film";
        let outcome = executor.execute(sql).await;

        let failure = outcome.as_failure().expect("failure");
        assert_eq!(failure.kind, ErrorKind::SqlSyntax);
        assert_eq!(failure.failed_query, sql);
        assert_eq!(failure.message, "SQLite error: no such column: titel");
    }

    #[tokio::test]
    async fn test_constraint_violation_is_integrity_error() {
        let (_dir, executor) = fixture();
        let outcome = executor
            .execute("INSERT INTO film (film_id, title) VALUES (1, 'DUPLICATE')")
            .await;
        assert_eq!(outcome.as_failure().unwrap().kind, ErrorKind::IntegrityViolation);
    }

    #[tokio::test]
    async fn test_missing_database_is_connection_error() {
        let dir = tempfile::tempdir().unwrap();
        let executor = SqliteExecutor::new(dir.path().join("missing.db"));
        let outcome = executor.execute("SELECT 1").await;
        assert_eq!(outcome.as_failure().unwrap().kind, ErrorKind::Connection);
        // Must not create the file
        assert!(!dir.path().join("missing.db").exists());
    }

    #[test]
    fn test_trim_statement() {
        assert_eq!(trim_statement("  SELECT 1;;\n"), "SELECT 1");
    }
}
