//! Shared fixtures for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use percolate_nl2sql::database::{ExecutionOutcome, QueryExecutor, SqliteExecutor};
use percolate_nl2sql::index::SchemaRetriever;
use percolate_nl2sql::llm::{LanguageModelClient, LlmError};
use percolate_nl2sql::types::{PipelineError, Result};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tempfile::TempDir;

/// Language model that replays scripted responses in order and records prompts.
pub struct ScriptedLlm {
    responses: Mutex<VecDeque<std::result::Result<String, LlmError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_results(responses.into_iter().map(|r| Ok(r.into())))
    }

    pub fn with_results(responses: impl IntoIterator<Item = std::result::Result<String, LlmError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn remaining(&self) -> usize {
        self.responses.lock().unwrap().len()
    }
}

#[async_trait]
impl LanguageModelClient for ScriptedLlm {
    async fn complete(&self, prompt: &str) -> std::result::Result<String, LlmError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::InvalidResponse("script exhausted".to_string())))
    }
}

/// Retriever returning fixed chunks and recording queries.
pub struct StaticRetriever {
    chunks: Vec<String>,
    queries: Mutex<Vec<String>>,
    unavailable: bool,
}

impl StaticRetriever {
    pub fn new(chunks: &[&str]) -> Self {
        Self {
            chunks: chunks.iter().map(|c| c.to_string()).collect(),
            queries: Mutex::new(Vec::new()),
            unavailable: false,
        }
    }

    /// Retriever whose index cannot be reached.
    pub fn unavailable() -> Self {
        Self {
            chunks: Vec::new(),
            queries: Mutex::new(Vec::new()),
            unavailable: true,
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl SchemaRetriever for StaticRetriever {
    async fn retrieve(&self, query: &str, top_n: usize) -> Result<Vec<String>> {
        self.queries.lock().unwrap().push(query.to_string());
        if self.unavailable {
            return Err(PipelineError::index("collection file missing"));
        }
        Ok(self.chunks.iter().take(top_n).cloned().collect())
    }
}

/// Executor wrapper counting calls.
pub struct CountingExecutor<E> {
    inner: E,
    calls: AtomicUsize,
}

impl<E> CountingExecutor<E> {
    pub fn new(inner: E) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<E: QueryExecutor> QueryExecutor for CountingExecutor<E> {
    async fn execute(&self, sql: &str) -> ExecutionOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.execute(sql).await
    }
}

pub const FILM_SCHEMA: &str = "Table: film\nPurpose: Films available for rent\nColumns:\n- film_id (INTEGER): primary key\n- title (VARCHAR): film title\n- rental_rate (DECIMAL): price per rental";

pub const STAFF_SCHEMA: &str = "Table: staff\nPurpose: Store employees\nColumns:\n- staff_id (INTEGER): primary key\n- first_name (VARCHAR)\n- last_name (VARCHAR)\n- store_id (INTEGER)";

/// Small rental database on disk. Keep the `TempDir` alive for the test.
pub struct RentalDb {
    pub dir: TempDir,
    pub path: PathBuf,
}

impl RentalDb {
    pub fn create() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dvdrental.db");
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE film (
                film_id INTEGER PRIMARY KEY,
                title VARCHAR(255) NOT NULL,
                rental_rate DECIMAL(4,2) NOT NULL DEFAULT 4.99,
                last_update TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE TABLE staff (
                staff_id INTEGER PRIMARY KEY,
                first_name VARCHAR(45) NOT NULL,
                last_name VARCHAR(45) NOT NULL,
                store_id INTEGER NOT NULL DEFAULT 1
            );
            INSERT INTO film (film_id, title, rental_rate) VALUES
                (1, 'ACADEMY DINOSAUR', 0.99),
                (2, 'ACE GOLDFINGER', 4.99),
                (3, 'ADAPTATION HOLES', 2.99);
            INSERT INTO staff (staff_id, first_name, last_name) VALUES
                (1, 'Mike', 'Hillyer'),
                (2, 'Jon', 'Stephens');",
        )
        .unwrap();

        Self { dir, path }
    }

    pub fn executor(&self) -> SqliteExecutor {
        SqliteExecutor::new(&self.path)
    }
}
