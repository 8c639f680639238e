//! Prompt templates for every model-facing stage.
//!
//! Each composer is a pure function: slots in, prompt text out. A required
//! slot that is empty (or only whitespace) is an error, except the original
//! question in [`repair_prompt`], which degrades to an empty string so a lost
//! question never aborts a repair.

use crate::llm::parser::CORRECTED_SQL_MARKER;
use crate::types::PipelineError;
use thiserror::Error;

/// Maximum rows a generated read query should return unless the question
/// asks for a specific number.
pub const DEFAULT_ROW_LIMIT: usize = 30;

/// Prompt composition error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PromptError {
    #[error("Missing prompt slot: {0}")]
    MissingSlot(&'static str),
}

impl From<PromptError> for PipelineError {
    fn from(err: PromptError) -> Self {
        match err {
            PromptError::MissingSlot(slot) => PipelineError::MissingSlot(slot),
        }
    }
}

fn require<'a>(slot: &'static str, value: &'a str) -> Result<&'a str, PromptError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(PromptError::MissingSlot(slot))
    } else {
        Ok(trimmed)
    }
}

/// Ask whether a question can be answered from the database.
///
/// The response is interpreted by [`crate::llm::parse_verdict`].
pub fn validation_prompt(question: &str) -> Result<String, PromptError> {
    let question = require("question", question)?;

    Ok(format!(
        r#"
    You are a gatekeeper for a SQL assistant over a DVD rental database. The database holds films, actors, film categories and languages, customers and their addresses, rentals, payments, inventory, staff and stores.

    Decide whether the question below can be answered by running a SQL query against this database.

    Question:
    {question}

    Return only True or False, followed by one sentence explaining the decision.
    "#
    ))
}

/// Ask for a single SQL statement answering a question.
///
/// # Arguments
///
/// * `schema_context` - Retrieved schema fragments, closest first, already joined
/// * `question` - Natural language question
pub fn generation_prompt(schema_context: &str, question: &str) -> Result<String, PromptError> {
    let schema_context = require("schema_context", schema_context)?;
    let question = require("question", question)?;

    Ok(format!(
        r#"
    You are an expert SQL Generator. Based on the provided database schema information, generate only One syntactically correct SQL query to answer the following question. Ensure that your query uses only the relevant tables and columns based on the schema information provided. The query should be limited to at most {DEFAULT_ROW_LIMIT} results unless the question specifies a different number.
    Return only the SQL query, with no explanation.

    Schema Information:
    {schema_context}

    Question:
    {question}

    SQL Query:
    "#
    ))
}

/// Ask the model to fix a failed statement.
///
/// # Arguments
///
/// * `original_question` - Question that started the run; `None` renders as empty
/// * `failed_query` - Statement exactly as executed
/// * `error_message` - Database error text, embedded verbatim
///
/// # Errors
///
/// `MissingSlot` if `failed_query` or `error_message` is empty
pub fn repair_prompt(
    original_question: Option<&str>,
    failed_query: &str,
    error_message: &str,
) -> Result<String, PromptError> {
    let failed_query = require("failed_query", failed_query)?;
    let error_message = require("error_message", error_message)?;
    let original_question = original_question.map(str::trim).unwrap_or("");

    Ok(format!(
        r#"
    You are an expert in SQL query generation. The following SQL query has encountered an error.

    **Original Question:**
    {original_question}

    **Failed SQL Query:**
    {failed_query}

    **Error Message:**
    {error_message}

    Carefully analyze the error and modify the query to fix the issue while maintaining the intent of the original question.
    Strictly specify {CORRECTED_SQL_MARKER} before giving the corrected query.
    {CORRECTED_SQL_MARKER}
    "#
    ))
}

/// Ask for a natural-language interpretation of a result.
///
/// # Arguments
///
/// * `question` - Original question
/// * `sql_query` - Statement that produced the result
/// * `result` - Rendered rows, or the mutation status
/// * `columns` - Column names in result order (empty for mutations)
pub fn insight_prompt(
    question: &str,
    sql_query: &str,
    result: &str,
    columns: &[String],
) -> Result<String, PromptError> {
    let question = require("question", question)?;
    let sql_query = require("sql_query", sql_query)?;
    let columns = if columns.is_empty() {
        "(none)".to_string()
    } else {
        columns.join(", ")
    };

    Ok(format!(
        r#"
    You are an excellent data analyst. Based on the following information, analyze the question, the generated SQL query, and the results obtained from the database. Provide an interpretation of the results ONLY and give a detailed explanation in the format below.

    Question: {question}
    SQL Query: {sql_query}
    Columns: {columns}
    Results from Database: {result}

    Interpretation:
    "#
    ))
}

/// Ask for an INSERT/UPDATE/DELETE statement applying tabular rows.
///
/// # Arguments
///
/// * `schema_context` - Retrieved schema fragments
/// * `question` - What to do with the rows ("insert the following data into the staff table")
/// * `payload` - Rows as CSV text, header first
pub fn modification_prompt(schema_context: &str, question: &str, payload: &str) -> Result<String, PromptError> {
    let schema_context = require("schema_context", schema_context)?;
    let question = require("question", question)?;
    let payload = require("payload", payload)?;

    Ok(format!(
        r#"
    You are an expert SQL Generator. Based on the provided database schema information, generate syntactically correct SQL statements that carry out the request below using the supplied rows. Use only tables and columns present in the schema information. Map each supplied column to the matching table column, quote text values, and supply values for required columns that the rows do not provide only when the schema gives a default.
    Return only the SQL, with no explanation.

    Schema Information:
    {schema_context}

    Request:
    {question}

    Rows (CSV, first line is the header):
    {payload}

    SQL Query:
    "#
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_prompt() {
        let prompt = validation_prompt("How many films are there?").unwrap();
        assert!(prompt.contains("How many films are there?"));
        assert!(prompt.contains("Return only True or False"));
    }

    #[test]
    fn test_empty_question_is_missing_slot() {
        assert_eq!(validation_prompt("   "), Err(PromptError::MissingSlot("question")));
        assert_eq!(
            generation_prompt("Table: film", ""),
            Err(PromptError::MissingSlot("question"))
        );
        assert_eq!(
            generation_prompt("", "How many films?"),
            Err(PromptError::MissingSlot("schema_context"))
        );
    }

    #[test]
    fn test_generation_prompt_row_limit() {
        let prompt = generation_prompt("Table: film\nInfo: ...", "List films").unwrap();
        assert!(prompt.contains("at most 30 results"));
        assert!(prompt.contains("Table: film"));
    }

    #[test]
    fn test_repair_prompt_carries_marker_and_error() {
        let prompt = repair_prompt(
            Some("How many films?"),
            "SELECT count(*) FROM films",
            "SQLite error: no such table: films",
        )
        .unwrap();

        assert!(prompt.contains("How many films?"));
        assert!(prompt.contains("SELECT count(*) FROM films"));
        assert!(prompt.contains("SQLite error: no such table: films"));
        assert_eq!(prompt.matches(CORRECTED_SQL_MARKER).count(), 2);
    }

    #[test]
    fn test_repair_prompt_without_question_degrades() {
        let prompt = repair_prompt(None, "SELECT 1", "boom").unwrap();
        assert!(prompt.contains("**Original Question:**\n    \n"));

        assert_eq!(
            repair_prompt(Some("q"), "SELECT 1", " "),
            Err(PromptError::MissingSlot("error_message"))
        );
    }

    #[test]
    fn test_insight_prompt_columns() {
        let columns = vec!["title".to_string(), "length".to_string()];
        let prompt = insight_prompt("Longest films?", "SELECT title, length FROM film", "[]", &columns).unwrap();
        assert!(prompt.contains("Columns: title, length"));

        let prompt = insight_prompt("Add staff", "INSERT ...", "Query executed successfully.", &[]).unwrap();
        assert!(prompt.contains("Columns: (none)"));
    }

    #[test]
    fn test_modification_prompt_requires_payload() {
        assert_eq!(
            modification_prompt("Table: staff", "insert rows", ""),
            Err(PromptError::MissingSlot("payload"))
        );

        let prompt = modification_prompt("Table: staff", "insert rows", "first_name\nAda").unwrap();
        assert!(prompt.contains("first_name\nAda"));
    }

    #[test]
    fn test_missing_slot_converts() {
        let err: PipelineError = PromptError::MissingSlot("question").into();
        assert!(matches!(err, PipelineError::MissingSlot("question")));
    }
}
