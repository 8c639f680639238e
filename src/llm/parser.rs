//! Defensive parsing of model responses.
//!
//! Prompts ask for a fixed output shape, but nothing guarantees the model
//! complies. Everything here accepts arbitrary text.

use serde::Serialize;

/// Marker the repair prompt asks the model to put before its corrected query.
pub const CORRECTED_SQL_MARKER: &str = "**Corrected SQL Query:**";

/// Outcome of asking whether a question can be answered with SQL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationVerdict {
    pub is_valid: bool,
    /// Full model response, shown to the user on rejection
    pub rationale: String,
}

/// Interpret a validation response.
///
/// Valid iff the response contains the case-sensitive substring `True`
/// anywhere. "Not True" therefore counts as valid; "true" does not.
pub fn parse_verdict(response: &str) -> ValidationVerdict {
    ValidationVerdict {
        is_valid: response.contains("True"),
        rationale: response.to_string(),
    }
}

/// What a repair response turned out to contain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum RepairResponse {
    /// Text after the last marker, trimmed and unfenced
    Corrected(String),
    /// No usable query; the whole response explains the failure
    Explanation(String),
}

/// Pull the corrected query out of a repair response.
///
/// Takes everything after the last [`CORRECTED_SQL_MARKER`]. A missing
/// marker, or nothing but whitespace after it, yields
/// [`RepairResponse::Explanation`] carrying the whole response.
pub fn extract_corrected_sql(response: &str) -> RepairResponse {
    let content = response.trim();

    match content.rsplit_once(CORRECTED_SQL_MARKER) {
        Some((_, tail)) => {
            let query = strip_markdown(tail);
            if query.is_empty() {
                RepairResponse::Explanation(content.to_string())
            } else {
                RepairResponse::Corrected(query)
            }
        }
        None => RepairResponse::Explanation(content.to_string()),
    }
}

/// Strip a markdown code fence from a model response.
///
/// Handles:
/// - ```sql ... ```
/// - ``` ... ```
/// - prose followed by a fenced block (the first block wins)
///
/// Text without a fence is returned trimmed.
pub fn strip_markdown(text: &str) -> String {
    let text = text.trim();

    let Some(open) = text.find("```") else {
        return text.to_string();
    };

    let after_fence = &text[open + 3..];
    // Drop the info string ("sql", "SQL", ...) on the opening line
    let body = match after_fence.find('\n') {
        Some(newline) => &after_fence[newline + 1..],
        None if after_fence.to_ascii_lowercase().starts_with("sql")
            && after_fence[3..].starts_with(char::is_whitespace) =>
        {
            &after_fence[3..]
        }
        None => after_fence,
    };

    let inner = match body.find("```") {
        Some(close) => &body[..close],
        None => body,
    };

    inner.trim().to_string()
}

/// Remove every backslash.
///
/// Models escape quotes and underscores (`\_`, `\'`) when they think they are
/// writing markdown; no backslash survives into an executed statement.
pub fn sanitize(sql: &str) -> String {
    sql.replace('\\', "")
}
