//! Error types for the NL-to-SQL pipeline.
//!
//! Uses `thiserror` for ergonomic error definitions with automatic `From` implementations.
//!
//! Only conditions that abort a run live here. Expected outcomes of a run
//! (a rejected question, a failed SQL statement, an exhausted repair budget)
//! are modelled as data in [`crate::pipeline::RunOutcome`] and
//! [`crate::database::ExecutionOutcome`].

use crate::llm::LlmError;
use thiserror::Error;

/// Comprehensive error type for all pipeline operations.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Schema index could not be loaded or queried
    #[error("Schema index unavailable: {0}")]
    IndexUnavailable(String),

    /// Embedding generation failed
    #[error("Embedding generation failed: {0}")]
    EmbeddingError(String),

    /// Language model call failed (after rate-limit retries)
    #[error("Language model call failed: {0}")]
    ModelError(#[from] LlmError),

    /// Prompt template slot was empty
    #[error("Missing prompt slot: {0}")]
    MissingSlot(&'static str),

    /// Database value has no JSON representation
    #[error("Unsupported value type: {0}")]
    UnsupportedType(String),

    /// Tabular payload for a modification request could not be parsed
    #[error("Invalid row payload: {0}")]
    InvalidPayload(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// YAML config parse error
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// HTTP client error (for embedding APIs)
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Internal error (should not happen)
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl PipelineError {
    /// Create an index error with context.
    pub fn index(msg: impl Into<String>) -> Self {
        Self::IndexUnavailable(msg.into())
    }

    /// Create a configuration error with context.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Check if error is recoverable.
    ///
    /// # Returns
    ///
    /// `true` if the same request may succeed when retried later
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::ModelError(err) => err.is_rate_limited() || matches!(err, LlmError::Transport(_)),
            Self::HttpError(_) | Self::IndexUnavailable(_) | Self::EmbeddingError(_) => true,
            _ => false,
        }
    }

    /// Natural-language message safe to show to an end user.
    ///
    /// Never includes raw driver or HTTP payloads.
    pub fn user_message(&self) -> String {
        match self {
            Self::IndexUnavailable(_) | Self::EmbeddingError(_) => {
                "The schema catalogue is currently unavailable, so the question cannot be answered right now.".to_string()
            }
            Self::ModelError(err) if err.is_rate_limited() => {
                "Request rate limited. Please try again later.".to_string()
            }
            Self::ModelError(_) => {
                "The language model did not respond. Please try again later.".to_string()
            }
            Self::UnsupportedType(_) => {
                "The query ran, but its results contain values that cannot be displayed.".to_string()
            }
            Self::InvalidPayload(msg) => format!("The supplied rows could not be read: {}", msg),
            Self::MissingSlot("question") => "The question is empty. Please enter a question.".to_string(),
            Self::MissingSlot("schema_context") => {
                "No schema description was found for this question.".to_string()
            }
            Self::MissingSlot("payload") => "No rows were supplied for the modification.".to_string(),
            Self::MissingSlot(_) => "The request could not be prepared for the model.".to_string(),
            Self::ConfigError(msg) => format!("Configuration problem: {}", msg),
            _ => "An unexpected error occurred while answering the question.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = PipelineError::index("collection file missing");
        assert_eq!(err.to_string(), "Schema index unavailable: collection file missing");

        let err = PipelineError::MissingSlot("question");
        assert_eq!(err.to_string(), "Missing prompt slot: question");
    }

    #[test]
    fn test_rate_limit_is_recoverable() {
        let err = PipelineError::from(LlmError::RateLimited("429".to_string()));
        assert!(err.is_recoverable());
        assert_eq!(err.user_message(), "Request rate limited. Please try again later.");

        let err = PipelineError::UnsupportedType("NaN".to_string());
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_missing_slot_message_names_the_slot() {
        assert_eq!(
            PipelineError::MissingSlot("question").user_message(),
            "The question is empty. Please enter a question."
        );
        assert_eq!(
            PipelineError::MissingSlot("payload").user_message(),
            "No rows were supplied for the modification."
        );
        assert_eq!(
            PipelineError::MissingSlot("schema_context").user_message(),
            "No schema description was found for this question."
        );
        assert!(!PipelineError::MissingSlot("error_message").user_message().contains("question is empty"));
    }

    #[test]
    fn test_user_message_hides_details() {
        let err = PipelineError::index("/secret/path/collection.json: permission denied");
        assert!(!err.user_message().contains("/secret"));
    }
}
