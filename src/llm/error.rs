//! Language model call errors.

use thiserror::Error;

/// Failure of a single language model call.
///
/// `RateLimited` is kept apart from every other failure: it is the only
/// condition [`crate::llm::RateLimitRetry`] waits out and retries.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    /// Provider quota exceeded (HTTP 429)
    #[error("Rate limited by provider: {0}")]
    RateLimited(String),

    /// Provider returned a non-success status
    #[error("Provider API error {status}: {body}")]
    Api { status: u16, body: String },

    /// Request never completed (DNS, TLS, timeout, connection reset)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Response body did not have the expected shape
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl LlmError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited(_))
    }

    /// Map an HTTP status and body to an error.
    ///
    /// # Arguments
    ///
    /// * `status` - HTTP status code (non-success)
    /// * `body` - Response body text
    pub fn from_status(status: u16, body: String) -> Self {
        if status == 429 {
            Self::RateLimited(body)
        } else {
            Self::Api { status, body }
        }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) if status.as_u16() == 429 => Self::RateLimited(err.to_string()),
            _ => Self::Transport(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status() {
        assert!(LlmError::from_status(429, "slow down".into()).is_rate_limited());

        let err = LlmError::from_status(500, "boom".into());
        assert!(!err.is_rate_limited());
        assert_eq!(err.to_string(), "Provider API error 500: boom");
    }
}
