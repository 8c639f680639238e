//! Rate-limit retry decorator.

use crate::llm::client::LanguageModelClient;
use crate::llm::error::LlmError;
use async_trait::async_trait;
use std::time::Duration;

/// Default number of calls made before a rate limit is surfaced.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default wait between rate-limited calls.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Retries a wrapped client while it reports [`LlmError::RateLimited`].
///
/// Every other error (and the final rate limit once attempts run out) is
/// returned unchanged. This is independent of SQL repair: waiting out a quota
/// never counts as a repair attempt.
pub struct RateLimitRetry<C> {
    inner: C,
    max_attempts: u32,
    delay: Duration,
}

impl<C> RateLimitRetry<C> {
    /// Wrap a client.
    ///
    /// # Arguments
    ///
    /// * `inner` - Client to call
    /// * `max_attempts` - Total calls per `complete`, including the first (minimum 1)
    /// * `delay` - Fixed wait after each rate-limited call
    pub fn new(inner: C, max_attempts: u32, delay: Duration) -> Self {
        Self {
            inner,
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Wrap a client with the default policy (3 attempts, 5 s apart).
    pub fn with_defaults(inner: C) -> Self {
        Self::new(inner, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY)
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

#[async_trait]
impl<C: LanguageModelClient> LanguageModelClient for RateLimitRetry<C> {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let mut attempt = 1;

        loop {
            match self.inner.complete(prompt).await {
                Err(err) if err.is_rate_limited() && attempt < self.max_attempts => {
                    tracing::warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = self.delay.as_millis() as u64,
                        "Model call rate limited, waiting before retry"
                    );
                    tokio::time::sleep(self.delay).await;
                    attempt += 1;
                }
                Err(err) if err.is_rate_limited() => {
                    tracing::error!(attempts = attempt, "Rate limit persisted after all retries");
                    return Err(err);
                }
                other => return other,
            }
        }
    }
}
