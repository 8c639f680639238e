//! Language model client contract and HTTP implementation.

use crate::llm::error::LlmError;
use crate::otel::llm_span;
use crate::types::{PipelineError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

/// Default model, matching the deployed application.
pub const DEFAULT_MODEL: &str = "mistral-medium";

/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = 0.3;

/// Prompt in, text out.
///
/// Implementations wrap exactly one external call per `complete` and must
/// report quota exhaustion as [`LlmError::RateLimited`].
#[async_trait]
pub trait LanguageModelClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> std::result::Result<String, LlmError>;
}

#[async_trait]
impl<T: LanguageModelClient + ?Sized> LanguageModelClient for Arc<T> {
    async fn complete(&self, prompt: &str) -> std::result::Result<String, LlmError> {
        (**self).complete(prompt).await
    }
}

/// LLM provider type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    OpenAI,
    Mistral,
    Anthropic,
}

impl LlmProvider {
    /// Pick a provider from the model name.
    ///
    /// # Examples
    ///
    /// - "mistral-medium" → Mistral
    /// - "claude-3-5-sonnet-20241022" → Anthropic
    /// - "gpt-4o-mini" → OpenAI
    pub fn from_model(model: &str) -> Self {
        if model.starts_with("claude") || model.starts_with("anthropic") {
            Self::Anthropic
        } else if model.starts_with("mistral")
            || model.starts_with("open-mistral")
            || model.starts_with("codestral")
        {
            Self::Mistral
        } else {
            Self::OpenAI
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAI => "openai",
            Self::Mistral => "mistral",
            Self::Anthropic => "anthropic",
        }
    }

    /// Environment variable holding the API key.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            Self::OpenAI => "OPENAI_API_KEY",
            Self::Mistral => "MISTRAL_API_KEY",
            Self::Anthropic => "ANTHROPIC_API_KEY",
        }
    }

    fn default_endpoint(&self) -> &'static str {
        match self {
            Self::OpenAI => "https://api.openai.com/v1/chat/completions",
            Self::Mistral => "https://api.mistral.ai/v1/chat/completions",
            Self::Anthropic => "https://api.anthropic.com/v1/messages",
        }
    }
}

/// OpenAI-compatible chat completion response (OpenAI and Mistral).
#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

/// Anthropic API response.
#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
}

/// Content block. Only `text` blocks carry text; `tool_use`, `thinking`
/// and other block types leave it empty.
#[derive(Debug, Deserialize)]
struct AnthropicContent {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

impl AnthropicResponse {
    /// Text of the first text block.
    fn first_text(self) -> Option<String> {
        self.content
            .into_iter()
            .filter(|block| block.kind.is_empty() || block.kind == "text")
            .find_map(|block| block.text)
    }
}

/// Chat completion client over HTTP.
pub struct HttpLlmClient {
    api_key: String,
    model: String,
    provider: LlmProvider,
    temperature: f32,
    endpoint: String,
    client: Client,
}

impl HttpLlmClient {
    /// Create new client.
    ///
    /// # Arguments
    ///
    /// * `api_key` - API key for the provider implied by `model`
    /// * `model` - Model name (e.g., "mistral-medium", "gpt-4o-mini", "claude-3-5-sonnet-20241022")
    ///
    /// # Returns
    ///
    /// New `HttpLlmClient` with default temperature and no request timeout
    pub fn new(api_key: String, model: String) -> Self {
        let provider = LlmProvider::from_model(&model);
        Self {
            api_key,
            model,
            provider,
            temperature: DEFAULT_TEMPERATURE,
            endpoint: provider.default_endpoint().to_string(),
            client: Client::new(),
        }
    }

    /// Create from environment variables.
    ///
    /// Uses `P8_DEFAULT_LLM` for model (default: "mistral-medium") and the
    /// provider's key variable (`MISTRAL_API_KEY`, `OPENAI_API_KEY` or
    /// `ANTHROPIC_API_KEY`).
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::ConfigError` if the API key is not set
    pub fn from_env() -> Result<Self> {
        let model = std::env::var("P8_DEFAULT_LLM").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let env = LlmProvider::from_model(&model).api_key_env();
        let api_key = std::env::var(env)
            .map_err(|_| PipelineError::config(format!("{} environment variable not set", env)))?;

        Ok(Self::new(api_key, model))
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Override the provider endpoint (proxies, self-hosted gateways).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Apply a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::HttpError` if the HTTP client cannot be built
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = Client::builder().timeout(timeout).build()?;
        Ok(self)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn provider(&self) -> LlmProvider {
        self.provider
    }

    /// Call an OpenAI-compatible chat endpoint (OpenAI, Mistral).
    async fn call_chat(&self, prompt: &str) -> std::result::Result<String, LlmError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&json!({
                "model": self.model,
                "messages": [
                    {"role": "user", "content": prompt}
                ],
                "temperature": self.temperature
            }))
            .send()
            .await?;

        let body = Self::read_body(response).await?;

        let parsed: ChatResponse = serde_json::from_str(&body).map_err(|e| {
            LlmError::InvalidResponse(format!("Failed to parse {} response: {}", self.provider.as_str(), e))
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| LlmError::InvalidResponse(format!("No response from {}", self.provider.as_str())))
    }

    /// Call Anthropic API.
    async fn call_anthropic(&self, prompt: &str) -> std::result::Result<String, LlmError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("Content-Type", "application/json")
            .json(&json!({
                "model": self.model,
                "max_tokens": 4096,
                "messages": [
                    {"role": "user", "content": prompt}
                ],
                "temperature": self.temperature
            }))
            .send()
            .await?;

        let body = Self::read_body(response).await?;

        let parsed: AnthropicResponse = serde_json::from_str(&body)
            .map_err(|e| LlmError::InvalidResponse(format!("Failed to parse Anthropic response: {}", e)))?;

        parsed
            .first_text()
            .ok_or_else(|| LlmError::InvalidResponse("No text content in Anthropic response".to_string()))
    }

    /// Read the body, mapping non-success statuses to errors.
    async fn read_body(response: reqwest::Response) -> std::result::Result<String, LlmError> {
        let status = response.status();
        tracing::Span::current().record("http.response.status_code", status.as_u16());

        let body = response.text().await?;

        if !status.is_success() {
            return Err(LlmError::from_status(status.as_u16(), body));
        }

        Ok(body)
    }
}

#[async_trait]
impl LanguageModelClient for HttpLlmClient {
    async fn complete(&self, prompt: &str) -> std::result::Result<String, LlmError> {
        let span = llm_span(self.provider.as_str(), &self.model);

        let result = match self.provider {
            LlmProvider::OpenAI | LlmProvider::Mistral => self.call_chat(prompt).instrument(span.clone()).await,
            LlmProvider::Anthropic => self.call_anthropic(prompt).instrument(span.clone()).await,
        };

        span.in_scope(|| match &result {
            Ok(text) => tracing::debug!(chars = text.len(), "Model response received"),
            Err(e) => tracing::warn!(error = %e, "Model call failed"),
        });
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_from_model() {
        assert_eq!(LlmProvider::from_model("mistral-medium"), LlmProvider::Mistral);
        assert_eq!(LlmProvider::from_model("claude-3-5-sonnet-20241022"), LlmProvider::Anthropic);
        assert_eq!(LlmProvider::from_model("gpt-4o-mini"), LlmProvider::OpenAI);
    }

    #[test]
    fn test_api_key_env() {
        assert_eq!(LlmProvider::Mistral.api_key_env(), "MISTRAL_API_KEY");
        assert_eq!(LlmProvider::Anthropic.api_key_env(), "ANTHROPIC_API_KEY");
    }

    #[test]
    fn test_new_uses_provider_endpoint() {
        let client = HttpLlmClient::new("key".into(), "mistral-medium".into());
        assert_eq!(client.provider(), LlmProvider::Mistral);
        assert_eq!(client.endpoint, "https://api.mistral.ai/v1/chat/completions");

        let client = client.with_endpoint("http://localhost:9999/v1/chat/completions");
        assert_eq!(client.endpoint, "http://localhost:9999/v1/chat/completions");
    }

    #[test]
    fn test_anthropic_response_skips_non_text_blocks() {
        let body = r#"{
            "content": [
                {"type": "thinking", "thinking": "The film table has a title column."},
                {"type": "tool_use", "id": "toolu_01", "name": "lookup", "input": {}},
                {"type": "text", "text": "SELECT title FROM film"},
                {"type": "text", "text": "second block"}
            ]
        }"#;
        let parsed: AnthropicResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.first_text().as_deref(), Some("SELECT title FROM film"));

        let body = r#"{"content": [{"type": "tool_use", "id": "toolu_01", "name": "lookup", "input": {}}]}"#;
        let parsed: AnthropicResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.first_text(), None);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_error() {
        let client = HttpLlmClient::new("key".into(), "gpt-4o-mini".into())
            .with_endpoint("http://127.0.0.1:9/v1/chat/completions")
            .with_timeout(Duration::from_secs(2))
            .unwrap();

        let err = client.complete("hello").await.unwrap_err();
        assert!(matches!(err, LlmError::Transport(_)));
    }
}
