//! OpenAI embedding API client.

use crate::embeddings::provider::EmbeddingProvider;
use crate::types::{PipelineError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const EMBEDDINGS_ENDPOINT: &str = "https://api.openai.com/v1/embeddings";

/// OpenAI API embedding request.
#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: serde_json::Value, // String or Vec<String>
}

/// OpenAI API embedding response.
#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

/// OpenAI embedding provider.
pub struct OpenAIEmbedder {
    api_key: String,
    model: String,
    dimensions: usize,
    endpoint: String,
    client: Client,
}

impl OpenAIEmbedder {
    /// Create new OpenAI embedder.
    ///
    /// # Arguments
    ///
    /// * `api_key` - OpenAI API key
    /// * `model` - Model name (e.g., "text-embedding-3-small")
    ///
    /// # Returns
    ///
    /// New `OpenAIEmbedder`
    pub fn new(api_key: String, model: String) -> Self {
        let dimensions = match model.as_str() {
            "text-embedding-3-large" => 3072,
            _ => 1536,
        };

        Self {
            api_key,
            model,
            dimensions,
            endpoint: EMBEDDINGS_ENDPOINT.to_string(),
            client: Client::new(),
        }
    }

    /// Override the API endpoint (proxies, compatible gateways).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Call OpenAI embeddings API.
    async fn call_api(&self, input: serde_json::Value) -> Result<Vec<Vec<f32>>> {
        let request = EmbeddingRequest {
            model: &self.model,
            input,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| PipelineError::EmbeddingError(format!("OpenAI API request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(PipelineError::EmbeddingError(format!(
                "OpenAI API error ({}): {}",
                status, error_text
            )));
        }

        let mut embedding_response: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::EmbeddingError(format!("Failed to parse OpenAI response: {}", e)))?;

        embedding_response.data.sort_by_key(|d| d.index);
        Ok(embedding_response.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embeddings = self.call_api(serde_json::json!(text)).await?;

        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| PipelineError::EmbeddingError("No embedding returned from OpenAI".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        // Schema catalogues are small; one request covers them
        let embeddings = self.call_api(serde_json::json!(texts)).await?;
        if embeddings.len() != texts.len() {
            return Err(PipelineError::EmbeddingError(format!(
                "OpenAI returned {} embeddings for {} inputs",
                embeddings.len(),
                texts.len()
            )));
        }

        Ok(embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> String {
        format!("openai:{}", self.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimensions_by_model() {
        assert_eq!(OpenAIEmbedder::new("k".into(), "text-embedding-3-small".into()).dimensions(), 1536);
        assert_eq!(OpenAIEmbedder::new("k".into(), "text-embedding-3-large".into()).dimensions(), 3072);
    }

    #[tokio::test]
    async fn test_empty_batch_skips_request() {
        let embedder = OpenAIEmbedder::new("k".into(), "text-embedding-3-small".into())
            .with_endpoint("http://127.0.0.1:9/v1/embeddings");
        assert!(embedder.embed_batch(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_embedding_error() {
        let embedder = OpenAIEmbedder::new("k".into(), "text-embedding-3-small".into())
            .with_endpoint("http://127.0.0.1:9/v1/embeddings");
        assert!(matches!(embedder.embed("film").await, Err(PipelineError::EmbeddingError(_))));
    }
}
