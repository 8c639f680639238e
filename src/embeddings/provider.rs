//! Embedding provider trait and factory.

use crate::embeddings::hash::HashEmbedder;
use crate::embeddings::local::LocalEmbedder;
use crate::embeddings::openai::OpenAIEmbedder;
use crate::types::{PipelineError, Result};
use async_trait::async_trait;

/// Embedding provider trait.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embedding for single text.
    ///
    /// # Arguments
    ///
    /// * `text` - Input text
    ///
    /// # Returns
    ///
    /// Embedding vector
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::EmbeddingError` if generation fails
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for batch of texts.
    ///
    /// # Arguments
    ///
    /// * `texts` - Input texts
    ///
    /// # Returns
    ///
    /// Embedding vectors, one per input, in input order
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::EmbeddingError` if generation fails
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Get embedding dimensionality.
    fn dimensions(&self) -> usize;

    /// Provider config string this provider was created from.
    ///
    /// Stored in collection files so a collection is never queried with
    /// vectors from a different model.
    fn name(&self) -> String;
}

/// Factory for creating embedding providers.
pub struct ProviderFactory;

impl ProviderFactory {
    /// Create provider from config string.
    ///
    /// # Arguments
    ///
    /// * `config` - Provider config (e.g., "local:sentence-transformers/all-MiniLM-L6-v2",
    ///   "openai:text-embedding-3-small", "hash:256"). A bare `text-embedding-*` model
    ///   name is treated as OpenAI, and bare `local` loads the default MiniLM model.
    ///
    /// # Returns
    ///
    /// Box of embedding provider
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::ConfigError` if config is invalid or
    /// `OPENAI_API_KEY` is missing for an OpenAI model, and
    /// `PipelineError::EmbeddingError` if a local model fails to load
    pub fn create(config: &str) -> Result<Box<dyn EmbeddingProvider>> {
        let config = config.trim();
        let (kind, arg) = match config.split_once(':') {
            Some((kind, arg)) => (kind, arg),
            None if config.starts_with("text-embedding-") => ("openai", config),
            None => (config, ""),
        };

        match kind {
            "local" => {
                let model = if arg.is_empty() { LocalEmbedder::DEFAULT_MODEL } else { arg };
                Ok(Box::new(LocalEmbedder::new(model)?))
            }
            "openai" => {
                if arg.is_empty() {
                    return Err(PipelineError::config("openai provider requires a model name"));
                }
                let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
                    PipelineError::config("OPENAI_API_KEY environment variable required for OpenAI models")
                })?;
                Ok(Box::new(OpenAIEmbedder::new(api_key, arg.to_string())))
            }
            "hash" => {
                let dims = if arg.is_empty() {
                    HashEmbedder::DEFAULT_DIMENSIONS
                } else {
                    arg.parse::<usize>()
                        .map_err(|_| PipelineError::config(format!("Invalid hash dimensions: {}", arg)))?
                };
                if dims == 0 {
                    return Err(PipelineError::config("hash dimensions must be positive"));
                }
                Ok(Box::new(HashEmbedder::new(dims)))
            }
            other => Err(PipelineError::config(format!("Unknown embedding provider: {}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_hash_provider() {
        let provider = ProviderFactory::create("hash:64").unwrap();
        assert_eq!(provider.dimensions(), 64);
        assert_eq!(provider.name(), "hash:64");

        let provider = ProviderFactory::create("hash").unwrap();
        assert_eq!(provider.dimensions(), HashEmbedder::DEFAULT_DIMENSIONS);
    }

    #[test]
    fn test_create_rejects_bad_config() {
        assert!(matches!(ProviderFactory::create("hash:abc"), Err(PipelineError::ConfigError(_))));
        assert!(matches!(ProviderFactory::create("hash:0"), Err(PipelineError::ConfigError(_))));
        assert!(matches!(ProviderFactory::create("fastembed:minilm"), Err(PipelineError::ConfigError(_))));
        assert!(matches!(ProviderFactory::create("openai:"), Err(PipelineError::ConfigError(_))));
    }
}
