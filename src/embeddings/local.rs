//! Local sentence-transformer embeddings via embed_anything.
//!
//! Models are downloaded from the Hugging Face hub on first use and cached
//! under `~/.p8/models` unless `HF_HOME` is already set.

use crate::config::expand_path;
use crate::embeddings::provider::EmbeddingProvider;
use crate::types::{PipelineError, Result};
use async_trait::async_trait;
use embed_anything::embed_query;
use embed_anything::embeddings::embed::{Embedder, TextEmbedder};
use embed_anything::embeddings::local::bert::BertEmbedder;
use std::sync::Arc;

const MODEL_CACHE_DIR: &str = "~/.p8/models";

/// Local BERT-family embedder.
pub struct LocalEmbedder {
    embedder: Arc<Embedder>,
    model: String,
    dimensions: usize,
}

impl LocalEmbedder {
    pub const DEFAULT_MODEL: &'static str = "sentence-transformers/all-MiniLM-L6-v2";

    /// Load a model by Hugging Face id.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::EmbeddingError` if the model cannot be downloaded or loaded
    pub fn new(model: &str) -> Result<Self> {
        if std::env::var("HF_HOME").is_err() {
            let cache_dir = expand_path(MODEL_CACHE_DIR);
            std::fs::create_dir_all(&cache_dir)
                .map_err(|e| PipelineError::EmbeddingError(format!("Failed to create model cache: {}", e)))?;
            std::env::set_var("HF_HOME", cache_dir);
        }

        let bert = BertEmbedder::new(model.to_string(), None, None)
            .map_err(|e| PipelineError::EmbeddingError(format!("Failed to load model {}: {}", model, e)))?;

        tracing::debug!(model, "Loaded local embedding model");

        Ok(Self {
            embedder: Arc::new(Embedder::Text(TextEmbedder::Bert(Box::new(bert)))),
            model: model.to_string(),
            dimensions: Self::known_dimensions(model),
        })
    }

    /// Output width for known sentence-transformer models.
    pub fn known_dimensions(model: &str) -> usize {
        let model = model.to_ascii_lowercase();
        if model.contains("mpnet") || model.contains("bge-base") || model.contains("e5-base") {
            768
        } else if model.contains("bge-large") || model.contains("e5-large") {
            1024
        } else {
            // MiniLM, bge-small, e5-small
            384
        }
    }
}

#[async_trait]
impl EmbeddingProvider for LocalEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| PipelineError::EmbeddingError("No embedding generated".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let text_refs: Vec<&str> = texts.iter().map(|s| s.as_str()).collect();
        let embeddings = embed_query(&text_refs, &self.embedder, None)
            .await
            .map_err(|e| PipelineError::EmbeddingError(format!("Embedding failed: {}", e)))?;

        let vectors = embeddings
            .into_iter()
            .map(|emb| {
                emb.embedding
                    .to_dense()
                    .map_err(|e| PipelineError::EmbeddingError(format!("Dense conversion failed: {}", e)))
            })
            .collect::<Result<Vec<_>>>()?;

        if vectors.len() != texts.len() {
            return Err(PipelineError::EmbeddingError(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                vectors.len()
            )));
        }
        if let Some(v) = vectors.iter().find(|v| v.len() != self.dimensions) {
            return Err(PipelineError::EmbeddingError(format!(
                "Model {} returned {} dimensions, expected {}",
                self.model,
                v.len(),
                self.dimensions
            )));
        }

        Ok(vectors)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> String {
        format!("local:{}", self.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_dimensions() {
        assert_eq!(LocalEmbedder::known_dimensions(LocalEmbedder::DEFAULT_MODEL), 384);
        assert_eq!(LocalEmbedder::known_dimensions("BAAI/bge-small-en-v1.5"), 384);
        assert_eq!(LocalEmbedder::known_dimensions("sentence-transformers/all-mpnet-base-v2"), 768);
        assert_eq!(LocalEmbedder::known_dimensions("BAAI/bge-large-en-v1.5"), 1024);
    }

    #[tokio::test]
    #[ignore] // Downloads all-MiniLM-L6-v2 on first run
    async fn test_local_model_embeddings() {
        let embedder = LocalEmbedder::new(LocalEmbedder::DEFAULT_MODEL).unwrap();
        assert_eq!(embedder.name(), "local:sentence-transformers/all-MiniLM-L6-v2");

        let texts = vec![
            "Table: film. Films available for rent".to_string(),
            "Table: staff. Store employees".to_string(),
        ];
        let vectors = embedder.embed_batch(&texts).await.unwrap();
        assert_eq!(vectors.len(), 2);
        assert!(vectors.iter().all(|v| v.len() == 384));

        let query = embedder.embed("which movies can be rented").await.unwrap();
        let dot = |a: &[f32], b: &[f32]| a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>();
        assert!(dot(&query, &vectors[0]) > dot(&query, &vectors[1]));
    }
}
