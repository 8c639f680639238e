//! HNSW index over schema descriptions.
//!
//! A [`SchemaCollection`] is the persisted form: every chunk with its
//! embedding plus the provider that produced them, stored as JSON. The HNSW
//! graph is rebuilt from it on open; catalogues are a few dozen entries, so
//! this takes milliseconds and keeps the file format trivial.

use crate::embeddings::EmbeddingProvider;
use crate::otel::{index_job_span, record_index_job, IndexJobType};
use crate::schema::{SchemaEntry, TableKind};
use crate::types::{PipelineError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use instant_distance::{Builder, HnswMap, Point, Search};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::Instrument;

/// Fixed seed so repeated opens build the same graph.
const HNSW_SEED: u64 = 0x5eed_5c4e;

/// Default number of chunks returned per question.
pub const DEFAULT_TOP_N: usize = 5;

/// Embedded table or view description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaChunk {
    pub id: String,
    pub name: String,
    pub kind: TableKind,
    pub text: String,
    pub embedding: Vec<f32>,
}

/// Persisted set of embedded schema chunks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaCollection {
    pub name: String,
    /// Provider config string (e.g. "hash:256", "openai:text-embedding-3-small")
    pub provider: String,
    pub dimensions: usize,
    pub created_at: DateTime<Utc>,
    pub chunks: Vec<SchemaChunk>,
}

impl SchemaCollection {
    /// Embed schema entries into a new collection.
    ///
    /// # Arguments
    ///
    /// * `name` - Collection name
    /// * `entries` - Descriptions to embed
    /// * `embedder` - Provider used now and for every later query
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::EmbeddingError` if embedding fails or returns
    /// vectors of the wrong size
    pub async fn build(name: &str, entries: Vec<SchemaEntry>, embedder: &dyn EmbeddingProvider) -> Result<Self> {
        let span = index_job_span(IndexJobType::EmbeddingGeneration, name);
        let result = Self::embed_entries(name, entries, embedder).instrument(span.clone()).await;

        span.in_scope(|| match &result {
            Ok(collection) => {
                record_index_job(Some(collection.chunks.len()), "success");
                tracing::info!(collection = name, chunks = collection.chunks.len(), "Embedded schema collection");
            }
            Err(e) => {
                record_index_job(None, "failed");
                tracing::error!(collection = name, error = %e, "Schema embedding failed");
            }
        });
        result
    }

    async fn embed_entries(name: &str, entries: Vec<SchemaEntry>, embedder: &dyn EmbeddingProvider) -> Result<Self> {
        let texts: Vec<String> = entries.iter().map(|e| e.text.clone()).collect();
        let embeddings = embedder.embed_batch(&texts).await?;

        if embeddings.len() != entries.len() {
            return Err(PipelineError::EmbeddingError(format!(
                "Expected {} embeddings, got {}",
                entries.len(),
                embeddings.len()
            )));
        }

        let dimensions = embedder.dimensions();
        let chunks = entries
            .into_iter()
            .zip(embeddings)
            .map(|(entry, embedding)| {
                if embedding.len() != dimensions {
                    return Err(PipelineError::EmbeddingError(format!(
                        "Embedding for '{}' has {} dimensions, expected {}",
                        entry.id,
                        embedding.len(),
                        dimensions
                    )));
                }
                Ok(SchemaChunk {
                    id: entry.id,
                    name: entry.name,
                    kind: entry.kind,
                    text: entry.text,
                    embedding,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            name: name.to_string(),
            provider: embedder.name(),
            dimensions,
            created_at: Utc::now(),
            chunks,
        })
    }

    /// Read a collection file.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::IndexUnavailable` if the file is missing or malformed
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .map_err(|e| PipelineError::index(format!("Cannot read {}: {}", path.display(), e)))?;

        serde_json::from_slice(&bytes)
            .map_err(|e| PipelineError::index(format!("Malformed collection {}: {}", path.display(), e)))
    }

    /// Write the collection as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }
}

/// Embedding wrapped for HNSW with cosine distance.
#[derive(Debug, Clone)]
struct EmbeddingPoint(Vec<f32>);

impl Point for EmbeddingPoint {
    fn distance(&self, other: &Self) -> f32 {
        cosine_distance(&self.0, &other.0)
    }
}

/// `1 - cos(a, b)`; zero vectors are at distance 1 from everything.
fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let (mut dot, mut norm_a, mut norm_b) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// One search result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub id: String,
    pub name: String,
    pub kind: TableKind,
    pub text: String,
    pub distance: f32,
}

/// Source of schema context for a question.
#[async_trait]
pub trait SchemaRetriever: Send + Sync {
    /// Return up to `top_n` chunk texts, closest first.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::IndexUnavailable` if the index or its embedder
    /// cannot be used
    async fn retrieve(&self, query: &str, top_n: usize) -> Result<Vec<String>>;
}

/// Searchable schema index.
pub struct SchemaIndex {
    collection: SchemaCollection,
    map: HnswMap<EmbeddingPoint, usize>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl SchemaIndex {
    /// Build the HNSW graph for a collection.
    ///
    /// # Arguments
    ///
    /// * `collection` - Embedded chunks
    /// * `embedder` - Must be the provider the collection was built with
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::IndexUnavailable` if the collection is empty,
    /// was built by another provider, or holds vectors of the wrong size
    pub fn new(collection: SchemaCollection, embedder: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        if collection.chunks.is_empty() {
            return Err(PipelineError::index(format!("Collection '{}' has no chunks", collection.name)));
        }

        let provider = embedder.name();
        if provider != collection.provider || embedder.dimensions() != collection.dimensions {
            return Err(PipelineError::index(format!(
                "Collection '{}' was built with {} ({} dims) but the configured embedder is {} ({} dims)",
                collection.name,
                collection.provider,
                collection.dimensions,
                provider,
                embedder.dimensions()
            )));
        }

        if let Some(bad) = collection
            .chunks
            .iter()
            .find(|c| c.embedding.len() != collection.dimensions)
        {
            return Err(PipelineError::index(format!(
                "Chunk '{}' has {} dimensions, expected {}",
                bad.id,
                bad.embedding.len(),
                collection.dimensions
            )));
        }

        let points: Vec<EmbeddingPoint> = collection
            .chunks
            .iter()
            .map(|c| EmbeddingPoint(c.embedding.clone()))
            .collect();
        let values: Vec<usize> = (0..points.len()).collect();
        let map = Builder::default().seed(HNSW_SEED).build(points, values);

        Ok(Self {
            collection,
            map,
            embedder,
        })
    }

    /// Load a collection file and build its graph.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::IndexUnavailable` on any load or validation failure
    pub fn open(path: &Path, embedder: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        let span = index_job_span(IndexJobType::IndexLoad, &path.display().to_string());
        let _guard = span.enter();

        let result = SchemaCollection::load(path).and_then(|c| Self::new(c, embedder));
        match &result {
            Ok(index) => {
                record_index_job(Some(index.len()), "success");
                tracing::info!(path = %path.display(), chunks = index.len(), "Schema index loaded");
            }
            Err(e) => {
                record_index_job(None, "failed");
                tracing::error!(path = %path.display(), error = %e, "Schema index unavailable");
            }
        }
        result
    }

    /// Embed the built-in catalogue, persist it, and open it.
    ///
    /// # Arguments
    ///
    /// * `path` - Collection file to write
    /// * `name` - Collection name
    /// * `entries` - Schema descriptions
    /// * `embedder` - Embedding provider
    pub async fn build(
        path: &Path,
        name: &str,
        entries: Vec<SchemaEntry>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        let span = index_job_span(IndexJobType::IndexBuild, name);
        let collection = SchemaCollection::build(name, entries, embedder.as_ref())
            .instrument(span.clone())
            .await?;

        collection.save(path)?;
        span.in_scope(|| tracing::info!(path = %path.display(), "Schema collection written"));

        Self::new(collection, embedder)
    }

    pub fn len(&self) -> usize {
        self.collection.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collection.chunks.is_empty()
    }

    pub fn collection(&self) -> &SchemaCollection {
        &self.collection
    }

    /// Nearest chunks to a query.
    ///
    /// # Arguments
    ///
    /// * `query` - Free text (usually the question)
    /// * `top_n` - Maximum hits
    ///
    /// # Returns
    ///
    /// Hits ordered by ascending cosine distance
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::IndexUnavailable` if the embedder fails
    pub async fn search(&self, query: &str, top_n: usize) -> Result<Vec<SearchHit>> {
        if top_n == 0 {
            return Ok(Vec::new());
        }

        let embedding = self
            .embedder
            .embed(query)
            .await
            .map_err(|e| PipelineError::index(format!("Query embedding failed: {}", e)))?;

        if embedding.len() != self.collection.dimensions {
            return Err(PipelineError::index(format!(
                "Query embedding has {} dimensions, expected {}",
                embedding.len(),
                self.collection.dimensions
            )));
        }

        let point = EmbeddingPoint(embedding);
        let mut search = Search::default();
        let hits = self
            .map
            .search(&point, &mut search)
            .take(top_n)
            .filter_map(|item| {
                self.collection.chunks.get(*item.value).map(|chunk| SearchHit {
                    id: chunk.id.clone(),
                    name: chunk.name.clone(),
                    kind: chunk.kind,
                    text: chunk.text.clone(),
                    distance: item.distance,
                })
            })
            .collect();

        Ok(hits)
    }
}

#[async_trait]
impl SchemaRetriever for SchemaIndex {
    async fn retrieve(&self, query: &str, top_n: usize) -> Result<Vec<String>> {
        let hits = self.search(query, top_n).await?;
        tracing::debug!(
            tables = ?hits.iter().map(|h| h.name.as_str()).collect::<Vec<_>>(),
            "Retrieved schema context"
        );
        Ok(hits.into_iter().map(|h| h.text).collect())
    }
}
