//! Embedding generation for schema retrieval.
//!
//! Providers are selected by config string (`P8_DEFAULT_EMBEDDING`):
//! - `local:<hf model id>`: sentence-transformers via embed_anything (default
//!   `sentence-transformers/all-MiniLM-L6-v2`, 384 dims, cached in `~/.p8/models`)
//! - `openai:<model>`: OpenAI embeddings API (requires `OPENAI_API_KEY`)
//! - `hash:<dims>`: feature hashing, deterministic and offline (tests, air-gapped hosts)

pub mod hash;
pub mod local;
pub mod openai;
pub mod provider;

pub use hash::HashEmbedder;
pub use local::LocalEmbedder;
pub use openai::OpenAIEmbedder;
pub use provider::{EmbeddingProvider, ProviderFactory};
