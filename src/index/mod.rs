//! Semantic retrieval of schema descriptions.

pub mod schema_index;

pub use schema_index::{
    SchemaChunk, SchemaCollection, SchemaIndex, SchemaRetriever, SearchHit, DEFAULT_TOP_N,
};
