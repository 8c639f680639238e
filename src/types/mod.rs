//! Core data types for the pipeline.
//!
//! Defines fundamental types used throughout the system:
//! - `SqlValue`: Cell value returned by a query, plus JSON normalization
//! - `PipelineError`: Error types for all operations
//! - `Result`: Convenient result type alias

pub mod error;
pub mod value;

pub use error::PipelineError;
pub use value::{normalize, normalize_row, SqlValue};

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
