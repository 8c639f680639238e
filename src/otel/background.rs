//! Schema index job instrumentation.
//!
//! For offline operations like index build and load.
//! Uses INTERNAL span kind since these are not client operations.

use tracing::{field, span, Level, Span};

/// Index job types.
#[derive(Debug, Clone, Copy)]
pub enum IndexJobType {
    /// Embed schema chunks and build the HNSW graph
    IndexBuild,
    /// Read collection file and rebuild the HNSW graph
    IndexLoad,
    /// Generate embeddings for a batch of texts
    EmbeddingGeneration,
}

impl IndexJobType {
    /// Get job type as string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IndexBuild => "index.build",
            Self::IndexLoad => "index.load",
            Self::EmbeddingGeneration => "embedding.generate",
        }
    }
}

/// Create index job span.
///
/// # Arguments
///
/// * `job_type` - Type of job
/// * `target` - Job target (collection name, file path)
///
/// # Returns
///
/// Tracing span with job attributes
pub fn index_job_span(job_type: IndexJobType, target: &str) -> Span {
    span!(
        Level::INFO,
        "index.job",
        otel.name = format!("{} {}", job_type.as_str(), target),
        otel.kind = "internal",
        job.type = job_type.as_str(),
        job.target = target,
        job.batch_size = field::Empty,
        job.status = field::Empty,
    )
}

/// Record job metrics on the current span.
///
/// # Arguments
///
/// * `batch_size` - Number of items processed (optional)
/// * `status` - Job status ("success", "failed")
pub fn record_index_job(batch_size: Option<usize>, status: &str) {
    let span = Span::current();
    if let Some(size) = batch_size {
        span.record("job.batch_size", size);
    }
    span.record("job.status", status);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_type_names() {
        assert_eq!(IndexJobType::IndexBuild.as_str(), "index.build");
        assert_eq!(IndexJobType::EmbeddingGeneration.as_str(), "embedding.generate");
    }
}
