//! Subscriber setup for binaries.

use tracing_subscriber::{fmt, EnvFilter};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines on stderr
    #[default]
    Pretty,
    /// One JSON object per event (for log shippers)
    Json,
}

/// Install the global tracing subscriber.
///
/// Filter comes from `RUST_LOG`, falling back to `default_directive`
/// (e.g. `"percolate_nl2sql=info"`). Safe to call more than once; later calls
/// are ignored.
pub fn init_tracing(format: LogFormat, default_directive: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    let builder = fmt().with_env_filter(filter).with_writer(std::io::stderr);

    let result = match format {
        LogFormat::Pretty => builder.with_target(false).try_init(),
        LogFormat::Json => builder.json().with_current_span(true).try_init(),
    };

    if let Err(e) = result {
        tracing::debug!(error = %e, "Tracing subscriber already installed");
    }
}
