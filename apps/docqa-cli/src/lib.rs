//! Wiring shared by the `docqa` binary: offline index build and the
//! question-answering pipeline (readiness gate, retrieval, streamed answer).

pub mod indexer;
pub mod pipeline;

pub use indexer::{build_index, IndexSummary};
pub use pipeline::QaPipeline;

/// Install the stderr `fmt` subscriber. `RUST_LOG` overrides `default_filter`.
pub fn init_logging(default_filter: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
