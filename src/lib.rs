pub mod clock;
pub mod config;
pub mod db;
pub mod models;
pub mod pipeline;

use tracing_subscriber::EnvFilter;

pub use pipeline::processor::{
    DocumentProcessor, PipelineResult, ProcessOptions, ProcessingError, ProcessingOutput,
    ProcessingRequest,
};

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` wins when set; otherwise [`config::default_log_filter`].
/// Safe to call more than once: later calls leave the first subscriber in place.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_tracing_is_idempotent() {
        init_tracing();
        init_tracing();
        tracing::info!("subscriber installed");
    }
}
