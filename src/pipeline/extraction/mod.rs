pub mod mock;
pub mod orchestrator;
pub mod types;

pub use mock::MockExtractor;
pub use orchestrator::*;
pub use types::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("All extraction methods failed. Last error: {last_error}")]
    AllMethodsFailed {
        last_error: String,
        failures: Vec<MethodFailure>,
    },
}
