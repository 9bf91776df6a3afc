pub mod router;

pub use router::*;

use thiserror::Error;

/// Failure raised by an import routine. Never escapes `ImportRouter::dispatch`.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Invalid {field}: {reason}")]
    InvalidData { field: String, reason: String },

    #[error("Duplicate record: {0}")]
    Duplicate(String),

    #[error("Storage error: {0}")]
    Storage(String),
}
