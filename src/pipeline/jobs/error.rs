//! Job persistence and state-machine errors.

use thiserror::Error;
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::enums::JobStatus;

#[derive(Error, Debug)]
pub enum JobStoreError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("JSON error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt job record {id}: {reason}")]
    Corrupt { id: String, reason: String },

    #[error("Job not found: {0}")]
    NotFound(Uuid),

    /// The stored record had already left `expected` when the write arrived.
    #[error("Job {id} is no longer {expected}")]
    Conflict { id: Uuid, expected: JobStatus },

    #[error("Job store lock poisoned")]
    LockPoisoned,
}

impl From<rusqlite::Error> for JobStoreError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Database(DatabaseError::Sqlite(e))
    }
}

#[derive(Error, Debug)]
pub enum JobError {
    #[error("Illegal job transition: {from} -> {to}")]
    IllegalTransition { from: JobStatus, to: JobStatus },

    #[error("Job store error: {0}")]
    Store(#[from] JobStoreError),
}
