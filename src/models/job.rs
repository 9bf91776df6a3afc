use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::enums::JobStatus;

/// Audit record for one submitted document.
///
/// `result` and `error` are mutually exclusive: the first is written on
/// `completed`, the second on `failed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingJob {
    pub id: Uuid,
    pub organization_id: String,
    pub user_id: String,
    pub file_path: String,
    pub file_name: String,
    pub status: JobStatus,
    pub status_message: Option<String>,
    pub metadata: Map<String, Value>,
    pub result: Option<Map<String, Value>>,
    pub error: Option<JobErrorRecord>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ProcessingJob {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Error payload stored on a failed job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobErrorRecord {
    pub error: String,
    /// Cause chain, one cause per line.
    pub trace: String,
}

/// Fields supplied when a job is first created.
#[derive(Debug, Clone, Default)]
pub struct NewJob {
    pub organization_id: String,
    pub user_id: String,
    pub file_path: String,
    pub file_name: String,
    pub metadata: Map<String, Value>,
}
