use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::error::JobStoreError;
use crate::models::enums::JobStatus;
use crate::models::job::{NewJob, ProcessingJob};

/// Durable storage for job records. Each job is keyed by its own id, so
/// concurrent runs never touch each other's rows.
pub trait JobStore: Send + Sync {
    /// Insert a new `pending` job with a generated id.
    fn create(&self, fields: NewJob, now: DateTime<Utc>) -> Result<ProcessingJob, JobStoreError>;

    /// Overwrite the stored record with `job`, but only while its stored
    /// status is still `expected`. Otherwise fails with
    /// [`JobStoreError::Conflict`] and leaves the record untouched.
    fn update(&self, job: &ProcessingJob, expected: JobStatus) -> Result<(), JobStoreError>;

    fn get(&self, id: &Uuid) -> Result<Option<ProcessingJob>, JobStoreError>;

    /// Jobs in any of `statuses` last touched before `updated_before`.
    fn list_stale(
        &self,
        statuses: &[JobStatus],
        updated_before: DateTime<Utc>,
    ) -> Result<Vec<ProcessingJob>, JobStoreError>;
}

/// Build the initial record for `fields`.
pub(crate) fn new_job_record(fields: NewJob, now: DateTime<Utc>) -> ProcessingJob {
    ProcessingJob {
        id: Uuid::new_v4(),
        organization_id: fields.organization_id,
        user_id: fields.user_id,
        file_path: fields.file_path,
        file_name: fields.file_name,
        status: JobStatus::Pending,
        status_message: Some(JobStatus::Pending.stage_message().to_string()),
        metadata: fields.metadata,
        result: None,
        error: None,
        started_at: now,
        updated_at: now,
        completed_at: None,
    }
}
