//! Applies state-table transitions to a job and persists each one.

use std::error::Error;

use serde_json::{Map, Value};

use super::error::JobError;
use super::traits::JobStore;
use crate::clock::Clock;
use crate::models::enums::JobStatus;
use crate::models::job::{JobErrorRecord, NewJob, ProcessingJob};

/// Writes every status change of a run through to the store.
///
/// The caller's `job` value is only replaced once the store has accepted
/// the new record, so a failed write leaves it at its last durable status.
/// Each write is conditional on the stored status still matching `job`, so
/// a run whose job was failed elsewhere (by the reaper) cannot revive it.
pub struct JobRecorder<'a> {
    store: &'a dyn JobStore,
    clock: &'a dyn Clock,
}

impl<'a> JobRecorder<'a> {
    pub fn new(store: &'a dyn JobStore, clock: &'a dyn Clock) -> Self {
        Self { store, clock }
    }

    pub fn start(&self, fields: NewJob) -> Result<ProcessingJob, JobError> {
        let job = self.store.create(fields, self.clock.now())?;
        tracing::info!(
            job_id = %job.id,
            organization_id = %job.organization_id,
            file_name = %job.file_name,
            status = %job.status,
            "Processing job created"
        );
        Ok(job)
    }

    /// Move to `status` with its standard stage message.
    pub fn advance(&self, job: &mut ProcessingJob, status: JobStatus) -> Result<(), JobError> {
        self.advance_with_message(job, status, status.stage_message())
    }

    pub fn advance_with_message(
        &self,
        job: &mut ProcessingJob,
        status: JobStatus,
        message: &str,
    ) -> Result<(), JobError> {
        let next = self.transition(job, status, message)?;
        self.persist(job, next)?;
        tracing::info!(job_id = %job.id, status = %status, status_message = message, "Job status updated");
        Ok(())
    }

    /// Terminal success: store the full result and the run's metadata.
    pub fn complete(
        &self,
        job: &mut ProcessingJob,
        result: Map<String, Value>,
        metadata: Map<String, Value>,
    ) -> Result<(), JobError> {
        let status = JobStatus::Completed;
        let mut next = self.transition(job, status, status.stage_message())?;
        next.result = Some(result);
        next.metadata = metadata;
        next.completed_at = Some(next.updated_at);

        self.persist(job, next)?;
        tracing::info!(job_id = %job.id, status = %status, "Job completed");
        Ok(())
    }

    /// Terminal failure: store `{error, trace}`.
    pub fn fail(&self, job: &mut ProcessingJob, error: &str, trace: String) -> Result<(), JobError> {
        let status = JobStatus::Failed;
        let mut next = self.transition(job, status, status.stage_message())?;
        next.error = Some(JobErrorRecord {
            error: error.to_string(),
            trace,
        });
        next.completed_at = Some(next.updated_at);

        self.persist(job, next)?;
        tracing::error!(job_id = %job.id, status = %status, error, "Job failed");
        Ok(())
    }

    fn transition(
        &self,
        job: &ProcessingJob,
        status: JobStatus,
        message: &str,
    ) -> Result<ProcessingJob, JobError> {
        if !job.status.can_transition_to(status) {
            return Err(JobError::IllegalTransition {
                from: job.status,
                to: status,
            });
        }

        let mut next = job.clone();
        next.status = status;
        next.status_message = Some(message.to_string());
        next.updated_at = self.clock.now();
        Ok(next)
    }

    fn persist(&self, job: &mut ProcessingJob, next: ProcessingJob) -> Result<(), JobError> {
        self.store.update(&next, job.status)?;
        *job = next;
        Ok(())
    }
}

/// Render an error and its `source()` chain, one cause per line.
pub fn error_trace(error: &dyn Error) -> String {
    let mut lines = vec![error.to_string()];
    let mut source = error.source();
    while let Some(cause) = source {
        lines.push(cause.to_string());
        source = cause.source();
    }
    lines.join("\n")
}
