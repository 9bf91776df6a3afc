use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::error::JobStoreError;
use super::traits::{new_job_record, JobStore};
use crate::models::enums::JobStatus;
use crate::models::job::{NewJob, ProcessingJob};

/// Mutex-guarded in-process job store.
#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: Mutex<HashMap<Uuid, ProcessingJob>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().map(|jobs| jobs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl JobStore for InMemoryJobStore {
    fn create(&self, fields: NewJob, now: DateTime<Utc>) -> Result<ProcessingJob, JobStoreError> {
        let job = new_job_record(fields, now);
        let mut jobs = self.jobs.lock().map_err(|_| JobStoreError::LockPoisoned)?;
        jobs.insert(job.id, job.clone());
        Ok(job)
    }

    fn update(&self, job: &ProcessingJob, expected: JobStatus) -> Result<(), JobStoreError> {
        let mut jobs = self.jobs.lock().map_err(|_| JobStoreError::LockPoisoned)?;
        match jobs.get_mut(&job.id) {
            Some(stored) if stored.status == expected => {
                *stored = job.clone();
                Ok(())
            }
            Some(_) => Err(JobStoreError::Conflict {
                id: job.id,
                expected,
            }),
            None => Err(JobStoreError::NotFound(job.id)),
        }
    }

    fn get(&self, id: &Uuid) -> Result<Option<ProcessingJob>, JobStoreError> {
        let jobs = self.jobs.lock().map_err(|_| JobStoreError::LockPoisoned)?;
        Ok(jobs.get(id).cloned())
    }

    fn list_stale(
        &self,
        statuses: &[JobStatus],
        updated_before: DateTime<Utc>,
    ) -> Result<Vec<ProcessingJob>, JobStoreError> {
        let jobs = self.jobs.lock().map_err(|_| JobStoreError::LockPoisoned)?;
        let mut stale: Vec<ProcessingJob> = jobs
            .values()
            .filter(|job| statuses.contains(&job.status) && job.updated_at < updated_before)
            .cloned()
            .collect();
        stale.sort_by_key(|job| job.updated_at);
        Ok(stale)
    }
}
