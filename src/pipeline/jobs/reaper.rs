//! Fails jobs left mid-pipeline by a crashed or killed process.
//!
//! Runs never resume on their own; a supervisor calls [`reap_stale_jobs`]
//! periodically and decides separately whether to resubmit the documents.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{JobError, JobStoreError};
use super::recorder::JobRecorder;
use super::traits::JobStore;
use crate::clock::Clock;
use crate::models::enums::JobStatus;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReaperReport {
    /// Jobs transitioned to `failed` by this pass.
    pub failed: Vec<Uuid>,
}

impl ReaperReport {
    pub fn is_empty(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Fail every non-terminal job whose last update is older than `stale_after`.
pub fn reap_stale_jobs(
    store: &dyn JobStore,
    clock: &dyn Clock,
    stale_after: Duration,
) -> Result<ReaperReport, JobError> {
    let mut report = ReaperReport::default();

    let Some(cutoff) = chrono::Duration::from_std(stale_after)
        .ok()
        .and_then(|age| clock.now().checked_sub_signed(age))
    else {
        return Ok(report);
    };

    let recorder = JobRecorder::new(store, clock);
    for mut job in store.list_stale(JobStatus::non_terminal(), cutoff)? {
        let stalled_in = job.status;
        let message = format!("Job stalled in status {stalled_in}");
        let trace = format!(
            "last update at {} exceeded stale threshold of {}s",
            job.updated_at.to_rfc3339(),
            stale_after.as_secs()
        );

        match recorder.fail(&mut job, &message, trace) {
            Ok(()) => {}
            // The run wrote a newer status after the listing; it is alive.
            Err(JobError::Store(JobStoreError::Conflict { .. })) => {
                tracing::warn!(job_id = %job.id, status = %stalled_in, "Stale job moved on before reaping");
                continue;
            }
            Err(e) => return Err(e),
        }
        tracing::warn!(job_id = %job.id, status = %stalled_in, "Reaped stale job");
        report.failed.push(job.id);
    }

    if !report.is_empty() {
        tracing::info!(count = report.failed.len(), "Stale job reaper pass finished");
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::models::job::NewJob;
    use crate::pipeline::jobs::memory::InMemoryJobStore;

    fn fields(name: &str) -> NewJob {
        NewJob {
            organization_id: "org-1".into(),
            file_name: name.into(),
            ..Default::default()
        }
    }

    #[test]
    fn fails_only_old_non_terminal_jobs() {
        let store = InMemoryJobStore::new();
        let then = FixedClock::on(2024, 10, 15).unwrap();
        let later = FixedClock::new(then.now() + chrono::Duration::hours(1));

        let recorder = JobRecorder::new(&store, &then);
        let mut stuck = recorder.start(fields("stuck.pdf")).unwrap();
        recorder.advance(&mut stuck, JobStatus::Extracting).unwrap();

        let mut finished = recorder.start(fields("done.pdf")).unwrap();
        recorder.fail(&mut finished, "boom", String::new()).unwrap();

        let fresh = JobRecorder::new(&store, &later)
            .start(fields("fresh.pdf"))
            .unwrap();

        let report = reap_stale_jobs(&store, &later, Duration::from_secs(30 * 60)).unwrap();
        assert_eq!(report.failed, vec![stuck.id]);

        let reaped = store.get(&stuck.id).unwrap().unwrap();
        assert_eq!(reaped.status, JobStatus::Failed);
        assert_eq!(
            reaped.error.unwrap().error,
            "Job stalled in status extracting"
        );
        assert_eq!(reaped.completed_at, Some(later.now()));

        assert_eq!(store.get(&fresh.id).unwrap().unwrap().status, JobStatus::Pending);
        assert_eq!(store.get(&finished.id).unwrap().unwrap().error.unwrap().error, "boom");
    }

    #[test]
    fn second_pass_finds_nothing() {
        let store = InMemoryJobStore::new();
        let then = FixedClock::on(2024, 10, 15).unwrap();
        let later = FixedClock::new(then.now() + chrono::Duration::hours(2));
        JobRecorder::new(&store, &then).start(fields("a.pdf")).unwrap();

        let stale_after = Duration::from_secs(60);
        assert_eq!(reap_stale_jobs(&store, &later, stale_after).unwrap().failed.len(), 1);
        assert!(reap_stale_jobs(&store, &later, stale_after).unwrap().is_empty());
    }

    #[test]
    fn reaped_job_is_not_revived_by_live_run() {
        let store = InMemoryJobStore::new();
        let then = FixedClock::on(2024, 10, 15).unwrap();
        let later = FixedClock::new(then.now() + chrono::Duration::hours(1));

        let live = JobRecorder::new(&store, &then);
        let mut job = live.start(fields("slow.pdf")).unwrap();
        live.advance(&mut job, JobStatus::Extracting).unwrap();

        let report = reap_stale_jobs(&store, &later, Duration::from_secs(60)).unwrap();
        assert_eq!(report.failed, vec![job.id]);

        let err = live.advance(&mut job, JobStatus::Analyzing).unwrap_err();
        assert!(matches!(
            err,
            JobError::Store(JobStoreError::Conflict {
                expected: JobStatus::Extracting,
                ..
            })
        ));
        assert_eq!(job.status, JobStatus::Extracting);

        let stored = store.get(&job.id).unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Failed);
        assert_eq!(stored.error.unwrap().error, "Job stalled in status extracting");

        assert!(live.fail(&mut job, "late failure", String::new()).is_err());
        let stored = store.get(&job.id).unwrap().unwrap();
        assert_eq!(stored.error.unwrap().error, "Job stalled in status extracting");
    }

    #[test]
    fn huge_threshold_reaps_nothing() {
        let store = InMemoryJobStore::new();
        let clock = FixedClock::on(2024, 10, 15).unwrap();
        JobRecorder::new(&store, &clock).start(fields("a.pdf")).unwrap();

        let report = reap_stale_jobs(&store, &clock, Duration::MAX).unwrap();
        assert!(report.is_empty());
    }
}
