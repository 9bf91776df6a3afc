//! SQLite-backed job store over the `processing_jobs` table.

use std::path::Path;
use std::str::FromStr;
use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::error::JobStoreError;
use super::traits::{new_job_record, JobStore};
use crate::db::{open_database, open_memory_database};
use crate::models::enums::JobStatus;
use crate::models::job::{JobErrorRecord, NewJob, ProcessingJob};

const SELECT_COLUMNS: &str = "SELECT id, organization_id, user_id, file_path, file_name, status,
        status_message, metadata, result, error, started_at, updated_at, completed_at
 FROM processing_jobs";

pub struct SqliteJobStore {
    conn: Mutex<Connection>,
}

impl SqliteJobStore {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Open (and migrate) the database at `path`.
    pub fn open(path: &Path) -> Result<Self, JobStoreError> {
        Ok(Self::new(open_database(path)?))
    }

    pub fn in_memory() -> Result<Self, JobStoreError> {
        Ok(Self::new(open_memory_database()?))
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, JobStoreError> {
        self.conn.lock().map_err(|_| JobStoreError::LockPoisoned)
    }
}

impl JobStore for SqliteJobStore {
    fn create(&self, fields: NewJob, now: DateTime<Utc>) -> Result<ProcessingJob, JobStoreError> {
        let job = new_job_record(fields, now);
        let conn = self.lock()?;

        conn.execute(
            "INSERT INTO processing_jobs
             (id, organization_id, user_id, file_path, file_name, status, status_message,
              metadata, result, error, started_at, updated_at, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, NULL, NULL, ?9, ?10, NULL)",
            params![
                job.id.to_string(),
                job.organization_id,
                job.user_id,
                job.file_path,
                job.file_name,
                job.status.as_str(),
                job.status_message,
                serde_json::to_string(&job.metadata)?,
                timestamp(&job.started_at),
                timestamp(&job.updated_at),
            ],
        )?;

        Ok(job)
    }

    fn update(&self, job: &ProcessingJob, expected: JobStatus) -> Result<(), JobStoreError> {
        let result_json = job.result.as_ref().map(serde_json::to_string).transpose()?;
        let error_json = job.error.as_ref().map(serde_json::to_string).transpose()?;
        let conn = self.lock()?;

        let changed = conn.execute(
            "UPDATE processing_jobs
             SET status = ?1, status_message = ?2, metadata = ?3, result = ?4, error = ?5,
                 updated_at = ?6, completed_at = ?7
             WHERE id = ?8 AND status = ?9",
            params![
                job.status.as_str(),
                job.status_message,
                serde_json::to_string(&job.metadata)?,
                result_json,
                error_json,
                timestamp(&job.updated_at),
                job.completed_at.as_ref().map(timestamp),
                job.id.to_string(),
                expected.as_str(),
            ],
        )?;

        if changed == 0 {
            let exists = conn
                .query_row(
                    "SELECT 1 FROM processing_jobs WHERE id = ?1",
                    params![job.id.to_string()],
                    |_| Ok(()),
                )
                .optional()?
                .is_some();
            return Err(if exists {
                JobStoreError::Conflict {
                    id: job.id,
                    expected,
                }
            } else {
                JobStoreError::NotFound(job.id)
            });
        }
        Ok(())
    }

    fn get(&self, id: &Uuid) -> Result<Option<ProcessingJob>, JobStoreError> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                params![id.to_string()],
                JobRow::from_row,
            )
            .optional()?;

        row.map(job_from_row).transpose()
    }

    fn list_stale(
        &self,
        statuses: &[JobStatus],
        updated_before: DateTime<Utc>,
    ) -> Result<Vec<ProcessingJob>, JobStoreError> {
        if statuses.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders: Vec<String> = (2..statuses.len() + 2).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "{SELECT_COLUMNS} WHERE updated_at < ?1 AND status IN ({}) ORDER BY updated_at ASC",
            placeholders.join(", ")
        );

        let mut bind: Vec<String> = vec![timestamp(&updated_before)];
        bind.extend(statuses.iter().map(|s| s.as_str().to_string()));

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(bind.iter()), JobRow::from_row)?;

        let mut jobs = Vec::new();
        for row in rows {
            jobs.push(job_from_row(row?)?);
        }
        Ok(jobs)
    }
}

/// Fixed-width UTC timestamps keep lexical order equal to time order.
fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

// ═══════════════════════════════════════════
// Internal row mapping
// ═══════════════════════════════════════════

struct JobRow {
    id: String,
    organization_id: String,
    user_id: String,
    file_path: String,
    file_name: String,
    status: String,
    status_message: Option<String>,
    metadata: String,
    result: Option<String>,
    error: Option<String>,
    started_at: String,
    updated_at: String,
    completed_at: Option<String>,
}

impl JobRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            organization_id: row.get(1)?,
            user_id: row.get(2)?,
            file_path: row.get(3)?,
            file_name: row.get(4)?,
            status: row.get(5)?,
            status_message: row.get(6)?,
            metadata: row.get(7)?,
            result: row.get(8)?,
            error: row.get(9)?,
            started_at: row.get(10)?,
            updated_at: row.get(11)?,
            completed_at: row.get(12)?,
        })
    }
}

fn job_from_row(row: JobRow) -> Result<ProcessingJob, JobStoreError> {
    let corrupt = |reason: String| JobStoreError::Corrupt {
        id: row.id.clone(),
        reason,
    };

    let id = Uuid::parse_str(&row.id).map_err(|e| corrupt(format!("bad id: {e}")))?;
    let status = JobStatus::from_str(&row.status)?;
    let parse_time = |raw: &str| {
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| corrupt(format!("bad timestamp {raw}: {e}")))
    };

    let metadata: Map<String, Value> = serde_json::from_str(&row.metadata)?;
    let result: Option<Map<String, Value>> =
        row.result.as_deref().map(serde_json::from_str).transpose()?;
    let error: Option<JobErrorRecord> = row.error.as_deref().map(serde_json::from_str).transpose()?;

    Ok(ProcessingJob {
        id,
        organization_id: row.organization_id.clone(),
        user_id: row.user_id.clone(),
        file_path: row.file_path.clone(),
        file_name: row.file_name.clone(),
        status,
        status_message: row.status_message.clone(),
        metadata,
        result,
        error,
        started_at: parse_time(&row.started_at)?,
        updated_at: parse_time(&row.updated_at)?,
        completed_at: row.completed_at.as_deref().map(parse_time).transpose()?,
    })
}
