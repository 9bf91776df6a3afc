//! Processing-job lifecycle: the status table, its stores, the recorder that
//! drives a run through it, and the stale-job reaper.

pub mod error;
pub mod memory;
pub mod reaper;
pub mod recorder;
pub mod state;
pub mod store;
pub mod traits;

pub use error::{JobError, JobStoreError};
pub use memory::InMemoryJobStore;
pub use reaper::{reap_stale_jobs, ReaperReport};
pub use recorder::{error_trace, JobRecorder};
pub use store::SqliteJobStore;
pub use traits::JobStore;
