pub mod extraction;
pub mod import;
pub mod jobs; // Job lifecycle, stores and stale-job reaper
pub mod processor; // Document Processing Orchestrator
pub mod structuring;
