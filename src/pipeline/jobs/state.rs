//! Pure job state table. No I/O: persistence and logging live in the recorder.
//!
//! ```text
//! pending → extracting → analyzing → validating → fixing
//!         → analyzing_confidence → (importing) → completed
//! ```
//! `failed` is reachable from every non-terminal state.

use crate::models::enums::JobStatus;

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Statuses a job can be stuck in after a crash.
    pub fn non_terminal() -> &'static [JobStatus] {
        &[
            Self::Pending,
            Self::Extracting,
            Self::Analyzing,
            Self::Validating,
            Self::Fixing,
            Self::AnalyzingConfidence,
            Self::Importing,
        ]
    }

    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;

        if next == Failed {
            return !self.is_terminal();
        }

        matches!(
            (self, next),
            (Pending, Extracting)
                | (Extracting, Analyzing)
                | (Analyzing, Validating)
                | (Validating, Fixing)
                | (Fixing, AnalyzingConfidence)
                | (AnalyzingConfidence, Importing)
                | (AnalyzingConfidence, Completed)
                | (Importing, Completed)
        )
    }

    /// Human-readable message recorded when entering this status.
    pub fn stage_message(&self) -> &'static str {
        match self {
            Self::Pending => "Queued for processing",
            Self::Extracting => "Extracting data from document",
            Self::Analyzing => "Analyzing document type",
            Self::Validating => "Validating and cleaning data",
            Self::Fixing => "Fixing common data issues",
            Self::AnalyzingConfidence => "Analyzing confidence",
            Self::Importing => "Importing data",
            Self::Completed => "Processing completed successfully",
            Self::Failed => "Processing failed",
        }
    }
}
