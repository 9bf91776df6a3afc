use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use super::types::{ExtractedDocument, MethodExtractor, MethodFailure, MethodOutcome};
use super::ExtractionError;
use crate::models::enums::ExtractionMethod;

/// Upper bound on deadline worker threads alive at once, counting workers
/// abandoned after a timeout that are still stuck in their backend.
pub const DEFAULT_MAX_WORKERS: usize = 16;

/// Tries each configured extraction method in priority order and returns the
/// first one that yields text. Methods are never compared against each other.
pub struct ExtractionCoordinator {
    extractors: HashMap<ExtractionMethod, Arc<dyn MethodExtractor>>,
    method_timeout: Option<Duration>,
    max_workers: usize,
    workers: Arc<AtomicUsize>,
}

impl Default for ExtractionCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractionCoordinator {
    pub fn new() -> Self {
        Self {
            extractors: HashMap::new(),
            method_timeout: None,
            max_workers: DEFAULT_MAX_WORKERS,
            workers: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Register the backend for one method. Registration order does not
    /// affect the attempt order.
    pub fn with_method(
        mut self,
        method: ExtractionMethod,
        extractor: Arc<dyn MethodExtractor>,
    ) -> Self {
        self.extractors.insert(method, extractor);
        self
    }

    /// Bound each method call. A method that misses the deadline counts as failed.
    ///
    /// An explicit `Some` deadline takes precedence over
    /// `PipelineConfig::method_timeout` when the coordinator is handed to
    /// `DocumentProcessor::new`; the config only fills in a missing one.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.method_timeout = timeout;
        self
    }

    /// Cap the deadline worker threads alive at once. When the cap is
    /// reached, further methods fail immediately instead of spawning.
    pub fn with_worker_limit(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    pub fn method_timeout(&self) -> Option<Duration> {
        self.method_timeout
    }

    /// Deadline workers still running, including abandoned ones.
    pub fn running_workers(&self) -> usize {
        self.workers.load(Ordering::SeqCst)
    }

    pub fn extract(
        &self,
        file_path: &Path,
        organization_id: &str,
    ) -> Result<ExtractedDocument, ExtractionError> {
        let mut failures = Vec::new();
        let mut last_error: Option<String> = None;

        for method in ExtractionMethod::PRIORITY {
            let Some(extractor) = self.extractors.get(&method) else {
                tracing::debug!(method = %method, "No extractor configured, skipping");
                continue;
            };

            match self.run_method(method, extractor, file_path, organization_id) {
                MethodOutcome::Extracted(raw) if !raw.extracted_text.is_empty() => {
                    tracing::info!(
                        method = %method,
                        text_length = raw.extracted_text.len(),
                        fields = raw.extracted_data.len(),
                        "Extraction succeeded"
                    );
                    return Ok(ExtractedDocument {
                        text: raw.extracted_text,
                        data: raw.extracted_data,
                        method,
                    });
                }
                MethodOutcome::Extracted(_) | MethodOutcome::Empty => {
                    tracing::warn!(method = %method, "Extraction method returned no text");
                    failures.push(MethodFailure {
                        method,
                        reason: "returned no text".to_string(),
                    });
                }
                MethodOutcome::Failed(reason) => {
                    tracing::warn!(method = %method, error = %reason, "Extraction method failed");
                    failures.push(MethodFailure {
                        method,
                        reason: reason.clone(),
                    });
                    last_error = Some(reason);
                }
            }
        }

        Err(ExtractionError::AllMethodsFailed {
            last_error: last_error.unwrap_or_else(|| "Unknown error".to_string()),
            failures,
        })
    }

    /// Run one method, on a worker thread when a deadline is configured.
    fn run_method(
        &self,
        method: ExtractionMethod,
        extractor: &Arc<dyn MethodExtractor>,
        file_path: &Path,
        organization_id: &str,
    ) -> MethodOutcome {
        let Some(timeout) = self.method_timeout else {
            return extractor.extract(file_path, organization_id);
        };

        let Some(slot) = WorkerSlot::acquire(&self.workers, self.max_workers) else {
            return MethodOutcome::Failed(format!(
                "{method} skipped: {} extraction workers still running",
                self.max_workers
            ));
        };

        let (tx, rx) = mpsc::channel();
        let worker = Arc::clone(extractor);
        let path = file_path.to_path_buf();
        let org = organization_id.to_string();
        let thread_name = format!("extract-{method}");

        let spawned = std::thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                let outcome = worker.extract(&path, &org);
                drop(slot);
                // Receiver may be gone after a timeout
                let _ = tx.send(outcome);
            });
        if let Err(e) = spawned {
            return MethodOutcome::Failed(format!("could not start {method} worker: {e}"));
        }

        match rx.recv_timeout(timeout) {
            Ok(outcome) => outcome,
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(
                    method = %method,
                    thread = %thread_name,
                    timeout_ms = timeout.as_millis() as u64,
                    running_workers = self.running_workers(),
                    "Abandoning extraction worker after deadline"
                );
                MethodOutcome::Failed(format!("{method} timed out after {timeout:?}"))
            }
            Err(RecvTimeoutError::Disconnected) => {
                MethodOutcome::Failed(format!("{method} extractor terminated without a result"))
            }
        }
    }
}

/// One reserved worker; released when the worker thread finishes or unwinds.
struct WorkerSlot(Arc<AtomicUsize>);

impl WorkerSlot {
    fn acquire(workers: &Arc<AtomicUsize>, max: usize) -> Option<Self> {
        workers
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| (n < max).then_some(n + 1))
            .ok()
            .map(|_| Self(Arc::clone(workers)))
    }
}

impl Drop for WorkerSlot {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
