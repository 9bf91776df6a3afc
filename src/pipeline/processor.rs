//! Document Processing Orchestrator.
//!
//! Single entry point that drives one uploaded document through the
//! pipeline and records every stage on its processing job:
//! extract → classify → clean → fix → score → (auto-import).
//!
//! Extraction backends, import routines, the job store and the clock are all
//! injected, so the orchestrator stays testable with mock implementations.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::config::PipelineConfig;
use crate::models::document::{DocumentType, ReviewQuestion};
use crate::models::enums::JobStatus;
use crate::models::job::{NewJob, ProcessingJob};
use crate::pipeline::extraction::{ExtractionCoordinator, ExtractionError};
use crate::pipeline::import::{ImportContext, ImportOutcome, ImportRouter};
use crate::pipeline::jobs::{self, error_trace, JobError, JobRecorder, JobStore, ReaperReport};
use crate::pipeline::structuring::{
    analyze_confidence, classify_document, clean_document, fix_common_issues,
};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors returned to the caller. Every variant carrying a `job_id` has
/// already been recorded as `failed` on that job.
#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    /// No job could be created, so nothing was recorded.
    #[error("Could not start processing job: {0}")]
    Job(#[from] JobError),

    #[error("{source}")]
    Extraction {
        job_id: Uuid,
        #[source]
        source: ExtractionError,
    },

    #[error("Processing job {job_id} failed: {source}")]
    Stage {
        job_id: Uuid,
        #[source]
        source: StageError,
    },
}

impl ProcessingError {
    /// The job this failure was recorded on, if one was created.
    pub fn job_id(&self) -> Option<Uuid> {
        match self {
            Self::Job(_) => None,
            Self::Extraction { job_id, .. } | Self::Stage { job_id, .. } => Some(*job_id),
        }
    }
}

/// Failure inside a run, after the job exists.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Job(#[from] JobError),

    #[error("Could not serialize pipeline result: {0}")]
    Serialization(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Request / result types
// ---------------------------------------------------------------------------

/// Per-run switches supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessOptions {
    /// `Some(false)` skips auto-import for this run; `None` follows config.
    #[serde(default)]
    pub auto_import: Option<bool>,
    /// Require review even when every required field is present.
    #[serde(default)]
    pub force_review: bool,
}

/// One uploaded document to process.
#[derive(Debug, Clone, Default)]
pub struct ProcessingRequest {
    pub organization_id: String,
    pub user_id: String,
    pub file_path: PathBuf,
    pub file_name: String,
    pub metadata: Map<String, Value>,
    pub options: ProcessOptions,
}

/// Outcome of a successful run. Also stored verbatim as the job's `result`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub success: bool,
    pub document_type: DocumentType,
    pub data: Map<String, Value>,
    pub raw_text: String,
    pub confidence: f64,
    pub requires_review: bool,
    pub questions: Vec<ReviewQuestion>,
    pub metadata: Map<String, Value>,
    /// Whether auto-import was attempted, not whether it succeeded.
    pub imported: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub import_result: Option<ImportOutcome>,
}

/// A finished run: the job it was recorded on plus its result.
#[derive(Debug, Clone)]
pub struct ProcessingOutput {
    pub job_id: Uuid,
    pub result: PipelineResult,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Orchestrates document processing and its job bookkeeping.
///
/// Holds no per-run state: several documents can be processed concurrently
/// from different threads against the same store.
pub struct DocumentProcessor {
    extraction: ExtractionCoordinator,
    imports: ImportRouter,
    store: Arc<dyn JobStore>,
    clock: Arc<dyn Clock>,
    config: PipelineConfig,
}

impl DocumentProcessor {
    /// `config.method_timeout` applies only when `extraction` has no
    /// deadline of its own.
    pub fn new(
        extraction: ExtractionCoordinator,
        imports: ImportRouter,
        store: Arc<dyn JobStore>,
        config: PipelineConfig,
    ) -> Self {
        let extraction = match extraction.method_timeout() {
            Some(_) => extraction,
            None => extraction.with_timeout(config.method_timeout),
        };
        Self {
            extraction,
            imports,
            store,
            clock: Arc::new(SystemClock),
            config,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn store(&self) -> &dyn JobStore {
        self.store.as_ref()
    }

    /// Fail jobs that stopped advancing more than `config.stale_after` ago.
    pub fn reap_stale_jobs(&self) -> Result<ReaperReport, JobError> {
        jobs::reap_stale_jobs(self.store.as_ref(), self.clock.as_ref(), self.config.stale_after)
    }

    /// Full pipeline for one document.
    ///
    /// 1. Create the job (`pending`)
    /// 2. Extract text and fields, first successful method wins
    /// 3. Classify, clean, fix, score
    /// 4. Auto-import when confident and allowed
    /// 5. Record `completed` with the result
    ///
    /// Any failure after step 1 is recorded as `failed` on the job before it
    /// is returned.
    pub fn process(&self, request: ProcessingRequest) -> Result<ProcessingOutput, ProcessingError> {
        let recorder = JobRecorder::new(self.store.as_ref(), self.clock.as_ref());

        let mut job_metadata = request.metadata.clone();
        job_metadata.insert("file_name".into(), json!(request.file_name));

        let mut job = recorder.start(NewJob {
            organization_id: request.organization_id.clone(),
            user_id: request.user_id.clone(),
            file_path: request.file_path.display().to_string(),
            file_name: request.file_name.clone(),
            metadata: job_metadata,
        })?;

        match self.run_stages(&recorder, &mut job, &request) {
            Ok(result) => Ok(ProcessingOutput {
                job_id: job.id,
                result,
            }),
            Err(error) => {
                let trace = failure_trace(&error);
                if let Err(record_error) = recorder.fail(&mut job, &error.to_string(), trace) {
                    tracing::error!(
                        job_id = %job.id,
                        error = %record_error,
                        "Could not record job failure"
                    );
                }

                Err(match error {
                    StageError::Extraction(source) => ProcessingError::Extraction {
                        job_id: job.id,
                        source,
                    },
                    source => ProcessingError::Stage {
                        job_id: job.id,
                        source,
                    },
                })
            }
        }
    }

    fn run_stages(
        &self,
        recorder: &JobRecorder<'_>,
        job: &mut ProcessingJob,
        request: &ProcessingRequest,
    ) -> Result<PipelineResult, StageError> {
        let started = Instant::now();

        recorder.advance(job, JobStatus::Extracting)?;
        let extracted = self
            .extraction
            .extract(&request.file_path, &request.organization_id)?;

        recorder.advance(job, JobStatus::Analyzing)?;
        let document_type = classify_document(&extracted.text, &extracted.data);
        tracing::info!(job_id = %job.id, document_type = %document_type, "Document classified");

        let today = self.clock.today();

        recorder.advance(job, JobStatus::Validating)?;
        let cleaned = clean_document(&document_type, extracted.data, today);

        recorder.advance(job, JobStatus::Fixing)?;
        let data = fix_common_issues(&document_type, cleaned, today, &self.config.default_currency);

        recorder.advance(job, JobStatus::AnalyzingConfidence)?;
        let mut scored = analyze_confidence(&document_type, &data, self.config.review_threshold);
        if request.options.force_review && !scored.requires_review {
            tracing::info!(job_id = %job.id, "Review forced by caller");
            scored.requires_review = true;
        }

        let import_result = if self.should_import(&request.options, scored.confidence, scored.requires_review) {
            recorder.advance(job, JobStatus::Importing)?;
            let context = ImportContext {
                user_id: request.user_id.clone(),
                organization_id: request.organization_id.clone(),
            };
            Some(self.imports.dispatch(&document_type, &context, &data))
        } else {
            None
        };

        let mut metadata = request.metadata.clone();
        metadata.insert(
            "processing_time".into(),
            json!(started.elapsed().as_secs_f64()),
        );
        metadata.insert("extraction_method".into(), json!(extracted.method.as_str()));

        let result = PipelineResult {
            success: true,
            document_type,
            data,
            raw_text: extracted.text,
            confidence: scored.confidence,
            requires_review: scored.requires_review,
            questions: scored.questions,
            metadata: metadata.clone(),
            imported: import_result.is_some(),
            import_result,
        };

        let stored = match serde_json::to_value(&result)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        recorder.complete(job, stored, metadata)?;

        Ok(result)
    }

    /// Import needs a confident score, no review flag, and auto-import
    /// enabled both globally and for this run. Both score conditions are
    /// checked independently.
    fn should_import(&self, options: &ProcessOptions, confidence: f64, requires_review: bool) -> bool {
        let enabled = self.config.auto_import && options.auto_import.unwrap_or(true);
        enabled && !requires_review && confidence >= self.config.review_threshold
    }
}

/// Error chain plus, for extraction, one line per failed method.
fn failure_trace(error: &StageError) -> String {
    let mut trace = error_trace(error);
    if let StageError::Extraction(ExtractionError::AllMethodsFailed { failures, .. }) = error {
        for failure in failures {
            trace.push_str(&format!("\n{}: {}", failure.method, failure.reason));
        }
    }
    trace
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use crate::clock::FixedClock;
    use crate::models::enums::ExtractionMethod;
    use crate::pipeline::extraction::{MethodExtractor, MockExtractor};
    use crate::pipeline::import::{ImportError, ImportHandler};
    use crate::pipeline::jobs::{InMemoryJobStore, SqliteJobStore};

    /// Import handler that remembers what it was asked to import.
    #[derive(Default)]
    struct RecordingImporter {
        calls: Mutex<Vec<(ImportContext, Map<String, Value>)>>,
        fail_with: Option<String>,
    }

    impl RecordingImporter {
        fn failing(message: &str) -> Self {
            Self {
                fail_with: Some(message.to_string()),
                ..Default::default()
            }
        }

        fn count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    impl ImportHandler for RecordingImporter {
        fn import(
            &self,
            context: &ImportContext,
            data: &Map<String, Value>,
        ) -> Result<ImportOutcome, ImportError> {
            self.calls
                .lock()
                .unwrap()
                .push((context.clone(), data.clone()));
            match &self.fail_with {
                Some(message) => Err(ImportError::Storage(message.clone())),
                None => {
                    let mut details = Map::new();
                    details.insert("records".into(), json!(1));
                    Ok(ImportOutcome::succeeded(details))
                }
            }
        }
    }

    struct Handlers {
        bank: Arc<RecordingImporter>,
        receipt: Arc<RecordingImporter>,
        income: Arc<RecordingImporter>,
        mobile: Arc<RecordingImporter>,
    }

    impl Handlers {
        fn new() -> Self {
            Self {
                bank: Arc::default(),
                receipt: Arc::default(),
                income: Arc::default(),
                mobile: Arc::default(),
            }
        }

        fn router(&self) -> ImportRouter {
            ImportRouter::standard(
                self.bank.clone(),
                self.receipt.clone(),
                self.income.clone(),
                self.mobile.clone(),
            )
        }

        fn total(&self) -> usize {
            self.bank.count() + self.receipt.count() + self.income.count() + self.mobile.count()
        }
    }

    fn clock() -> Arc<FixedClock> {
        Arc::new(FixedClock::on(2024, 10, 15).unwrap())
    }

    fn vision(extractor: MockExtractor) -> ExtractionCoordinator {
        ExtractionCoordinator::new().with_method(ExtractionMethod::AiVision, Arc::new(extractor))
    }

    fn processor(
        extraction: ExtractionCoordinator,
        router: ImportRouter,
        store: Arc<dyn JobStore>,
    ) -> DocumentProcessor {
        DocumentProcessor::new(extraction, router, store, PipelineConfig::default())
            .with_clock(clock())
    }

    fn request(file_name: &str) -> ProcessingRequest {
        let mut metadata = Map::new();
        metadata.insert("source".into(), json!("upload"));
        ProcessingRequest {
            organization_id: "org-1".into(),
            user_id: "user-1".into(),
            file_path: PathBuf::from(format!("/uploads/{file_name}")),
            file_name: file_name.into(),
            metadata,
            options: ProcessOptions::default(),
        }
    }

    fn stored_job(store: &dyn JobStore, id: Uuid) -> ProcessingJob {
        store.get(&id).unwrap().unwrap()
    }

    #[test]
    fn explicit_label_overrides_heuristics() {
        let store = Arc::new(InMemoryJobStore::new());
        let extractor = MockExtractor::with_text(
            "Amount due 250.00",
            json!({"document_type": "bill", "date": "2024-10-01", "amount": "250.00"}),
        );
        let handlers = Handlers::new();
        let p = processor(vision(extractor), handlers.router(), store.clone());

        let output = p.process(request("bill.pdf")).unwrap();
        assert_eq!(output.result.document_type, DocumentType::Invoice);
        assert_eq!(output.result.data["document_type"], "invoice");
        assert_eq!(stored_job(store.as_ref(), output.job_id).status, JobStatus::Completed);
    }

    #[test]
    fn bank_statement_classified_from_text_and_transactions() {
        let store = Arc::new(InMemoryJobStore::new());
        let extractor = MockExtractor::with_text(
            "ZANACO Bank Statement. Opening balance 100. Closing balance 400.",
            json!({"transactions": [{"date": "2024-09-01", "amount": 300, "description": "Salary deposit"}]}),
        );
        let handlers = Handlers::new();
        let p = processor(vision(extractor), handlers.router(), store);

        let output = p.process(request("statement.pdf")).unwrap();
        assert_eq!(output.result.document_type, DocumentType::BankStatement);
    }

    #[test]
    fn yearless_statement_lines_take_period_end_year() {
        let store = Arc::new(InMemoryJobStore::new());
        let extractor = MockExtractor::with_text(
            "Bank statement. Closing balance 1,200.00",
            json!({
                "statement_period_end": "2024-10-31",
                "transactions": [
                    {"date": "Sep 29", "amount": "K1,000.00", "type": "credit", "description": "Transfer"},
                    {"date": "Sep 29", "amount": "50.00", "description": "Cash deposit at branch"},
                    {"date": "Sep 29", "amount": "20.00", "description": "  "}
                ]
            }),
        );
        let handlers = Handlers::new();
        let p = processor(vision(extractor), handlers.router(), store.clone());

        let output = p.process(request("statement.pdf")).unwrap();
        let transactions = output.result.data["transactions"].as_array().unwrap();
        assert_eq!(transactions.len(), 3);
        for tx in transactions {
            assert_eq!(tx["date"], "2024-09-29");
        }
        assert_eq!(transactions[0]["flow_type"], "income");
        assert_eq!(transactions[0]["amount"], 1000.0);
        assert_eq!(transactions[1]["flow_type"], "income");
        assert_eq!(transactions[2]["flow_type"], "expense");
        assert_eq!(transactions[2]["description"], "Transaction");

        assert_eq!(output.result.confidence, 1.0);
        assert!(output.result.imported);
        assert_eq!(handlers.bank.count(), 1);
        assert_eq!(stored_job(store.as_ref(), output.job_id).status, JobStatus::Completed);
    }

    #[test]
    fn complete_receipt_is_auto_imported() {
        let store = Arc::new(InMemoryJobStore::new());
        let extractor = MockExtractor::with_text(
            "Shoprite receipt",
            json!({"document_type": "receipt", "date": "2024-10-14", "amount": "$45.50", "merchant": "Shoprite"}),
        );
        let handlers = Handlers::new();
        let p = processor(vision(extractor), handlers.router(), store.clone());

        let output = p.process(request("receipt.jpg")).unwrap();
        let result = &output.result;
        assert_eq!(result.confidence, 1.0);
        assert!(!result.requires_review);
        assert!(result.questions.is_empty());
        assert!(result.imported);
        assert!(result.import_result.as_ref().unwrap().success);
        assert_eq!(result.data["amount"], 45.5);
        assert_eq!(result.data["currency"], "ZMW");

        let calls = handlers.receipt.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0.organization_id, "org-1");
        assert_eq!(calls[0].0.user_id, "user-1");
        assert_eq!(calls[0].1["merchant"], "Shoprite");

        let job = stored_job(store.as_ref(), output.job_id);
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.result.unwrap()["imported"], true);
    }

    #[test]
    fn incomplete_invoice_asks_one_question_and_skips_import() {
        let store = Arc::new(InMemoryJobStore::new());
        let extractor = MockExtractor::with_text(
            "Invoice",
            json!({"document_type": "invoice", "date": "2024-10-01", "total_amount": 900}),
        );
        let handlers = Handlers::new();
        let p = processor(vision(extractor), handlers.router(), store.clone());

        let output = p.process(request("invoice.pdf")).unwrap();
        let result = &output.result;
        assert!((result.confidence - 2.0 / 3.0).abs() < 1e-9);
        assert!(result.requires_review);
        assert_eq!(result.questions.len(), 1);
        assert_eq!(result.questions[0].field, "customer_name");
        assert_eq!(result.questions[0].question, "What is the customer_name?");
        assert!(!result.imported);
        assert!(result.import_result.is_none());
        assert_eq!(handlers.total(), 0);

        let job = stored_job(store.as_ref(), output.job_id);
        assert_eq!(job.status, JobStatus::Completed);
        let stored = job.result.unwrap();
        assert_eq!(stored["imported"], false);
        assert!(!stored.contains_key("import_result"));
    }

    #[test]
    fn all_methods_failing_fails_the_job() {
        let store = Arc::new(InMemoryJobStore::new());
        let vision = Arc::new(MockExtractor::failing("vision service unavailable"));
        let pdf = Arc::new(MockExtractor::failing("not a pdf"));
        let ocr = Arc::new(MockExtractor::failing("tesseract crashed"));
        let extraction = ExtractionCoordinator::new()
            .with_method(ExtractionMethod::AiVision, vision.clone())
            .with_method(ExtractionMethod::PdfParser, pdf.clone())
            .with_method(ExtractionMethod::Ocr, ocr.clone());
        let handlers = Handlers::new();
        let p = processor(extraction, handlers.router(), store.clone());

        let err = p.process(request("scan.png")).unwrap_err();
        assert!(matches!(
            err,
            ProcessingError::Extraction {
                source: ExtractionError::AllMethodsFailed { .. },
                ..
            }
        ));
        assert_eq!(
            err.to_string(),
            "All extraction methods failed. Last error: tesseract crashed"
        );
        assert_eq!((vision.calls(), pdf.calls(), ocr.calls()), (1, 1, 1));

        let job = stored_job(store.as_ref(), err.job_id().unwrap());
        assert_eq!(job.status, JobStatus::Failed);
        let error = job.error.unwrap();
        assert!(!error.error.is_empty());
        assert!(error.trace.contains("pdf_parser: not a pdf"));
        assert!(job.result.is_none());
        assert!(job.completed_at.is_some());
        assert_eq!(handlers.total(), 0);
    }

    #[test]
    fn first_successful_method_wins() {
        let store = Arc::new(InMemoryJobStore::new());
        let vision = Arc::new(MockExtractor::empty());
        let pdf = Arc::new(MockExtractor::with_text(
            "Receipt",
            json!({"document_type": "receipt"}),
        ));
        let ocr = Arc::new(MockExtractor::with_text("unused", json!({})));
        let extraction = ExtractionCoordinator::new()
            .with_method(ExtractionMethod::Ocr, ocr.clone())
            .with_method(ExtractionMethod::PdfParser, pdf.clone())
            .with_method(ExtractionMethod::AiVision, vision.clone());
        let p = processor(extraction, Handlers::new().router(), store);

        let output = p.process(request("r.pdf")).unwrap();
        assert_eq!(output.result.metadata["extraction_method"], "pdf_parser");
        assert_eq!((vision.calls(), pdf.calls(), ocr.calls()), (1, 1, 0));
    }

    #[test]
    fn import_failure_does_not_fail_the_job() {
        let store = Arc::new(InMemoryJobStore::new());
        let extractor = MockExtractor::with_text(
            "Receipt",
            json!({"document_type": "receipt", "date": "2024-10-14", "amount": 10, "merchant": "Pick n Pay"}),
        );
        let failing = Arc::new(RecordingImporter::failing("ledger locked"));
        let router = ImportRouter::new().with_handler("receipt", failing.clone());
        let p = processor(vision(extractor), router, store.clone());

        let output = p.process(request("r.jpg")).unwrap();
        assert!(output.result.imported);
        let outcome = output.result.import_result.unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.message.as_deref(), Some("Storage error: ledger locked"));
        assert_eq!(failing.count(), 1);
        assert_eq!(stored_job(store.as_ref(), output.job_id).status, JobStatus::Completed);
    }

    struct PanickingImporter;

    impl ImportHandler for PanickingImporter {
        fn import(
            &self,
            _context: &ImportContext,
            _data: &Map<String, Value>,
        ) -> Result<ImportOutcome, ImportError> {
            panic!("ledger connection dropped")
        }
    }

    #[test]
    fn panicking_importer_still_completes_the_job() {
        let store = Arc::new(InMemoryJobStore::new());
        let extractor = MockExtractor::with_text(
            "Receipt",
            json!({"document_type": "receipt", "date": "2024-10-14", "amount": 10, "merchant": "Pick n Pay"}),
        );
        let router = ImportRouter::new().with_handler("receipt", Arc::new(PanickingImporter));
        let p = processor(vision(extractor), router, store.clone());

        let output = p.process(request("r.jpg")).unwrap();
        let outcome = output.result.import_result.unwrap();
        assert!(!outcome.success);
        assert_eq!(stored_job(store.as_ref(), output.job_id).status, JobStatus::Completed);
    }

    #[test]
    fn unsupported_type_reports_unsuccessful_import() {
        let store = Arc::new(InMemoryJobStore::new());
        let extractor = MockExtractor::with_text(
            "Quotation",
            json!({"document_type": "quotation", "date": "2024-10-14", "amount": 75}),
        );
        let p = processor(vision(extractor), Handlers::new().router(), store);

        let output = p.process(request("quote.pdf")).unwrap();
        assert_eq!(output.result.document_type, DocumentType::Quote);
        let outcome = output.result.import_result.unwrap();
        assert!(!outcome.success);
        assert_eq!(
            outcome.message.as_deref(),
            Some("Auto-import not supported for document type: quote")
        );
    }

    #[test]
    fn caller_can_opt_out_of_import_or_force_review() {
        let data = json!({"document_type": "receipt", "date": "2024-10-14", "amount": 10, "merchant": "Spar"});

        let handlers = Handlers::new();
        let p = processor(
            vision(MockExtractor::with_text("Receipt", data.clone())),
            handlers.router(),
            Arc::new(InMemoryJobStore::new()),
        );

        let mut opted_out = request("a.jpg");
        opted_out.options.auto_import = Some(false);
        let output = p.process(opted_out).unwrap();
        assert!(!output.result.imported);
        assert!(!output.result.requires_review);

        let mut forced = request("b.jpg");
        forced.options.force_review = true;
        let output = p.process(forced).unwrap();
        assert!(output.result.requires_review);
        assert_eq!(output.result.confidence, 1.0);
        assert!(output.result.questions.is_empty());
        assert!(!output.result.imported);

        assert_eq!(handlers.total(), 0);
    }

    #[test]
    fn global_switch_disables_import() {
        let handlers = Handlers::new();
        let config = PipelineConfig {
            auto_import: false,
            ..PipelineConfig::default()
        };
        let extractor = MockExtractor::with_text(
            "Receipt",
            json!({"document_type": "receipt", "date": "2024-10-14", "amount": 10, "merchant": "Spar"}),
        );
        let p = DocumentProcessor::new(
            vision(extractor),
            handlers.router(),
            Arc::new(InMemoryJobStore::new()),
            config,
        )
        .with_clock(clock());

        let output = p.process(request("r.jpg")).unwrap();
        assert!(!output.result.imported);
        assert_eq!(handlers.total(), 0);
    }

    #[test]
    fn metadata_merges_caller_and_pipeline_keys() {
        let store = Arc::new(InMemoryJobStore::new());
        let extractor = MockExtractor::with_text("Receipt", json!({"document_type": "receipt"}));
        let p = processor(vision(extractor), Handlers::new().router(), store.clone());

        let output = p.process(request("r.jpg")).unwrap();
        let metadata = &output.result.metadata;
        assert_eq!(metadata["source"], "upload");
        assert_eq!(metadata["extraction_method"], "ai_vision");
        assert!(metadata["processing_time"].as_f64().unwrap() >= 0.0);

        let job = stored_job(store.as_ref(), output.job_id);
        assert_eq!(&job.metadata, metadata);
        assert_eq!(job.file_name, "r.jpg");
    }

    #[test]
    fn missing_date_and_currency_use_injected_today() {
        let extractor = MockExtractor::with_text(
            "Receipt",
            json!({"document_type": "receipt", "total": "12.00", "merchant": "Game"}),
        );
        let p = processor(
            vision(extractor),
            Handlers::new().router(),
            Arc::new(InMemoryJobStore::new()),
        );

        let output = p.process(request("r.jpg")).unwrap();
        assert_eq!(output.result.data["date"], "2024-10-15");
        assert_eq!(output.result.data["currency"], "ZMW");
        assert_eq!(output.result.data["amount"], 12.0);
    }

    #[test]
    fn slow_method_times_out_and_next_method_runs() {
        let slow = Arc::new(
            MockExtractor::with_text("too late", json!({})).with_delay(Duration::from_millis(500)),
        );
        let ocr = Arc::new(MockExtractor::with_text("Receipt", json!({"document_type": "receipt"})));
        let extraction = ExtractionCoordinator::new()
            .with_method(ExtractionMethod::AiVision, slow)
            .with_method(ExtractionMethod::Ocr, ocr);
        let config = PipelineConfig {
            method_timeout: Some(Duration::from_millis(50)),
            ..PipelineConfig::default()
        };
        let p = DocumentProcessor::new(
            extraction,
            Handlers::new().router(),
            Arc::new(InMemoryJobStore::new()),
            config,
        );

        let output = p.process(request("r.jpg")).unwrap();
        assert_eq!(output.result.metadata["extraction_method"], "ocr");
    }

    #[test]
    fn coordinator_deadline_wins_over_config() {
        let config = PipelineConfig {
            method_timeout: Some(Duration::from_secs(30)),
            ..PipelineConfig::default()
        };
        let store: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::new());

        let explicit = vision(MockExtractor::empty()).with_timeout(Some(Duration::from_millis(50)));
        let p = DocumentProcessor::new(explicit, ImportRouter::new(), store.clone(), config.clone());
        assert_eq!(p.extraction.method_timeout(), Some(Duration::from_millis(50)));

        let unset = vision(MockExtractor::empty());
        let p = DocumentProcessor::new(unset, ImportRouter::new(), store, config);
        assert_eq!(p.extraction.method_timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn concurrent_documents_get_independent_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SqliteJobStore::open(&dir.path().join("jobs.db")).unwrap());
        let handlers = Handlers::new();
        let extractor = MockExtractor::with_text(
            "Receipt",
            json!({"document_type": "receipt", "date": "2024-10-14", "amount": 5, "merchant": "Spar"}),
        );
        let p = processor(vision(extractor), handlers.router(), store.clone());

        let ids: Vec<Uuid> = std::thread::scope(|scope| {
            let workers: Vec<_> = (0..4)
                .map(|i| {
                    let p = &p;
                    scope.spawn(move || p.process(request(&format!("r{i}.jpg"))).unwrap().job_id)
                })
                .collect();
            workers.into_iter().map(|w| w.join().unwrap()).collect()
        });

        let mut unique = ids.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), 4);
        for id in ids {
            assert_eq!(stored_job(store.as_ref(), id).status, JobStatus::Completed);
        }
        assert_eq!(handlers.receipt.count(), 4);
    }

    #[test]
    fn reaper_uses_configured_threshold() {
        let store = Arc::new(InMemoryJobStore::new());
        let then = FixedClock::on(2024, 10, 15).unwrap();
        let mut stuck = JobRecorder::new(store.as_ref(), &then)
            .start(NewJob::default())
            .unwrap();
        JobRecorder::new(store.as_ref(), &then)
            .advance(&mut stuck, JobStatus::Extracting)
            .unwrap();

        let later = Arc::new(FixedClock::new(then.now() + chrono::Duration::hours(1)));
        let p = DocumentProcessor::new(
            ExtractionCoordinator::new(),
            ImportRouter::new(),
            store.clone(),
            PipelineConfig::default(),
        )
        .with_clock(later);

        let report = p.reap_stale_jobs().unwrap();
        assert_eq!(report.failed, vec![stuck.id]);
        assert_eq!(stored_job(store.as_ref(), stuck.id).status, JobStatus::Failed);
    }

    #[test]
    fn pipeline_result_serializes_expected_shape() {
        let result = PipelineResult {
            success: true,
            document_type: DocumentType::Receipt,
            data: Map::new(),
            raw_text: "text".into(),
            confidence: 1.0,
            requires_review: false,
            questions: Vec::new(),
            metadata: Map::new(),
            imported: false,
            import_result: None,
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["document_type"], "receipt");
        assert_eq!(value["imported"], false);
        assert!(value.get("import_result").is_none());
    }

    #[test]
    fn extractor_trait_objects_are_shareable() {
        fn assert_sync<T: Send + Sync>() {}
        assert_sync::<DocumentProcessor>();
        let _: Arc<dyn MethodExtractor> = Arc::new(MockExtractor::empty());
    }
}
