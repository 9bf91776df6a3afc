use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde_json::{Map, Value};

use super::types::{MethodExtractor, MethodOutcome, RawExtraction};

/// Mock extractor for unit testing without a vision/PDF/OCR backend.
pub struct MockExtractor {
    outcome: MethodOutcome,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl MockExtractor {
    pub fn new(outcome: MethodOutcome) -> Self {
        Self {
            outcome,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Returns the given text and fields on every call.
    pub fn with_text(text: &str, data: Value) -> Self {
        let extracted_data = match data {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self::new(MethodOutcome::Extracted(RawExtraction {
            extracted_text: text.to_string(),
            extracted_data,
        }))
    }

    pub fn empty() -> Self {
        Self::new(MethodOutcome::Empty)
    }

    pub fn failing(message: &str) -> Self {
        Self::new(MethodOutcome::Failed(message.to_string()))
    }

    /// Sleep before answering (exercises the per-method deadline).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl MethodExtractor for MockExtractor {
    fn extract(&self, _file_path: &Path, _organization_id: &str) -> MethodOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        self.outcome.clone()
    }
}
