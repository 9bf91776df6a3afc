use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::enums::ExtractionMethod;

/// Text and structured fields pulled out of an uploaded document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedDocument {
    pub text: String,
    pub data: Map<String, Value>,
    pub method: ExtractionMethod,
}

/// What an extraction backend handed back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawExtraction {
    #[serde(default)]
    pub extracted_text: String,
    #[serde(default)]
    pub extracted_data: Map<String, Value>,
}

/// Result of one extraction method. Failures are data, not control flow.
#[derive(Debug, Clone, PartialEq)]
pub enum MethodOutcome {
    Extracted(RawExtraction),
    Empty,
    Failed(String),
}

impl MethodOutcome {
    /// Only an outcome carrying non-empty text counts as a success.
    pub fn into_success(self) -> Option<RawExtraction> {
        match self {
            Self::Extracted(raw) if !raw.extracted_text.is_empty() => Some(raw),
            _ => None,
        }
    }
}

/// A method that failed or came back empty during a coordinated run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MethodFailure {
    pub method: ExtractionMethod,
    pub reason: String,
}

/// Extraction backend abstraction (vision model, PDF text layer, OCR).
pub trait MethodExtractor: Send + Sync {
    fn extract(&self, file_path: &Path, organization_id: &str) -> MethodOutcome;
}
