use serde_json::{Map, Value};

use super::fields::has_value;
use crate::models::document::{ConfidenceResult, DocumentType, ReviewQuestion};

/// Fields a document of the given type must carry to skip review.
pub fn required_fields(doc_type: &DocumentType) -> &'static [&'static str] {
    match doc_type {
        DocumentType::Receipt => &["date", "amount", "merchant"],
        DocumentType::Invoice => &["date", "total_amount", "customer_name"],
        DocumentType::BankStatement => &["transactions"],
        DocumentType::MobileMoney => &["date", "amount", "transaction_id"],
        _ => &["date", "amount"],
    }
}

/// Share of required fields that are present and non-empty.
/// An empty requirement list scores 1.0.
pub fn field_completeness(required: &[&str], data: &Map<String, Value>) -> f64 {
    if required.is_empty() {
        return 1.0;
    }
    let present = required.iter().filter(|field| has_value(data, field)).count();
    present as f64 / required.len() as f64
}

/// Score a cleaned document and, below `review_threshold`, ask one question
/// per missing required field (in table order).
pub fn analyze_confidence(
    doc_type: &DocumentType,
    data: &Map<String, Value>,
    review_threshold: f64,
) -> ConfidenceResult {
    let required = required_fields(doc_type);
    let confidence = field_completeness(required, data).clamp(0.0, 1.0);
    let requires_review = confidence < review_threshold;

    let questions = if requires_review {
        required
            .iter()
            .filter(|field| !has_value(data, field))
            .map(|field| ReviewQuestion::for_missing_field(field))
            .collect()
    } else {
        Vec::new()
    };

    tracing::debug!(
        document_type = %doc_type,
        confidence,
        requires_review,
        questions = questions.len(),
        "Confidence analyzed"
    );

    ConfidenceResult {
        confidence,
        requires_review,
        questions,
    }
}
