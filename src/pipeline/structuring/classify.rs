use serde_json::{Map, Value};

use super::fields::{has_value, str_field};
use super::normalize::normalize_to_type;
use crate::models::document::DocumentType;

/// Score a candidate type must reach to be chosen.
pub const CLASSIFICATION_THRESHOLD: u32 = 5;

/// Points per keyword found in the text.
const KEYWORD_POINTS: u32 = 2;

/// Number of characters of text included in the fallback diagnostic.
const PREVIEW_CHARS: usize = 200;

/// Candidates in evaluation order. The first to clear the threshold wins,
/// even if a later candidate would score higher.
const CANDIDATES: [DocumentType; 5] = [
    DocumentType::BankStatement,
    DocumentType::Receipt,
    DocumentType::Invoice,
    DocumentType::MobileMoney,
    DocumentType::Quote,
];

fn keywords(candidate: &DocumentType) -> &'static [&'static str] {
    match candidate {
        DocumentType::BankStatement => &[
            "bank statement",
            "account statement",
            "closing balance",
            "opening balance",
            "transaction history",
        ],
        DocumentType::Receipt => &[
            "receipt",
            "cash sale",
            "subtotal",
            "change due",
            "thank you for shopping",
        ],
        DocumentType::Invoice => &[
            "invoice",
            "bill to",
            "due date",
            "invoice number",
            "payment terms",
        ],
        DocumentType::MobileMoney => &[
            "mobile money",
            "airtel money",
            "mtn money",
            "zamtel",
            "transaction id",
        ],
        DocumentType::Quote => &[
            "quotation",
            "quote",
            "estimate",
            "valid until",
            "proforma",
        ],
        _ => &[],
    }
}

/// Heuristic score of one candidate against lower-cased text and fields.
pub fn candidate_score(candidate: &DocumentType, text_lower: &str, data: &Map<String, Value>) -> u32 {
    let keyword_hits = keywords(candidate)
        .iter()
        .filter(|kw| text_lower.contains(*kw))
        .count() as u32;
    let mut score = keyword_hits * KEYWORD_POINTS;

    score += match candidate {
        DocumentType::BankStatement if has_value(data, "transactions") => 5,
        DocumentType::Receipt if has_value(data, "amount") => 1,
        DocumentType::Invoice if has_value(data, "invoice_number") => 3,
        DocumentType::MobileMoney if has_value(data, "transaction_id") => 3,
        _ => 0,
    };

    score
}

/// Explicit `document_type`/`type` label, unless it says "unknown".
fn explicit_type(data: &Map<String, Value>) -> Option<DocumentType> {
    ["document_type", "type"]
        .iter()
        .filter_map(|field| str_field(data, field))
        .map(normalize_to_type)
        .find(|doc_type| *doc_type != DocumentType::Unknown)
}

/// Decide the canonical document type.
///
/// An explicit label always wins. Otherwise candidates are scored in fixed
/// order and the first reaching `CLASSIFICATION_THRESHOLD` is returned.
pub fn classify_document(text: &str, data: &Map<String, Value>) -> DocumentType {
    if let Some(doc_type) = explicit_type(data) {
        return doc_type;
    }

    let text_lower = text.to_lowercase();
    for candidate in CANDIDATES {
        if candidate_score(&candidate, &text_lower, data) >= CLASSIFICATION_THRESHOLD {
            return candidate;
        }
    }

    let field_names: Vec<&str> = data.keys().map(String::as_str).collect();
    let preview: String = text.chars().take(PREVIEW_CHARS).collect();
    tracing::info!(
        fields = ?field_names,
        text_preview = %preview,
        "Could not determine document type, using unknown"
    );
    DocumentType::Unknown
}
