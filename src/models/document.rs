use serde::{Deserialize, Serialize};

use super::enums::FlowType;

/// Canonical document type.
///
/// Explicit labels the normalizer does not recognise are kept verbatim
/// (lower-cased) in `Other`, so downstream routing can still report them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum DocumentType {
    Receipt,
    Invoice,
    BankStatement,
    MobileMoney,
    Income,
    Quote,
    Unknown,
    Other(String),
}

impl DocumentType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Receipt => "receipt",
            Self::Invoice => "invoice",
            Self::BankStatement => "bank_statement",
            Self::MobileMoney => "mobile_money",
            Self::Income => "income",
            Self::Quote => "quote",
            Self::Unknown => "unknown",
            Self::Other(label) => label,
        }
    }

    /// Map an already-canonical label onto its variant.
    pub fn from_canonical(label: &str) -> Self {
        match label {
            "receipt" => Self::Receipt,
            "invoice" => Self::Invoice,
            "bank_statement" => Self::BankStatement,
            "mobile_money" => Self::MobileMoney,
            "income" => Self::Income,
            "quote" => Self::Quote,
            "unknown" | "" => Self::Unknown,
            other => Self::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for DocumentType {
    fn from(label: String) -> Self {
        Self::from_canonical(&label)
    }
}

impl From<DocumentType> for String {
    fn from(doc_type: DocumentType) -> Self {
        doc_type.as_str().to_string()
    }
}

/// A single bank-statement line item after cleaning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// ISO calendar date (`YYYY-MM-DD`).
    pub date: String,
    pub amount: f64,
    pub flow_type: FlowType,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    TextInput,
}

/// A question put to the user for a required field the document lacked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewQuestion {
    pub field: String,
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    pub question: String,
    pub required: bool,
}

impl ReviewQuestion {
    pub fn for_missing_field(field: &str) -> Self {
        Self {
            field: field.to_string(),
            kind: QuestionKind::TextInput,
            question: format!("What is the {field}?"),
            required: true,
        }
    }
}

/// Field-completeness score for a cleaned document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceResult {
    /// Always within `[0, 1]`.
    pub confidence: f64,
    pub requires_review: bool,
    pub questions: Vec<ReviewQuestion>,
}
