use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::ImportError;
use crate::models::document::DocumentType;

/// Who is importing, and into which organization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportContext {
    pub user_id: String,
    pub organization_id: String,
}

/// Result of an auto-import attempt. Handler-specific keys (record ids,
/// counts) are flattened next to `success`/`message`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl ImportOutcome {
    pub fn succeeded(details: Map<String, Value>) -> Self {
        Self {
            success: true,
            message: None,
            details,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            details: Map::new(),
        }
    }
}

/// Persists one cleaned document as bookkeeping records.
///
/// Report failures through `Err`. A panic is turned into an unsuccessful
/// outcome only in unwinding builds; release builds abort on panic.
pub trait ImportHandler: Send + Sync {
    fn import(
        &self,
        context: &ImportContext,
        data: &Map<String, Value>,
    ) -> Result<ImportOutcome, ImportError>;
}

/// Type → handler lookup table for auto-import.
#[derive(Default, Clone)]
pub struct ImportRouter {
    handlers: HashMap<String, Arc<dyn ImportHandler>>,
}

impl ImportRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// The four standard routines; receipts also serve `expense`.
    pub fn standard(
        bank_statement: Arc<dyn ImportHandler>,
        receipt: Arc<dyn ImportHandler>,
        income: Arc<dyn ImportHandler>,
        mobile_money: Arc<dyn ImportHandler>,
    ) -> Self {
        Self::new()
            .with_handler(DocumentType::BankStatement.as_str(), bank_statement)
            .with_handler(DocumentType::Receipt.as_str(), Arc::clone(&receipt))
            .with_handler("expense", receipt)
            .with_handler(DocumentType::Income.as_str(), income)
            .with_handler(DocumentType::MobileMoney.as_str(), mobile_money)
    }

    pub fn with_handler(mut self, doc_type: &str, handler: Arc<dyn ImportHandler>) -> Self {
        self.handlers.insert(doc_type.to_string(), handler);
        self
    }

    pub fn supports(&self, doc_type: &DocumentType) -> bool {
        self.handlers.contains_key(doc_type.as_str())
    }

    /// Route a document to its handler. Unsupported types, handler errors
    /// and handler panics come back as an unsuccessful outcome rather than
    /// an error.
    pub fn dispatch(
        &self,
        doc_type: &DocumentType,
        context: &ImportContext,
        data: &Map<String, Value>,
    ) -> ImportOutcome {
        let Some(handler) = self.handlers.get(doc_type.as_str()) else {
            return ImportOutcome::failed(format!(
                "Auto-import not supported for document type: {doc_type}"
            ));
        };

        let attempt = panic::catch_unwind(AssertUnwindSafe(|| handler.import(context, data)));
        let result = match attempt {
            Ok(result) => result,
            Err(payload) => {
                let reason = panic_message(payload.as_ref());
                tracing::error!(
                    document_type = %doc_type,
                    organization_id = %context.organization_id,
                    panic = %reason,
                    "Import handler panicked"
                );
                return ImportOutcome::failed(format!("Import handler panicked: {reason}"));
            }
        };

        match result {
            Ok(outcome) => {
                tracing::info!(
                    document_type = %doc_type,
                    organization_id = %context.organization_id,
                    success = outcome.success,
                    "Auto-import finished"
                );
                outcome
            }
            Err(e) => {
                tracing::error!(
                    document_type = %doc_type,
                    organization_id = %context.organization_id,
                    error = %e,
                    "Auto-import failed"
                );
                ImportOutcome::failed(e.to_string())
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
