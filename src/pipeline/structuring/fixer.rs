use chrono::NaiveDate;
use serde_json::{json, Map, Value};

use super::dates::iso;
use super::fields::has_value;
use crate::models::document::DocumentType;

/// Fill defaulted fields and copy equivalent fields across.
///
/// Missing `date` becomes today, missing `currency` becomes
/// `default_currency`. Receipts take `amount` from `total`; invoices take
/// `total_amount` from `amount`.
pub fn fix_common_issues(
    doc_type: &DocumentType,
    mut data: Map<String, Value>,
    today: NaiveDate,
    default_currency: &str,
) -> Map<String, Value> {
    if !has_value(&data, "date") {
        data.insert("date".into(), json!(iso(today)));
    }
    if !has_value(&data, "currency") {
        data.insert("currency".into(), json!(default_currency));
    }

    match doc_type {
        DocumentType::Receipt => copy_if_missing(&mut data, "total", "amount"),
        DocumentType::Invoice => copy_if_missing(&mut data, "amount", "total_amount"),
        _ => {}
    }

    data
}

fn copy_if_missing(data: &mut Map<String, Value>, from: &str, to: &str) {
    if has_value(data, to) || !has_value(data, from) {
        return;
    }
    if let Some(value) = data.get(from).cloned() {
        tracing::debug!(from, to, "Filling missing field from equivalent");
        data.insert(to.to_string(), value);
    }
}
