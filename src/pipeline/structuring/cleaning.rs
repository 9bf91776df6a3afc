//! Type-generic and type-specific normalization of extracted fields.

use chrono::NaiveDate;
use serde_json::{json, Map, Value};

use super::dates::{clean_date, parse_bank_statement_date};
use super::fields::{is_set, str_field};
use crate::models::document::{DocumentType, Transaction};
use crate::models::enums::FlowType;

const AMOUNT_FIELDS: [&str; 3] = ["amount", "total", "total_amount"];
const DATE_FIELDS: [&str; 4] = ["date", "due_date", "statement_period_start", "statement_period_end"];

const DEFAULT_DESCRIPTION: &str = "Transaction";

/// Parse a money value. Numbers pass through; strings keep only digits and
/// dots before parsing. Anything unreadable is 0.0.
pub fn clean_amount(value: &Value) -> f64 {
    let parsed = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => {
            let digits: String = s.chars().filter(|c| c.is_ascii_digit() || *c == '.').collect();
            digits.parse::<f64>().unwrap_or(0.0)
        }
        _ => 0.0,
    };
    if parsed.is_finite() {
        parsed
    } else {
        0.0
    }
}

/// Run the generic pass followed by the pass for `doc_type`.
pub fn clean_document(
    doc_type: &DocumentType,
    mut data: Map<String, Value>,
    today: NaiveDate,
) -> Map<String, Value> {
    // The generic pass overwrites `type`; remember whether the document had one.
    let had_type_field = is_set(&data, "type");

    data.insert("document_type".into(), json!(doc_type.as_str()));
    data.insert("type".into(), json!(doc_type.as_str()));

    for field in AMOUNT_FIELDS {
        if is_set(&data, field) {
            let amount = clean_amount(&data[field]);
            data.insert(field.into(), json!(amount));
        }
    }

    for field in DATE_FIELDS {
        if is_set(&data, field) {
            let cleaned = clean_date(&data[field]).map_or(Value::Null, Value::String);
            data.insert(field.into(), cleaned);
        }
    }

    match doc_type {
        DocumentType::BankStatement => clean_bank_statement(&mut data, today),
        DocumentType::MobileMoney => clean_mobile_money(&mut data, had_type_field),
        _ => {}
    }

    data
}

fn clean_bank_statement(data: &mut Map<String, Value>, today: NaiveDate) {
    let period_end = str_field(data, "statement_period_end").map(str::to_string);

    let entries = match data.remove("transactions") {
        Some(Value::Array(entries)) => entries,
        Some(Value::Null) | None => Vec::new(),
        Some(other) => {
            tracing::warn!(kind = json_kind(&other), "transactions is not a list, discarding");
            Vec::new()
        }
    };

    let cleaned: Vec<Value> = entries
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| match entry {
            Value::Object(fields) => Some(clean_transaction(fields, period_end.as_deref(), today)),
            other => {
                tracing::warn!(index, kind = json_kind(&other), "Skipping non-object transaction");
                None
            }
        })
        .collect();

    data.insert("transactions".into(), Value::Array(cleaned));
}

fn clean_transaction(
    mut fields: Map<String, Value>,
    period_end: Option<&str>,
    today: NaiveDate,
) -> Value {
    let raw_date = str_field(&fields, "date").unwrap_or("");
    let description = str_field(&fields, "description").unwrap_or(DEFAULT_DESCRIPTION);

    let transaction = Transaction {
        date: parse_bank_statement_date(raw_date, period_end, today),
        // Direction lives in flow_type; the amount is a magnitude.
        amount: clean_amount(fields.get("amount").unwrap_or(&Value::Null)).abs(),
        flow_type: str_field(&fields, "flow_type")
            .and_then(direction_word)
            .unwrap_or_else(|| infer_transaction_flow(&fields)),
        description: description.to_string(),
    };

    if let Ok(Value::Object(typed)) = serde_json::to_value(&transaction) {
        fields.extend(typed);
    }
    Value::Object(fields)
}

/// Map a debit/credit style word onto a flow direction.
fn direction_word(word: &str) -> Option<FlowType> {
    match word.trim().to_lowercase().as_str() {
        "debit" | "expense" | "withdrawal" => Some(FlowType::Expense),
        "credit" | "income" | "deposit" => Some(FlowType::Income),
        _ => None,
    }
}

/// Flow direction of a statement line without an explicit `flow_type`.
/// Defaults to expense.
pub fn infer_transaction_flow(fields: &Map<String, Value>) -> FlowType {
    if let Some(flow) = str_field(fields, "type").and_then(direction_word) {
        return flow;
    }

    let description = str_field(fields, "description").unwrap_or("").to_lowercase();
    if description.contains("deposit") || description.contains("credit") {
        return FlowType::Income;
    }

    FlowType::Expense
}

fn clean_mobile_money(data: &mut Map<String, Value>, had_type_field: bool) {
    if let Some(provider) = data.get("provider").and_then(Value::as_str) {
        let normalized = normalize_provider(provider);
        data.insert("provider".into(), json!(normalized));
    }

    if !is_set(data, "flow_type") && !had_type_field {
        let flow = infer_mobile_money_flow(data);
        data.insert("flow_type".into(), json!(flow.as_str()));
    }
}

/// Canonical wallet name for a provider label.
pub fn normalize_provider(raw: &str) -> String {
    let provider = raw.trim().to_lowercase();
    if provider.contains("airtel") {
        "Airtel Money".to_string()
    } else if provider.contains("mtn") {
        "MTN Money".to_string()
    } else if provider.contains("zamtel") {
        "Zamtel Money".to_string()
    } else {
        provider
    }
}

/// Flow direction of a mobile-money slip. Defaults to income: wallet
/// activity for this user base is mostly incoming payments.
pub fn infer_mobile_money_flow(data: &Map<String, Value>) -> FlowType {
    let context = str_field(data, "transaction_context")
        .or_else(|| str_field(data, "description"))
        .unwrap_or("")
        .to_lowercase();

    if context.contains("received") || context.contains("payment from") {
        FlowType::Income
    } else if context.contains("sent") || context.contains("payment to") {
        FlowType::Expense
    } else {
        FlowType::Income
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
