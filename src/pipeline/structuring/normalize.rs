use crate::models::document::DocumentType;

/// Synonym table: lower-cased label → canonical type label.
const SYNONYMS: &[(&str, &str)] = &[
    // Receipts and expenses
    ("receipt", "receipt"),
    ("expense", "receipt"),
    ("expenses", "receipt"),
    ("expense receipt", "receipt"),
    ("purchase", "receipt"),
    ("till slip", "receipt"),
    // Invoices
    ("invoice", "invoice"),
    ("bill", "invoice"),
    ("tax invoice", "invoice"),
    ("sales invoice", "invoice"),
    // Bank statements
    ("bank_statement", "bank_statement"),
    ("bank statement", "bank_statement"),
    ("statement", "bank_statement"),
    ("account statement", "bank_statement"),
    // Mobile money
    ("mobile_money", "mobile_money"),
    ("mobile money", "mobile_money"),
    ("momo", "mobile_money"),
    ("airtel", "mobile_money"),
    ("airtel money", "mobile_money"),
    ("mtn", "mobile_money"),
    ("mtn money", "mobile_money"),
    ("zamtel", "mobile_money"),
    ("zamtel money", "mobile_money"),
    // Income
    ("income", "income"),
    ("revenue", "income"),
    ("sales", "income"),
    // Quotes
    ("quote", "quote"),
    ("quotation", "quote"),
    ("estimate", "quote"),
];

/// Lower-case, trim and map known synonyms onto one canonical label.
/// Unmapped labels pass through (still lower-cased and trimmed).
pub fn normalize_document_type(raw: &str) -> String {
    let label = raw.trim().to_lowercase();
    SYNONYMS
        .iter()
        .find(|(synonym, _)| *synonym == label)
        .map(|(_, canonical)| (*canonical).to_string())
        .unwrap_or(label)
}

/// `normalize_document_type` lifted into the typed enum.
pub fn normalize_to_type(raw: &str) -> DocumentType {
    DocumentType::from_canonical(&normalize_document_type(raw))
}
