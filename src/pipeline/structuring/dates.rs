use std::sync::LazyLock;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde_json::Value;

/// Date-only layouts accepted by `parse_date`, tried in order.
/// Day-first precedes month-first for slash dates.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d/%m/%Y",
    "%m/%d/%Y",
    "%d-%m-%Y",
    "%d.%m.%Y",
    "%d %b %Y",
    "%d-%b-%Y",
    "%d %b, %Y",
    "%b %d %Y",
    "%b %d, %Y",
];

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// "Sep 29" or "Sep 29 2024": three-letter month, day, optional year.
static MONTH_DAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^([a-z]{3})[a-z]*\.?\s+(\d{1,2})(?:,?\s+(\d{4}))?\b")
        .expect("month-day pattern compiles")
});

/// Format a date the way every cleaned field stores it.
pub fn iso(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Generic calendar-date parse. Inputs without a year are rejected.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.date_naive());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(dt.date());
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
}

/// Clean a date field to ISO form. Anything unparsable becomes `None`.
pub fn clean_date(value: &Value) -> Option<String> {
    value.as_str().and_then(parse_date).map(iso)
}

fn month_number(abbrev: &str) -> Option<u32> {
    let month = match abbrev.to_lowercase().as_str() {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

/// Parse a statement line-item date, inferring a missing year.
///
/// A year-less "Sep 29" takes its year from `statement_period_end` when that
/// parses, otherwise from `today`. Empty or unreadable input yields `today`.
pub fn parse_bank_statement_date(
    date_str: &str,
    statement_period_end: Option<&str>,
    today: NaiveDate,
) -> String {
    let trimmed = date_str.trim();
    if trimmed.is_empty() {
        return iso(today);
    }

    if let Some(date) = parse_date(trimmed) {
        return iso(date);
    }

    if let Some(caps) = MONTH_DAY.captures(trimmed) {
        let month = month_number(&caps[1]);
        let day: Option<u32> = caps[2].parse().ok();
        let year = match caps.get(3) {
            Some(y) => y.as_str().parse().ok(),
            None => Some(
                statement_period_end
                    .and_then(parse_date)
                    .map(|end| end.year())
                    .unwrap_or_else(|| today.year()),
            ),
        };

        if let (Some(month), Some(day), Some(year)) = (month, day, year) {
            if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
                return iso(date);
            }
        }
    }

    tracing::debug!(input = %trimmed, "Unreadable statement date, defaulting to today");
    iso(today)
}
