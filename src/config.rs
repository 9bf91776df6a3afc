use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "DocLedger";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Currency stamped on documents that do not name one.
pub const DEFAULT_CURRENCY: &str = "ZMW";

/// Confidence below which a document is sent for human review.
pub const REVIEW_THRESHOLD: f64 = 0.85;

/// Default per-method extraction deadline.
pub const DEFAULT_METHOD_TIMEOUT_SECS: u64 = 120;

/// Jobs left in a non-terminal status longer than this are considered stalled.
pub const DEFAULT_STALE_AFTER_SECS: u64 = 30 * 60;

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "info,docledger=debug"
}

/// Get the application data directory.
/// Falls back to the working directory when the platform reports none.
pub fn app_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Default location of the SQLite job database.
pub fn default_database_path() -> PathBuf {
    app_data_dir().join("jobs.db")
}

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// Runtime knobs for the document pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineConfig {
    /// Confidence below this requires review and blocks auto-import.
    pub review_threshold: f64,
    /// Currency applied when a document carries none.
    pub default_currency: String,
    /// Deadline for a single extraction method. `None` waits indefinitely.
    pub method_timeout: Option<Duration>,
    /// Global auto-import switch; callers can still opt out per run.
    pub auto_import: bool,
    /// Age after which the reaper fails a non-terminal job.
    pub stale_after: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            review_threshold: REVIEW_THRESHOLD,
            default_currency: DEFAULT_CURRENCY.to_string(),
            method_timeout: Some(Duration::from_secs(DEFAULT_METHOD_TIMEOUT_SECS)),
            auto_import: true,
            stale_after: Duration::from_secs(DEFAULT_STALE_AFTER_SECS),
        }
    }
}

impl PipelineConfig {
    /// Defaults overridden by `DOCLEDGER_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each known key.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup("DOCLEDGER_REVIEW_THRESHOLD") {
            let value: f64 = parse_value("DOCLEDGER_REVIEW_THRESHOLD", &raw)?;
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid("DOCLEDGER_REVIEW_THRESHOLD", &raw));
            }
            config.review_threshold = value;
        }

        if let Some(raw) = lookup("DOCLEDGER_DEFAULT_CURRENCY") {
            let currency = raw.trim().to_uppercase();
            if currency.is_empty() {
                return Err(invalid("DOCLEDGER_DEFAULT_CURRENCY", &raw));
            }
            config.default_currency = currency;
        }

        if let Some(raw) = lookup("DOCLEDGER_METHOD_TIMEOUT_SECS") {
            let secs: u64 = parse_value("DOCLEDGER_METHOD_TIMEOUT_SECS", &raw)?;
            // 0 disables the deadline
            config.method_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }

        if let Some(raw) = lookup("DOCLEDGER_AUTO_IMPORT") {
            config.auto_import = match raw.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => return Err(invalid("DOCLEDGER_AUTO_IMPORT", &raw)),
            };
        }

        if let Some(raw) = lookup("DOCLEDGER_STALE_AFTER_SECS") {
            let secs: u64 = parse_value("DOCLEDGER_STALE_AFTER_SECS", &raw)?;
            config.stale_after = Duration::from_secs(secs);
        }

        Ok(config)
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| invalid(key, raw))
}

fn invalid(key: &str, raw: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_constants() {
        let config = PipelineConfig::default();
        assert_eq!(config.review_threshold, 0.85);
        assert_eq!(config.default_currency, "ZMW");
        assert_eq!(config.method_timeout, Some(Duration::from_secs(120)));
        assert!(config.auto_import);
    }

    #[test]
    fn empty_lookup_yields_defaults() {
        let config = PipelineConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.review_threshold, REVIEW_THRESHOLD);
        assert_eq!(config.default_currency, DEFAULT_CURRENCY);
    }

    #[test]
    fn overrides_are_applied() {
        let config = PipelineConfig::from_lookup(lookup_from(&[
            ("DOCLEDGER_REVIEW_THRESHOLD", "0.9"),
            ("DOCLEDGER_DEFAULT_CURRENCY", " usd "),
            ("DOCLEDGER_METHOD_TIMEOUT_SECS", "15"),
            ("DOCLEDGER_AUTO_IMPORT", "off"),
            ("DOCLEDGER_STALE_AFTER_SECS", "60"),
        ]))
        .unwrap();

        assert_eq!(config.review_threshold, 0.9);
        assert_eq!(config.default_currency, "USD");
        assert_eq!(config.method_timeout, Some(Duration::from_secs(15)));
        assert!(!config.auto_import);
        assert_eq!(config.stale_after, Duration::from_secs(60));
    }

    #[test]
    fn zero_timeout_disables_deadline() {
        let config =
            PipelineConfig::from_lookup(lookup_from(&[("DOCLEDGER_METHOD_TIMEOUT_SECS", "0")]))
                .unwrap();
        assert_eq!(config.method_timeout, None);
    }

    #[test]
    fn malformed_threshold_rejected() {
        let err =
            PipelineConfig::from_lookup(lookup_from(&[("DOCLEDGER_REVIEW_THRESHOLD", "high")]))
                .unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                key: "DOCLEDGER_REVIEW_THRESHOLD".into(),
                value: "high".into(),
            }
        );
    }

    #[test]
    fn out_of_range_threshold_rejected() {
        let result =
            PipelineConfig::from_lookup(lookup_from(&[("DOCLEDGER_REVIEW_THRESHOLD", "1.5")]));
        assert!(result.is_err());
    }

    #[test]
    fn malformed_auto_import_rejected() {
        let result = PipelineConfig::from_lookup(lookup_from(&[("DOCLEDGER_AUTO_IMPORT", "maybe")]));
        assert!(result.is_err());
    }

    #[test]
    fn database_path_under_app_data() {
        let path = default_database_path();
        assert!(path.starts_with(app_data_dir()));
        assert!(path.ends_with("jobs.db"));
    }

    #[test]
    fn app_name_is_docledger() {
        assert_eq!(APP_NAME, "DocLedger");
    }
}
