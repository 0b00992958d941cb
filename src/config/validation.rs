//! Parsing and validation of raw environment / flag values.
//!
//! Upstream URLs are strict: a bad one is a fatal startup error. The
//! migration percentage is lenient: anything unusable becomes `0` and the
//! caller logs a warning.

use url::Url;

use super::model::DEFAULT_KAFKA_BROKERS;

/// Parse an upstream base URL. Returns the URL or a human-readable error.
pub fn parse_upstream_url(raw: &str) -> Result<Url, String> {
    let parsed = Url::parse(raw).map_err(|e| format!("'{raw}' is not a valid URL ({e})"))?;
    match parsed.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(format!(
                "'{raw}' uses unsupported scheme '{scheme}' (expected http or https)"
            ))
        }
    }
    if parsed.host_str().is_none() {
        return Err(format!("'{raw}' has no host"));
    }
    Ok(parsed)
}

/// Parse the migration percentage.
///
/// Returns `Err(0)` when the value is non-numeric or outside `0..=100`, so
/// the caller can both use the fallback and report the bad input.
pub fn parse_migration_percent(raw: &str) -> Result<u8, u8> {
    match raw.trim().parse::<i64>() {
        Ok(value) if (0..=100).contains(&value) => u8::try_from(value).map_err(|_| 0),
        _ => Err(0),
    }
}

/// Only the literal `true` (any case) enables gradual migration.
#[must_use]
pub fn parse_gate(raw: &str) -> bool {
    raw.trim().eq_ignore_ascii_case("true")
}

/// Split a comma-separated broker list, dropping blanks.
#[must_use]
pub fn parse_broker_list(raw: &str) -> Vec<String> {
    let brokers: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect();
    if brokers.is_empty() {
        vec![DEFAULT_KAFKA_BROKERS.to_string()]
    } else {
        brokers
    }
}
