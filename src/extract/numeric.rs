//! Numeric and currency token extraction from arbitrary text.
//!
//! Pure functions with no I/O.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

/// Exclusive lower bound for any value emitted in a rate record.
pub const PLAUSIBLE_MIN: f64 = 100.0;
/// Exclusive upper bound for any value emitted in a rate record.
pub const PLAUSIBLE_MAX: f64 = 500_000.0;

/// Tighter window used by free-text scanning, where page noise is common.
pub const TEXT_SCAN_MIN: f64 = 1_000.0;
pub const TEXT_SCAN_MAX: f64 = 100_000.0;

static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:,\d{3})*(?:\.\d+)?").unwrap());

// Indian grouping (1,23,456) is accepted alongside western grouping.
static CURRENCY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:(?:₹|\$|\brupees\b|\brs\b\.?|\binr\b)\s*(\d+(?:,\d{2,3})*(?:\.\d+)?))|(?:(\d+(?:,\d{2,3})*(?:\.\d+)?)\s*(?:₹|\$|\brupees\b|\brs\b\.?|\binr\b))",
    )
    .unwrap()
});

/// A currency-marked value with the substring it was parsed from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrencyValue {
    pub raw: String,
    pub value: f64,
}

/// Every number in `text`, in order, duplicates kept.
///
/// Thousands separators are stripped before parsing.
pub fn extract_numbers(text: &str) -> Vec<f64> {
    NUMBER
        .find_iter(text)
        .filter_map(|m| m.as_str().replace(',', "").parse::<f64>().ok())
        .filter(|v| !v.is_nan())
        .collect()
}

/// Currency-prefixed or currency-suffixed values (₹, $, rs, inr, rupees).
pub fn extract_currency_values(text: &str) -> Vec<CurrencyValue> {
    CURRENCY
        .captures_iter(text)
        .filter_map(|caps| {
            let raw = caps.get(0)?.as_str().to_string();
            let digits = caps.get(1).or_else(|| caps.get(2))?.as_str();
            let value = digits.replace(',', "").parse::<f64>().ok()?;
            Some(CurrencyValue { raw, value })
        })
        .collect()
}

/// Parse a single value, ignoring everything but digits, `.` and `-`.
///
/// `None` means missing, which callers must keep distinct from zero.
pub fn parse_number(text: &str) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Whether `value` can be a real rate and not a page or version number.
pub fn is_plausible(value: f64) -> bool {
    value > PLAUSIBLE_MIN && value < PLAUSIBLE_MAX
}

/// Stricter window for values lifted out of running text.
pub fn is_plausible_text_value(value: f64) -> bool {
    value > TEXT_SCAN_MIN && value < TEXT_SCAN_MAX
}

/// Parse a cell and keep it only if plausible.
pub fn plausible_number(text: &str) -> Option<f64> {
    parse_number(text).filter(|v| is_plausible(*v))
}
