//! Free-text and embedded-JSON rate scans.
//!
//! Both scans run against any [`QueryableDocument`], so the static path
//! (div/script heuristics) and the rendered path share them.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::document::QueryableDocument;
use super::numeric::{is_plausible_text_value, parse_number};
use crate::models::{Metal, RateFields, RateRecord, RateSource};

/// Nodes whose text the free-text scan reads.
pub const TEXT_SCAN_SELECTOR: &str = "div, span, p";

/// Nodes whose contents the embedded-JSON scan reads.
pub const SCRIPT_SELECTOR: &str = "script";

/// Longest label kept on a text-scan record.
const PRODUCT_LABEL_MAX: usize = 80;

/// Brace-balanced candidates longer than this are not worth parsing.
const JSON_CANDIDATE_MAX: usize = 20_000;

const RATE_KEYWORDS: &[&str] = &["gold", "silver", "rate"];

const NUM: &str = r"(\d{1,3}(?:,\d{2,3})+(?:\.\d+)?|\d+(?:\.\d+)?)";

static GOLD_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| metal_patterns("gold"));
static SILVER_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| metal_patterns("silver"));

/// `<metal> ... rate ... N`, then `N ... <metal>`.
fn metal_patterns(metal: &str) -> Vec<Regex> {
    [
        format!(r"(?i)\b{metal}\b.{{0,60}}?\brates?\b\D{{0,30}}?{NUM}"),
        format!(r"(?i){NUM}\D{{0,30}}?\b{metal}\b"),
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
}

fn patterns_for(metal: Metal) -> &'static [Regex] {
    match metal {
        Metal::Gold => &GOLD_PATTERNS,
        Metal::Silver => &SILVER_PATTERNS,
    }
}

fn truncate_label(text: &str) -> String {
    text.chars().take(PRODUCT_LABEL_MAX).collect()
}

/// First in-window value a metal's patterns find in `text`.
pub fn scan_text_value(metal: Metal, text: &str) -> Option<f64> {
    patterns_for(metal).iter().find_map(|re| {
        re.captures_iter(text)
            .filter_map(|caps| parse_number(caps.get(1)?.as_str()))
            .find(|v| is_plausible_text_value(*v))
    })
}

/// Regex scan over the text of div/span/paragraph nodes.
///
/// Each node contributes at most one value per metal. Nested nodes share
/// their text, so a (metal, value) pair is kept only once.
pub fn scan_text_nodes(doc: &impl QueryableDocument, source: RateSource) -> Vec<RateRecord> {
    let mut records = Vec::new();
    let mut seen = HashSet::new();
    for text in doc.texts(TEXT_SCAN_SELECTOR) {
        for metal in [Metal::Gold, Metal::Silver] {
            let Some(value) = scan_text_value(metal, &text) else {
                continue;
            };
            let fields = RateFields {
                m_rate: Some(value),
                ..Default::default()
            };
            if !seen.insert((metal, value.to_bits())) {
                continue;
            }
            if let Some(record) =
                RateRecord::new(metal, format!("{}_rate", metal), truncate_label(&text), fields, source)
            {
                records.push(record);
            }
        }
    }
    records
}

/// Every brace-balanced `{...}` substring, outermost first.
///
/// Quotes are tracked so braces inside string literals do not unbalance the
/// scan.
pub fn balanced_objects(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut found = Vec::new();

    for (start, _) in text.match_indices('{') {
        let mut depth = 0usize;
        let mut in_string: Option<u8> = None;
        let mut escaped = false;

        for (offset, &b) in bytes[start..].iter().enumerate() {
            if offset > JSON_CANDIDATE_MAX {
                break;
            }
            if let Some(quote) = in_string {
                if escaped {
                    escaped = false;
                } else if b == b'\\' {
                    escaped = true;
                } else if b == quote {
                    in_string = None;
                }
                continue;
            }
            match b {
                b'"' | b'\'' => in_string = Some(b),
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        found.push(&text[start..=start + offset]);
                        break;
                    }
                }
                _ => {}
            }
        }
    }
    found
}

/// Numeric value of a JSON field that may be a number or a numeric string.
pub fn json_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_number(s),
        _ => None,
    }
}

/// Lift `.gold` / `.silver` numeric fields out of a parsed object.
pub fn lift_metal_fields(object: &Value, source: RateSource) -> Vec<RateRecord> {
    [Metal::Gold, Metal::Silver]
        .into_iter()
        .filter_map(|metal| {
            let value = object.get(metal.as_str()).and_then(json_number)?;
            let fields = RateFields {
                m_rate: Some(value),
                ..Default::default()
            };
            RateRecord::new(metal, format!("{}_embedded", metal), metal.as_str(), fields, source)
        })
        .collect()
}

/// JSON-parse rate-bearing `{...}` fragments in script bodies.
///
/// The same payload often appears in several scripts; repeats are dropped.
pub fn scan_scripts(doc: &impl QueryableDocument, source: RateSource) -> Vec<RateRecord> {
    let mut records: Vec<RateRecord> = Vec::new();
    for script in doc.texts(SCRIPT_SELECTOR) {
        let lower = script.to_lowercase();
        if !RATE_KEYWORDS.iter().any(|k| lower.contains(k)) {
            continue;
        }
        for candidate in balanced_objects(&script) {
            let candidate_lower = candidate.to_lowercase();
            if !RATE_KEYWORDS.iter().any(|k| candidate_lower.contains(k)) {
                continue;
            }
            if let Ok(value) = serde_json::from_str::<Value>(candidate) {
                for record in lift_metal_fields(&value, source) {
                    if !records.iter().any(|r| r.dedup_key() == record.dedup_key()) {
                        records.push(record);
                    }
                }
            }
        }
    }
    records
}
