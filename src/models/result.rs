//! Scrape result envelope returned to every caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::rate::RateRecord;

/// Extraction tier that produced (or last attempted to produce) a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScrapeMethod {
    StaticHtml,
    ApiDetection,
    SpaSimulation,
    BrowserFallback,
}

impl ScrapeMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StaticHtml => "static-html",
            Self::ApiDetection => "api-detection",
            Self::SpaSimulation => "spa-simulation",
            Self::BrowserFallback => "browser-fallback",
        }
    }

    /// Whether results from this tier are expensive to refresh.
    pub fn is_rendered(&self) -> bool {
        matches!(self, Self::BrowserFallback)
    }
}

impl std::fmt::Display for ScrapeMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeMetadata {
    pub url: String,
    pub timestamp: DateTime<Utc>,
    pub processing_time_ms: u64,
    pub method: ScrapeMethod,
    pub elements_found: usize,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Layout of one table-detection strategy, for diagnosis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableDump {
    pub strategy: String,
    pub rows: usize,
    /// Cell texts of the first few rows.
    pub sample: Vec<Vec<String>>,
}

/// Characters of page source kept in `DebugInfo::html_snippet`.
pub const HTML_SNIPPET_CHARS: usize = 2_000;

/// Leading slice of `html` for diagnostics, cut on a char boundary.
pub fn html_snippet(html: &str) -> String {
    html.chars().take(HTML_SNIPPET_CHARS).collect()
}

/// Expensive diagnostics, only collected in debug mode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugInfo {
    pub html_snippet: String,
    pub html_length: usize,
    pub api_endpoints: Vec<String>,
    /// Low-confidence probe output that could not be lifted into records.
    pub api_candidates: Vec<serde_json::Value>,
    /// Base64 PNG, present when the browser tier ran with screenshots enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
    pub table_structure: Vec<TableDump>,
}

/// Outer envelope of one scrape invocation. Never mutated after return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeResult {
    pub success: bool,
    /// Records in discovery order.
    pub rates: Vec<RateRecord>,
    pub metadata: ScrapeMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<DebugInfo>,
}

impl ScrapeResult {
    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}
