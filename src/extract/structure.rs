//! Classification of fetched HTML (static content vs client-rendered shell).
//!
//! The classification is advisory. The orchestrator still falls through to
//! slower tiers when it turns out to be wrong.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::document::{QueryableDocument, StaticDocument};

/// Markers used by client-rendered apps for their mount point, in priority order.
const APP_ROOT_SELECTORS: &[&str] = &[
    "#root",
    "#app",
    "#__next",
    "[data-reactroot]",
    "#__nuxt",
];

/// Elements that commonly carry rate values.
pub const RATE_CONTAINER_SELECTOR: &str =
    r#"[class*="rate"], [class*="price"], [class*="Rate"], [class*="Price"]"#;

/// Literal path fragments that suggest a data endpoint.
const API_PATH_MARKERS: &[&str] = &["/api/", "/data/", "/rates/", "/live/"];

static BUNDLE_SCRIPT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|/)(?:main|app|bundle|index|runtime|vendors?|chunk)[.\-~][0-9a-f]{6,}(?:\.chunk)?\.js|/static/js/main\.").unwrap()
});

static FRAMEWORK_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\breact(?:dom)?\b|__REACT|_reactRoot").unwrap());

static API_PATH_LITERAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:https?://[A-Za-z0-9.\-]+(?::\d+)?)?/(?:api|data|rates|live)/[^"'\s<>`)\]}]*"#)
        .unwrap()
});

static API_HOST_LITERAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"https?://(?:api|data|rates|live|feed)[A-Za-z0-9\-]*\.[A-Za-z0-9.\-]+[^"'\s<>`)\]}]*"#)
        .unwrap()
});

/// Result of classifying a document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructureReport {
    #[serde(rename = "isReactSPA")]
    pub is_react_spa: bool,
    pub has_java_script: bool,
    #[serde(rename = "possibleAPIs")]
    pub possible_apis: Vec<String>,
    pub root_element_selector: Option<String>,
}

/// Count of data-bearing candidate elements.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateCensus {
    pub tables: usize,
    pub scripts: usize,
    pub rate_containers: usize,
}

impl CandidateCensus {
    pub fn total(&self) -> usize {
        self.tables + self.scripts + self.rate_containers
    }
}

pub struct HtmlStructureAnalyzer;

impl HtmlStructureAnalyzer {
    /// Classify `html` and collect endpoint candidates.
    pub fn analyze(html: &str) -> StructureReport {
        let doc = StaticDocument::parse(html);
        Self::analyze_document(&doc, html)
    }

    /// Classify an already parsed document; `raw` is its source text.
    pub fn analyze_document(doc: &impl QueryableDocument, raw: &str) -> StructureReport {
        let root_element_selector = APP_ROOT_SELECTORS
            .iter()
            .find(|sel| doc.count(sel) > 0)
            .map(|sel| sel.to_string());

        let script_srcs = doc.attrs("script[src]", "src");
        let has_bundle = script_srcs.iter().any(|src| BUNDLE_SCRIPT.is_match(src));
        let mentions_framework = FRAMEWORK_MARKER.is_match(raw);

        let is_react_spa = root_element_selector.is_some() && (has_bundle || mentions_framework);
        let has_java_script = doc.count("script") > 0;

        StructureReport {
            is_react_spa,
            has_java_script,
            possible_apis: Self::possible_apis(&script_srcs, raw),
            root_element_selector,
        }
    }

    /// Deduplicated endpoint candidates from script sources and literal paths.
    fn possible_apis(script_srcs: &[String], raw: &str) -> Vec<String> {
        let mut found: Vec<String> = Vec::new();
        let mut push = |candidate: &str| {
            let candidate = candidate.trim_end_matches(['\\', ',', ';']);
            if !candidate.is_empty() && !found.iter().any(|f| f == candidate) {
                found.push(candidate.to_string());
            }
        };

        for src in script_srcs {
            let lower = src.to_lowercase();
            if lower.contains("api") || lower.contains("data") {
                push(src);
            }
        }

        if API_PATH_MARKERS.iter().any(|m| raw.contains(m)) {
            for m in API_PATH_LITERAL.find_iter(raw) {
                push(m.as_str());
            }
        }

        for m in API_HOST_LITERAL.find_iter(raw) {
            push(m.as_str());
        }

        found
    }

    /// Count tables, scripts and rate-like containers.
    pub fn census(doc: &impl QueryableDocument) -> CandidateCensus {
        CandidateCensus {
            tables: doc.count("table"),
            scripts: doc.count("script"),
            rate_containers: doc.count(RATE_CONTAINER_SELECTOR),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPA_SHELL: &str = r#"<!doctype html><html><head>
        <script defer src="/static/js/main.8f2c1a9b.js"></script>
        </head><body><noscript>You need to enable JavaScript to run this app.</noscript>
        <div id="root"></div></body></html>"#;

    #[test]
    fn test_root_and_bundle_is_spa() {
        let report = HtmlStructureAnalyzer::analyze(SPA_SHELL);
        assert!(report.is_react_spa);
        assert!(report.has_java_script);
        assert_eq!(report.root_element_selector.as_deref(), Some("#root"));
    }

    #[test]
    fn test_neither_marker_is_not_spa() {
        let html = "<html><body><table><tr><td>Gold</td></tr></table></body></html>";
        let report = HtmlStructureAnalyzer::analyze(html);
        assert!(!report.is_react_spa);
        assert!(!report.has_java_script);
        assert!(report.root_element_selector.is_none());
    }

    #[test]
    fn test_root_only_is_not_spa() {
        let html = r#"<html><body><div id="root"><p>Gold 62000</p></div></body></html>"#;
        assert!(!HtmlStructureAnalyzer::analyze(html).is_react_spa);
    }

    #[test]
    fn test_bundle_only_is_not_spa() {
        let html = r#"<html><body><script src="/static/js/main.8f2c1a9b.js"></script>
            <p>We love react and jewellery</p></body></html>"#;
        assert!(!HtmlStructureAnalyzer::analyze(html).is_react_spa);
    }

    #[test]
    fn test_root_with_framework_word_is_spa() {
        let html = r#"<html><body><div id="app"></div>
            <script>window.React = {}; ReactDOM.render()</script></body></html>"#;
        let report = HtmlStructureAnalyzer::analyze(html);
        assert!(report.is_react_spa);
        assert_eq!(report.root_element_selector.as_deref(), Some("#app"));
    }

    #[test]
    fn test_possible_apis_deduplicated() {
        let html = r#"<html><head><script src="/js/api-client.js"></script></head><body>
            <script>fetch("/api/rates?x=1"); fetch("/api/rates?x=1"); fetch('https://api.example.com/v1/live')</script>
            </body></html>"#;
        let report = HtmlStructureAnalyzer::analyze(html);
        assert_eq!(
            report.possible_apis,
            vec![
                "/js/api-client.js".to_string(),
                "/api/rates?x=1".to_string(),
                "https://api.example.com/v1/live".to_string(),
            ]
        );
    }

    #[test]
    fn test_census_counts_candidates() {
        let html = r#"<html><body><table></table><table></table>
            <div class="gold-rate">1</div><span class="price">2</span>
            <script></script></body></html>"#;
        let doc = StaticDocument::parse(html);
        let census = HtmlStructureAnalyzer::census(&doc);
        assert_eq!(census.tables, 2);
        assert_eq!(census.scripts, 1);
        assert_eq!(census.rate_containers, 2);
        assert_eq!(census.total(), 5);
    }
}
