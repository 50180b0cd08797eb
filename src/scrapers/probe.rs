//! Guess and probe JSON endpoints behind a client-rendered page.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};
use url::Url;

use super::relay::ProxyFetcher;
use crate::error::{Result, ScrapeError};
use crate::extract::numeric::{extract_numbers, is_plausible};
use crate::extract::text::{json_number, lift_metal_fields};
use crate::extract::{merge_records, HtmlStructureAnalyzer};
use crate::models::{Metal, RateFields, RateRecord, RateSource};

/// Paths rate widgets commonly load their data from.
pub const COMMON_API_PATHS: &[&str] = &[
    "/api/rates",
    "/api/live-rates",
    "/api/liverates",
    "/api/prices",
    "/api/gold-rates",
    "/data/rates.json",
    "/data/live.json",
    "/rates.json",
    "/live/rates",
];

/// Declared or sniffed type of a probe response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    Json,
    Html,
    Xml,
    Text,
}

impl ResponseType {
    /// Guess from a URL's file extension; extensionless paths are assumed JSON.
    pub fn guess_from_url(url: &str) -> Self {
        let path = url.split(['?', '#']).next().unwrap_or(url).to_lowercase();
        if path.ends_with(".xml") {
            Self::Xml
        } else if path.ends_with(".html") || path.ends_with(".htm") {
            Self::Html
        } else if path.ends_with(".js") || path.ends_with(".txt") {
            Self::Text
        } else {
            Self::Json
        }
    }

    /// Classify by declared content type, sniffing the body when absent.
    pub fn classify(content_type: Option<&str>, body: &str) -> Self {
        if let Some(ct) = content_type.map(str::to_lowercase) {
            if ct.contains("json") {
                return Self::Json;
            }
            if ct.contains("xml") && !ct.contains("xhtml") {
                return Self::Xml;
            }
            if ct.contains("html") {
                return Self::Html;
            }
            if !ct.is_empty() {
                return Self::Text;
            }
        }

        let trimmed = body.trim_start();
        if (trimmed.starts_with('{') || trimmed.starts_with('['))
            && serde_json::from_str::<Value>(trimmed).is_ok()
        {
            Self::Json
        } else if trimmed.starts_with("<?xml") {
            Self::Xml
        } else if trimmed.starts_with('<') {
            Self::Html
        } else {
            Self::Text
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEndpoint {
    pub url: String,
    pub method: String,
    pub response_type: ResponseType,
}

impl ApiEndpoint {
    pub fn get(url: String) -> Self {
        let response_type = ResponseType::guess_from_url(&url);
        Self {
            url,
            method: "GET".to_string(),
            response_type,
        }
    }
}

/// Outcome of one probe. Failures are data, not errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeResult {
    pub url: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_type: Option<ResponseType>,
    /// Parsed JSON, or the raw body as a string for other types.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProbeResult {
    fn failed(url: &str, error: String) -> Self {
        Self {
            url: url.to_string(),
            success: false,
            response_type: None,
            data: None,
            error: Some(error),
        }
    }
}

/// Everything the API tier learned about a page.
#[derive(Debug, Clone, Default)]
pub struct ApiDiscovery {
    pub endpoints: Vec<ApiEndpoint>,
    pub rates: Vec<RateRecord>,
    /// Items that could not be lifted into records.
    pub candidates: Vec<Value>,
}

#[derive(Clone)]
pub struct ApiEndpointProbe {
    fetcher: ProxyFetcher,
    extra_paths: Vec<String>,
    concurrency: usize,
}

impl ApiEndpointProbe {
    pub fn new(fetcher: ProxyFetcher) -> Self {
        Self {
            fetcher,
            extra_paths: Vec::new(),
            concurrency: 3,
        }
    }

    pub fn with_extra_paths(mut self, paths: Vec<String>) -> Self {
        self.extra_paths = paths;
        self
    }

    /// Cap on probes in flight at once.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Endpoints referenced by the page, then guessed paths under its origin.
    pub fn detect_endpoints(&self, base_url: &str, html: &str) -> Result<Vec<ApiEndpoint>> {
        let base = Url::parse(base_url).map_err(|e| ScrapeError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        let discovered = HtmlStructureAnalyzer::analyze(html).possible_apis;

        let guessed = COMMON_API_PATHS
            .iter()
            .copied()
            .chain(self.extra_paths.iter().map(String::as_str));

        let mut urls: Vec<String> = Vec::new();
        for candidate in discovered.iter().map(String::as_str).chain(guessed) {
            let Ok(resolved) = base.join(candidate) else {
                debug!("Skipping unresolvable endpoint candidate {}", candidate);
                continue;
            };
            if !matches!(resolved.scheme(), "http" | "https") {
                continue;
            }
            let resolved = resolved.to_string();
            if !urls.contains(&resolved) {
                urls.push(resolved);
            }
        }

        Ok(urls.into_iter().map(ApiEndpoint::get).collect())
    }

    /// Fetch one endpoint and classify the response. Never fails.
    pub async fn probe(&self, url: &str) -> ProbeResult {
        let raw = match self.fetcher.fetch_raw(url).await {
            Ok(raw) => raw,
            Err(e) => {
                debug!("Probe failed for {}: {}", url, e);
                return ProbeResult::failed(url, e.to_string());
            }
        };

        let mut response_type = ResponseType::classify(raw.content_type.as_deref(), &raw.html);
        let data = match response_type {
            ResponseType::Json => match serde_json::from_str::<Value>(&raw.html) {
                Ok(value) => value,
                Err(_) => {
                    response_type = ResponseType::Text;
                    Value::String(raw.html)
                }
            },
            _ => Value::String(raw.html),
        };

        debug!("Probe of {} returned {:?} via {}", url, response_type, raw.source);
        ProbeResult {
            url: url.to_string(),
            success: true,
            response_type: Some(response_type),
            data: Some(data),
            error: None,
        }
    }

    /// Probe endpoints in order, at most `concurrency` at a time.
    pub async fn probe_all(&self, endpoints: &[ApiEndpoint]) -> Vec<ProbeResult> {
        let mut results = Vec::with_capacity(endpoints.len());
        for chunk in endpoints.chunks(self.concurrency) {
            let futures: Vec<_> = chunk.iter().map(|e| self.probe(&e.url)).collect();
            results.extend(futures::future::join_all(futures).await);
        }
        results
    }

    /// Detect, probe, and lift whatever the endpoints return.
    pub async fn discover(&self, base_url: &str, html: &str) -> Result<ApiDiscovery> {
        let endpoints = self.detect_endpoints(base_url, html)?;
        info!("Probing {} candidate endpoints for {}", endpoints.len(), base_url);

        let mut discovery = ApiDiscovery {
            endpoints,
            ..Default::default()
        };

        for result in self.probe_all(&discovery.endpoints).await {
            let (Some(data), Some(response_type)) = (result.data, result.response_type) else {
                continue;
            };
            let mut endpoint_rates = Vec::new();
            for item in parse_api_response(&data, response_type) {
                let lifted = lift_api_item(&item);
                if lifted.is_empty() {
                    discovery.candidates.push(json!({ "endpoint": result.url, "item": item }));
                } else {
                    endpoint_rates.extend(lifted);
                }
            }
            // Several endpoints often serve the same feed.
            merge_records(&mut discovery.rates, endpoint_rates);
        }

        info!(
            "API probing yielded {} rates, {} unliftable candidates",
            discovery.rates.len(),
            discovery.candidates.len()
        );
        Ok(discovery)
    }
}

/// Known shapes only: a bare array, or an array/object under `.rates` or
/// `.data`. Non-JSON bodies become one low-confidence `extracted_numbers`
/// item.
pub fn parse_api_response(data: &Value, response_type: ResponseType) -> Vec<Value> {
    match response_type {
        ResponseType::Json => {
            let inner = match data {
                Value::Array(_) => Some(data),
                Value::Object(map) => map.get("rates").or_else(|| map.get("data")),
                _ => None,
            };
            match inner {
                Some(Value::Array(items)) => items.clone(),
                Some(obj @ Value::Object(_)) => vec![obj.clone()],
                _ => Vec::new(),
            }
        }
        ResponseType::Html | ResponseType::Text | ResponseType::Xml => {
            let text = data.as_str().unwrap_or_default();
            let values: Vec<f64> = extract_numbers(text)
                .into_iter()
                .filter(|v| is_plausible(*v))
                .collect();
            if values.is_empty() {
                Vec::new()
            } else {
                vec![json!({ "type": "extracted_numbers", "values": values })]
            }
        }
    }
}

const LABEL_KEYS: &[&str] = &["metal", "name", "product", "label", "title", "type", "symbol"];

fn field(item: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|k| item.get(*k).and_then(json_number))
}

/// Lift one API item into records.
///
/// Objects keyed by metal (`{"gold": 62000}`) and objects labelled with a
/// metal name are supported. Everything else is left for manual review.
pub fn lift_api_item(item: &Value) -> Vec<RateRecord> {
    if !item.is_object() || item.get("type").and_then(Value::as_str) == Some("extracted_numbers") {
        return Vec::new();
    }

    let keyed = lift_metal_fields(item, RateSource::Api);
    if !keyed.is_empty() {
        return keyed;
    }

    let Some((label, metal)) = LABEL_KEYS.iter().find_map(|k| {
        let label = item.get(*k)?.as_str()?;
        Some((label, Metal::detect(label)?))
    }) else {
        return Vec::new();
    };

    let fields = RateFields {
        m_rate: field(item, &["mRate", "m_rate", "rate", "price"]),
        premium: field(item, &["premium"]),
        sell: field(item, &["sell", "sellRate", "sell_rate"]),
        bid: field(item, &["bid", "buy"]),
        ask: field(item, &["ask", "offer"]),
        high: field(item, &["high"]),
        low: field(item, &["low"]),
    };
    let category = item
        .get("category")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("{}_api", metal));

    RateRecord::new(metal, category, label, fields, RateSource::Api)
        .into_iter()
        .collect()
}
