//! Shared test doubles: an in-memory transport and a scripted renderer.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use liverates::cache::RateCache;
use liverates::error::{Result, ScrapeError};
use liverates::models::{Metal, RateFields, RateRecord, RateSource};
use liverates::scrapers::{
    HttpResponse, HttpTransport, PageStructure, ProxyFetcher, RelayConfig, RenderOutcome,
    RenderScraper,
};
use liverates::RateOrchestrator;

pub const TARGET: &str = "https://rates.example.com/";

/// Client-rendered shell: app root plus a hashed main bundle.
pub const SPA_SHELL: &str = r#"<!doctype html><html><head>
<script src="/static/js/main.1a2b3c4d.js"></script>
</head><body><div id="root"></div></body></html>"#;

pub const STATIC_TABLE_PAGE: &str = r#"<html><body>
<table>
  <tr><th>Product</th><th>Bid</th><th>Ask</th><th>High</th><th>Low</th></tr>
  <tr><td>Gold 995</td><td>62,000</td><td>62,400</td><td>62,900</td><td>61,800</td></tr>
  <tr><td>Silver 999</td><td>74,100</td><td>74,600</td><td>75,000</td><td>73,900</td></tr>
</table>
</body></html>"#;

/// Answers by exact request URL. A route with several responses serves
/// them in order and then repeats the last. Unknown URLs get a 404; URLs
/// listed in `unreachable` fail at the network level.
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<String, Vec<HttpResponse>>>,
    unreachable: Vec<String>,
    requests: Mutex<Vec<String>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(self, url: &str, response: HttpResponse) -> Self {
        self.routes
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push(response);
        self
    }

    pub fn html(self, url: &str, body: &str) -> Self {
        self.route(url, HttpResponse::new(200, body).with_header("Content-Type", "text/html"))
    }

    pub fn json(self, url: &str, body: serde_json::Value) -> Self {
        self.route(
            url,
            HttpResponse::new(200, body.to_string()).with_header("Content-Type", "application/json"),
        )
    }

    pub fn unreachable(mut self, url: &str) -> Self {
        self.unreachable.push(url.to_string());
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn get(&self, url: &str) -> Result<HttpResponse> {
        self.requests.lock().unwrap().push(url.to_string());
        if self.unreachable.iter().any(|u| u == url) {
            return Err(ScrapeError::Browser(format!("connection refused: {}", url)));
        }
        let mut routes = self.routes.lock().unwrap();
        let response = match routes.get_mut(url) {
            Some(queue) if queue.len() > 1 => queue.remove(0),
            Some(queue) => queue[0].clone(),
            None => HttpResponse::new(404, "not found"),
        };
        Ok(response)
    }
}

/// Renderer returning a fixed outcome and counting calls.
#[derive(Default)]
pub struct StubRenderer {
    outcome: RenderOutcome,
    pub scrapes: AtomicUsize,
    pub closes: AtomicUsize,
}

impl StubRenderer {
    pub fn returning(outcome: RenderOutcome) -> Self {
        Self {
            outcome,
            ..Default::default()
        }
    }

    pub fn failing(error: &str) -> Self {
        Self::returning(RenderOutcome::failed(error))
    }

    pub fn scrape_count(&self) -> usize {
        self.scrapes.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RenderScraper for StubRenderer {
    async fn scrape(&self, _url: &str, _debug: bool) -> RenderOutcome {
        self.scrapes.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }

    async fn structure(&self, url: &str) -> Result<PageStructure> {
        Ok(PageStructure {
            url: url.to_string(),
            title: "Live Rates".to_string(),
            tables: 1,
            scripts: 3,
            rate_elements: 4,
            root: None,
        })
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn gold(category: &str, m_rate: f64, source: RateSource) -> RateRecord {
    let fields = RateFields {
        m_rate: Some(m_rate),
        ..Default::default()
    };
    RateRecord::new(Metal::Gold, category, "Gold 995", fields, source).unwrap()
}

/// Browser outcome with two gold records.
pub fn two_gold_render() -> RenderOutcome {
    RenderOutcome {
        success: true,
        rates: vec![
            gold("gold_market", 62_150.0, RateSource::BrowserTable),
            gold("gold_rate", 62_400.0, RateSource::BrowserText),
        ],
        elements_found: 7,
        final_url: Some(TARGET.to_string()),
        ..Default::default()
    }
}

/// Orchestrator over the doubles, fetching directly with no refetch delay.
pub fn orchestrator(
    transport: Arc<MockTransport>,
    renderer: Arc<StubRenderer>,
) -> RateOrchestrator {
    let fetcher = ProxyFetcher::new(transport, vec![RelayConfig::direct()]);
    RateOrchestrator::new(fetcher, renderer, Arc::new(RateCache::new()))
        .with_refetch_delay(Duration::ZERO)
}
