//! Tiered rate extraction: static HTML, API probing, SPA simulation, then
//! the browser.
//!
//! Each tier runs only when every cheaper tier produced nothing. The
//! reported method is the tier that produced output, or on total failure
//! the last tier attempted. Successful results are written through to the
//! cache before returning.

use std::sync::{Arc, LazyLock};
use std::time::{Duration, Instant};

use chrono::Utc;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::RateCache;
use crate::config::Settings;
use crate::error::Result;
use crate::extract::{self, merge_records, CandidateCensus, StructureReport};
use crate::models::{html_snippet, DebugInfo, RateRecord, ScrapeMetadata, ScrapeMethod, ScrapeResult};
use crate::scrapers::{
    ApiEndpoint, ApiEndpointProbe, BrowserRenderScraper, HttpClient, PageStructure, ProxyFetcher,
    RenderScraper,
};

static WEBSOCKET_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"wss?://[^\s"'<>`)]+"#).unwrap());

/// Static classification of a page, for the `analyze` command.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageAnalysis {
    pub url: String,
    /// Relay that delivered the page.
    pub relay: String,
    pub html_length: usize,
    pub structure: StructureReport,
    pub census: CandidateCensus,
    pub static_rates: Vec<RateRecord>,
    pub endpoints: Vec<ApiEndpoint>,
    pub websockets: Vec<String>,
}

/// Mutable state of one scrape, frozen into a [`ScrapeResult`] at the end.
struct ScrapeRun {
    started: Instant,
    url: String,
    method: ScrapeMethod,
    rates: Vec<RateRecord>,
    elements_found: usize,
    errors: Vec<String>,
    warnings: Vec<String>,
    debug: DebugInfo,
}

impl ScrapeRun {
    fn new(url: &str) -> Self {
        Self {
            started: Instant::now(),
            url: url.to_string(),
            method: ScrapeMethod::StaticHtml,
            rates: Vec::new(),
            elements_found: 0,
            errors: Vec::new(),
            warnings: Vec::new(),
            debug: DebugInfo::default(),
        }
    }

    fn finish(mut self, debug: bool) -> ScrapeResult {
        let success = !self.rates.is_empty();
        if !success {
            self.errors.push("No rates extracted by any strategy".to_string());
        }
        ScrapeResult {
            success,
            rates: self.rates,
            metadata: ScrapeMetadata {
                url: self.url,
                timestamp: Utc::now(),
                processing_time_ms: self.started.elapsed().as_millis() as u64,
                method: self.method,
                elements_found: self.elements_found,
                errors: self.errors,
                warnings: self.warnings,
            },
            debug: debug.then_some(self.debug),
        }
    }
}

pub struct RateOrchestrator {
    fetcher: ProxyFetcher,
    probe: ApiEndpointProbe,
    renderer: Arc<dyn RenderScraper>,
    cache: Arc<RateCache>,
    refetch_delay: Duration,
}

impl RateOrchestrator {
    pub fn new(fetcher: ProxyFetcher, renderer: Arc<dyn RenderScraper>, cache: Arc<RateCache>) -> Self {
        let probe = ApiEndpointProbe::new(fetcher.clone());
        Self {
            fetcher,
            probe,
            renderer,
            cache,
            refetch_delay: Duration::from_secs(2),
        }
    }

    /// Wire the production transport, relays and browser from settings.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let client = HttpClient::with_user_agent(settings.request_timeout(), settings.user_agent.as_deref())?;
        let fetcher = ProxyFetcher::new(Arc::new(client), settings.relays.clone());
        let probe = ApiEndpointProbe::new(fetcher.clone())
            .with_extra_paths(settings.extra_api_paths.clone())
            .with_concurrency(settings.probe_concurrency);
        let renderer = Arc::new(BrowserRenderScraper::new(settings.browser.clone()));
        let cache = Arc::new(RateCache::with_ttls(
            Duration::from_secs(settings.static_cache_ttl),
            Duration::from_secs(settings.browser_cache_ttl),
        ));

        Ok(Self::new(fetcher, renderer, cache)
            .with_probe(probe)
            .with_refetch_delay(settings.spa_refetch_delay()))
    }

    pub fn with_probe(mut self, probe: ApiEndpointProbe) -> Self {
        self.probe = probe;
        self
    }

    /// Delay before the SPA-simulation re-fetch.
    pub fn with_refetch_delay(mut self, delay: Duration) -> Self {
        self.refetch_delay = delay;
        self
    }

    pub fn cache(&self) -> &Arc<RateCache> {
        &self.cache
    }

    /// Serve a fresh cached result for `url` if one exists, else scrape.
    ///
    /// The cache never holds debug payloads, so debug requests always scrape.
    pub async fn scrape_with_cache(&self, url: &str, debug: bool) -> ScrapeResult {
        if debug {
            debug!("Debug scrape of {} bypasses the cache", url);
            return self.scrape(url, true).await;
        }
        if let Some(cached) = self.cache.get(url) {
            info!(
                "Serving cached rates for {} ({} rates via {})",
                url,
                cached.rates.len(),
                cached.metadata.method
            );
            return cached;
        }
        debug!("Cache miss for {}", url);
        self.scrape(url, debug).await
    }

    /// Run the tiers against `url`. Never fails; an empty result is a
    /// normal `success: false` outcome.
    pub async fn scrape(&self, url: &str, debug: bool) -> ScrapeResult {
        info!("Scraping rates from {}", url);
        let mut run = ScrapeRun::new(url);

        let raw = match self.fetcher.fetch_raw(url).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Initial fetch failed: {}", e);
                run.errors.push(e.to_string());
                return run.finish(debug);
            }
        };
        for failed in raw.failures() {
            run.warnings.push(format!(
                "Relay {} failed: {}",
                failed.relay,
                failed.error.as_deref().unwrap_or("unknown error")
            ));
        }
        run.debug.html_snippet = html_snippet(&raw.html);
        run.debug.html_length = raw.html.len();

        let report = extract::HtmlStructureAnalyzer::analyze(&raw.html);
        debug!(
            "Page via {}: spa={} js={} candidates={}",
            raw.source,
            report.is_react_spa,
            report.has_java_script,
            report.possible_apis.len()
        );

        if report.is_react_spa {
            self.run_api_tier(&mut run, &raw.html).await;
            if run.rates.is_empty() {
                self.run_spa_simulation(&mut run, &raw.html).await;
            }
        } else {
            let extraction = extract::extract_static(&raw.html);
            info!("Static extraction found {} rates", extraction.rates.len());
            run.elements_found = extraction.census.total();
            run.debug.table_structure = extraction.table_structure;
            merge_records(&mut run.rates, extraction.rates);
        }

        if run.rates.is_empty() {
            self.run_browser_tier(&mut run, debug).await;
        }

        let result = run.finish(debug);
        if result.success {
            self.cache.put(&result);
        }
        info!(
            "Scrape of {} finished: {} rates via {} in {}ms",
            url,
            result.rates.len(),
            result.metadata.method,
            result.metadata.processing_time_ms
        );
        result
    }

    async fn run_api_tier(&self, run: &mut ScrapeRun, html: &str) {
        run.method = ScrapeMethod::ApiDetection;
        match self.probe.discover(&run.url, html).await {
            Ok(discovery) => {
                run.debug.api_endpoints = discovery.endpoints.into_iter().map(|e| e.url).collect();
                run.debug.api_candidates = discovery.candidates;
                merge_records(&mut run.rates, discovery.rates);
            }
            Err(e) => {
                warn!("API detection failed: {}", e);
                run.errors.push(format!("API detection: {}", e));
            }
        }
    }

    /// WebSocket URLs are reported, never connected. One delayed re-fetch
    /// is extracted statically if the page changed.
    async fn run_spa_simulation(&self, run: &mut ScrapeRun, html: &str) {
        run.method = ScrapeMethod::SpaSimulation;
        for ws in websocket_urls(html) {
            run.warnings.push(format!("WebSocket feed detected, not followed: {}", ws));
        }

        tokio::time::sleep(self.refetch_delay).await;
        match self.fetcher.fetch_html(&run.url).await {
            Ok(refetched) if refetched != html => {
                let extraction = extract::extract_static(&refetched);
                info!("SPA re-fetch found {} rates", extraction.rates.len());
                run.elements_found = run.elements_found.max(extraction.census.total());
                merge_records(&mut run.rates, extraction.rates);
            }
            Ok(_) => debug!("SPA re-fetch returned identical content"),
            Err(e) => run.errors.push(format!("SPA re-fetch: {}", e)),
        }
    }

    async fn run_browser_tier(&self, run: &mut ScrapeRun, debug: bool) {
        run.method = ScrapeMethod::BrowserFallback;
        info!("Falling back to browser rendering for {}", run.url);

        let outcome = self.renderer.scrape(&run.url, debug).await;
        if let Some(error) = outcome.error {
            run.errors.push(format!("Browser: {}", error));
        }
        if outcome.elements_found > 0 {
            run.elements_found = outcome.elements_found;
        }
        if let Some(final_url) = outcome.final_url.filter(|u| *u != run.url) {
            debug!("Browser loaded {} instead of {}", final_url, run.url);
        }
        if debug {
            if outcome.html_length > 0 {
                run.debug.html_snippet = outcome.html_snippet;
                run.debug.html_length = outcome.html_length;
            }
            if !outcome.table_structure.is_empty() {
                run.debug.table_structure = outcome.table_structure;
            }
            run.debug.screenshot = outcome.screenshot;
        }
        merge_records(&mut run.rates, outcome.rates);
    }

    /// Fetch and classify a page without rendering it.
    pub async fn analyze(&self, url: &str) -> Result<PageAnalysis> {
        let raw = self.fetcher.fetch_raw(url).await?;
        let structure = extract::HtmlStructureAnalyzer::analyze(&raw.html);
        let extraction = extract::extract_static(&raw.html);
        let endpoints = self.probe.detect_endpoints(url, &raw.html)?;

        Ok(PageAnalysis {
            url: url.to_string(),
            relay: raw.source,
            html_length: raw.html.len(),
            structure,
            census: extraction.census,
            static_rates: extraction.rates,
            endpoints,
            websockets: websocket_urls(&raw.html),
        })
    }

    /// Rendered DOM summary of `url`.
    pub async fn structure(&self, url: &str) -> Result<PageStructure> {
        self.renderer.structure(url).await
    }

    /// Tear down the shared browser.
    pub async fn close(&self) {
        self.renderer.close().await;
    }
}

/// Distinct WebSocket URLs referenced by the page.
pub fn websocket_urls(html: &str) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();
    for m in WEBSOCKET_URL.find_iter(html) {
        let url = m.as_str().to_string();
        if !urls.contains(&url) {
            urls.push(url);
        }
    }
    urls
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_websocket_urls_deduplicated() {
        let html = r#"<script>
            const feed = new WebSocket("wss://feed.example.com/live");
            const again = "wss://feed.example.com/live";
            const plain = 'ws://10.0.0.1:8080/rates';
        </script>"#;
        assert_eq!(
            websocket_urls(html),
            vec![
                "wss://feed.example.com/live".to_string(),
                "ws://10.0.0.1:8080/rates".to_string()
            ]
        );
    }

    #[test]
    fn test_empty_run_reports_failure() {
        let run = ScrapeRun::new("https://rates.example.com/");
        let result = run.finish(false);
        assert!(!result.success);
        assert!(result.debug.is_none());
        assert_eq!(result.metadata.method, ScrapeMethod::StaticHtml);
        assert_eq!(result.metadata.errors, vec!["No rates extracted by any strategy".to_string()]);
    }
}
