//! Time-boxed cache for the last successful scrape.
//!
//! A single entry per process. Browser-rendered results live longer than
//! static/API results because they are expensive to refresh. The entry is
//! replaced wholesale on every successful scrape and never partially updated.

use std::sync::RwLock;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;

use crate::models::{ScrapeMethod, ScrapeResult};

/// TTL for static-HTML, API and SPA-simulation results.
pub const DEFAULT_STATIC_TTL: Duration = Duration::from_secs(180);
/// TTL for browser-rendered results.
pub const DEFAULT_BROWSER_TTL: Duration = Duration::from_secs(300);

/// A cached result and when it was stored.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub result: ScrapeResult,
    pub cached_at_ms: i64,
}

/// Cache status for the HTTP and CLI surfaces.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheSummary {
    pub url: String,
    pub method: ScrapeMethod,
    pub rates: usize,
    pub cached_at_ms: i64,
    pub age_ms: i64,
    pub ttl_ms: i64,
    pub fresh: bool,
}

pub struct RateCache {
    entry: RwLock<Option<CacheEntry>>,
    static_ttl: Duration,
    browser_ttl: Duration,
}

pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

impl RateCache {
    pub fn new() -> Self {
        Self::with_ttls(DEFAULT_STATIC_TTL, DEFAULT_BROWSER_TTL)
    }

    pub fn with_ttls(static_ttl: Duration, browser_ttl: Duration) -> Self {
        Self {
            entry: RwLock::new(None),
            static_ttl,
            browser_ttl,
        }
    }

    /// TTL applied to results produced by `method`.
    pub fn ttl_for(&self, method: ScrapeMethod) -> Duration {
        if method.is_rendered() {
            self.browser_ttl
        } else {
            self.static_ttl
        }
    }

    fn is_fresh(&self, entry: &CacheEntry, now_ms: i64) -> bool {
        let ttl_ms = self.ttl_for(entry.result.metadata.method).as_millis() as i64;
        now_ms - entry.cached_at_ms < ttl_ms
    }

    /// Fresh result for `url`, or None if expired, missing or for another URL.
    pub fn get(&self, url: &str) -> Option<ScrapeResult> {
        self.get_at(url, now_ms())
    }

    pub fn get_at(&self, url: &str, now_ms: i64) -> Option<ScrapeResult> {
        self.entry.read().ok().and_then(|guard| {
            guard
                .as_ref()
                .filter(|e| e.result.metadata.url == url && self.is_fresh(e, now_ms))
                .map(|e| e.result.clone())
        })
    }

    /// Store a successful result without its debug payload. Empty results
    /// are ignored.
    pub fn put(&self, result: &ScrapeResult) {
        self.put_at(result, now_ms());
    }

    pub fn put_at(&self, result: &ScrapeResult, now_ms: i64) {
        if !result.success {
            return;
        }
        if let Ok(mut guard) = self.entry.write() {
            *guard = Some(CacheEntry {
                result: ScrapeResult {
                    debug: None,
                    ..result.clone()
                },
                cached_at_ms: now_ms,
            });
        }
    }

    pub fn summary(&self) -> Option<CacheSummary> {
        self.summary_at(now_ms())
    }

    pub fn summary_at(&self, now_ms: i64) -> Option<CacheSummary> {
        let guard = self.entry.read().ok()?;
        let entry = guard.as_ref()?;
        let method = entry.result.metadata.method;
        Some(CacheSummary {
            url: entry.result.metadata.url.clone(),
            method,
            rates: entry.result.rates.len(),
            cached_at_ms: entry.cached_at_ms,
            age_ms: now_ms - entry.cached_at_ms,
            ttl_ms: self.ttl_for(method).as_millis() as i64,
            fresh: self.is_fresh(entry, now_ms),
        })
    }
}

impl Default for RateCache {
    fn default() -> Self {
        Self::new()
    }
}
