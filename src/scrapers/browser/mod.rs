//! Headless browser rendering, the last-resort extraction tier.
//!
//! One render walks LAUNCH, NAVIGATE, STABILIZE, EXTRACT, CAPTURE_DEBUG and
//! CLOSE_PAGE. The browser process is shared and single-flight: a render
//! holds the [`BrowserHandle`] lease for its whole duration.

mod config;
#[cfg(feature = "browser")]
mod engine;
pub mod navigate;
pub mod scripts;

pub use config::BrowserEngineConfig;
#[cfg(feature = "browser")]
pub use engine::{BrowserHandle, BrowserLease, BrowserRenderScraper};
pub use navigate::{url_variants, NavigationPolicy, WaitCondition};
pub use scripts::{DomNode, PageStructure};

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{RateRecord, TableDump};

/// Result of one render attempt. Failures are reported here, not raised.
#[derive(Debug, Clone, Default)]
pub struct RenderOutcome {
    pub success: bool,
    pub rates: Vec<RateRecord>,
    pub elements_found: usize,
    /// URL variant that finally loaded.
    pub final_url: Option<String>,
    pub html_snippet: String,
    pub html_length: usize,
    pub table_structure: Vec<TableDump>,
    /// Base64 PNG, debug mode only.
    pub screenshot: Option<String>,
    pub error: Option<String>,
}

impl RenderOutcome {
    /// Empty outcome with zeroed debug fields.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

/// Render-and-extract capability the orchestrator depends on.
#[async_trait]
pub trait RenderScraper: Send + Sync {
    /// Render `url` and run every in-page extraction strategy.
    async fn scrape(&self, url: &str, debug: bool) -> RenderOutcome;

    /// Depth-limited summary of the rendered DOM.
    async fn structure(&self, url: &str) -> Result<PageStructure>;

    /// Tear down the shared browser process.
    async fn close(&self);
}

// Stub for when browser feature is disabled
#[cfg(not(feature = "browser"))]
pub struct BrowserRenderScraper {
    #[allow(dead_code)]
    config: BrowserEngineConfig,
}

#[cfg(not(feature = "browser"))]
impl BrowserRenderScraper {
    pub fn new(config: BrowserEngineConfig) -> Self {
        Self { config }
    }
}

#[cfg(not(feature = "browser"))]
#[async_trait]
impl RenderScraper for BrowserRenderScraper {
    async fn scrape(&self, _url: &str, _debug: bool) -> RenderOutcome {
        RenderOutcome::failed(crate::error::ScrapeError::BrowserUnavailable.to_string())
    }

    async fn structure(&self, _url: &str) -> Result<PageStructure> {
        Err(crate::error::ScrapeError::BrowserUnavailable)
    }

    async fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_outcome_is_zeroed() {
        let outcome = RenderOutcome::failed("navigation failed");
        assert!(!outcome.success);
        assert!(outcome.rates.is_empty());
        assert_eq!(outcome.html_length, 0);
        assert!(outcome.screenshot.is_none());
        assert_eq!(outcome.error.as_deref(), Some("navigation failed"));
    }
}
