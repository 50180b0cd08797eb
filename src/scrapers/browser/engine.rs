//! chromiumoxide-backed rendering.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine;
use chromiumoxide::cdp::browser_protocol::page::{CaptureScreenshotFormat, NavigateParams};
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::navigate::{url_variants, Navigated, NavigationPolicy, WaitCondition};
use super::scripts::{snapshot_script, structure_script, PageStructure, RATE_WAIT_SELECTOR};
use super::{BrowserEngineConfig, RenderOutcome, RenderScraper};
use crate::error::{Result, ScrapeError};
use crate::extract::{extract_rates, LiveSnapshot, SourceTags};
use crate::models::html_snippet;

fn browser_err(e: impl std::fmt::Display) -> ScrapeError {
    ScrapeError::Browser(e.to_string())
}

struct LiveBrowser {
    browser: Browser,
    handler: JoinHandle<()>,
}

/// Shared, lazily launched browser process.
///
/// Cloning shares the same process. At most one lease is outstanding.
#[derive(Clone)]
pub struct BrowserHandle {
    config: BrowserEngineConfig,
    slot: Arc<Mutex<Option<LiveBrowser>>>,
}

/// Exclusive use of the running browser. Dropping it releases the handle.
pub struct BrowserLease {
    guard: OwnedMutexGuard<Option<LiveBrowser>>,
}

impl BrowserLease {
    pub fn browser(&self) -> Result<&Browser> {
        self.guard
            .as_ref()
            .map(|live| &live.browser)
            .ok_or(ScrapeError::BrowserUnavailable)
    }
}

/// Take the slot's value out if `exited` reports it dead.
fn evict_if<T>(slot: &mut Option<T>, exited: impl Fn(&T) -> bool) -> Option<T> {
    if slot.as_ref().is_some_and(exited) {
        slot.take()
    } else {
        None
    }
}

impl BrowserHandle {
    /// Common Chrome executable paths to check.
    const CHROME_PATHS: &'static [&'static str] = &[
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        "/opt/google/chrome/google-chrome",
    ];

    pub fn new(config: BrowserEngineConfig) -> Self {
        Self {
            config,
            slot: Arc::new(Mutex::new(None)),
        }
    }

    /// Wait for the handle, launching the browser if it is not running.
    ///
    /// A crashed process or dropped remote connection ends the handler
    /// task; such a browser is discarded and relaunched here.
    pub async fn acquire(&self) -> Result<BrowserLease> {
        let mut guard = self.slot.clone().lock_owned().await;
        if let Some(stale) = evict_if(&mut *guard, |live| live.handler.is_finished()) {
            warn!("Browser connection lost, relaunching");
            stale.handler.abort();
        }
        if guard.is_none() {
            *guard = Some(self.launch().await?);
        }
        Ok(BrowserLease { guard })
    }

    /// Shut the browser down. Waits for an in-flight render to finish.
    pub async fn force_close(&self) {
        let mut guard = self.slot.lock().await;
        if let Some(mut live) = guard.take() {
            info!("Closing browser");
            if let Err(e) = live.browser.close().await {
                debug!("Browser close returned error: {}", e);
            }
            live.handler.abort();
        }
    }

    fn find_chrome() -> Result<PathBuf> {
        for path in Self::CHROME_PATHS {
            let p = std::path::Path::new(path);
            if p.exists() {
                info!("Found Chrome at: {}", path);
                return Ok(p.to_path_buf());
            }
        }

        for cmd in ["google-chrome", "google-chrome-stable", "chromium", "chromium-browser"] {
            if let Ok(output) = std::process::Command::new("which").arg(cmd).output() {
                if output.status.success() {
                    let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                    if !path.is_empty() {
                        info!("Found Chrome in PATH: {}", path);
                        return Ok(PathBuf::from(path));
                    }
                }
            }
        }

        Err(ScrapeError::BrowserLaunch(
            "Chrome/Chromium not found; install it or set CHROME_REMOTE_URL".to_string(),
        ))
    }

    async fn launch(&self) -> Result<LiveBrowser> {
        if let Some(remote_url) = self.config.remote_url.as_deref() {
            return self.connect_remote(remote_url).await;
        }

        info!("Launching browser (headless={})", self.config.headless);
        let mut builder = BrowserConfig::builder()
            .chrome_executable(Self::find_chrome()?)
            .request_timeout(Duration::from_secs(self.config.navigation_timeout))
            .window_size(1366, 900);

        // with_head means NOT headless
        if !self.config.headless {
            builder = builder.with_head();
        }
        if let Some(ref proxy) = self.config.proxy {
            builder = builder.arg(format!("--proxy-server={}", proxy));
        }

        builder = builder
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--no-sandbox")
            .arg("--disable-gpu");
        for arg in &self.config.chrome_args {
            builder = builder.arg(arg);
        }

        let config = builder.build().map_err(ScrapeError::BrowserLaunch)?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| ScrapeError::BrowserLaunch(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        Ok(LiveBrowser { browser, handler })
    }

    async fn connect_remote(&self, url: &str) -> Result<LiveBrowser> {
        info!("Connecting to remote browser at {}", url);

        let http_url = url.replace("ws://", "http://").replace("wss://", "https://");
        let version_url = format!("{}/json/version", http_url.trim_end_matches('/'));
        let version: serde_json::Value = reqwest::get(&version_url)
            .await
            .map_err(|e| ScrapeError::BrowserLaunch(format!("remote browser unreachable: {}", e)))?
            .json()
            .await
            .map_err(|e| ScrapeError::BrowserLaunch(format!("bad version info: {}", e)))?;

        let ws_url = version
            .get("webSocketDebuggerUrl")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ScrapeError::BrowserLaunch("no webSocketDebuggerUrl in response".to_string()))?;

        let handler_config = chromiumoxide::handler::HandlerConfig {
            request_timeout: Duration::from_secs(self.config.navigation_timeout),
            ..Default::default()
        };
        let (browser, mut handler) = Browser::connect_with_config(ws_url, handler_config)
            .await
            .map_err(|e| ScrapeError::BrowserLaunch(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        Ok(LiveBrowser { browser, handler })
    }
}

/// Closes its page on every exit path, including cancellation.
struct PageGuard {
    page: Page,
    closed: bool,
}

impl PageGuard {
    fn new(page: Page) -> Self {
        Self { page, closed: false }
    }

    async fn close(mut self) {
        self.closed = true;
        if let Err(e) = self.page.clone().close().await {
            debug!("Page close failed: {}", e);
        }
    }
}

impl Drop for PageGuard {
    fn drop(&mut self) {
        if !self.closed {
            let page = self.page.clone();
            tokio::spawn(async move {
                let _ = page.close().await;
            });
        }
    }
}

/// One navigation attempt; the error is the browser's own error text.
async fn navigate_once(
    page: &Page,
    url: &str,
    condition: WaitCondition,
    timeout: Duration,
) -> std::result::Result<(), String> {
    let params = NavigateParams::builder()
        .url(url)
        .build()
        .map_err(|e| format!("invalid URL: {}", e))?;

    let response = tokio::time::timeout(timeout, page.execute(params))
        .await
        .map_err(|_| format!("navigation timed out after {}s", timeout.as_secs()))?
        .map_err(|e| e.to_string())?;
    if let Some(error) = response.result.error_text.clone() {
        return Err(error);
    }

    let ready: bool = tokio::time::timeout(
        timeout,
        page.evaluate(condition.script(timeout.as_millis() as u64)),
    )
    .await
    .map_err(|_| format!("timed out waiting for {}", condition.as_str()))?
    .map_err(|e| e.to_string())?
    .into_value()
    .map_err(|e| e.to_string())?;

    if ready {
        Ok(())
    } else {
        Err(format!("timed out waiting for {}", condition.as_str()))
    }
}

/// Renders pages in the shared browser and extracts rates from the live DOM.
pub struct BrowserRenderScraper {
    config: BrowserEngineConfig,
    handle: BrowserHandle,
}

impl BrowserRenderScraper {
    pub fn new(config: BrowserEngineConfig) -> Self {
        let handle = BrowserHandle::new(config.clone());
        Self { config, handle }
    }

    pub fn handle(&self) -> &BrowserHandle {
        &self.handle
    }

    async fn navigate(&self, page: &Page, url: &str) -> Result<Navigated> {
        let policy = NavigationPolicy {
            attempts_per_condition: self.config.attempts_per_condition,
        };
        let timeout = Duration::from_secs(self.config.navigation_timeout);
        policy
            .run(&url_variants(url), |target, condition| {
                let page = page.clone();
                async move { navigate_once(&page, &target, condition, timeout).await }
            })
            .await
    }

    /// Fixed delay, then a bounded wait for rate-like elements. Never fails.
    async fn stabilize(&self, page: &Page) {
        tokio::time::sleep(Duration::from_millis(self.config.stabilize_delay_ms)).await;

        let selector = self
            .config
            .wait_for_selector
            .as_deref()
            .unwrap_or(RATE_WAIT_SELECTOR);
        let deadline = Instant::now() + Duration::from_secs(self.config.selector_wait);
        loop {
            if page.find_element(selector).await.is_ok() {
                debug!("Selector {} present", selector);
                return;
            }
            if Instant::now() >= deadline {
                warn!("No element matched {} in time; extracting anyway", selector);
                return;
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
    }

    async fn screenshot(&self, page: &Page) -> Option<String> {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(true)
            .build();
        match page.screenshot(params).await {
            Ok(png) => Some(base64::engine::general_purpose::STANDARD.encode(png)),
            Err(e) => {
                warn!("Screenshot failed: {}", e);
                None
            }
        }
    }

    async fn render_page(&self, page: &Page, url: &str, debug: bool) -> Result<RenderOutcome> {
        let navigated = self.navigate(page, url).await?;
        info!("Loaded {} ({})", navigated.url, navigated.condition.as_str());

        self.stabilize(page).await;

        let snapshot: LiveSnapshot = page
            .evaluate(snapshot_script())
            .await
            .map_err(browser_err)?
            .into_value()?;
        let extraction = extract_rates(&snapshot, SourceTags::BROWSER);
        info!("Browser extraction found {} rates", extraction.rates.len());

        let mut outcome = RenderOutcome {
            success: !extraction.rates.is_empty(),
            rates: extraction.rates,
            elements_found: extraction.census.total(),
            final_url: Some(navigated.url),
            ..Default::default()
        };

        if debug {
            let html = page.content().await.map_err(browser_err)?;
            outcome.html_length = html.len();
            outcome.html_snippet = html_snippet(&html);
            outcome.table_structure = extraction.table_structure;
            if self.config.screenshot_in_debug {
                outcome.screenshot = self.screenshot(page).await;
            }
        }

        Ok(outcome)
    }

    async fn render(&self, url: &str, debug: bool) -> Result<RenderOutcome> {
        let lease = self.handle.acquire().await?;
        let page = PageGuard::new(lease.browser()?.new_page("about:blank").await.map_err(browser_err)?);

        let result = self.render_page(&page.page, url, debug).await;
        page.close().await;
        drop(lease);
        result
    }

    async fn render_structure(&self, url: &str) -> Result<PageStructure> {
        let lease = self.handle.acquire().await?;
        let page = PageGuard::new(lease.browser()?.new_page("about:blank").await.map_err(browser_err)?);

        let result: Result<PageStructure> = async {
            self.navigate(&page.page, url).await?;
            self.stabilize(&page.page).await;
            let structure: PageStructure = page
                .page
                .evaluate(structure_script())
                .await
                .map_err(browser_err)?
                .into_value()?;
            Ok(structure)
        }
        .await;
        page.close().await;
        result
    }

    fn ceiling(&self) -> Duration {
        Duration::from_secs(self.config.render_timeout)
    }
}

#[async_trait]
impl RenderScraper for BrowserRenderScraper {
    async fn scrape(&self, url: &str, debug: bool) -> RenderOutcome {
        match tokio::time::timeout(self.ceiling(), self.render(url, debug)).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                warn!("Browser render failed for {}: {}", url, e);
                RenderOutcome::failed(e.to_string())
            }
            Err(_) => {
                let e = ScrapeError::RenderTimeout(self.config.render_timeout);
                warn!("{} for {}", e, url);
                RenderOutcome::failed(e.to_string())
            }
        }
    }

    async fn structure(&self, url: &str) -> Result<PageStructure> {
        tokio::time::timeout(self.ceiling(), self.render_structure(url))
            .await
            .map_err(|_| ScrapeError::RenderTimeout(self.config.render_timeout))?
    }

    async fn close(&self) {
        self.handle.force_close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evict_if_keeps_live_value() {
        let mut slot = Some(3);
        assert!(evict_if(&mut slot, |v| *v > 5).is_none());
        assert_eq!(slot, Some(3));
        assert!(evict_if(&mut None::<i32>, |_| true).is_none());
    }

    #[tokio::test]
    async fn test_finished_handler_is_evicted() {
        let finished = tokio::spawn(async {});
        while !finished.is_finished() {
            tokio::task::yield_now().await;
        }
        let mut slot = Some(finished);
        assert!(evict_if(&mut slot, |h| h.is_finished()).is_some());
        assert!(slot.is_none());

        let running = tokio::spawn(std::future::pending::<()>());
        let mut slot = Some(running);
        assert!(evict_if(&mut slot, |h| h.is_finished()).is_none());
        if let Some(h) = slot {
            h.abort();
        }
    }
}
