//! Navigation retry policy.
//!
//! Kept free of any browser type so the state machine can be driven by a
//! plain closure in tests.

use std::future::Future;

use tracing::{debug, info, warn};
use url::Url;

use crate::error::{Result, ScrapeError};

/// Condition a navigation waits for before it counts as done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitCondition {
    /// No new network requests for a quiet window.
    NetworkIdle,
    /// At most a couple of requests during the quiet window.
    ReducedActivity,
    DomContentLoaded,
    Load,
}

impl WaitCondition {
    pub const PRIMARY: Self = Self::NetworkIdle;

    /// Progressively weaker conditions used after a block-type error.
    pub const ALTERNATES: &'static [Self] = &[
        Self::NetworkIdle,
        Self::ReducedActivity,
        Self::DomContentLoaded,
        Self::Load,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NetworkIdle => "network-idle",
            Self::ReducedActivity => "reduced-activity",
            Self::DomContentLoaded => "dom-content-loaded",
            Self::Load => "load",
        }
    }

    /// In-page script resolving `true` once the condition holds, or `false`
    /// after `timeout_ms`.
    pub fn script(&self, timeout_ms: u64) -> String {
        let check = match self {
            Self::NetworkIdle => "quiet(0)",
            Self::ReducedActivity => "quiet(2)",
            Self::DomContentLoaded => "Promise.resolve(document.readyState !== 'loading')",
            Self::Load => "Promise.resolve(document.readyState === 'complete')",
        };
        format!(
            r#"new Promise((resolve) => {{
    const deadline = Date.now() + {timeout_ms};
    const resources = () => performance.getEntriesByType('resource').length;
    const quiet = (allowed) => new Promise((done) => {{
        const before = resources();
        setTimeout(() => done(document.readyState === 'complete' && resources() - before <= allowed), 500);
    }});
    const tick = () => {{
        {check}.then((ok) => {{
            if (ok) resolve(true);
            else if (Date.now() > deadline) resolve(false);
            else setTimeout(tick, 100);
        }});
    }};
    tick();
}})"#
        )
    }
}

/// Network error codes that mean the request was refused by policy.
const BLOCKED_ERRORS: &[&str] = &[
    "ERR_BLOCKED_BY_CLIENT",
    "ERR_BLOCKED_BY_ADMINISTRATOR",
    "ERR_BLOCKED_BY_RESPONSE",
    "ERR_ACCESS_DENIED",
];

pub fn is_blocked_error(error: &str) -> bool {
    BLOCKED_ERRORS.iter().any(|code| error.contains(code))
}

/// The original URL, then http/https with and without `www.`.
pub fn url_variants(url: &str) -> Vec<String> {
    let mut variants = vec![url.to_string()];
    let Ok(parsed) = Url::parse(url) else {
        return variants;
    };
    let Some(host) = parsed.host_str() else {
        return variants;
    };
    let bare = host.strip_prefix("www.").unwrap_or(host).to_string();

    for scheme in ["https", "http"] {
        for candidate_host in [bare.clone(), format!("www.{}", bare)] {
            let mut candidate = parsed.clone();
            if candidate.set_scheme(scheme).is_err() || candidate.set_host(Some(&candidate_host)).is_err() {
                continue;
            }
            let candidate = candidate.to_string();
            if !variants.contains(&candidate) {
                variants.push(candidate);
            }
        }
    }
    variants
}

/// Where a navigation finally landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigated {
    pub url: String,
    pub condition: WaitCondition,
}

/// Navigation retry policy.
#[derive(Debug, Clone, Copy)]
pub struct NavigationPolicy {
    pub attempts_per_condition: u32,
}

impl NavigationPolicy {
    /// Try every URL variant, retrying the primary condition and switching to
    /// the alternate sequence after a block-type error.
    ///
    /// `attempt` returns the browser's error text on failure.
    pub async fn run<F, Fut>(&self, urls: &[String], mut attempt: F) -> Result<Navigated>
    where
        F: FnMut(String, WaitCondition) -> Fut,
        Fut: Future<Output = std::result::Result<(), String>>,
    {
        let mut last_error = String::from("no navigation attempted");
        let mut last_blocked = false;

        for url in urls {
            for n in 1..=self.attempts_per_condition.max(1) {
                info!("Navigating to {} (attempt {}, {})", url, n, WaitCondition::PRIMARY.as_str());
                match attempt(url.clone(), WaitCondition::PRIMARY).await {
                    Ok(()) => {
                        return Ok(Navigated {
                            url: url.clone(),
                            condition: WaitCondition::PRIMARY,
                        })
                    }
                    Err(error) if is_blocked_error(&error) => {
                        warn!("Navigation to {} blocked: {}", url, error);
                        last_error = error;
                        last_blocked = true;
                        for &condition in WaitCondition::ALTERNATES {
                            debug!("Retrying {} with {}", url, condition.as_str());
                            match attempt(url.clone(), condition).await {
                                Ok(()) => {
                                    return Ok(Navigated {
                                        url: url.clone(),
                                        condition,
                                    })
                                }
                                Err(error) => {
                                    last_blocked = is_blocked_error(&error);
                                    last_error = error;
                                }
                            }
                        }
                        break;
                    }
                    Err(error) => {
                        debug!("Navigation to {} failed: {}", url, error);
                        last_error = error;
                        last_blocked = false;
                    }
                }
            }
        }

        let url = urls.first().cloned().unwrap_or_default();
        if last_blocked {
            Err(ScrapeError::NavigationBlocked { url, last_error })
        } else {
            Err(ScrapeError::NavigationFailed { url, last_error })
        }
    }
}
