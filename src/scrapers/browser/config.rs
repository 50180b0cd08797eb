//! Browser engine configuration.

use serde::{Deserialize, Serialize};

/// Browser engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserEngineConfig {
    /// Run in headless mode (default: true).
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Proxy server URL (e.g., "socks5://127.0.0.1:1080").
    #[serde(default)]
    pub proxy: Option<String>,

    /// Per-attempt navigation timeout in seconds.
    #[serde(default = "default_navigation_timeout")]
    pub navigation_timeout: u64,

    /// Fixed delay after navigation for client-side rendering, in milliseconds.
    #[serde(default = "default_stabilize_delay_ms")]
    pub stabilize_delay_ms: u64,

    /// Selector awaited after the fixed delay. Defaults to rate-like elements.
    #[serde(default)]
    pub wait_for_selector: Option<String>,

    /// Bound on the selector wait in seconds. Expiry is not an error.
    #[serde(default = "default_selector_wait")]
    pub selector_wait: u64,

    /// Attempts per URL variant with the primary wait condition.
    #[serde(default = "default_attempts")]
    pub attempts_per_condition: u32,

    /// Wall-clock ceiling for one whole render, in seconds.
    #[serde(default = "default_render_timeout")]
    pub render_timeout: u64,

    /// Capture a full-page screenshot when a scrape runs in debug mode.
    #[serde(default = "default_screenshot")]
    pub screenshot_in_debug: bool,

    /// Additional Chrome arguments.
    #[serde(default)]
    pub chrome_args: Vec<String>,

    /// Remote Chrome DevTools URL (e.g., "ws://localhost:9222").
    /// If set, connects to existing browser instead of launching one.
    #[serde(default)]
    pub remote_url: Option<String>,
}

impl Default for BrowserEngineConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            proxy: None,
            navigation_timeout: default_navigation_timeout(),
            stabilize_delay_ms: default_stabilize_delay_ms(),
            wait_for_selector: None,
            selector_wait: default_selector_wait(),
            attempts_per_condition: default_attempts(),
            render_timeout: default_render_timeout(),
            screenshot_in_debug: default_screenshot(),
            chrome_args: Vec::new(),
            remote_url: None,
        }
    }
}

pub fn default_headless() -> bool {
    true
}

pub fn default_navigation_timeout() -> u64 {
    30
}

pub fn default_stabilize_delay_ms() -> u64 {
    5_000
}

pub fn default_selector_wait() -> u64 {
    10
}

pub fn default_attempts() -> u32 {
    2
}

pub fn default_render_timeout() -> u64 {
    75
}

pub fn default_screenshot() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: BrowserEngineConfig =
            toml::from_str("headless = false\nremote_url = \"ws://localhost:9222\"").unwrap();
        assert!(!config.headless);
        assert_eq!(config.remote_url.as_deref(), Some("ws://localhost:9222"));
        assert_eq!(config.stabilize_delay_ms, 5_000);
        assert_eq!(config.attempts_per_condition, 2);
        assert_eq!(config.render_timeout, 75);
    }
}
