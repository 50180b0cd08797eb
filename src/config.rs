//! Configuration management for liverates using the prefer crate.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::scrapers::{BrowserEngineConfig, RelayConfig};

/// Default HTTP bind address for `serve`.
pub const DEFAULT_BIND: &str = "127.0.0.1:3030";

/// Environment variables that override file configuration.
pub const ENV_TARGET_URL: &str = "LIVERATES_TARGET_URL";
pub const ENV_REQUEST_TIMEOUT: &str = "LIVERATES_REQUEST_TIMEOUT";
pub const ENV_BIND: &str = "LIVERATES_BIND";
pub const ENV_CHROME_REMOTE_URL: &str = "CHROME_REMOTE_URL";

/// Application settings.
#[derive(Debug, Clone, Serialize)]
pub struct Settings {
    /// Site scraped when no URL is given.
    pub target_url: Option<String>,
    /// None = crate agent, "impersonate" = browser agent, else verbatim.
    pub user_agent: Option<String>,
    /// Per-request timeout in seconds.
    pub request_timeout: u64,
    /// Relays in priority order.
    pub relays: Vec<RelayConfig>,
    /// Probes in flight at once.
    pub probe_concurrency: usize,
    /// Guessed API paths added to the built-in list.
    pub extra_api_paths: Vec<String>,
    /// Delay before the SPA re-fetch, in milliseconds.
    pub spa_refetch_delay_ms: u64,
    /// Cache TTL for static/API results, in seconds.
    pub static_cache_ttl: u64,
    /// Cache TTL for browser-rendered results, in seconds.
    pub browser_cache_ttl: u64,
    pub browser: BrowserEngineConfig,
    /// HTTP bind address.
    pub bind: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            target_url: None,
            user_agent: Some("impersonate".to_string()),
            request_timeout: 20,
            relays: RelayConfig::defaults(),
            probe_concurrency: 3,
            extra_api_paths: Vec::new(),
            spa_refetch_delay_ms: 2_000,
            static_cache_ttl: 180,
            browser_cache_ttl: 300,
            browser: BrowserEngineConfig::default(),
            bind: DEFAULT_BIND.to_string(),
        }
    }
}

impl Settings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    pub fn spa_refetch_delay(&self) -> Duration {
        Duration::from_millis(self.spa_refetch_delay_ms)
    }

    /// Apply environment overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Apply environment overrides read through `lookup`.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_TARGET_URL).filter(|v| !v.is_empty()) {
            self.target_url = Some(url);
        }
        if let Some(timeout) = lookup(ENV_REQUEST_TIMEOUT).and_then(|v| v.parse().ok()) {
            self.request_timeout = timeout;
        }
        if let Some(bind) = lookup(ENV_BIND).filter(|v| !v.is_empty()) {
            self.bind = bind;
        }
        if let Some(remote) = lookup(ENV_CHROME_REMOTE_URL).filter(|v| !v.is_empty()) {
            self.browser.remote_url = Some(remote);
        }
    }
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Site scraped when no URL is given.
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "target")]
    pub target_url: Option<String>,
    /// User agent string, or "impersonate".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Request timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<u64>,
    /// Relay list replacing the built-in one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relays: Option<Vec<RelayConfig>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probe_concurrency: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub api_paths: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spa_refetch_delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub static_cache_ttl: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser_cache_ttl: Option<u64>,
    /// Browser engine configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser: Option<BrowserEngineConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration using prefer crate for discovery.
    /// Automatically discovers liverates config files in standard locations.
    pub async fn load() -> Self {
        match prefer::load("liverates").await {
            Ok(pref_config) => match pref_config.source_path() {
                Some(path) => match Self::load_from_path(path).await {
                    Ok(config) => config,
                    Err(e) => {
                        tracing::warn!("{}; using defaults", e);
                        Self::default()
                    }
                },
                None => Self::default(),
            },
            // No config file found
            Err(_) => Self::default(),
        }
    }

    /// Load configuration from a specific file path.
    /// TOML, YAML or JSON, chosen by file extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, String> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read config file {}: {}", path.display(), e))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

        let mut config: Config = match ext {
            "toml" => toml::from_str(&contents)
                .map_err(|e| format!("Failed to parse TOML config: {}", e))?,
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .map_err(|e| format!("Failed to parse YAML config: {}", e))?,
            _ => serde_json::from_str(&contents)
                .map_err(|e| format!("Failed to parse JSON config: {}", e))?,
        };

        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Apply configuration to settings.
    pub fn apply_to_settings(&self, settings: &mut Settings) {
        if let Some(ref url) = self.target_url {
            settings.target_url = Some(url.clone());
        }
        if let Some(ref user_agent) = self.user_agent {
            settings.user_agent = Some(user_agent.clone());
        }
        if let Some(timeout) = self.request_timeout {
            settings.request_timeout = timeout;
        }
        if let Some(ref relays) = self.relays {
            settings.relays = relays.clone();
        }
        if let Some(concurrency) = self.probe_concurrency {
            settings.probe_concurrency = concurrency;
        }
        settings.extra_api_paths.extend(self.api_paths.iter().cloned());
        if let Some(delay) = self.spa_refetch_delay_ms {
            settings.spa_refetch_delay_ms = delay;
        }
        if let Some(ttl) = self.static_cache_ttl {
            settings.static_cache_ttl = ttl;
        }
        if let Some(ttl) = self.browser_cache_ttl {
            settings.browser_cache_ttl = ttl;
        }
        if let Some(ref browser) = self.browser {
            settings.browser = browser.clone();
        }
        if let Some(ref bind) = self.bind {
            settings.bind = bind.clone();
        }
    }
}

/// Load settings from an explicit path or by discovery, then apply the
/// environment on top.
pub async fn load_settings(config_path: Option<&Path>) -> Result<(Settings, Config), String> {
    let config = match config_path {
        Some(path) => Config::load_from_path(path).await?,
        None => Config::load().await,
    };

    let mut settings = Settings::default();
    config.apply_to_settings(&mut settings);
    settings.apply_env_overrides();
    Ok((settings, config))
}
