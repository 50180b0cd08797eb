//! Relay fan-out for fetching a page through CORS proxies.
//!
//! Relays are tried strictly in order. A relay failure is recorded in the
//! attempt ledger and never raised; only exhausting the whole list produces
//! an error.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::http_client::{HttpResponse, HttpTransport};
use crate::error::{RelayFailure, Result, ScrapeError};

/// How a relay wraps the target's body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayFormat {
    /// Body is the target's body.
    #[default]
    Raw,
    /// Body is JSON with the target's body under `contents`.
    JsonContents,
}

fn default_encode() -> bool {
    true
}

/// One relay endpoint. `template` contains a `{url}` placeholder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayConfig {
    pub name: String,
    pub template: String,
    #[serde(default)]
    pub format: RelayFormat,
    /// Percent-encode the target before substitution.
    #[serde(default = "default_encode")]
    pub encode: bool,
}

impl RelayConfig {
    pub fn new(name: &str, template: &str, format: RelayFormat, encode: bool) -> Self {
        Self {
            name: name.to_string(),
            template: template.to_string(),
            format,
            encode,
        }
    }

    /// Fetch the target without a relay.
    pub fn direct() -> Self {
        Self::new("direct", "{url}", RelayFormat::Raw, false)
    }

    /// Built-in relay list, highest priority first.
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::direct(),
            Self::new(
                "allorigins",
                "https://api.allorigins.win/get?url={url}",
                RelayFormat::JsonContents,
                true,
            ),
            Self::new("corsproxy", "https://corsproxy.io/?{url}", RelayFormat::Raw, true),
            Self::new(
                "codetabs",
                "https://api.codetabs.com/v1/proxy?quest={url}",
                RelayFormat::Raw,
                true,
            ),
            Self::new(
                "thingproxy",
                "https://thingproxy.freeboard.io/fetch/{url}",
                RelayFormat::Raw,
                false,
            ),
        ]
    }

    pub fn request_url(&self, target: &str) -> String {
        let target = if self.encode {
            urlencoding::encode(target).into_owned()
        } else {
            target.to_string()
        };
        self.template.replace("{url}", &target)
    }

    /// Unwrap a relay response into the target's body and content type.
    fn normalize(&self, response: HttpResponse) -> std::result::Result<Unwrapped, String> {
        if response.status != 200 {
            return Err(format!("HTTP {}", response.status));
        }

        let unwrapped = match self.format {
            RelayFormat::Raw => Unwrapped {
                content_type: response.content_type().map(str::to_string),
                body: response.body,
            },
            RelayFormat::JsonContents => {
                let envelope: Value = serde_json::from_str(&response.body)
                    .map_err(|e| format!("invalid relay envelope: {}", e))?;
                let status = envelope.get("status");
                if let Some(code) = status.and_then(|s| s.get("http_code")).and_then(Value::as_u64) {
                    if code != 200 {
                        return Err(format!("upstream HTTP {}", code));
                    }
                }
                Unwrapped {
                    content_type: status
                        .and_then(|s| s.get("content_type"))
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    body: envelope
                        .get("contents")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                }
            }
        };

        if unwrapped.body.trim().is_empty() {
            return Err("empty body".to_string());
        }
        Ok(unwrapped)
    }
}

struct Unwrapped {
    body: String,
    content_type: Option<String>,
}

/// Outcome of one relay attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayAttempt {
    pub relay: String,
    pub success: bool,
    pub length: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A successful fetch plus every attempt made to get it.
#[derive(Debug, Clone)]
pub struct RawFetch {
    pub html: String,
    /// Name of the relay that succeeded.
    pub source: String,
    pub content_type: Option<String>,
    pub attempts: Vec<RelayAttempt>,
}

impl RawFetch {
    /// Attempts that failed before the successful one.
    pub fn failures(&self) -> impl Iterator<Item = &RelayAttempt> {
        self.attempts.iter().filter(|a| !a.success)
    }
}

#[derive(Clone)]
pub struct ProxyFetcher {
    transport: Arc<dyn HttpTransport>,
    relays: Vec<RelayConfig>,
}

impl ProxyFetcher {
    pub fn new(transport: Arc<dyn HttpTransport>, relays: Vec<RelayConfig>) -> Self {
        Self { transport, relays }
    }

    pub fn with_default_relays(transport: Arc<dyn HttpTransport>) -> Self {
        Self::new(transport, RelayConfig::defaults())
    }

    pub fn relays(&self) -> &[RelayConfig] {
        &self.relays
    }

    /// Fetch `url` through the first relay that yields a usable body.
    pub async fn fetch_raw(&self, url: &str) -> Result<RawFetch> {
        let mut attempts = Vec::with_capacity(self.relays.len());

        for relay in &self.relays {
            let request_url = relay.request_url(url);
            let outcome = match self.transport.get(&request_url).await {
                Ok(response) => relay.normalize(response),
                Err(e) => Err(e.to_string()),
            };

            match outcome {
                Ok(unwrapped) => {
                    tracing::debug!(
                        "Relay {} succeeded for {} ({} bytes)",
                        relay.name,
                        url,
                        unwrapped.body.len()
                    );
                    attempts.push(RelayAttempt {
                        relay: relay.name.clone(),
                        success: true,
                        length: unwrapped.body.len(),
                        error: None,
                    });
                    return Ok(RawFetch {
                        html: unwrapped.body,
                        source: relay.name.clone(),
                        content_type: unwrapped.content_type,
                        attempts,
                    });
                }
                Err(error) => {
                    tracing::debug!("Relay {} failed for {}: {}", relay.name, url, error);
                    attempts.push(RelayAttempt {
                        relay: relay.name.clone(),
                        success: false,
                        length: 0,
                        error: Some(error),
                    });
                }
            }
        }

        tracing::warn!("All {} relays failed for {}", attempts.len(), url);
        Err(ScrapeError::TransportFailure {
            url: url.to_string(),
            failures: attempts
                .into_iter()
                .map(|a| RelayFailure {
                    relay: a.relay,
                    error: a.error.unwrap_or_default(),
                })
                .collect(),
        })
    }

    pub async fn fetch_html(&self, url: &str) -> Result<String> {
        Ok(self.fetch_raw(url).await?.html)
    }
}
