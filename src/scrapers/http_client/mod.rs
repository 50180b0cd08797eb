//! HTTP transport shared by the relay fetcher and the endpoint probe.

mod user_agent;

pub use user_agent::{random_user_agent, resolve_user_agent, USER_AGENT};

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;

use crate::error::Result;

/// A fully read HTTP response.
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    pub status: u16,
    /// Header names lowercased.
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_lowercase(), value.to_string());
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type").map(|s| s.as_str())
    }
}

/// Outbound GET capability.
///
/// Network errors are `Err`; any HTTP status, including 4xx/5xx, is `Ok`.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, url: &str) -> Result<HttpResponse>;
}

/// reqwest-backed transport.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        Self::with_user_agent(timeout, None)
    }

    /// Build a client with a custom user agent.
    /// - None: crate user agent
    /// - Some("impersonate"): random real browser user agent
    /// - Some(custom): custom user agent string
    pub fn with_user_agent(timeout: Duration, user_agent_config: Option<&str>) -> Result<Self> {
        let user_agent = resolve_user_agent(user_agent_config);
        let client = Client::builder()
            .user_agent(&user_agent)
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for HttpClient {
    async fn get(&self, url: &str) -> Result<HttpResponse> {
        let start = Instant::now();
        let response = self
            .client
            .get(url)
            .header("Accept", "text/html,application/json;q=0.9,*/*;q=0.8")
            .send()
            .await?;

        let status = response.status().as_u16();
        let mut headers = HashMap::new();
        for (name, value) in response.headers() {
            if let Ok(v) = value.to_str() {
                headers.insert(name.to_string(), v.to_string());
            }
        }
        let body = response.text().await?;

        tracing::debug!(
            "GET {} -> {} ({} bytes, {}ms)",
            url,
            status,
            body.len(),
            start.elapsed().as_millis()
        );

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_helpers() {
        let response = HttpResponse::new(200, "{}").with_header("Content-Type", "application/json");
        assert!(response.is_success());
        assert_eq!(response.content_type(), Some("application/json"));
        assert!(!HttpResponse::new(404, "").is_success());
    }

    #[test]
    fn test_client_builds() {
        assert!(HttpClient::with_user_agent(Duration::from_secs(5), Some("impersonate")).is_ok());
    }
}
