//! Error taxonomy for the extraction pipeline.
//!
//! Only conditions that stop a tier are errors. A row that matches keywords
//! but cannot be resolved, or a value outside the plausibility window, is a
//! non-match and never surfaces here. An empty extraction is a normal
//! `ScrapeResult { success: false }`, not an error.

use thiserror::Error;

/// Failure of one relay attempt, kept for the aggregate error.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayFailure {
    pub relay: String,
    pub error: String,
}

impl std::fmt::Display for RelayFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.relay, self.error)
    }
}

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("All {} relays failed for {url}: {}", .failures.len(), join_failures(.failures))]
    TransportFailure {
        url: String,
        failures: Vec<RelayFailure>,
    },

    #[error("Navigation blocked by client policy for {url}: {last_error}")]
    NavigationBlocked { url: String, last_error: String },

    #[error("Navigation failed for {url}: {last_error}")]
    NavigationFailed { url: String, last_error: String },

    #[error("Failed to launch browser: {0}")]
    BrowserLaunch(String),

    #[error("Browser support not compiled. Rebuild with: cargo build --features browser")]
    BrowserUnavailable,

    #[error("Browser render exceeded {0}s")]
    RenderTimeout(u64),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("No target URL configured")]
    MissingTarget,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn join_failures(failures: &[RelayFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, ScrapeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_failure_message_lists_relays() {
        let err = ScrapeError::TransportFailure {
            url: "https://example.com".to_string(),
            failures: vec![
                RelayFailure {
                    relay: "direct".to_string(),
                    error: "HTTP 403".to_string(),
                },
                RelayFailure {
                    relay: "allorigins".to_string(),
                    error: "timeout".to_string(),
                },
            ],
        };
        let msg = err.to_string();
        assert!(msg.starts_with("All 2 relays failed"));
        assert!(msg.contains("direct: HTTP 403; allorigins: timeout"));
    }
}
