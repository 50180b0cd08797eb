//! Relay chain behavior of `ProxyFetcher`.

mod common;

use std::sync::Arc;

use common::{MockTransport, STATIC_TABLE_PAGE, TARGET};
use liverates::error::ScrapeError;
use liverates::scrapers::{HttpResponse, ProxyFetcher, RelayConfig, RelayFormat};

fn relays() -> Vec<RelayConfig> {
    vec![
        RelayConfig::new("alpha", "https://alpha.test/raw?u={url}", RelayFormat::Raw, true),
        RelayConfig::new(
            "beta",
            "https://beta.test/get?url={url}",
            RelayFormat::JsonContents,
            true,
        ),
        RelayConfig::new("gamma", "https://gamma.test/{url}", RelayFormat::Raw, false),
    ]
}

fn relay_url(index: usize) -> String {
    relays()[index].request_url(TARGET)
}

#[tokio::test]
async fn later_relay_succeeds_after_failures() {
    let transport = Arc::new(
        MockTransport::new()
            .route(&relay_url(0), HttpResponse::new(503, "unavailable"))
            .unreachable(&relay_url(1))
            .html(&relay_url(2), STATIC_TABLE_PAGE),
    );
    let fetcher = ProxyFetcher::new(transport.clone(), relays());

    let raw = fetcher.fetch_raw(TARGET).await.unwrap();

    assert_eq!(raw.html, STATIC_TABLE_PAGE);
    assert_eq!(raw.source, "gamma");
    assert_eq!(raw.attempts.len(), 3);
    let failures: Vec<_> = raw.failures().map(|a| a.relay.as_str()).collect();
    assert_eq!(failures, vec!["alpha", "beta"]);
    assert_eq!(raw.attempts[0].error.as_deref(), Some("HTTP 503"));
    assert_eq!(raw.attempts[2].length, STATIC_TABLE_PAGE.len());
}

#[tokio::test]
async fn json_envelope_is_unwrapped_and_stops_the_chain() {
    let envelope = serde_json::json!({
        "contents": STATIC_TABLE_PAGE,
        "status": { "http_code": 200, "content_type": "text/html; charset=utf-8" }
    });
    let transport = Arc::new(
        MockTransport::new()
            .route(&relay_url(0), HttpResponse::new(403, "denied"))
            .json(&relay_url(1), envelope)
            .html(&relay_url(2), "<html>never used</html>"),
    );
    let fetcher = ProxyFetcher::new(transport.clone(), relays());

    let raw = fetcher.fetch_raw(TARGET).await.unwrap();

    assert_eq!(raw.source, "beta");
    assert_eq!(raw.html, STATIC_TABLE_PAGE);
    assert_eq!(raw.content_type.as_deref(), Some("text/html; charset=utf-8"));
    assert!(!transport.requests().contains(&relay_url(2)));
}

#[tokio::test]
async fn empty_body_counts_as_failure() {
    let transport = Arc::new(
        MockTransport::new()
            .route(&relay_url(0), HttpResponse::new(200, "   "))
            .route(
                &relay_url(1),
                HttpResponse::new(200, r#"{"contents": "", "status": {"http_code": 404}}"#),
            )
            .html(&relay_url(2), STATIC_TABLE_PAGE),
    );
    let fetcher = ProxyFetcher::new(transport, relays());

    let raw = fetcher.fetch_raw(TARGET).await.unwrap();
    assert_eq!(raw.source, "gamma");
    assert_eq!(raw.attempts[0].error.as_deref(), Some("empty body"));
    assert_eq!(raw.attempts[1].error.as_deref(), Some("upstream HTTP 404"));
}

#[tokio::test]
async fn exhausted_chain_raises_one_aggregate_error() {
    let transport = Arc::new(MockTransport::new().unreachable(&relay_url(2)));
    let fetcher = ProxyFetcher::new(transport.clone(), relays());

    let err = fetcher.fetch_html(TARGET).await.unwrap_err();

    match err {
        ScrapeError::TransportFailure { url, failures } => {
            assert_eq!(url, TARGET);
            let names: Vec<_> = failures.iter().map(|f| f.relay.as_str()).collect();
            assert_eq!(names, vec!["alpha", "beta", "gamma"]);
        }
        other => panic!("expected TransportFailure, got {:?}", other),
    }
    // Each relay is tried exactly once.
    assert_eq!(transport.request_count(), 3);
}
