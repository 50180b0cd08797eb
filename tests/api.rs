//! HTTP interface, driven through the router without sockets.

mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use tower::ServiceExt;

use common::{orchestrator, two_gold_render, MockTransport, StubRenderer, SPA_SHELL, TARGET};
use liverates::server::{create_router, AppState};

fn app(transport: MockTransport, renderer: Arc<StubRenderer>, default_url: Option<&str>) -> Router {
    let orch = orchestrator(Arc::new(transport), renderer);
    create_router(AppState::new(Arc::new(orch), default_url.map(str::to_string)))
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/rates")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn health_reports_ok() {
    let app = app(MockTransport::new(), Arc::new(StubRenderer::default()), None);
    let (status, json) = send(app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn scrape_returns_result_for_default_target() {
    let renderer = Arc::new(StubRenderer::returning(two_gold_render()));
    let app = app(MockTransport::new().html(TARGET, SPA_SHELL), renderer, Some(TARGET));

    let (status, json) = send(app, get("/api/rates?debug=true")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["rates"].as_array().unwrap().len(), 2);
    assert_eq!(json["metadata"]["method"], "browser-fallback");
    assert_eq!(json["metadata"]["url"], TARGET);
    assert!(json["debug"].is_object());
}

#[tokio::test]
async fn empty_scrape_is_still_200() {
    let app = app(MockTransport::new(), Arc::new(StubRenderer::default()), None);
    let uri = format!("/api/rates?url={}", urlencoding::encode(TARGET));

    let (status, json) = send(app, get(&uri)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], false);
    assert_eq!(json["rates"], serde_json::json!([]));
}

#[tokio::test]
async fn missing_target_is_a_bad_request() {
    let app = app(MockTransport::new(), Arc::new(StubRenderer::default()), None);
    let (status, json) = send(app, get("/api/rates")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn malformed_body_is_500_with_zeroed_debug_info() {
    let app = app(MockTransport::new(), Arc::new(StubRenderer::default()), Some(TARGET));

    let (status, json) = send(app, post("{not json")).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["success"], false);
    assert_eq!(json["rates"], serde_json::json!([]));
    assert!(json["error"].as_str().unwrap().contains("Invalid request body"));
    assert_eq!(json["debugInfo"]["htmlLength"], 0);
}

#[tokio::test]
async fn get_structure_action_renders_dom_summary() {
    let app = app(MockTransport::new(), Arc::new(StubRenderer::default()), Some(TARGET));

    let (status, json) = send(app, post(r#"{"action": "getStructure"}"#)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["structure"]["url"], TARGET);
    assert_eq!(json["structure"]["rateElements"], 4);
}

#[tokio::test]
async fn close_action_tears_down_browser() {
    let renderer = Arc::new(StubRenderer::default());
    let app = app(MockTransport::new(), renderer.clone(), None);

    let (status, json) = send(app, post(r#"{"action": "close"}"#)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(renderer.close_count(), 1);
}

#[tokio::test]
async fn cache_endpoint_reflects_last_success() {
    let renderer = Arc::new(StubRenderer::returning(two_gold_render()));
    let app = app(MockTransport::new().html(TARGET, SPA_SHELL), renderer, Some(TARGET));

    let (_, empty) = send(app.clone(), get("/api/rates/cache")).await;
    assert!(empty.is_null());

    send(app.clone(), get("/api/rates")).await;
    let (status, summary) = send(app, get("/api/rates/cache")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["url"], TARGET);
    assert_eq!(summary["method"], "browser-fallback");
    assert_eq!(summary["ttlMs"], 300_000);
    assert_eq!(summary["fresh"], true);
}
