//! Service-level endpoints.

use axum::{extract::State, response::IntoResponse, Json};

use super::super::AppState;

/// Health check endpoint for container orchestration.
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Summary of the cached result, or `null` when nothing is cached.
pub async fn cache_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.orchestrator.cache().summary())
}
