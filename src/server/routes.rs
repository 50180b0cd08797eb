//! Router configuration for the web server.

use axum::{routing::get, Router};
use tower_http::cors::CorsLayer;

use super::handlers;
use super::AppState;

/// Create the main router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/api/rates",
            get(handlers::get_rates).post(handlers::post_rates),
        )
        .route("/api/rates/cache", get(handlers::cache_status))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
