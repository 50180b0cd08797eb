//! Rate scraping endpoints.
//!
//! A scrape that completes without rates is still a 200; only malformed
//! requests and internal failures produce error statuses.

use axum::{
    body::Bytes,
    extract::{Query, State},
    response::{IntoResponse, Response},
    Json,
};
use tracing::info;

use super::super::AppState;
use super::helpers::{ApiError, RatesAction, RatesParams};

impl AppState {
    fn target(&self, url: Option<String>) -> Result<String, ApiError> {
        url.filter(|u| !u.trim().is_empty())
            .or_else(|| self.default_url.clone())
            .ok_or_else(|| ApiError::bad_request(crate::error::ScrapeError::MissingTarget.to_string()))
    }
}

/// `GET /api/rates`: scrape, serving the cache unless `fresh` is set.
pub async fn get_rates(
    State(state): State<AppState>,
    Query(params): Query<RatesParams>,
) -> Result<Response, ApiError> {
    let url = state.target(params.url)?;
    let orchestrator = state.orchestrator.clone();

    // A panic inside a tier surfaces here as a JoinError.
    let result = tokio::spawn(async move {
        if params.fresh {
            orchestrator.scrape(&url, params.debug).await
        } else {
            orchestrator.scrape_with_cache(&url, params.debug).await
        }
    })
    .await
    .map_err(|e| ApiError::internal(format!("Scrape task failed: {}", e)))?;

    Ok(Json(result).into_response())
}

/// `POST /api/rates`: `{"action": "getStructure" | "close"}`.
pub async fn post_rates(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    let action: RatesAction = serde_json::from_slice(&body)
        .map_err(|e| ApiError::internal(format!("Invalid request body: {}", e)))?;

    match action {
        RatesAction::GetStructure { url } => {
            let url = state.target(url)?;
            let structure = state
                .orchestrator
                .structure(&url)
                .await
                .map_err(|e| ApiError::internal(e.to_string()))?;
            Ok(Json(serde_json::json!({ "success": true, "structure": structure })).into_response())
        }
        RatesAction::Close => {
            info!("Closing browser on request");
            state.orchestrator.close().await;
            Ok(Json(serde_json::json!({ "success": true, "message": "Browser closed" })).into_response())
        }
    }
}
