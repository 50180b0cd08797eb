//! Request parameters and response envelopes shared by the handlers.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::models::{DebugInfo, RateRecord};

/// Query params for `GET /api/rates`.
#[derive(Debug, Default, Deserialize)]
pub struct RatesParams {
    pub url: Option<String>,
    #[serde(default)]
    pub debug: bool,
    /// Bypass the cache.
    #[serde(default)]
    pub fresh: bool,
}

/// Body of `POST /api/rates`.
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum RatesAction {
    GetStructure {
        #[serde(default)]
        url: Option<String>,
    },
    Close,
}

/// Failure envelope, shaped like a scrape result so clients parse one type.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    pub success: bool,
    pub rates: Vec<RateRecord>,
    pub error: String,
    pub debug_info: DebugInfo,
}

impl ErrorEnvelope {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            rates: Vec::new(),
            error: error.into(),
            debug_info: DebugInfo::default(),
        }
    }
}

/// Error response with a status code and the failure envelope.
pub struct ApiError {
    pub status: StatusCode,
    pub envelope: ErrorEnvelope,
}

impl ApiError {
    pub fn internal(error: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            envelope: ErrorEnvelope::new(error),
        }
    }

    pub fn bad_request(error: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            envelope: ErrorEnvelope::new(error),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::warn!("Request failed ({}): {}", self.status, self.envelope.error);
        (self.status, Json(self.envelope)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_parsing() {
        let action: RatesAction =
            serde_json::from_str(r#"{"action": "getStructure", "url": "https://a.example/"}"#).unwrap();
        assert!(matches!(action, RatesAction::GetStructure { url: Some(_) }));

        let action: RatesAction = serde_json::from_str(r#"{"action": "close"}"#).unwrap();
        assert!(matches!(action, RatesAction::Close));

        assert!(serde_json::from_str::<RatesAction>(r#"{"action": "reboot"}"#).is_err());
    }

    #[test]
    fn test_envelope_has_zeroed_debug_info() {
        let json = serde_json::to_value(ErrorEnvelope::new("boom")).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["rates"], serde_json::json!([]));
        assert_eq!(json["debugInfo"]["htmlLength"], 0);
        assert_eq!(json["debugInfo"]["htmlSnippet"], "");
    }
}
