pub mod stats;
pub mod traffic;

use axum::{
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::metrics::MetricsError;

// ─── Shared response envelope ────────────────────────────────────

/// Every API response is wrapped as `{"success": true, ...}` so clients can
/// branch on one field instead of parsing status codes.
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn data(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            message: None,
        })
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: true,
            data: None,
            message: Some(message.into()),
        })
    }
}

// ─── Unified error type ──────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Failed to retrieve statistics")]
    Stats(#[source] MetricsError),
    #[error("Failed to reset statistics")]
    Reset(String),
    #[error("Invalid request body")]
    BadRequest(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Stats(_) | Self::Reset(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn detail(&self) -> String {
        match self {
            Self::Stats(source) => source.to_string(),
            Self::Reset(msg) | Self::BadRequest(msg) => msg.clone(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        tracing::warn!(status = status.as_u16(), error = %self, detail = %self.detail(), "request failed");

        let body = serde_json::json!({
            "success": false,
            "error":   self.to_string(),
            "message": self.detail(),
        });

        (status, Json(body)).into_response()
    }
}

// ─── Fallback ────────────────────────────────────────────────────

/// JSON 404 for anything that is neither a route nor a static file.
pub async fn not_found(method: Method, uri: Uri) -> Response {
    let body = serde_json::json!({
        "success": false,
        "error":   "Endpoint not found",
        "path":    uri.path(),
        "method":  method.as_str(),
    });

    (StatusCode::NOT_FOUND, Json(body)).into_response()
}
