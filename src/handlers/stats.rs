use axum::{extract::State, Json};
use chrono::Utc;
use serde::Serialize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::info;

use super::{ApiResponse, AppError};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct Health {
    pub success: bool,
    pub status: &'static str,
    pub timestamp: String,
    /// Process uptime in seconds (not reset by `/reset`)
    pub uptime: f64,
}

// ─── GET /stats ──────────────────────────────────────────────────

pub async fn get_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let snapshot = state.store.snapshot();
    let data = serde_json::to_value(&snapshot).map_err(|e| AppError::Stats(e.into()))?;
    Ok(ApiResponse::data(data))
}

// ─── POST /reset ─────────────────────────────────────────────────

pub async fn reset_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    panic::catch_unwind(AssertUnwindSafe(|| state.store.reset()))
        .map_err(|_| AppError::Reset("store reset did not complete".into()))?;

    // Subscribers see the cleared state without waiting for the next tick
    let notified = state.publisher.publish();
    info!(subscribers = notified, "statistics reset");

    Ok(ApiResponse::message("Statistics reset successfully"))
}

// ─── GET /health ─────────────────────────────────────────────────

pub async fn health(State(state): State<Arc<AppState>>) -> Json<Health> {
    Json(Health {
        success: true,
        status: "healthy",
        timestamp: Utc::now().to_rfc3339(),
        uptime: state.launched_at.elapsed().as_secs_f64(),
    })
}
