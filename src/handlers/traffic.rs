use axum::{extract::rejection::JsonRejection, Json};
use chrono::Utc;
use rand::distributions::{Alphanumeric, DistString};
use rand::Rng;
use serde::Serialize;
use std::time::Duration;

use super::AppError;

// ─── Response types ──────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResponse {
    pub success: bool,
    pub message: &'static str,
    pub timestamp: String,
    pub delay: f64,
    pub random_data: RandomData,
}

#[derive(Debug, Serialize)]
pub struct RandomData {
    pub number: f64,
    pub string: String,
    pub array: Vec<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EchoResponse {
    pub success: bool,
    pub message: &'static str,
    pub received_data: serde_json::Value,
    pub timestamp: String,
}

/// Simulated handler latency range (ms)
const MIN_DELAY_MS: f64 = 50.0;
const MAX_DELAY_MS: f64 = 150.0;

// ─── GET /api/test ───────────────────────────────────────────────
/// Demo traffic: sleeps 50–150 ms, then returns a random payload.

pub async fn get_test() -> Json<TestResponse> {
    // ThreadRng is !Send, so never hold it across the await
    let delay = rand::thread_rng().gen_range(MIN_DELAY_MS..MAX_DELAY_MS);
    tokio::time::sleep(Duration::from_secs_f64(delay / 1000.0)).await;

    Json(TestResponse {
        success: true,
        message: "Test endpoint response",
        timestamp: Utc::now().to_rfc3339(),
        delay,
        random_data: random_data(),
    })
}

// ─── POST /api/test ──────────────────────────────────────────────
/// Demo traffic: echoes the JSON body back.

pub async fn post_test(
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<Json<EchoResponse>, AppError> {
    let Json(received_data) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;

    Ok(Json(EchoResponse {
        success: true,
        message: "POST request received",
        received_data,
        timestamp: Utc::now().to_rfc3339(),
    }))
}

fn random_data() -> RandomData {
    let mut rng = rand::thread_rng();
    RandomData {
        number: rng.gen(),
        string: Alphanumeric.sample_string(&mut rng, 7),
        array: (0..5).map(|_| rng.gen()).collect(),
    }
}
