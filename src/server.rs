use axum::{
    handler::HandlerWithoutStateExt,
    middleware as axum_mw,
    routing::{get, post},
    Router,
};
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use crate::handlers;
use crate::metrics::{socket, stream};
use crate::middleware::{track_traffic, TrafficObserver};
use crate::AppState;

/// Builds the full Axum `Router` with all routes, middleware, and static serving.
pub fn create_router(state: Arc<AppState>, static_dir: &Path) -> Router {
    let observer: Arc<dyn TrafficObserver> = state.store.clone();

    Router::new()
        // ── Statistics ──────────────────────────────────────────
        .route("/stats", get(handlers::stats::get_stats))
        .route("/reset", post(handlers::stats::reset_stats))
        .route("/health", get(handlers::stats::health))
        // ── Metrics ─────────────────────────────────────────────
        .route("/api/metrics", get(stream::get_metrics))
        .route("/api/history", get(stream::get_history))
        .route("/api/metrics/stream", get(stream::metrics_stream))
        .route("/ws", get(socket::metrics_socket))
        // ── Demo traffic ────────────────────────────────────────
        .route(
            "/api/test",
            get(handlers::traffic::get_test).post(handlers::traffic::post_test),
        )
        // ── Provide shared state to all routes above ────────────
        .with_state(state)
        // ── Serve the dashboard directory, JSON 404 otherwise ───
        .fallback_service(
            ServeDir::new(static_dir)
                .call_fallback_on_method_not_allowed(true)
                .not_found_service(handlers::not_found.into_service()),
        )
        // ── Global middleware (applied bottom-up) ───────────────
        .layer(axum_mw::from_fn_with_state(observer, track_traffic))
        .layer(CorsLayer::permissive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{SampleStore, SnapshotPublisher};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use std::collections::BTreeMap;
    use tower::ServiceExt;

    fn app() -> (Arc<AppState>, Router) {
        let store = Arc::new(SampleStore::default());
        let publisher = SnapshotPublisher::new(store.clone());
        let state = Arc::new(AppState::new(store, publisher));
        let router = create_router(state.clone(), Path::new("does-not-exist"));
        (state, router)
    }

    async fn call(router: &Router, method: &str, uri: &str, body: Body) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body)
            .expect("request");
        let response = router.clone().oneshot(request).await.expect("infallible");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        (status, serde_json::from_slice(&bytes).expect("json body"))
    }

    #[tokio::test]
    async fn stats_counts_the_request_serving_it() {
        let (state, router) = app();

        let (status, body) = call(&router, "GET", "/stats", Body::empty()).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["totalRequests"], 1);
        assert_eq!(body["data"]["activeConnections"], 1);
        assert!(body["data"]["uptimeFormatted"].is_string());

        // Body fully read → the transaction has completed
        let snap = state.store.snapshot();
        assert_eq!(snap.active_connections, 0);
        assert_eq!(snap.status_codes, BTreeMap::from([(200, 1)]));
        assert!(snap.total_bytes_out > 0);
    }

    #[tokio::test]
    async fn reset_clears_state_including_its_own_request() {
        let (state, router) = app();
        call(&router, "GET", "/api/metrics", Body::empty()).await;
        call(&router, "GET", "/nope", Body::empty()).await;

        let (status, body) = call(&router, "POST", "/reset", Body::empty()).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "Statistics reset successfully");

        let snap = state.store.snapshot();
        assert_eq!(snap.total_requests, 0);
        assert_eq!(snap.active_connections, 0);
        assert!(snap.status_codes.is_empty());
        assert_eq!(state.store.sample_counts(), (0, 0));
    }

    #[tokio::test]
    async fn unknown_route_is_a_json_404_and_is_tracked() {
        let (state, router) = app();

        let (status, body) = call(&router, "DELETE", "/missing", Body::empty()).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Endpoint not found");
        assert_eq!(body["path"], "/missing");
        assert_eq!(body["method"], "DELETE");
        assert_eq!(state.store.snapshot().status_codes.get(&404), Some(&1));
    }

    #[tokio::test]
    async fn echo_endpoint_counts_declared_body() {
        let (state, router) = app();
        let payload = r#"{"hello":"world"}"#;

        let request = Request::builder()
            .method("POST")
            .uri("/api/test")
            .header("content-type", "application/json")
            .header("content-length", payload.len())
            .body(Body::from(payload))
            .expect("request");
        let response = router.oneshot(request).await.expect("infallible");
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let body: serde_json::Value = serde_json::from_slice(&bytes).expect("json");

        assert_eq!(body["receivedData"]["hello"], "world");
        let snap = state.store.snapshot();
        // Request line + headers + declared body
        assert!(snap.total_bytes_in > payload.len() as u64);
        assert_eq!(snap.total_bytes_out, bytes.len() as u64);
    }

    #[tokio::test]
    async fn malformed_echo_body_is_a_400_envelope() {
        let (_state, router) = app();

        let (status, body) = call(&router, "POST", "/api/test", Body::from("{not json")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn history_grows_with_maintainer_ticks() {
        let (state, router) = app();
        state.store.maintain(std::time::Instant::now());
        state.store.maintain(std::time::Instant::now());

        let (status, body) = call(&router, "GET", "/api/history", Body::empty()).await;

        assert_eq!(status, StatusCode::OK);
        let points = body.as_array().expect("array");
        assert_eq!(points.len(), 2);
        assert!(points[0]["requestsPerSecond"].is_u64());
    }

    #[tokio::test]
    async fn health_reports_healthy() {
        let (_state, router) = app();

        let (status, body) = call(&router, "GET", "/health", Body::empty()).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert!(body["uptime"].as_f64().expect("seconds") >= 0.0);
    }

    /// Next `event:`/`data:` pair from an SSE body.
    async fn next_event(
        body: &mut axum::body::BodyDataStream,
    ) -> (String, serde_json::Value) {
        use tokio_stream::StreamExt;

        let chunk = tokio::time::timeout(std::time::Duration::from_secs(2), body.next())
            .await
            .expect("event in time")
            .expect("stream open")
            .expect("chunk");
        let text = std::str::from_utf8(&chunk).expect("utf8").to_owned();
        let field = |name: &str| {
            text.lines()
                .find_map(|line| line.strip_prefix(name))
                .map(str::trim)
                .unwrap_or_default()
                .to_owned()
        };
        let data = serde_json::from_str(&field("data:")).expect("json data");
        (field("event:"), data)
    }

    #[tokio::test]
    async fn event_stream_pushes_on_connect_and_tick_then_deregisters() {
        let (state, router) = app();
        let request = Request::builder()
            .uri("/api/metrics/stream")
            .body(Body::empty())
            .expect("request");

        let response = router.oneshot(request).await.expect("infallible");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(state.publisher.subscriber_count(), 1);
        let mut body = response.into_body().into_data_stream();

        // First event arrives before any tick; the stream itself is untracked
        let (event, first) = next_event(&mut body).await;
        assert_eq!(event, "stats");
        assert_eq!(first["totalRequests"], 0);

        state.store.record_request_start(3);
        assert_eq!(state.publisher.publish(), 1);
        let (event, pushed) = next_event(&mut body).await;
        assert_eq!(event, "stats");
        assert_eq!(pushed["totalRequests"], 1);

        drop(body);
        assert_eq!(state.publisher.subscriber_count(), 0);
        assert_eq!(state.store.snapshot().total_requests, 1);
    }

    #[tokio::test]
    async fn dropped_response_still_completes_transaction() {
        let (state, router) = app();
        let request = Request::builder()
            .uri("/api/metrics")
            .body(Body::empty())
            .expect("request");

        let response = router.oneshot(request).await.expect("infallible");
        assert_eq!(state.store.snapshot().active_connections, 1);
        drop(response);

        let snap = state.store.snapshot();
        assert_eq!(snap.active_connections, 0);
        assert_eq!(snap.total_bytes_out, 0);
        assert_eq!(snap.status_codes.get(&200), Some(&1));
    }
}
