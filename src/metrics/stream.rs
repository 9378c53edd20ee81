use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::{Stream, StreamExt};
use tracing::warn;

use super::snapshot::{HistoryPoint, Snapshot};
use crate::AppState;

// ─── GET /api/metrics ────────────────────────────────────────────
/// Returns a single bare JSON snapshot, handy for curl and debugging.

pub async fn get_metrics(State(state): State<Arc<AppState>>) -> Json<Snapshot> {
    Json(state.store.snapshot())
}

// ─── GET /api/history ────────────────────────────────────────────
/// One point per maintainer tick, oldest first.

pub async fn get_history(State(state): State<Arc<AppState>>) -> Json<Vec<HistoryPoint>> {
    Json(state.store.history())
}

// ─── GET /api/metrics/stream ─────────────────────────────────────
/// Server-Sent Events push channel.
/// Each connection is a publisher subscription: one `stats` event right
/// away, then one per publisher tick. The subscription is dropped (and
/// deregistered) when the client disconnects.

pub async fn metrics_stream(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscription = state.publisher.subscribe();

    let stream = subscription.map(|snapshot| {
        let event = match snapshot.to_json() {
            Ok(json) => Event::default().event("stats").data(json),
            Err(e) => {
                warn!(error = %e, "skipping snapshot event");
                Event::default().comment("snapshot unavailable")
            }
        };
        Ok::<_, Infallible>(event)
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
