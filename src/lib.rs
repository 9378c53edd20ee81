//! Real-time HTTP traffic metrics: a sample store fed by an axum
//! middleware, a window maintainer, and a snapshot publisher with
//! WebSocket and SSE subscribers.

use std::sync::Arc;
use std::time::Instant;

pub mod config;
pub mod handlers;
pub mod logging;
pub mod metrics;
pub mod middleware;
pub mod server;
pub mod ticker;

use metrics::{SampleStore, SnapshotPublisher};

/// Shared application state available to every handler via `State<Arc<AppState>>`.
pub struct AppState {
    /// Counters and windowed samples. The interceptor writes, everyone reads.
    pub store: Arc<SampleStore>,

    /// Subscriber registry behind the WebSocket and SSE push channels.
    pub publisher: Arc<SnapshotPublisher>,

    /// Process start, for `/health` (unaffected by `/reset`).
    pub launched_at: Instant,
}

impl AppState {
    pub fn new(store: Arc<SampleStore>, publisher: Arc<SnapshotPublisher>) -> Self {
        Self {
            store,
            publisher,
            launched_at: Instant::now(),
        }
    }
}
