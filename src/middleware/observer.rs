use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::{Method, StatusCode};
use tracing::debug;

use crate::metrics::{Epoch, SampleStore};

/// Hooks the instrumented server calls for every transaction: one
/// `request_observed`, then exactly one `response_observed`.
pub trait TrafficObserver: Send + Sync + 'static {
    fn request_observed(&self, bytes_in: u64) -> Epoch;

    fn response_observed(&self, epoch: Epoch, status: u16, elapsed: Duration, bytes_out: u64);
}

impl TrafficObserver for SampleStore {
    fn request_observed(&self, bytes_in: u64) -> Epoch {
        self.record_request_start(bytes_in)
    }

    fn response_observed(&self, epoch: Epoch, status: u16, elapsed: Duration, bytes_out: u64) {
        self.record_response_end(epoch, status, elapsed, bytes_out);
    }
}

/// Bookkeeping for one request/response exchange.
///
/// Completion is reported exactly once: through `complete()`, or from
/// `Drop` when the response body is abandoned mid-stream or the handler
/// future is cancelled.
pub struct Transaction {
    observer: Arc<dyn TrafficObserver>,
    epoch: Epoch,
    started: Instant,
    method: Method,
    path: String,
    bytes_in: u64,
    bytes_out: u64,
    /// 500 until the handler actually produced a response
    status: StatusCode,
    finished: bool,
}

impl Transaction {
    pub fn begin(
        observer: Arc<dyn TrafficObserver>,
        method: Method,
        path: impl Into<String>,
        bytes_in: u64,
    ) -> Self {
        let started = Instant::now();
        let epoch = observer.request_observed(bytes_in);
        Self {
            observer,
            epoch,
            started,
            method,
            path: path.into(),
            bytes_in,
            bytes_out: 0,
            status: StatusCode::INTERNAL_SERVER_ERROR,
            finished: false,
        }
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn bytes_written(&mut self, n: usize) {
        self.bytes_out = self.bytes_out.saturating_add(n as u64);
    }

    pub fn bytes_out(&self) -> u64 {
        self.bytes_out
    }

    pub fn complete(mut self) {
        self.finish();
    }

    fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;

        let elapsed = self.started.elapsed();
        let status = self.status.as_u16();
        self.observer
            .response_observed(self.epoch, status, elapsed, self.bytes_out);

        debug!(
            method = %self.method,
            path = %self.path,
            status,
            elapsed_us = elapsed.as_micros() as u64,
            bytes_in = self.bytes_in,
            bytes_out = self.bytes_out,
            "request completed"
        );
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        self.finish();
    }
}
