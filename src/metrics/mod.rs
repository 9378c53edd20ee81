pub mod maintainer;
pub mod percentiles;
pub mod publisher;
pub mod snapshot;
pub mod socket;
pub mod store;
pub mod stream;

use std::time::{Duration, Instant};

pub use maintainer::WindowMaintainer;
pub use publisher::{SnapshotPublisher, Subscription};
pub use snapshot::{HistoryPoint, Snapshot};
pub use store::{SampleStore, WindowConfig};

/// Recorded when a request is first observed.
#[derive(Debug, Clone, Copy)]
pub struct RequestSample {
    pub timestamp: Instant,
    pub bytes_in: u64,
}

/// Recorded once a response has been fully written (or abandoned).
#[derive(Debug, Clone, Copy)]
pub struct ResponseSample {
    pub timestamp: Instant,
    pub response_time: Duration,
    pub bytes_out: u64,
}

/// Reset generation a request start was recorded under.
///
/// Completions carrying an epoch older than the store's current one belong
/// to requests whose start was wiped by `reset()` and are discarded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Epoch(pub u64);

#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("failed to encode snapshot: {0}")]
    Encode(#[from] serde_json::Error),
}
