use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::trace;

use super::SampleStore;
use crate::ticker::Ticker;

/// Default tick period for pruning and derived-metric refresh
pub const DEFAULT_TICK: Duration = Duration::from_millis(1000);

/// Background task that keeps the rolling window trimmed and the derived
/// metrics (rates, average, percentiles, history) fresh.
///
/// It only ever touches windowed state; aggregate counters are left alone.
pub struct WindowMaintainer {
    store: Arc<SampleStore>,
}

impl WindowMaintainer {
    pub fn new(store: Arc<SampleStore>) -> Self {
        Self { store }
    }

    pub fn tick(&self) {
        self.tick_at(Instant::now());
    }

    pub fn tick_at(&self, now: Instant) {
        self.store.maintain(now);

        if tracing::enabled!(tracing::Level::TRACE) {
            let (requests, responses) = self.store.sample_counts();
            trace!(requests, responses, "window maintained");
        }
    }

    /// Run `tick` every `period` until the returned ticker is stopped.
    pub fn spawn(self, period: Duration) -> Ticker {
        Ticker::spawn("window-maintainer", period, move || self.tick())
    }
}
