use std::time::Duration;

use hdrhistogram::Histogram;
use serde::Serialize;

/// HdrHistogram range: 1 μs → 60 s, 3 significant figures
const HIST_LOW: u64 = 1;
const HIST_HIGH: u64 = 60_000_000;
const HIST_SIGFIG: u8 = 3;

/// Response-time percentile breakdown over the rolling window (μs).
/// Serialized straight into the snapshot JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PercentileSet {
    pub min: u64,
    pub max: u64,
    pub mean: f64,
    pub p50: u64,
    pub p95: u64,
    pub p99: u64,
    pub p999: u64,
    pub count: u64,
}

impl PercentileSet {
    /// Build a percentile set from raw response times.
    ///
    /// Returns `None` when there is nothing to summarise, so callers can
    /// keep their previous value instead of reporting zeros.
    pub fn from_durations<I>(durations: I) -> Option<Self>
    where
        I: IntoIterator<Item = Duration>,
    {
        let mut hist =
            Histogram::<u64>::new_with_bounds(HIST_LOW, HIST_HIGH, HIST_SIGFIG)
                .ok()?;

        for d in durations {
            // Clamp to ≥ 1 μs; anything past the upper bound saturates
            let us = u64::try_from(d.as_micros()).unwrap_or(u64::MAX).max(1);
            hist.saturating_record(us);
        }

        if hist.len() == 0 {
            return None;
        }

        Some(Self {
            min: hist.min(),
            max: hist.max(),
            mean: hist.mean(),
            p50: hist.value_at_percentile(50.0),
            p95: hist.value_at_percentile(95.0),
            p99: hist.value_at_percentile(99.0),
            p999: hist.value_at_percentile(99.9),
            count: hist.len(),
        })
    }

    /// Is this set backed by at least one observation?
    pub fn has_data(&self) -> bool {
        self.count > 0
    }
}
