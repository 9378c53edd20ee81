use std::collections::{BTreeMap, VecDeque};
use std::time::{Duration, Instant};

use chrono::Utc;
use parking_lot::Mutex;

use super::percentiles::PercentileSet;
use super::snapshot::{format_uptime, HistoryPoint, Snapshot};
use super::{Epoch, RequestSample, ResponseSample};

// ─── Configuration ───────────────────────────────────────────────

/// Trailing window samples are retained for
const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Span the per-second rates are measured over
const RATE_WINDOW: Duration = Duration::from_secs(1);

/// History points kept for the chart (one per maintainer tick)
const DEFAULT_HISTORY_SIZE: usize = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowConfig {
    pub window: Duration,
    pub history_size: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            history_size: DEFAULT_HISTORY_SIZE,
        }
    }
}

// ─── Public types ────────────────────────────────────────────────

/// Single source of truth for traffic counters and windowed samples.
///
/// Every operation takes the lock for its own duration only; the
/// interceptor never holds it across a transaction.
pub struct SampleStore {
    config: WindowConfig,
    inner: Mutex<Inner>,
}

// ─── Internal state ──────────────────────────────────────────────

struct Inner {
    epoch: Epoch,
    started_at: Instant,

    // Counters
    total_requests: u64,
    total_bytes_in: u64,
    total_bytes_out: u64,
    status_codes: BTreeMap<u16, u64>,
    active_connections: i64,

    // Rolling window, ordered by arrival
    requests: VecDeque<RequestSample>,
    responses: VecDeque<ResponseSample>,

    // Sum of `response_time` over `responses`
    response_time_sum: WindowSum,

    // Derived metrics
    requests_per_second: u64,
    bytes_in_per_second: u64,
    bytes_out_per_second: u64,
    average_response_time_ms: u64,
    percentiles: PercentileSet,

    history: VecDeque<HistoryPoint>,
}

/// Running total of the response times currently in the window.
#[derive(Debug, Default)]
struct WindowSum {
    nanos: u128,
    count: u64,
}

impl WindowSum {
    fn add(&mut self, elapsed: Duration) {
        self.nanos += elapsed.as_nanos();
        self.count += 1;
    }

    fn remove(&mut self, elapsed: Duration) {
        self.nanos = self.nanos.saturating_sub(elapsed.as_nanos());
        self.count = self.count.saturating_sub(1);
    }

    /// Rounded mean in milliseconds, `None` for an empty window.
    fn mean_ms(&self) -> Option<u64> {
        if self.count == 0 {
            return None;
        }
        let mean_nanos = self.nanos as f64 / self.count as f64;
        Some((mean_nanos / 1_000_000.0).round() as u64)
    }
}

// ─── SampleStore impl ────────────────────────────────────────────

impl SampleStore {
    pub fn new(config: WindowConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner::new(Epoch::default(), Instant::now(), config)),
        }
    }

    pub fn config(&self) -> WindowConfig {
        self.config
    }

    /// Count a newly observed request carrying `bytes_in` bytes.
    ///
    /// The returned epoch must be handed back to `record_response_end`.
    pub fn record_request_start(&self, bytes_in: u64) -> Epoch {
        let mut inner = self.inner.lock();
        let now = Instant::now();
        inner.request_start(bytes_in, now)
    }

    pub fn record_request_start_at(&self, bytes_in: u64, now: Instant) -> Epoch {
        self.inner.lock().request_start(bytes_in, now)
    }

    /// Count a completed response. Completions from before the last reset
    /// are ignored; returns whether the completion was applied.
    pub fn record_response_end(
        &self,
        epoch: Epoch,
        status: u16,
        elapsed: Duration,
        bytes_out: u64,
    ) -> bool {
        // Stamped under the lock so the deque stays in arrival order
        let mut inner = self.inner.lock();
        let now = Instant::now();
        inner.response_end(epoch, status, elapsed, bytes_out, now, self.config.window)
    }

    pub fn record_response_end_at(
        &self,
        epoch: Epoch,
        status: u16,
        elapsed: Duration,
        bytes_out: u64,
        now: Instant,
    ) -> bool {
        self.inner
            .lock()
            .response_end(epoch, status, elapsed, bytes_out, now, self.config.window)
    }

    /// Drop every sample older than `now - window`.
    pub fn prune(&self, now: Instant, window: Duration) {
        self.inner.lock().prune(now, window);
    }

    /// One maintainer tick: prune to the configured window, refresh the
    /// derived metrics and append a history point.
    pub fn maintain(&self, now: Instant) {
        self.inner.lock().maintain(now, self.config);
    }

    /// Consistent read-only view of everything.
    pub fn snapshot(&self) -> Snapshot {
        self.inner.lock().snapshot(Instant::now())
    }

    pub fn snapshot_at(&self, now: Instant) -> Snapshot {
        self.inner.lock().snapshot(now)
    }

    pub fn history(&self) -> Vec<HistoryPoint> {
        self.inner.lock().history.iter().cloned().collect()
    }

    /// Wipe all data and restart the uptime clock.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        let next = Epoch(inner.epoch.0 + 1);
        *inner = Inner::new(next, Instant::now(), self.config);
    }

    pub fn epoch(&self) -> Epoch {
        self.inner.lock().epoch
    }

    pub fn sample_counts(&self) -> (usize, usize) {
        let inner = self.inner.lock();
        (inner.requests.len(), inner.responses.len())
    }
}

impl Default for SampleStore {
    fn default() -> Self {
        Self::new(WindowConfig::default())
    }
}

// ─── Inner impl ──────────────────────────────────────────────────

/// `true` when a sample taken at `at` is within `span` of `now`.
/// Samples stamped after `now` count as age zero.
fn within(now: Instant, at: Instant, span: Duration) -> bool {
    now.saturating_duration_since(at) <= span
}

/// `true` when a sample is strictly younger than `span`.
fn younger_than(now: Instant, at: Instant, span: Duration) -> bool {
    now.saturating_duration_since(at) < span
}

impl Inner {
    fn new(epoch: Epoch, started_at: Instant, config: WindowConfig) -> Self {
        Self {
            epoch,
            started_at,
            total_requests: 0,
            total_bytes_in: 0,
            total_bytes_out: 0,
            status_codes: BTreeMap::new(),
            active_connections: 0,
            requests: VecDeque::new(),
            responses: VecDeque::new(),
            response_time_sum: WindowSum::default(),
            requests_per_second: 0,
            bytes_in_per_second: 0,
            bytes_out_per_second: 0,
            average_response_time_ms: 0,
            percentiles: PercentileSet::default(),
            history: VecDeque::with_capacity(config.history_size),
        }
    }

    fn request_start(&mut self, bytes_in: u64, now: Instant) -> Epoch {
        self.total_requests += 1;
        self.active_connections += 1;
        self.total_bytes_in = self.total_bytes_in.saturating_add(bytes_in);
        self.requests.push_back(RequestSample {
            timestamp: now,
            bytes_in,
        });
        self.epoch
    }

    fn response_end(
        &mut self,
        epoch: Epoch,
        status: u16,
        elapsed: Duration,
        bytes_out: u64,
        now: Instant,
        window: Duration,
    ) -> bool {
        if epoch != self.epoch {
            return false;
        }

        self.active_connections -= 1;
        self.total_bytes_out = self.total_bytes_out.saturating_add(bytes_out);
        *self.status_codes.entry(status).or_insert(0) += 1;
        self.responses.push_back(ResponseSample {
            timestamp: now,
            response_time: elapsed,
            bytes_out,
        });
        self.response_time_sum.add(elapsed);

        self.evict_responses(now, window);
        self.recompute_average();
        true
    }

    // Both deques are in arrival order: expired samples sit at the front.

    fn prune(&mut self, now: Instant, window: Duration) {
        while self
            .requests
            .front()
            .is_some_and(|s| !within(now, s.timestamp, window))
        {
            self.requests.pop_front();
        }
        self.evict_responses(now, window);
    }

    fn evict_responses(&mut self, now: Instant, window: Duration) {
        while self
            .responses
            .front()
            .is_some_and(|s| !within(now, s.timestamp, window))
        {
            if let Some(expired) = self.responses.pop_front() {
                self.response_time_sum.remove(expired.response_time);
            }
        }
    }

    fn maintain(&mut self, now: Instant, config: WindowConfig) {
        self.prune(now, config.window);

        // Newest samples sit at the back; stop at the first one too old
        let recent_requests = self
            .requests
            .iter()
            .rev()
            .take_while(|s| younger_than(now, s.timestamp, RATE_WINDOW));
        let (count, bytes_in) = recent_requests
            .fold((0u64, 0u64), |(n, b), s| (n + 1, b.saturating_add(s.bytes_in)));
        self.requests_per_second = count;
        self.bytes_in_per_second = bytes_in;

        self.bytes_out_per_second = self
            .responses
            .iter()
            .rev()
            .take_while(|s| younger_than(now, s.timestamp, RATE_WINDOW))
            .fold(0u64, |b, s| b.saturating_add(s.bytes_out));

        self.recompute_average();

        // Percentiles follow the same carry-forward rule as the average
        let windowed = self.responses.iter().map(|s| s.response_time);
        if let Some(set) = PercentileSet::from_durations(windowed) {
            self.percentiles = set;
        }

        self.push_history(config.history_size);
    }

    /// Mean response time over the window. With no samples in the window
    /// the previous value is kept as-is.
    fn recompute_average(&mut self) {
        if let Some(mean) = self.response_time_sum.mean_ms() {
            self.average_response_time_ms = mean;
        }
    }

    fn push_history(&mut self, capacity: usize) {
        if capacity == 0 {
            return;
        }
        while self.history.len() >= capacity {
            self.history.pop_front();
        }
        self.history.push_back(HistoryPoint {
            timestamp: Utc::now(),
            requests_per_second: self.requests_per_second,
            bytes_in_per_second: self.bytes_in_per_second,
            bytes_out_per_second: self.bytes_out_per_second,
            active_connections: self.active_connections,
            average_response_time: self.average_response_time_ms,
        });
    }

    fn snapshot(&self, now: Instant) -> Snapshot {
        let uptime = now.saturating_duration_since(self.started_at);

        Snapshot {
            total_requests: self.total_requests,
            active_connections: self.active_connections,
            total_bytes_in: self.total_bytes_in,
            total_bytes_out: self.total_bytes_out,
            status_codes: self.status_codes.clone(),
            requests_per_second: self.requests_per_second,
            bytes_in_per_second: self.bytes_in_per_second,
            bytes_out_per_second: self.bytes_out_per_second,
            average_response_time: self.average_response_time_ms,
            response_time_percentiles: self.percentiles.clone(),
            uptime: u64::try_from(uptime.as_millis()).unwrap_or(u64::MAX),
            uptime_formatted: format_uptime(uptime),
            timestamp: Utc::now(),
        }
    }
}
