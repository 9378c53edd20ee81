use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::percentiles::PercentileSet;
use super::MetricsError;

// ─── Public types ────────────────────────────────────────────────

/// Complete point-in-time view shipped to every consumer.
///
/// Built under the store lock, so counters, derived metrics and uptime
/// always describe the same instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    // Counters since the last reset
    pub total_requests: u64,
    pub active_connections: i64,
    pub total_bytes_in: u64,
    pub total_bytes_out: u64,
    /// Status code → count; JSON keys come out as strings ("200")
    pub status_codes: BTreeMap<u16, u64>,

    // Derived, refreshed by the window maintainer
    pub requests_per_second: u64,
    pub bytes_in_per_second: u64,
    pub bytes_out_per_second: u64,
    /// Milliseconds
    pub average_response_time: u64,
    pub response_time_percentiles: PercentileSet,

    /// Milliseconds since the store was created or last reset
    pub uptime: u64,
    pub uptime_formatted: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

/// One point on the history chart, appended on every maintainer tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPoint {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub requests_per_second: u64,
    pub bytes_in_per_second: u64,
    pub bytes_out_per_second: u64,
    pub active_connections: i64,
    pub average_response_time: u64,
}

impl Snapshot {
    pub fn to_json(&self) -> Result<String, MetricsError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Render an uptime as `"{d}d {h}h {m}m {s}s"`, omitting leading zero
/// components (`"42s"`, `"3m 0s"`, `"1h 0m 5s"`).
pub fn format_uptime(uptime: Duration) -> String {
    let total = uptime.as_secs();
    let (days, hours, minutes, seconds) = (
        total / 86_400,
        total / 3_600 % 24,
        total / 60 % 60,
        total % 60,
    );

    if days > 0 {
        format!("{days}d {hours}h {minutes}m {seconds}s")
    } else if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}
