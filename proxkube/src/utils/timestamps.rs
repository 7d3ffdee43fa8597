//! Timestamp helpers.

use chrono::{DateTime, Utc};

/// Timestamp type used for events and tasks.
pub type Timestamp = DateTime<Utc>;

/// Returns the current UTC timestamp.
#[must_use]
pub fn now_utc() -> Timestamp {
    Utc::now()
}

/// Formats a timestamp as RFC 3339 with microsecond precision.
#[must_use]
pub fn iso_timestamp(ts: &Timestamp) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%.6f+00:00").to_string()
}

/// Formats a duration as seconds with two decimals, e.g. `"12.34"`.
#[must_use]
pub fn format_seconds(duration: chrono::Duration) -> String {
    #[allow(clippy::cast_precision_loss)]
    let seconds = duration
        .num_microseconds()
        .map_or_else(|| duration.num_milliseconds() as f64 / 1_000.0, |us| us as f64 / 1_000_000.0);
    format!("{seconds:.2}")
}
