//! Unit scaling for the human formatter
//!
//! Byte quantities scale in powers of 1024; offsets, counts and rates scale
//! in powers of 1000 so they read like the offsets in the journal tool.

use std::time::Duration;

const BYTE_UNITS: [(f64, &str); 3] = [
    (1024.0 * 1024.0 * 1024.0, "GB"),
    (1024.0 * 1024.0, "MB"),
    (1024.0, "KB"),
];

const COUNT_UNITS: [(f64, &str); 2] = [(1_000_000.0, "M"), (1_000.0, "K")];

/// Largest unit not exceeding `value`, as `(scaled, suffix)`
fn scale(value: f64, units: &[(f64, &'static str)]) -> Option<(f64, &'static str)> {
    units
        .iter()
        .find(|(size, _)| value >= *size)
        .map(|(size, suffix)| (value / size, *suffix))
}

/// Journal or segment size, e.g. `410.2 MB`
pub(crate) fn bytes(value: u64) -> String {
    match scale(value as f64, &BYTE_UNITS) {
        Some((scaled, unit)) => format!("{scaled:.1} {unit}"),
        None => format!("{value} B"),
    }
}

/// Ingest or source throughput, e.g. `4.5 MB/s`
pub(crate) fn bytes_rate(per_sec: f64) -> String {
    match scale(per_sec, &BYTE_UNITS) {
        Some((scaled, unit)) => format!("{scaled:.1} {unit}/s"),
        None => format!("{per_sec:.0} B/s"),
    }
}

/// Offsets, lags and buffer slots, e.g. `1.2M`
pub(crate) fn count(value: u64) -> String {
    match scale(value as f64, &COUNT_UNITS) {
        Some((scaled, suffix)) => format!("{scaled:.1}{suffix}"),
        None => value.to_string(),
    }
}

/// Messages or chunks per second, e.g. `12.0K/s`
pub(crate) fn rate(per_sec: f64) -> String {
    match scale(per_sec, &COUNT_UNITS) {
        Some((scaled, suffix)) => format!("{scaled:.1}{suffix}/s"),
        None => format!("{per_sec:.0}/s"),
    }
}

/// An offset that may not exist yet, `-` until the first commit
pub(crate) fn offset(value: Option<u64>) -> String {
    value.map_or_else(|| "-".to_string(), count)
}

/// Buffer occupancy against its watermark scale, e.g. `12.5% (8.2K/65.5K)`
pub(crate) fn fill(percent: f64, len: u64, capacity: u64) -> String {
    format!("{percent:.1}% ({}/{})", count(len), count(capacity))
}

/// Sink write latency in milliseconds, e.g. `1.20ms`
pub(crate) fn millis(latency: Duration) -> String {
    format!("{:.2}ms", latency.as_secs_f64() * 1000.0)
}
