//! Metrics output formatters
//!
//! Formats collected metrics for human-readable or JSON output.

mod human;
mod json;
mod units;

pub use human::HumanFormatter;
pub use json::JsonFormatter;

use crate::{CollectedMetrics, MetricsRates};

/// Trait for metrics formatters
pub trait MetricsFormatter: Send + Sync {
    /// Format unified metrics report
    ///
    /// Gauges (buffer fill, journal offsets) come from `metrics`; counters
    /// are reported as rates once a baseline exists.
    fn format_unified(&self, metrics: &CollectedMetrics, rates: Option<&MetricsRates>) -> String;
}
