//! JSON metrics formatter
//!
//! Formats metrics as structured JSON for machine parsing.
//!
//! # Example Output
//!
//! ```json
//! {
//!   "type": "unified",
//!   "ingest": { "messages_per_sec": 12000, "throttled": 0 },
//!   "journal": { "log_end_offset": 1000, "committed_offset": 899 },
//!   "buffers": [...],
//!   "dispatcher": {...},
//!   "sources": [...]
//! }
//! ```

use super::MetricsFormatter;
use crate::{CollectedMetrics, JournalMetricsSnapshot, MetricsRates};
use serde::Serialize;

/// JSON metrics formatter
#[derive(Debug, Clone, Default)]
pub struct JsonFormatter;

impl JsonFormatter {
    /// Create a new JSON formatter
    pub fn new() -> Self {
        Self
    }
}

/// JSON structure for unified metrics output
#[derive(Serialize)]
struct UnifiedJson<'a> {
    #[serde(rename = "type")]
    report_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    ingest: Option<IngestJson>,
    #[serde(skip_serializing_if = "Option::is_none")]
    journal: Option<&'a JournalMetricsSnapshot>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    buffers: Vec<BufferJson<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    assembler: Option<AssemblerJson>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dispatcher: Option<DispatcherJson<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    sources: Vec<SourceJson<'a>>,
}

#[derive(Serialize)]
struct IngestJson {
    messages_per_sec: u64,
    bytes_per_sec: u64,
    throttled: u64,
    append_errors: u64,
    throttle_active: bool,
}

#[derive(Serialize)]
struct BufferJson<'a> {
    name: &'a str,
    capacity: u64,
    len: u64,
    utilization_percent: f64,
    rejected: u64,
}

#[derive(Serialize)]
struct AssemblerJson {
    chunks_per_sec: u64,
    completed_per_sec: u64,
    pending_sets: u64,
    expired: u64,
    malformed: u64,
}

#[derive(Serialize)]
struct DispatcherJson<'a> {
    sink_type: &'a str,
    messages_per_sec: u64,
    batches_per_sec: u64,
    avg_latency_us: u64,
    max_latency_us: u64,
    failures: u64,
    dropped: u64,
}

#[derive(Serialize)]
struct SourceJson<'a> {
    id: &'a str,
    #[serde(rename = "type")]
    source_type: &'a str,
    packets_per_sec: u64,
    bytes_per_sec: u64,
    malformed: u64,
    errors: u64,
}

impl MetricsFormatter for JsonFormatter {
    fn format_unified(&self, metrics: &CollectedMetrics, rates: Option<&MetricsRates>) -> String {
        let Some(rates) = rates else {
            return r#"{"type":"unified","status":"collecting_baseline"}"#.to_string();
        };

        let json = UnifiedJson {
            report_type: "unified",
            ingest: rates.pipeline.as_ref().map(|p| IngestJson {
                messages_per_sec: p.messages_per_sec as u64,
                bytes_per_sec: p.bytes_per_sec as u64,
                throttled: p.throttled,
                append_errors: p.append_errors,
                throttle_active: p.throttle_active,
            }),
            journal: metrics.journal.as_ref(),
            buffers: metrics
                .buffers
                .iter()
                .map(|b| BufferJson {
                    name: &b.name,
                    capacity: b.snapshot.capacity,
                    len: b.snapshot.len,
                    utilization_percent: b.snapshot.utilization_percent,
                    rejected: b.snapshot.rejected,
                })
                .collect(),
            assembler: rates.assembler.as_ref().map(|a| AssemblerJson {
                chunks_per_sec: a.chunks_per_sec as u64,
                completed_per_sec: a.completed_per_sec as u64,
                pending_sets: a.pending_sets,
                expired: a.expired,
                malformed: a.malformed,
            }),
            dispatcher: rates.dispatcher.as_ref().map(|d| DispatcherJson {
                sink_type: &d.sink_type,
                messages_per_sec: d.messages_per_sec as u64,
                batches_per_sec: d.batches_per_sec as u64,
                avg_latency_us: d.avg_latency.as_micros() as u64,
                max_latency_us: d.max_latency.as_micros() as u64,
                failures: d.failures,
                dropped: d.dropped,
            }),
            sources: rates
                .sources
                .iter()
                .map(|s| SourceJson {
                    id: &s.id,
                    source_type: &s.source_type,
                    packets_per_sec: s.packets_per_sec as u64,
                    bytes_per_sec: s.bytes_per_sec as u64,
                    malformed: s.malformed,
                    errors: s.errors,
                })
                .collect(),
        };

        // Use compact JSON (no pretty printing for log lines)
        serde_json::to_string(&json).unwrap_or_else(|_| "{}".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BufferMetricsSnapshot, CollectedBuffer, DispatcherRates, PipelineRates};
    use std::time::Duration;

    fn make_test_rates() -> MetricsRates {
        MetricsRates {
            elapsed: Duration::from_secs(10),
            pipeline: Some(PipelineRates {
                messages_per_sec: 1000.0,
                bytes_per_sec: 10000.0,
                throttled: 3,
                append_errors: 0,
                throttle_active: true,
            }),
            journal: None,
            assembler: None,
            dispatcher: Some(DispatcherRates {
                sink_type: "file".into(),
                messages_per_sec: 900.0,
                batches_per_sec: 2.0,
                avg_latency: Duration::from_micros(1500),
                max_latency: Duration::from_micros(4000),
                failures: 0,
                dropped: 0,
            }),
            sources: vec![],
        }
    }

    #[test]
    fn test_format_unified_with_rates() {
        let formatter = JsonFormatter::new();
        let metrics = CollectedMetrics {
            journal: Some(JournalMetricsSnapshot {
                log_end_offset: 42,
                committed_offset: Some(40),
                ..Default::default()
            }),
            buffers: vec![CollectedBuffer {
                name: "output".into(),
                snapshot: BufferMetricsSnapshot {
                    capacity: 4,
                    len: 2,
                    utilization_percent: 50.0,
                    ..Default::default()
                },
            }],
            ..Default::default()
        };

        let output = formatter.format_unified(&metrics, Some(&make_test_rates()));
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(parsed["type"], "unified");
        assert_eq!(parsed["ingest"]["messages_per_sec"], 1000);
        assert_eq!(parsed["ingest"]["throttle_active"], true);
        assert_eq!(parsed["journal"]["log_end_offset"], 42);
        assert_eq!(parsed["journal"]["committed_offset"], 40);
        assert_eq!(parsed["buffers"][0]["name"], "output");
        assert_eq!(parsed["buffers"][0]["utilization_percent"], 50.0);
        assert_eq!(parsed["dispatcher"]["avg_latency_us"], 1500);
    }

    #[test]
    fn test_format_unified_no_rates() {
        let formatter = JsonFormatter::new();
        let metrics = CollectedMetrics::default();

        let output = formatter.format_unified(&metrics, None);
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(parsed["status"], "collecting_baseline");
    }

    #[test]
    fn test_empty_collections_omitted() {
        let formatter = JsonFormatter::new();
        let metrics = CollectedMetrics::default();

        let output = formatter.format_unified(&metrics, Some(&make_test_rates()));
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert!(parsed.get("buffers").is_none());
        assert!(parsed.get("sources").is_none());
        assert!(parsed.get("assembler").is_none());
    }
}
