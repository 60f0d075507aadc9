//! Collected metrics snapshot and rate calculations
//!
//! This module contains the unified metrics snapshot that holds
//! all component metrics at a point in time, plus rate calculation
//! utilities for computing per-second rates.

use crate::{
    AssemblerMetricsSnapshot, BufferMetricsSnapshot, DispatcherMetricsSnapshot,
    JournalMetricsSnapshot, SourceMetricsSnapshot,
};
use std::time::{Duration, Instant};

/// Ingest-side pipeline metrics snapshot
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct PipelineSnapshot {
    /// Messages appended to the journal
    pub messages_accepted: u64,
    /// Payload bytes appended to the journal
    pub bytes_accepted: u64,
    /// Messages refused by admission control
    pub messages_throttled: u64,
    /// Appends that failed with a journal error
    pub append_errors: u64,
    /// Entries read back from the journal
    pub messages_read: u64,
    /// Entries moved through the process stage
    pub messages_processed: u64,
    /// Whether admission control is currently throttling
    pub throttle_active: bool,
}

/// Collected buffer snapshot with its name
#[derive(Debug, Clone)]
pub struct CollectedBuffer {
    /// Buffer name (process, output)
    pub name: String,
    /// Metrics snapshot
    pub snapshot: BufferMetricsSnapshot,
}

/// Collected source snapshot with metadata
#[derive(Debug, Clone)]
pub struct CollectedSource {
    /// Source identifier
    pub id: String,
    /// Source type (udp)
    pub source_type: String,
    /// Metrics snapshot
    pub snapshot: SourceMetricsSnapshot,
}

/// Collected dispatcher snapshot with its sink type
#[derive(Debug, Clone)]
pub struct CollectedDispatcher {
    /// Sink type the dispatcher writes to
    pub sink_type: String,
    /// Metrics snapshot
    pub snapshot: DispatcherMetricsSnapshot,
}

/// Complete metrics collection at a point in time
#[derive(Debug, Clone, Default)]
pub struct CollectedMetrics {
    /// When this collection was taken
    pub timestamp: Option<Instant>,

    /// Ingest and processing counters
    pub pipeline: Option<PipelineSnapshot>,

    /// Journal state
    pub journal: Option<JournalMetricsSnapshot>,

    /// Ring buffer fill levels
    pub buffers: Vec<CollectedBuffer>,

    /// Chunk reassembly counters
    pub assembler: Option<AssemblerMetricsSnapshot>,

    /// Output dispatcher counters
    pub dispatcher: Option<CollectedDispatcher>,

    /// All source metrics
    pub sources: Vec<CollectedSource>,
}

impl CollectedMetrics {
    /// Create a new empty collection
    pub fn new() -> Self {
        Self {
            timestamp: Some(Instant::now()),
            ..Default::default()
        }
    }

    /// Calculate rates by comparing with a previous snapshot
    ///
    /// Returns None if there's no previous snapshot or timestamps are missing.
    pub fn rates(&self, previous: &CollectedMetrics) -> Option<MetricsRates> {
        let current_ts = self.timestamp?;
        let previous_ts = previous.timestamp?;

        let elapsed = current_ts.duration_since(previous_ts);
        if elapsed.is_zero() {
            return None;
        }

        let elapsed_secs = elapsed.as_secs_f64();

        let pipeline = match (&self.pipeline, &previous.pipeline) {
            (Some(current), Some(prev)) => Some(PipelineRates {
                messages_per_sec: rate(
                    current.messages_accepted,
                    prev.messages_accepted,
                    elapsed_secs,
                ),
                bytes_per_sec: rate(current.bytes_accepted, prev.bytes_accepted, elapsed_secs),
                throttled: current
                    .messages_throttled
                    .saturating_sub(prev.messages_throttled),
                append_errors: current.append_errors.saturating_sub(prev.append_errors),
                throttle_active: current.throttle_active,
            }),
            _ => None,
        };

        let journal = match (&self.journal, &previous.journal) {
            (Some(current), Some(prev)) => Some(JournalRates {
                appends_per_sec: rate(current.appends, prev.appends, elapsed_secs),
                bytes_per_sec: rate(current.bytes_appended, prev.bytes_appended, elapsed_secs),
                segments_deleted: current
                    .segments_deleted
                    .saturating_sub(prev.segments_deleted),
            }),
            _ => None,
        };

        let assembler = match (&self.assembler, &previous.assembler) {
            (Some(current), Some(prev)) => Some(AssemblerRates {
                chunks_per_sec: rate(current.chunks_received, prev.chunks_received, elapsed_secs),
                completed_per_sec: rate(
                    current.messages_completed,
                    prev.messages_completed,
                    elapsed_secs,
                ),
                expired: current.messages_expired.saturating_sub(prev.messages_expired),
                malformed: current.chunks_malformed.saturating_sub(prev.chunks_malformed),
                pending_sets: current.pending_sets,
            }),
            _ => None,
        };

        let dispatcher = match (&self.dispatcher, &previous.dispatcher) {
            (Some(current), Some(prev)) => {
                let current_snap = &current.snapshot;
                let prev_snap = &prev.snapshot;
                let batches_delta = current_snap
                    .batches_written
                    .saturating_sub(prev_snap.batches_written);
                let latency_delta = current_snap
                    .write_latency_total_us
                    .saturating_sub(prev_snap.write_latency_total_us);

                Some(DispatcherRates {
                    sink_type: current.sink_type.clone(),
                    messages_per_sec: rate(
                        current_snap.messages_written,
                        prev_snap.messages_written,
                        elapsed_secs,
                    ),
                    batches_per_sec: rate(
                        current_snap.batches_written,
                        prev_snap.batches_written,
                        elapsed_secs,
                    ),
                    avg_latency: if batches_delta > 0 {
                        Duration::from_micros(latency_delta / batches_delta)
                    } else {
                        Duration::ZERO
                    },
                    max_latency: Duration::from_micros(current_snap.write_latency_max_us),
                    failures: current_snap
                        .write_failures
                        .saturating_sub(prev_snap.write_failures),
                    dropped: current_snap
                        .batches_dropped
                        .saturating_sub(prev_snap.batches_dropped),
                })
            }
            _ => None,
        };

        // Sources are matched by id
        let sources: Vec<_> = self
            .sources
            .iter()
            .filter_map(|current| {
                let prev = previous.sources.iter().find(|s| s.id == current.id)?;
                Some(SourceRates {
                    id: current.id.clone(),
                    source_type: current.source_type.clone(),
                    packets_per_sec: rate(
                        current.snapshot.packets_received,
                        prev.snapshot.packets_received,
                        elapsed_secs,
                    ),
                    bytes_per_sec: rate(
                        current.snapshot.bytes_received,
                        prev.snapshot.bytes_received,
                        elapsed_secs,
                    ),
                    malformed: current
                        .snapshot
                        .malformed
                        .saturating_sub(prev.snapshot.malformed),
                    errors: current.snapshot.errors.saturating_sub(prev.snapshot.errors),
                })
            })
            .collect();

        Some(MetricsRates {
            elapsed,
            pipeline,
            journal,
            assembler,
            dispatcher,
            sources,
        })
    }
}

/// Calculate rate per second
#[inline]
fn rate(current: u64, previous: u64, elapsed_secs: f64) -> f64 {
    let delta = current.saturating_sub(previous);
    delta as f64 / elapsed_secs
}

/// Calculated rates between two snapshots
#[derive(Debug, Clone)]
pub struct MetricsRates {
    /// Time elapsed between snapshots
    pub elapsed: Duration,

    /// Ingest rates
    pub pipeline: Option<PipelineRates>,

    /// Journal append rates
    pub journal: Option<JournalRates>,

    /// Reassembly rates
    pub assembler: Option<AssemblerRates>,

    /// Dispatch rates
    pub dispatcher: Option<DispatcherRates>,

    /// Per-source rates
    pub sources: Vec<SourceRates>,
}

/// Ingest rates
#[derive(Debug, Clone, Copy)]
pub struct PipelineRates {
    /// Messages accepted per second
    pub messages_per_sec: f64,
    /// Bytes accepted per second
    pub bytes_per_sec: f64,
    /// Messages throttled in this period
    pub throttled: u64,
    /// Append errors in this period
    pub append_errors: u64,
    /// Whether admission control is throttling right now
    pub throttle_active: bool,
}

/// Journal rates
#[derive(Debug, Clone, Copy)]
pub struct JournalRates {
    /// Records appended per second
    pub appends_per_sec: f64,
    /// Payload bytes appended per second
    pub bytes_per_sec: f64,
    /// Segments removed by retention in this period
    pub segments_deleted: u64,
}

/// Reassembly rates
#[derive(Debug, Clone, Copy)]
pub struct AssemblerRates {
    /// Chunks received per second
    pub chunks_per_sec: f64,
    /// Messages completed per second
    pub completed_per_sec: f64,
    /// Messages expired in this period
    pub expired: u64,
    /// Malformed chunks in this period
    pub malformed: u64,
    /// Currently pending sets
    pub pending_sets: u64,
}

/// Dispatch rates
#[derive(Debug, Clone)]
pub struct DispatcherRates {
    /// Sink type
    pub sink_type: String,
    /// Messages written per second
    pub messages_per_sec: f64,
    /// Batches written per second
    pub batches_per_sec: f64,
    /// Average write latency in this period
    pub avg_latency: Duration,
    /// Slowest write since start
    pub max_latency: Duration,
    /// Failed attempts in this period
    pub failures: u64,
    /// Batches dropped in this period
    pub dropped: u64,
}

/// Source rates
#[derive(Debug, Clone)]
pub struct SourceRates {
    /// Source identifier
    pub id: String,
    /// Source type
    pub source_type: String,
    /// Datagrams received per second
    pub packets_per_sec: f64,
    /// Bytes received per second
    pub bytes_per_sec: f64,
    /// Malformed datagrams in this period
    pub malformed: u64,
    /// Errors in this period
    pub errors: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collected_metrics_new() {
        let metrics = CollectedMetrics::new();
        assert!(metrics.timestamp.is_some());
        assert!(metrics.pipeline.is_none());
        assert!(metrics.journal.is_none());
        assert!(metrics.buffers.is_empty());
        assert!(metrics.sources.is_empty());
    }

    #[test]
    fn test_rate_calculation() {
        assert_eq!(rate(1000, 0, 1.0), 1000.0);
        assert_eq!(rate(1000, 500, 2.0), 250.0);
        assert_eq!(rate(100, 100, 1.0), 0.0);
        // Saturating sub handles underflow
        assert_eq!(rate(50, 100, 1.0), 0.0);
    }

    #[test]
    fn test_pipeline_rates() {
        let start = Instant::now();
        let prev = CollectedMetrics {
            timestamp: Some(start),
            pipeline: Some(PipelineSnapshot::default()),
            ..Default::default()
        };

        let current = CollectedMetrics {
            timestamp: Some(start + Duration::from_secs(10)),
            pipeline: Some(PipelineSnapshot {
                messages_accepted: 100_000,
                bytes_accepted: 5_000_000,
                messages_throttled: 42,
                throttle_active: true,
                ..Default::default()
            }),
            ..Default::default()
        };

        let rates = current.rates(&prev).unwrap();
        let pipeline = rates.pipeline.unwrap();

        assert_eq!(pipeline.messages_per_sec, 10_000.0);
        assert_eq!(pipeline.bytes_per_sec, 500_000.0);
        assert_eq!(pipeline.throttled, 42);
        assert!(pipeline.throttle_active);
    }

    #[test]
    fn test_dispatcher_avg_latency() {
        let start = Instant::now();
        let prev = CollectedMetrics {
            timestamp: Some(start),
            dispatcher: Some(CollectedDispatcher {
                sink_type: "stdout".into(),
                snapshot: DispatcherMetricsSnapshot::default(),
            }),
            ..Default::default()
        };

        let current = CollectedMetrics {
            timestamp: Some(start + Duration::from_secs(10)),
            dispatcher: Some(CollectedDispatcher {
                sink_type: "stdout".into(),
                snapshot: DispatcherMetricsSnapshot {
                    batches_written: 100,
                    messages_written: 5_000,
                    write_latency_total_us: 100_000,
                    write_latency_max_us: 9_000,
                    batches_dropped: 1,
                    ..Default::default()
                },
            }),
            ..Default::default()
        };

        let rates = current.rates(&prev).unwrap();
        let dispatcher = rates.dispatcher.unwrap();

        assert_eq!(dispatcher.messages_per_sec, 500.0);
        assert_eq!(dispatcher.avg_latency, Duration::from_millis(1));
        assert_eq!(dispatcher.max_latency, Duration::from_millis(9));
        assert_eq!(dispatcher.dropped, 1);
    }

    #[test]
    fn test_source_rates_matched_by_id() {
        let start = Instant::now();
        let source = |packets, errors| CollectedSource {
            id: "udp".into(),
            source_type: "udp".into(),
            snapshot: SourceMetricsSnapshot {
                packets_received: packets,
                errors,
                ..Default::default()
            },
        };

        let prev = CollectedMetrics {
            timestamp: Some(start),
            sources: vec![source(0, 0)],
            ..Default::default()
        };
        let current = CollectedMetrics {
            timestamp: Some(start + Duration::from_secs(5)),
            sources: vec![source(500, 2)],
            ..Default::default()
        };

        let rates = current.rates(&prev).unwrap();
        assert_eq!(rates.sources.len(), 1);
        assert_eq!(rates.sources[0].packets_per_sec, 100.0);
        assert_eq!(rates.sources[0].errors, 2);
    }

    #[test]
    fn test_rates_no_previous() {
        let current = CollectedMetrics::new();
        let prev = CollectedMetrics::default(); // No timestamp

        assert!(current.rates(&prev).is_none());
    }
}
