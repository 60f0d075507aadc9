//! Metrics provider traits
//!
//! Traits for components to expose their metrics to the unified reporter.
//! The journal, buffers, assembler, dispatcher and sources implement these
//! traits so the reporter can collect their metrics without knowing the
//! concrete types.
//!
//! # Design
//!
//! - Traits use `&self` for zero-copy metric access
//! - All providers are `Send + Sync` for thread-safe collection
//! - Metric structs use atomics internally, so no locks needed

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

// =============================================================================
// Journal
// =============================================================================

/// Point-in-time snapshot of journal state and counters
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct JournalMetricsSnapshot {
    /// Next offset to be assigned
    pub log_end_offset: u64,
    /// Highest committed offset, if anything has been committed
    pub committed_offset: Option<u64>,
    /// Total bytes across all segments
    pub size_bytes: u64,
    /// Number of segments on disk
    pub segments: u64,
    /// Records appended since start
    pub appends: u64,
    /// Payload bytes appended since start
    pub bytes_appended: u64,
    /// Failed appends
    pub append_errors: u64,
    /// Segments removed by retention
    pub segments_deleted: u64,
    /// Segments quarantined during recovery
    pub corrupt_segments: u64,
}

impl JournalMetricsSnapshot {
    /// Entries appended but not yet committed
    pub fn uncommitted(&self) -> u64 {
        match self.committed_offset {
            Some(committed) => self.log_end_offset.saturating_sub(committed + 1),
            None => self.log_end_offset,
        }
    }
}

/// Trait for the journal to provide metrics to the reporter
pub trait JournalMetricsProvider: Send + Sync {
    /// Get a snapshot of current journal metrics
    fn snapshot(&self) -> JournalMetricsSnapshot;
}

// =============================================================================
// Ring buffers
// =============================================================================

/// Point-in-time snapshot of a ring buffer
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct BufferMetricsSnapshot {
    /// Fixed capacity
    pub capacity: u64,
    /// Items currently held
    pub len: u64,
    /// Fill level in percent
    pub utilization_percent: f64,
    /// Accepted puts
    pub puts: u64,
    /// Puts rejected because the buffer was full
    pub rejected: u64,
    /// Items handed out by take or drain
    pub taken: u64,
}

/// Trait for ring buffers to provide metrics to the reporter
pub trait BufferMetricsProvider: Send + Sync {
    /// Buffer name (e.g., "process", "output")
    fn buffer_name(&self) -> &str;

    /// Get a snapshot of current buffer metrics
    fn snapshot(&self) -> BufferMetricsSnapshot;
}

// =============================================================================
// Chunk assembler
// =============================================================================

/// Metrics for the chunk assembler
///
/// All fields use atomics for lock-free updates.
#[derive(Debug, Default)]
pub struct AssemblerMetrics {
    /// Chunks accepted for reassembly
    pub chunks_received: AtomicU64,
    /// Messages fully reassembled
    pub messages_completed: AtomicU64,
    /// Incomplete messages evicted after the TTL
    pub messages_expired: AtomicU64,
    /// Chunks rejected as malformed
    pub chunks_malformed: AtomicU64,
    /// Chunks that replaced an already received index
    pub chunks_duplicate: AtomicU64,
    /// New messages rejected because too many were pending
    pub pending_overflow: AtomicU64,
}

impl AssemblerMetrics {
    /// Create new metrics with all counters at zero
    pub const fn new() -> Self {
        Self {
            chunks_received: AtomicU64::new(0),
            messages_completed: AtomicU64::new(0),
            messages_expired: AtomicU64::new(0),
            chunks_malformed: AtomicU64::new(0),
            chunks_duplicate: AtomicU64::new(0),
            pending_overflow: AtomicU64::new(0),
        }
    }

    /// Take a snapshot of current values
    ///
    /// `pending_sets` is a gauge owned by the assembler map.
    #[inline]
    pub fn snapshot(&self, pending_sets: u64) -> AssemblerMetricsSnapshot {
        AssemblerMetricsSnapshot {
            chunks_received: self.chunks_received.load(Ordering::Relaxed),
            messages_completed: self.messages_completed.load(Ordering::Relaxed),
            messages_expired: self.messages_expired.load(Ordering::Relaxed),
            chunks_malformed: self.chunks_malformed.load(Ordering::Relaxed),
            chunks_duplicate: self.chunks_duplicate.load(Ordering::Relaxed),
            pending_overflow: self.pending_overflow.load(Ordering::Relaxed),
            pending_sets,
        }
    }
}

/// Point-in-time snapshot of assembler metrics
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct AssemblerMetricsSnapshot {
    pub chunks_received: u64,
    pub messages_completed: u64,
    pub messages_expired: u64,
    pub chunks_malformed: u64,
    pub chunks_duplicate: u64,
    pub pending_overflow: u64,
    pub pending_sets: u64,
}

/// Trait for the chunk assembler to provide metrics to the reporter
pub trait AssemblerMetricsProvider: Send + Sync {
    /// Get a snapshot of current assembler metrics
    fn snapshot(&self) -> AssemblerMetricsSnapshot;
}

// =============================================================================
// Output dispatcher
// =============================================================================

/// Metrics for the output dispatcher
///
/// All fields use atomics for lock-free updates.
#[derive(Debug, Default)]
pub struct DispatcherMetrics {
    /// Batches accepted by the sink
    pub batches_written: AtomicU64,
    /// Messages accepted by the sink
    pub messages_written: AtomicU64,
    /// Failed write attempts
    pub write_failures: AtomicU64,
    /// Retries after a failed attempt
    pub retries: AtomicU64,
    /// Batches dropped after exhausting retries
    pub batches_dropped: AtomicU64,
    /// Messages in dropped batches
    pub messages_dropped: AtomicU64,
    /// Sum of successful write latencies in microseconds
    pub write_latency_total_us: AtomicU64,
    /// Latency of the most recent successful write
    pub write_latency_last_us: AtomicU64,
    /// Slowest successful write
    pub write_latency_max_us: AtomicU64,
}

impl DispatcherMetrics {
    /// Create new metrics with all counters at zero
    pub const fn new() -> Self {
        Self {
            batches_written: AtomicU64::new(0),
            messages_written: AtomicU64::new(0),
            write_failures: AtomicU64::new(0),
            retries: AtomicU64::new(0),
            batches_dropped: AtomicU64::new(0),
            messages_dropped: AtomicU64::new(0),
            write_latency_total_us: AtomicU64::new(0),
            write_latency_last_us: AtomicU64::new(0),
            write_latency_max_us: AtomicU64::new(0),
        }
    }

    /// Record a batch the sink accepted
    #[inline]
    pub fn record_written(&self, messages: u64, latency: Duration) {
        let us = latency.as_micros() as u64;
        self.batches_written.fetch_add(1, Ordering::Relaxed);
        self.messages_written.fetch_add(messages, Ordering::Relaxed);
        self.write_latency_total_us.fetch_add(us, Ordering::Relaxed);
        self.write_latency_last_us.store(us, Ordering::Relaxed);
        self.write_latency_max_us.fetch_max(us, Ordering::Relaxed);
    }

    /// Record a failed write attempt
    #[inline]
    pub fn record_failure(&self) {
        self.write_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a retry
    #[inline]
    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a batch dropped after exhausting retries
    #[inline]
    pub fn record_dropped(&self, messages: u64) {
        self.batches_dropped.fetch_add(1, Ordering::Relaxed);
        self.messages_dropped.fetch_add(messages, Ordering::Relaxed);
    }

    /// Take a snapshot of current values
    #[inline]
    pub fn snapshot(&self) -> DispatcherMetricsSnapshot {
        DispatcherMetricsSnapshot {
            batches_written: self.batches_written.load(Ordering::Relaxed),
            messages_written: self.messages_written.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            batches_dropped: self.batches_dropped.load(Ordering::Relaxed),
            messages_dropped: self.messages_dropped.load(Ordering::Relaxed),
            write_latency_total_us: self.write_latency_total_us.load(Ordering::Relaxed),
            write_latency_last_us: self.write_latency_last_us.load(Ordering::Relaxed),
            write_latency_max_us: self.write_latency_max_us.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of dispatcher metrics
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct DispatcherMetricsSnapshot {
    pub batches_written: u64,
    pub messages_written: u64,
    pub write_failures: u64,
    pub retries: u64,
    pub batches_dropped: u64,
    pub messages_dropped: u64,
    pub write_latency_total_us: u64,
    pub write_latency_last_us: u64,
    pub write_latency_max_us: u64,
}

impl DispatcherMetricsSnapshot {
    /// Average latency of a successful write
    #[inline]
    pub fn avg_write_latency(&self) -> Duration {
        if self.batches_written == 0 {
            Duration::ZERO
        } else {
            Duration::from_micros(self.write_latency_total_us / self.batches_written)
        }
    }
}

/// Trait for the dispatcher to provide metrics to the reporter
pub trait DispatcherMetricsProvider: Send + Sync {
    /// Sink type the dispatcher writes to (e.g., "stdout", "file")
    fn sink_type(&self) -> &str;

    /// Get a snapshot of current metrics
    fn snapshot(&self) -> DispatcherMetricsSnapshot;
}

// =============================================================================
// Sources
// =============================================================================

/// Metrics for a source component
///
/// All fields use atomics for lock-free updates.
#[derive(Debug, Default)]
pub struct SourceMetrics {
    /// Datagrams received
    pub packets_received: AtomicU64,
    /// Bytes received
    pub bytes_received: AtomicU64,
    /// Datagrams that carried a chunk
    pub chunks_received: AtomicU64,
    /// Messages accepted into the journal
    pub messages_ingested: AtomicU64,
    /// Datagrams rejected as malformed
    pub malformed: AtomicU64,
    /// Messages rejected by admission control
    pub throttled: AtomicU64,
    /// Socket or journal errors
    pub errors: AtomicU64,
}

impl SourceMetrics {
    /// Create new metrics with all counters at zero
    pub const fn new() -> Self {
        Self {
            packets_received: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            chunks_received: AtomicU64::new(0),
            messages_ingested: AtomicU64::new(0),
            malformed: AtomicU64::new(0),
            throttled: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    /// Record a received datagram
    #[inline]
    pub fn record_packet(&self, bytes: u64) {
        self.packets_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Take a snapshot of current values
    #[inline]
    pub fn snapshot(&self) -> SourceMetricsSnapshot {
        SourceMetricsSnapshot {
            packets_received: self.packets_received.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            chunks_received: self.chunks_received.load(Ordering::Relaxed),
            messages_ingested: self.messages_ingested.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            throttled: self.throttled.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of source metrics
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct SourceMetricsSnapshot {
    pub packets_received: u64,
    pub bytes_received: u64,
    pub chunks_received: u64,
    pub messages_ingested: u64,
    pub malformed: u64,
    pub throttled: u64,
    pub errors: u64,
}

/// Trait for sources to provide metrics to the reporter
pub trait SourceMetricsProvider: Send + Sync {
    /// Unique identifier for this source instance
    fn source_id(&self) -> &str;

    /// Source type (e.g., "udp")
    fn source_type(&self) -> &str;

    /// Get a snapshot of current metrics
    fn snapshot(&self) -> SourceMetricsSnapshot;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatcher_metrics_latency() {
        let metrics = DispatcherMetrics::new();

        metrics.record_written(10, Duration::from_micros(300));
        metrics.record_written(5, Duration::from_micros(100));
        metrics.record_failure();
        metrics.record_retry();
        metrics.record_dropped(7);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.batches_written, 2);
        assert_eq!(snapshot.messages_written, 15);
        assert_eq!(snapshot.write_latency_total_us, 400);
        assert_eq!(snapshot.write_latency_last_us, 100);
        assert_eq!(snapshot.write_latency_max_us, 300);
        assert_eq!(snapshot.write_failures, 1);
        assert_eq!(snapshot.retries, 1);
        assert_eq!(snapshot.batches_dropped, 1);
        assert_eq!(snapshot.messages_dropped, 7);
        assert_eq!(snapshot.avg_write_latency(), Duration::from_micros(200));
    }

    #[test]
    fn test_dispatcher_avg_latency_zero() {
        let snapshot = DispatcherMetricsSnapshot::default();
        assert_eq!(snapshot.avg_write_latency(), Duration::ZERO);
    }

    #[test]
    fn test_assembler_metrics_snapshot() {
        let metrics = AssemblerMetrics::new();
        metrics.chunks_received.fetch_add(3, Ordering::Relaxed);
        metrics.messages_completed.fetch_add(1, Ordering::Relaxed);

        let snapshot = metrics.snapshot(2);
        assert_eq!(snapshot.chunks_received, 3);
        assert_eq!(snapshot.messages_completed, 1);
        assert_eq!(snapshot.pending_sets, 2);
    }

    #[test]
    fn test_source_metrics_record_packet() {
        let metrics = SourceMetrics::new();
        metrics.record_packet(100);
        metrics.record_packet(50);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.packets_received, 2);
        assert_eq!(snapshot.bytes_received, 150);
    }

    #[test]
    fn test_journal_uncommitted() {
        let mut snapshot = JournalMetricsSnapshot {
            log_end_offset: 10,
            ..Default::default()
        };
        assert_eq!(snapshot.uncommitted(), 10);

        snapshot.committed_offset = Some(4);
        assert_eq!(snapshot.uncommitted(), 5);

        snapshot.committed_offset = Some(9);
        assert_eq!(snapshot.uncommitted(), 0);
    }
}
