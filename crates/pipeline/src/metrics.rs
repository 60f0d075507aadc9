//! Pipeline metrics
//!
//! Atomic counters for the ingest and replay side of the pipeline.
//! All operations use relaxed ordering; values are eventually consistent.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use sluice_buffer::AdmissionGate;
use sluice_metrics::{Counter, PipelineMetricsProvider, PipelineSnapshot};

/// Counters for the ingest, reader and process stages
///
/// # Thread Safety
///
/// All methods are safe to call from multiple threads concurrently.
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    /// Messages appended to the journal
    messages_accepted: Counter,

    /// Payload bytes appended to the journal
    bytes_accepted: Counter,

    /// Messages refused by the admission gate
    messages_throttled: Counter,

    /// Appends that returned a journal error
    append_errors: Counter,

    /// Entries read back from the journal
    messages_read: Counter,

    /// Entries moved from the process buffer to the output buffer
    messages_processed: Counter,

    /// Entries a processor chose not to forward
    messages_filtered: Counter,
}

impl PipelineMetrics {
    /// Create new metrics with all counters at zero
    pub const fn new() -> Self {
        Self {
            messages_accepted: Counter::new(),
            bytes_accepted: Counter::new(),
            messages_throttled: Counter::new(),
            append_errors: Counter::new(),
            messages_read: Counter::new(),
            messages_processed: Counter::new(),
            messages_filtered: Counter::new(),
        }
    }

    /// Record a message appended to the journal
    #[inline]
    pub fn record_accepted(&self, bytes: usize) {
        self.messages_accepted.inc();
        self.bytes_accepted.add(bytes as u64);
    }

    /// Record a message refused by admission control
    #[inline]
    pub fn record_throttled(&self) {
        self.messages_throttled.inc();
    }

    /// Record a failed append
    #[inline]
    pub fn record_append_error(&self) {
        self.append_errors.inc();
    }

    /// Record entries read from the journal
    #[inline]
    pub fn record_read(&self, count: usize) {
        self.messages_read.add(count as u64);
    }

    /// Record an entry forwarded to the output buffer
    #[inline]
    pub fn record_processed(&self) {
        self.messages_processed.inc();
    }

    /// Record an entry dropped by the processor
    #[inline]
    pub fn record_filtered(&self) {
        self.messages_filtered.inc();
    }

    /// Messages appended so far
    #[inline]
    pub fn messages_accepted(&self) -> u64 {
        self.messages_accepted.get()
    }

    /// Messages throttled so far
    #[inline]
    pub fn messages_throttled(&self) -> u64 {
        self.messages_throttled.get()
    }

    /// Entries read so far
    #[inline]
    pub fn messages_read(&self) -> u64 {
        self.messages_read.get()
    }

    /// Entries processed so far
    #[inline]
    pub fn messages_processed(&self) -> u64 {
        self.messages_processed.get()
    }

    /// Entries filtered so far
    #[inline]
    pub fn messages_filtered(&self) -> u64 {
        self.messages_filtered.get()
    }

    /// Point-in-time copy of all counters
    pub fn snapshot(&self, throttle_active: bool) -> PipelineSnapshot {
        PipelineSnapshot {
            messages_accepted: self.messages_accepted.get(),
            bytes_accepted: self.bytes_accepted.get(),
            messages_throttled: self.messages_throttled.get(),
            append_errors: self.append_errors.get(),
            messages_read: self.messages_read.get(),
            messages_processed: self.messages_processed.get(),
            throttle_active,
        }
    }
}

/// Metrics handle for the reporter
#[derive(Debug, Clone)]
pub struct PipelineMetricsHandle {
    metrics: Arc<PipelineMetrics>,
    gate: Arc<AdmissionGate>,
}

impl PipelineMetricsHandle {
    pub(crate) fn new(metrics: Arc<PipelineMetrics>, gate: Arc<AdmissionGate>) -> Self {
        Self { metrics, gate }
    }
}

impl PipelineMetricsProvider for PipelineMetricsHandle {
    fn pipeline_snapshot(&self) -> PipelineSnapshot {
        self.metrics.snapshot(self.gate.is_throttled())
    }
}

// ============================================================================
// Throttle Tracker - Rate-limited logging for production visibility
// ============================================================================

/// Rate-limited throttle logging
///
/// Aggregates rejected messages and logs a summary at most once per second
/// instead of per-event logging.
///
/// # Thresholds
///
/// - >0 rejections/sec: WARN level
/// - >10000 rejections/sec: ERROR level (the process stage cannot keep up)
pub struct ThrottleTracker {
    /// Rejections in current interval
    interval_rejections: AtomicU64,
    /// Last log time (epoch milliseconds)
    last_log_ms: AtomicU64,
}

/// Log interval in milliseconds
const LOG_INTERVAL_MS: u64 = 1000;
/// Rejections per interval that escalate to ERROR
const CRITICAL_THROTTLE_THRESHOLD: u64 = 10_000;

impl ThrottleTracker {
    /// Create a new tracker
    pub fn new() -> Self {
        Self {
            interval_rejections: AtomicU64::new(0),
            last_log_ms: AtomicU64::new(Self::now_ms()),
        }
    }

    /// Record a throttled message and log a summary if one is due
    ///
    /// Returns true if a log was emitted.
    pub fn record_rejection(&self, utilization_percent: f64) -> bool {
        self.interval_rejections.fetch_add(1, Ordering::Relaxed);
        self.maybe_log(utilization_percent)
    }

    fn maybe_log(&self, utilization_percent: f64) -> bool {
        let now = Self::now_ms();
        let last = self.last_log_ms.load(Ordering::Relaxed);

        if now.saturating_sub(last) < LOG_INTERVAL_MS {
            return false;
        }

        // Claim the log slot so concurrent callers do not log twice
        if self
            .last_log_ms
            .compare_exchange(last, now, Ordering::SeqCst, Ordering::Relaxed)
            .is_err()
        {
            return false;
        }

        let rejected = self.interval_rejections.swap(0, Ordering::Relaxed);
        if rejected == 0 {
            return false;
        }

        if rejected > CRITICAL_THROTTLE_THRESHOLD {
            tracing::error!(
                rejected,
                utilization_percent,
                threshold = CRITICAL_THROTTLE_THRESHOLD,
                "CRITICAL: sustained throttling - process stage cannot keep up"
            );
        } else {
            tracing::warn!(
                rejected,
                utilization_percent,
                "throttling: messages rejected in last second"
            );
        }

        true
    }

    #[inline]
    fn now_ms() -> u64 {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }

    /// Rejections not yet logged (for testing)
    #[cfg(test)]
    pub fn current_rejections(&self) -> u64 {
        self.interval_rejections.load(Ordering::Relaxed)
    }
}

impl Default for ThrottleTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ThrottleTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThrottleTracker")
            .field(
                "interval_rejections",
                &self.interval_rejections.load(Ordering::Relaxed),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_buffer::RingBuffer;

    // ========================================================================
    // ThrottleTracker Tests
    // ========================================================================

    #[test]
    fn test_tracker_accumulates_within_interval() {
        let tracker = ThrottleTracker::new();

        // Not enough time elapsed to log
        assert!(!tracker.record_rejection(97.0));
        assert!(!tracker.record_rejection(97.0));

        assert_eq!(tracker.current_rejections(), 2);
    }

    #[test]
    fn test_tracker_logs_after_interval() {
        let tracker = ThrottleTracker::new();
        tracker
            .last_log_ms
            .store(ThrottleTracker::now_ms() - 2 * LOG_INTERVAL_MS, Ordering::Relaxed);

        assert!(tracker.record_rejection(99.0));
        assert_eq!(tracker.current_rejections(), 0);
    }

    #[test]
    fn test_tracker_debug() {
        let tracker = ThrottleTracker::default();
        tracker.record_rejection(96.0);

        let debug = format!("{:?}", tracker);
        assert!(debug.contains("ThrottleTracker"));
        assert!(debug.contains("interval_rejections"));
    }

    // ========================================================================
    // PipelineMetrics Tests
    // ========================================================================

    #[test]
    fn test_record_accepted() {
        let metrics = PipelineMetrics::new();
        metrics.record_accepted(100);
        metrics.record_accepted(50);

        let snapshot = metrics.snapshot(false);
        assert_eq!(snapshot.messages_accepted, 2);
        assert_eq!(snapshot.bytes_accepted, 150);
        assert!(!snapshot.throttle_active);
    }

    #[test]
    fn test_read_and_processed() {
        let metrics = PipelineMetrics::default();
        metrics.record_read(10);
        metrics.record_processed();
        metrics.record_filtered();
        metrics.record_throttled();
        metrics.record_append_error();

        let snapshot = metrics.snapshot(true);
        assert_eq!(snapshot.messages_read, 10);
        assert_eq!(snapshot.messages_processed, 1);
        assert_eq!(snapshot.messages_throttled, 1);
        assert_eq!(snapshot.append_errors, 1);
        assert_eq!(metrics.messages_filtered(), 1);
        assert!(snapshot.throttle_active);
    }

    #[test]
    fn test_handle_reports_gate_state() {
        let buffer = RingBuffer::new("process", 2);
        let gate = Arc::new(AdmissionGate::new(buffer.watermark(), 95.0, 80.0));
        let handle = PipelineMetricsHandle::new(Arc::new(PipelineMetrics::new()), gate.clone());

        assert!(!handle.pipeline_snapshot().throttle_active);

        buffer.put(1).unwrap();
        buffer.put(2).unwrap();
        assert!(!gate.admit());
        assert!(handle.pipeline_snapshot().throttle_active);
    }

    #[test]
    fn test_concurrent_access() {
        use std::thread;

        let metrics = Arc::new(PipelineMetrics::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let m = Arc::clone(&metrics);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        m.record_accepted(10);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = metrics.snapshot(false);
        assert_eq!(snapshot.messages_accepted, 4000);
        assert_eq!(snapshot.bytes_accepted, 40000);
    }
}
