//! Null sink - discards all data
//!
//! Accepts every batch, counts it and drops it. Useful for measuring
//! pipeline throughput without any sink I/O.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use sluice_journal::JournalEntry;

use crate::common::{Sink, SinkError};

/// Null sink that discards all batches
#[derive(Debug, Default)]
pub struct NullSink {
    metrics: NullSinkMetrics,
}

/// Counters for the null sink
#[derive(Debug, Default)]
pub struct NullSinkMetrics {
    batches_received: AtomicU64,
    messages_received: AtomicU64,
    bytes_received: AtomicU64,
}

impl NullSinkMetrics {
    /// Record a received batch
    #[inline]
    pub fn record_batch(&self, message_count: u64, byte_count: u64) {
        self.batches_received.fetch_add(1, Ordering::Relaxed);
        self.messages_received
            .fetch_add(message_count, Ordering::Relaxed);
        self.bytes_received.fetch_add(byte_count, Ordering::Relaxed);
    }

    /// Get snapshot of metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            batches_received: self.batches_received.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of null sink metrics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub batches_received: u64,
    pub messages_received: u64,
    pub bytes_received: u64,
}

impl NullSink {
    /// Create a new null sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Get reference to metrics
    #[inline]
    pub fn metrics(&self) -> &NullSinkMetrics {
        &self.metrics
    }
}

#[async_trait]
impl Sink for NullSink {
    fn name(&self) -> &'static str {
        "null"
    }

    async fn write(&self, batch: &[JournalEntry]) -> Result<(), SinkError> {
        let bytes: usize = batch.iter().map(JournalEntry::len).sum();
        self.metrics.record_batch(batch.len() as u64, bytes as u64);
        Ok(())
    }
}

#[cfg(test)]
#[path = "null_test.rs"]
mod null_test;
