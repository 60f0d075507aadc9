//! Chunk assembler
//!
//! Collects the chunks of a message until every index has arrived, then
//! hands back the concatenated payload. Incomplete messages are evicted by
//! a periodic sweep once they are older than the TTL.
//!
//! # Concurrency
//!
//! Pending messages live in a sharded `DashMap`, so input workers only
//! contend when chunks of messages in the same shard arrive together. The
//! sweep uses `retain`, which locks one shard at a time.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use sluice_config::AssemblerConfig;
use sluice_metrics::{AssemblerMetrics, AssemblerMetricsProvider, AssemblerMetricsSnapshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::ChunkError;

/// Chunks received so far for one message
#[derive(Debug)]
struct PendingChunkSet {
    total_chunks: u8,
    chunks: Vec<Option<Bytes>>,
    received: usize,
    size: usize,
    first_seen: Instant,
}

impl PendingChunkSet {
    fn new(total_chunks: u8, now: Instant) -> Self {
        Self {
            total_chunks,
            chunks: vec![None; total_chunks as usize],
            received: 0,
            size: 0,
            first_seen: now,
        }
    }

    /// Store a chunk, returning true if the index was already filled
    fn insert(&mut self, index: u8, data: Bytes) -> bool {
        let new_len = data.len();
        match self.chunks[index as usize].replace(data) {
            Some(old) => {
                self.size = self.size - old.len() + new_len;
                true
            }
            None => {
                self.size += new_len;
                self.received += 1;
                false
            }
        }
    }

    fn is_complete(&self) -> bool {
        self.received == self.total_chunks as usize
    }

    fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.first_seen) > ttl
    }

    /// Concatenate chunks in index order
    fn assemble(self) -> Bytes {
        let mut payload = BytesMut::with_capacity(self.size);
        for chunk in self.chunks.into_iter().flatten() {
            payload.extend_from_slice(&chunk);
        }
        payload.freeze()
    }
}

/// Reassembles chunked messages
#[derive(Debug)]
pub struct ChunkAssembler {
    pending: DashMap<Bytes, PendingChunkSet>,
    config: AssemblerConfig,
    metrics: Arc<AssemblerMetrics>,
    /// Gauge mirroring `pending.len()` without locking every shard
    pending_count: Arc<AtomicUsize>,
}

impl ChunkAssembler {
    /// Create an assembler with the given limits
    pub fn new(config: AssemblerConfig) -> Self {
        Self {
            pending: DashMap::new(),
            config,
            metrics: Arc::new(AssemblerMetrics::new()),
            pending_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Accept one chunk
    ///
    /// Returns the full payload once the last missing chunk arrives and
    /// `None` while the message is incomplete. A chunk that repeats an
    /// index replaces the earlier data without counting toward completion.
    pub fn on_chunk(
        &self,
        message_id: &[u8],
        chunk_index: u8,
        total_chunks: u8,
        data: Bytes,
    ) -> Result<Option<Bytes>, ChunkError> {
        self.on_chunk_at(message_id, chunk_index, total_chunks, data, Instant::now())
    }

    /// [`on_chunk`](Self::on_chunk) with an explicit clock
    pub fn on_chunk_at(
        &self,
        message_id: &[u8],
        chunk_index: u8,
        total_chunks: u8,
        data: Bytes,
        now: Instant,
    ) -> Result<Option<Bytes>, ChunkError> {
        let result = self.accept(message_id, chunk_index, total_chunks, data, now);
        match &result {
            Ok(completed) => {
                self.metrics.chunks_received.fetch_add(1, Ordering::Relaxed);
                if completed.is_some() {
                    self.metrics
                        .messages_completed
                        .fetch_add(1, Ordering::Relaxed);
                }
            }
            Err(ChunkError::TooManyPending { .. }) => {
                self.metrics.pending_overflow.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {
                self.metrics.chunks_malformed.fetch_add(1, Ordering::Relaxed);
            }
        }
        result
    }

    fn accept(
        &self,
        message_id: &[u8],
        chunk_index: u8,
        total_chunks: u8,
        data: Bytes,
        now: Instant,
    ) -> Result<Option<Bytes>, ChunkError> {
        let max_chunks = self.config.max_chunks;
        if total_chunks == 0 || total_chunks > max_chunks {
            return Err(ChunkError::InvalidTotal {
                total: total_chunks,
                max: max_chunks,
            });
        }
        if chunk_index >= total_chunks {
            return Err(ChunkError::IndexOutOfRange {
                index: chunk_index,
                total: total_chunks,
            });
        }

        let max_size = self.config.max_message_size;

        match self.pending.entry(Bytes::copy_from_slice(message_id)) {
            Entry::Vacant(vacant) => {
                if data.len() > max_size {
                    return Err(ChunkError::MessageTooLarge {
                        size: data.len(),
                        max: max_size,
                    });
                }

                let mut set = PendingChunkSet::new(total_chunks, now);
                set.insert(chunk_index, data);
                if set.is_complete() {
                    return Ok(Some(set.assemble()));
                }

                let limit = self.config.max_pending;
                if self.pending_count.load(Ordering::Relaxed) >= limit {
                    return Err(ChunkError::TooManyPending { limit });
                }
                vacant.insert(set);
                self.pending_count.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
            Entry::Occupied(mut occupied) => {
                let set = occupied.get_mut();

                // Expired but not swept yet: start over
                if set.is_expired(now, self.config.ttl) {
                    self.metrics.messages_expired.fetch_add(1, Ordering::Relaxed);
                    *set = PendingChunkSet::new(total_chunks, now);
                }

                if set.total_chunks != total_chunks {
                    return Err(ChunkError::TotalMismatch {
                        expected: set.total_chunks,
                        got: total_chunks,
                    });
                }

                if set.insert(chunk_index, data) {
                    self.metrics.chunks_duplicate.fetch_add(1, Ordering::Relaxed);
                }

                if set.size > max_size {
                    let size = set.size;
                    occupied.remove();
                    self.pending_count.fetch_sub(1, Ordering::Relaxed);
                    return Err(ChunkError::MessageTooLarge {
                        size,
                        max: max_size,
                    });
                }

                if set.is_complete() {
                    let set = occupied.remove();
                    self.pending_count.fetch_sub(1, Ordering::Relaxed);
                    return Ok(Some(set.assemble()));
                }

                Ok(None)
            }
        }
    }

    /// Evict incomplete messages older than the TTL
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    /// [`sweep`](Self::sweep) with an explicit clock
    pub fn sweep_at(&self, now: Instant) -> usize {
        let ttl = self.config.ttl;
        let mut expired = 0usize;

        self.pending.retain(|message_id, set| {
            if set.is_expired(now, ttl) {
                debug!(
                    message_id = ?&message_id[..],
                    received = set.received,
                    total = set.total_chunks,
                    "evicting incomplete message"
                );
                expired += 1;
                false
            } else {
                true
            }
        });

        if expired > 0 {
            self.pending_count.fetch_sub(expired, Ordering::Relaxed);
            self.metrics
                .messages_expired
                .fetch_add(expired as u64, Ordering::Relaxed);
        }
        expired
    }

    /// Run the sweep on `sweep_interval` until cancelled
    pub async fn run_sweeper(self: Arc<Self>, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.sweep_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let expired = self.sweep();
                    if expired > 0 {
                        debug!(expired, pending = self.pending_len(), "assembler sweep");
                    }
                }
            }
        }

        info!(pending = self.pending_len(), "assembler sweeper stopped");
    }

    /// Number of messages being assembled
    pub fn pending_len(&self) -> usize {
        self.pending_count.load(Ordering::Relaxed)
    }

    /// Get a metrics handle for the reporter
    pub fn metrics_handle(&self) -> AssemblerMetricsHandle {
        AssemblerMetricsHandle {
            metrics: Arc::clone(&self.metrics),
            pending_count: Arc::clone(&self.pending_count),
        }
    }
}

/// Handle for reading assembler metrics
#[derive(Debug, Clone)]
pub struct AssemblerMetricsHandle {
    metrics: Arc<AssemblerMetrics>,
    pending_count: Arc<AtomicUsize>,
}

impl AssemblerMetricsProvider for AssemblerMetricsHandle {
    fn snapshot(&self) -> AssemblerMetricsSnapshot {
        self.metrics
            .snapshot(self.pending_count.load(Ordering::Relaxed) as u64)
    }
}

#[cfg(test)]
#[path = "assembler_test.rs"]
mod assembler_test;
