//! Bounded ring buffer
//!
//! Fixed-capacity FIFO shared between pipeline stages. Producers are
//! rejected when the buffer is full and consumers get nothing when it is
//! empty; neither side ever blocks on the lock for longer than one slot
//! update. Async callers park on [`RingBuffer::wait_for_items`] or
//! [`RingBuffer::wait_for_space`] instead of spinning.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use sluice_metrics::{BufferMetricsProvider, BufferMetricsSnapshot, Counter};
use tokio::sync::Notify;

use crate::watermark::Watermark;

/// Slot storage guarded by the buffer lock
struct Slots<T> {
    items: Box<[Option<T>]>,
    /// Index of the next item to take
    head: usize,
    /// Index of the next free slot
    tail: usize,
    count: usize,
}

impl<T> Slots<T> {
    fn with_capacity(capacity: usize) -> Self {
        let items = (0..capacity).map(|_| None).collect::<Vec<_>>();
        Self {
            items: items.into_boxed_slice(),
            head: 0,
            tail: 0,
            count: 0,
        }
    }

    #[inline]
    fn push(&mut self, item: T) -> Result<(), T> {
        if self.count == self.items.len() {
            return Err(item);
        }
        self.items[self.tail] = Some(item);
        self.tail = (self.tail + 1) % self.items.len();
        self.count += 1;
        Ok(())
    }

    #[inline]
    fn pop(&mut self) -> Option<T> {
        if self.count == 0 {
            return None;
        }
        let item = self.items[self.head].take();
        self.head = (self.head + 1) % self.items.len();
        self.count -= 1;
        item
    }
}

/// Put/take counters for one buffer
#[derive(Debug, Default)]
struct BufferCounters {
    puts: Counter,
    rejected: Counter,
    taken: Counter,
}

/// Fixed-capacity FIFO ring buffer
///
/// Share it between stages with `Arc`. The fill level is mirrored into an
/// atomic so [`Watermark`] reads never touch the lock.
pub struct RingBuffer<T> {
    name: &'static str,
    slots: Mutex<Slots<T>>,
    capacity: usize,
    len: Arc<AtomicUsize>,
    items_available: Notify,
    space_available: Notify,
    counters: Arc<BufferCounters>,
}

impl<T> RingBuffer<T> {
    /// Create a buffer holding at most `capacity` items
    ///
    /// A zero capacity is raised to one so the buffer can make progress.
    pub fn new(name: &'static str, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            name,
            slots: Mutex::new(Slots::with_capacity(capacity)),
            capacity,
            len: Arc::new(AtomicUsize::new(0)),
            items_available: Notify::new(),
            space_available: Notify::new(),
            counters: Arc::new(BufferCounters::default()),
        }
    }

    /// Buffer name used in logs and metrics
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Add an item at the tail
    ///
    /// Returns the item back when the buffer is full.
    pub fn put(&self, item: T) -> Result<(), T> {
        let result = {
            let mut slots = self.slots.lock();
            let result = slots.push(item);
            self.len.store(slots.count, Ordering::Release);
            result
        };

        match result {
            Ok(()) => {
                self.counters.puts.inc();
                self.items_available.notify_waiters();
                Ok(())
            }
            Err(item) => {
                self.counters.rejected.inc();
                Err(item)
            }
        }
    }

    /// Remove the item at the head, if any
    pub fn take(&self) -> Option<T> {
        let item = {
            let mut slots = self.slots.lock();
            let item = slots.pop();
            self.len.store(slots.count, Ordering::Release);
            item
        };

        if item.is_some() {
            self.counters.taken.inc();
            self.space_available.notify_waiters();
        }
        item
    }

    /// Remove up to `max_items` items in FIFO order
    pub fn drain_batch(&self, max_items: usize) -> Vec<T> {
        let batch = {
            let mut slots = self.slots.lock();
            let n = max_items.min(slots.count);
            let mut batch = Vec::with_capacity(n);
            for _ in 0..n {
                if let Some(item) = slots.pop() {
                    batch.push(item);
                }
            }
            self.len.store(slots.count, Ordering::Release);
            batch
        };

        if !batch.is_empty() {
            self.counters.taken.add(batch.len() as u64);
            self.space_available.notify_waiters();
        }
        batch
    }

    /// Wait until the buffer holds at least one item or a put happens
    ///
    /// Another consumer may win the race for the item, so callers should
    /// treat a subsequent empty `take` as a spurious wakeup.
    pub async fn wait_for_items(&self) {
        let notified = self.items_available.notified();
        if !self.is_empty() {
            return;
        }
        notified.await;
    }

    /// Wait until the buffer holds at least `min_items` items
    ///
    /// `min_items` is clamped to the capacity so the wait can finish.
    pub async fn wait_for_len(&self, min_items: usize) {
        let min_items = min_items.clamp(1, self.capacity);
        loop {
            let notified = self.items_available.notified();
            if self.len() >= min_items {
                return;
            }
            notified.await;
        }
    }

    /// Wait until the buffer has a free slot or a take happens
    pub async fn wait_for_space(&self) {
        let notified = self.space_available.notified();
        if !self.is_full() {
            return;
        }
        notified.await;
    }

    /// Items currently held
    #[inline]
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    /// Whether the buffer holds no items
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether every slot is occupied
    #[inline]
    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    /// Fixed capacity
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Lock-free fill level view of this buffer
    pub fn watermark(&self) -> Watermark {
        Watermark::new(Arc::clone(&self.len), self.capacity)
    }

    /// Get a metrics handle for the reporter
    pub fn metrics_handle(&self) -> BufferMetricsHandle {
        BufferMetricsHandle {
            name: self.name,
            watermark: self.watermark(),
            counters: Arc::clone(&self.counters),
        }
    }
}

impl<T> std::fmt::Debug for RingBuffer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingBuffer")
            .field("name", &self.name)
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

/// Metrics handle for a ring buffer
///
/// Stays valid for as long as the reporter holds it, independent of the
/// buffer itself.
#[derive(Clone)]
pub struct BufferMetricsHandle {
    name: &'static str,
    watermark: Watermark,
    counters: Arc<BufferCounters>,
}

impl BufferMetricsProvider for BufferMetricsHandle {
    fn buffer_name(&self) -> &str {
        self.name
    }

    fn snapshot(&self) -> BufferMetricsSnapshot {
        BufferMetricsSnapshot {
            capacity: self.watermark.capacity() as u64,
            len: self.watermark.len() as u64,
            utilization_percent: self.watermark.utilization_percent(),
            puts: self.counters.puts.get(),
            rejected: self.counters.rejected.get(),
            taken: self.counters.taken.get(),
        }
    }
}

#[cfg(test)]
#[path = "ring_buffer_test.rs"]
mod ring_buffer_test;
