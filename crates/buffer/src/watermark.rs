//! Fill-level view of a ring buffer

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Read-only projection of a buffer's fill level
///
/// Cloning is cheap; every clone observes the same buffer. Reads are a
/// single atomic load and never contend with producers or consumers.
#[derive(Debug, Clone)]
pub struct Watermark {
    len: Arc<AtomicUsize>,
    capacity: usize,
}

impl Watermark {
    pub(crate) fn new(len: Arc<AtomicUsize>, capacity: usize) -> Self {
        Self { len, capacity }
    }

    /// Items currently held
    #[inline]
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    /// Capacity of the underlying buffer
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Fill level as a fraction in `0.0..=1.0`
    #[inline]
    pub fn utilization(&self) -> f64 {
        self.len() as f64 / self.capacity as f64
    }

    /// Fill level as a percentage in `0.0..=100.0`
    #[inline]
    pub fn utilization_percent(&self) -> f64 {
        self.utilization() * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RingBuffer;

    #[test]
    fn test_empty_is_zero() {
        let buffer = RingBuffer::<u32>::new("test", 8);
        assert_eq!(buffer.watermark().utilization_percent(), 0.0);
    }

    #[test]
    fn test_utilization_after_puts() {
        for (capacity, puts) in [(4usize, 1usize), (4, 3), (10, 7), (3, 1), (65536, 1000)] {
            let buffer = RingBuffer::new("test", capacity);
            let watermark = buffer.watermark();
            for i in 0..puts {
                buffer.put(i).unwrap();
            }

            let expected = puts as f64 / capacity as f64 * 100.0;
            assert_eq!(watermark.utilization_percent(), expected);
        }
    }

    #[test]
    fn test_tracks_takes() {
        let buffer = RingBuffer::new("test", 4);
        let watermark = buffer.watermark();
        for i in 0..4 {
            buffer.put(i).unwrap();
        }
        assert_eq!(watermark.utilization_percent(), 100.0);

        buffer.take();
        buffer.take();
        assert_eq!(watermark.utilization_percent(), 50.0);
        assert_eq!(watermark.len(), 2);
    }

    #[test]
    fn test_concurrent_reads() {
        let buffer = Arc::new(RingBuffer::new("test", 1000));
        let watermark = buffer.watermark();

        let producer = {
            let buffer = Arc::clone(&buffer);
            std::thread::spawn(move || {
                for i in 0..1000 {
                    buffer.put(i).unwrap();
                }
            })
        };

        let reader = std::thread::spawn(move || {
            let mut last = 0.0;
            for _ in 0..1000 {
                let current = watermark.utilization_percent();
                assert!((0.0..=100.0).contains(&current));
                assert!(current >= last);
                last = current;
            }
        });

        producer.join().unwrap();
        reader.join().unwrap();
        assert_eq!(buffer.watermark().utilization_percent(), 100.0);
    }
}
