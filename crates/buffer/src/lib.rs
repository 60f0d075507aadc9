//! Sluice - Buffer
//!
//! Bounded in-memory hand-off between pipeline stages.
//!
//! # Overview
//!
//! - [`RingBuffer`]: fixed-capacity FIFO with fail-fast `put`/`take` and
//!   async wake-ups for waiting loops
//! - [`Watermark`]: lock-free fill-level view for admission control and
//!   metrics
//! - [`AdmissionGate`]: hysteresis switch that throttles ingest when the
//!   process buffer runs hot
//!
//! # Example
//!
//! ```
//! use sluice_buffer::{AdmissionGate, RingBuffer};
//!
//! let buffer = RingBuffer::new("process", 4);
//! let gate = AdmissionGate::new(buffer.watermark(), 95.0, 80.0);
//!
//! assert!(gate.admit());
//! for i in 0..4 {
//!     buffer.put(i).unwrap();
//! }
//! assert_eq!(buffer.put(4), Err(4));
//! assert_eq!(buffer.watermark().utilization_percent(), 100.0);
//! assert!(!gate.admit());
//! ```

mod admission;
mod ring_buffer;
mod watermark;

pub use admission::AdmissionGate;
pub use ring_buffer::{BufferMetricsHandle, RingBuffer};
pub use watermark::Watermark;
