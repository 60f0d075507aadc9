//! Sluice - Sinks
//!
//! Downstream destinations for the output dispatcher.
//!
//! # Architecture
//!
//! The dispatcher drains a batch from the output buffer and calls
//! [`Sink::write`] on the configured sink. A write either accepts the whole
//! batch or fails; retry and drop policy live in the dispatcher.
//!
//! ```text
//! [Output buffer] --drain_batch--> [OutputDispatcher] --write(&[JournalEntry])--> [Sink]
//! ```
//!
//! # Available Sinks
//!
//! | Sink | Purpose |
//! |------|---------|
//! | `null` | Benchmarking (discard all) |
//! | `stdout` | Debug output, one line per message |
//! | `file` | Append one line per message to a file |
//!
//! # Example
//!
//! ```
//! use sluice_config::SinkConfig;
//! use sluice_sinks::{Sink, SinkKind};
//!
//! let sink = SinkKind::from_config(&SinkConfig::Null).unwrap();
//! assert_eq!(sink.name(), "null");
//! ```

// =============================================================================
// Sink implementations (each in its own submodule)
// =============================================================================

/// Null sink - discards all data (for benchmarking)
pub mod null;

/// Stdout sink - human-readable debug output
pub mod stdout;

/// File sink - appends one line per message
pub mod file;

// =============================================================================
// Shared types
// =============================================================================

mod common;
mod kind;
mod rate_limited_logger;

pub use common::{Sink, SinkError, format_batch, format_line};
pub use file::FileSink;
pub use kind::SinkKind;
pub use null::NullSink;
pub use rate_limited_logger::{DEFAULT_LOG_INTERVAL, RateLimitedLogger};
pub use stdout::StdoutSink;
