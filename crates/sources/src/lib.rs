//! Sluice - Sources
//!
//! Network listeners that hand received messages to the pipeline
//! [`Ingestor`](sluice_pipeline::Ingestor).
//!
//! # Available Sources
//!
//! - **UDP** - GELF over UDP, chunked or whole datagrams, with multi-worker
//!   support via `SO_REUSEPORT`
//!
//! # Design Principles
//!
//! - **Durable hand-off**: a datagram counts as ingested once the journal
//!   accepted it; throttled datagrams are dropped (UDP is best effort)
//! - **Async I/O**: Built on `tokio` for non-blocking operations
//! - **Kernel load balancing**: each worker owns a socket bound to the same
//!   port
//!
//! # Example
//!
//! ```ignore
//! use sluice_sources::GelfUdpSource;
//!
//! let source = GelfUdpSource::new(udp_config, pipeline.ingestor());
//! let metrics = source.metrics_handle();
//! source.run(cancel.clone()).await?;
//! ```

pub mod udp;

pub use udp::{GelfUdpSource, UdpSourceError, UdpSourceMetricsHandle};
