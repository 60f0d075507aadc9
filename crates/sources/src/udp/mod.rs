//! GELF UDP Source
//!
//! Receives GELF datagrams over UDP with multi-worker support.
//!
//! # Protocol Support
//!
//! - **Whole messages** - any datagram without the chunk magic bytes
//! - **Chunked messages** - `0x1e 0x0f` header, reassembled before the
//!   message is journaled
//!
//! Payloads are journaled as received; compression and JSON parsing are
//! left to whatever reads the journal.
//!
//! # Design
//!
//! UDP is connectionless, so instead of accepting connections:
//! - Multiple workers bind the same port (SO_REUSEPORT)
//! - Each worker receives datagrams and calls the ingestor directly
//! - A throttled datagram is dropped and counted; nothing blocks the socket
//!
//! # Example
//!
//! ```ignore
//! let config = UdpSourceConfig {
//!     address: "0.0.0.0".into(),
//!     port: 12201,
//!     num_workers: 4,
//!     ..Default::default()
//! };
//!
//! let source = GelfUdpSource::new(config, pipeline.ingestor());
//! source.run(cancel).await?;
//! ```

use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::{Arc, OnceLock};

use bytes::Bytes;
use sluice_assembler::ChunkError;
use sluice_assembler::gelf::CHUNK_MAGIC;
use sluice_config::UdpSourceConfig;
use sluice_metrics::{SourceMetrics, SourceMetricsProvider, SourceMetricsSnapshot};
use sluice_pipeline::{IngestOutcome, Ingestor, PipelineError};
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

/// Source type reported to the metrics reporter
const SOURCE_TYPE: &str = "udp";

// =============================================================================
// Metrics
// =============================================================================

/// Handle for accessing UDP source metrics
///
/// It remains valid even during source operation.
#[derive(Debug, Clone)]
pub struct UdpSourceMetricsHandle {
    id: String,
    metrics: Arc<SourceMetrics>,
}

impl SourceMetricsProvider for UdpSourceMetricsHandle {
    fn source_id(&self) -> &str {
        &self.id
    }

    fn source_type(&self) -> &str {
        SOURCE_TYPE
    }

    fn snapshot(&self) -> SourceMetricsSnapshot {
        self.metrics.snapshot()
    }
}

// =============================================================================
// Errors
// =============================================================================

/// UDP source errors
#[derive(Debug, thiserror::Error)]
pub enum UdpSourceError {
    /// Failed to resolve or bind the listen address
    #[error("failed to bind to {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create a worker socket
    #[error("failed to create worker {worker_id}: {source}")]
    WorkerCreation {
        worker_id: usize,
        #[source]
        source: std::io::Error,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Source Implementation
// =============================================================================

/// GELF UDP source
///
/// Receives datagrams on one port with several worker sockets and feeds
/// them to the pipeline.
pub struct GelfUdpSource {
    config: UdpSourceConfig,
    ingestor: Ingestor,
    metrics: Arc<SourceMetrics>,
    /// Address actually bound, known once `run` has created the sockets
    local_addr: OnceLock<SocketAddr>,
}

impl std::fmt::Debug for GelfUdpSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GelfUdpSource")
            .field("address", &self.config.bind_address())
            .field("num_workers", &self.config.num_workers)
            .finish()
    }
}

impl GelfUdpSource {
    /// Create a new UDP source
    pub fn new(config: UdpSourceConfig, ingestor: Ingestor) -> Self {
        Self {
            config,
            ingestor,
            metrics: Arc::new(SourceMetrics::new()),
            local_addr: OnceLock::new(),
        }
    }

    /// Get a metrics handle for reporting
    pub fn metrics_handle(&self) -> UdpSourceMetricsHandle {
        UdpSourceMetricsHandle {
            id: format!("udp:{}", self.config.bind_address()),
            metrics: Arc::clone(&self.metrics),
        }
    }

    /// Address the workers are bound to, once listening
    ///
    /// With port 0 in the config this reports the port the OS picked.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr.get().copied()
    }

    /// Run the source until cancelled
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid or a worker socket cannot
    /// be bound. Per-datagram failures are counted, not returned.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), UdpSourceError> {
        let bind_addr = self.config.bind_address();
        let mut socket_addr: SocketAddr =
            bind_addr.parse().map_err(|_| UdpSourceError::Bind {
                address: bind_addr.clone(),
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "invalid socket address",
                ),
            })?;

        let num_workers = self.config.num_workers.max(1);
        tracing::info!(
            address = %bind_addr,
            num_workers,
            max_datagram_size = self.config.max_datagram_size,
            "UDP source starting"
        );

        // Bind every socket before spawning so a bind failure leaves nothing running
        let mut sockets = Vec::with_capacity(num_workers);
        for worker_id in 0..num_workers {
            let socket = self.create_reuseport_socket(socket_addr).map_err(|e| {
                if worker_id == 0 {
                    UdpSourceError::Bind {
                        address: bind_addr.clone(),
                        source: e,
                    }
                } else {
                    UdpSourceError::WorkerCreation {
                        worker_id,
                        source: e,
                    }
                }
            })?;
            // Later workers join the port the OS picked for the first one
            if socket_addr.port() == 0 {
                socket_addr = socket.local_addr()?;
            }
            sockets.push(socket);
        }
        let _ = self.local_addr.set(socket_addr);

        let mut worker_handles = Vec::with_capacity(num_workers);
        for (worker_id, socket) in sockets.into_iter().enumerate() {
            let worker = UdpWorker {
                id: worker_id,
                socket,
                max_datagram_size: self.config.max_datagram_size,
                ingestor: self.ingestor.clone(),
                metrics: Arc::clone(&self.metrics),
                cancel: cancel.clone(),
            };
            worker_handles.push(tokio::spawn(worker.run()));
        }

        tracing::info!(
            address = %socket_addr,
            workers_started = num_workers,
            "UDP source listening"
        );

        for handle in worker_handles {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "UDP worker task failed");
            }
        }

        tracing::info!(address = %socket_addr, "UDP source stopped");
        Ok(())
    }

    /// Create a UDP socket with SO_REUSEPORT and the configured receive buffer
    fn create_reuseport_socket(&self, addr: SocketAddr) -> std::io::Result<UdpSocket> {
        let domain = if addr.is_ipv4() {
            Domain::IPV4
        } else {
            Domain::IPV6
        };

        let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;

        #[cfg(unix)]
        socket.set_reuse_port(true)?;

        let recv_buffer_size = self.config.recv_buffer_size;
        if let Err(e) = socket.set_recv_buffer_size(recv_buffer_size) {
            tracing::warn!(
                error = %e,
                requested_size = recv_buffer_size,
                "failed to set UDP SO_RCVBUF"
            );
        }

        socket.bind(&addr.into())?;
        socket.set_nonblocking(true)?;

        let std_socket: std::net::UdpSocket = socket.into();
        UdpSocket::from_std(std_socket)
    }
}

// =============================================================================
// UDP Worker
// =============================================================================

/// Individual UDP worker that owns one SO_REUSEPORT socket
struct UdpWorker {
    id: usize,
    socket: UdpSocket,
    max_datagram_size: usize,
    ingestor: Ingestor,
    metrics: Arc<SourceMetrics>,
    cancel: CancellationToken,
}

impl UdpWorker {
    async fn run(self) {
        tracing::debug!(worker_id = self.id, "UDP worker started");

        // One spare byte tells an oversized datagram from one that fits exactly
        let mut recv_buf = vec![0u8; self.max_datagram_size + 1];

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => break,

                recv_result = self.socket.recv_from(&mut recv_buf) => {
                    match recv_result {
                        Ok((len, peer_addr)) => {
                            self.handle_datagram(&recv_buf[..len], peer_addr);
                        }
                        Err(e) => {
                            self.metrics.errors.fetch_add(1, Ordering::Relaxed);
                            tracing::debug!(
                                worker_id = self.id,
                                error = %e,
                                "UDP recv error"
                            );
                        }
                    }
                }
            }
        }

        tracing::debug!(worker_id = self.id, "UDP worker stopped");
    }

    fn handle_datagram(&self, data: &[u8], peer_addr: SocketAddr) {
        self.metrics.record_packet(data.len() as u64);

        if data.is_empty() || data.len() > self.max_datagram_size {
            self.metrics.malformed.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(
                worker_id = self.id,
                peer = %peer_addr,
                size = data.len(),
                max = self.max_datagram_size,
                "UDP datagram empty or too large, dropping"
            );
            return;
        }

        if data.starts_with(&CHUNK_MAGIC) {
            self.metrics.chunks_received.fetch_add(1, Ordering::Relaxed);
        }

        // Appends inline; under every_append this worker waits on the fsync
        match self.ingestor.ingest_datagram(Bytes::copy_from_slice(data)) {
            Ok(IngestOutcome::Accepted { .. }) => {
                self.metrics.messages_ingested.fetch_add(1, Ordering::Relaxed);
            }
            Ok(IngestOutcome::Pending) => {}
            Ok(IngestOutcome::Throttled) => {
                self.metrics.throttled.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) if e.is_malformed() => {
                self.metrics.malformed.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    worker_id = self.id,
                    peer = %peer_addr,
                    error = %e,
                    "malformed GELF datagram"
                );
            }
            Err(PipelineError::Chunk(ChunkError::TooManyPending { limit })) => {
                self.metrics.throttled.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    worker_id = self.id,
                    limit,
                    "too many incomplete chunked messages, dropping chunk"
                );
            }
            Err(e) => {
                self.metrics.errors.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(worker_id = self.id, error = %e, "failed to ingest datagram");
            }
        }
    }
}
