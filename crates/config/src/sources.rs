//! Source configuration
//!
//! Network inputs that feed the pipeline. Sources are optional; without
//! one the pipeline only replays what is already in the journal.

use serde::Deserialize;

/// Container for all source configurations
///
/// ```toml
/// [sources.udp]
/// port = 12201
/// num_workers = 4
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// Chunked UDP source (GELF chunking)
    pub udp: Option<UdpSourceConfig>,
}

/// UDP source configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UdpSourceConfig {
    /// Whether this source is enabled
    /// Default: true (enabled when config is present)
    pub enabled: bool,

    /// Bind address
    pub address: String,

    /// Listen port
    /// Default: 12201
    pub port: u16,

    /// Number of worker sockets (SO_REUSEPORT)
    pub num_workers: usize,

    /// Socket receive buffer size in bytes
    pub recv_buffer_size: usize,

    /// Largest datagram accepted
    pub max_datagram_size: usize,
}

impl Default for UdpSourceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            address: "0.0.0.0".into(),
            port: 12201,
            num_workers: 4,
            recv_buffer_size: 256 * 1024,
            max_datagram_size: 65536,
        }
    }
}

impl UdpSourceConfig {
    /// Get the socket address to bind to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}
