//! Chunk assembler configuration

use serde::Deserialize;
use std::time::Duration;

/// Chunk reassembly limits
///
/// ```toml
/// [assembler]
/// ttl = "5s"
/// sweep_interval = "1s"
/// max_chunks = 128
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AssemblerConfig {
    /// Incomplete messages older than this are evicted
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,

    /// How often the eviction sweep runs
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,

    /// Highest accepted chunk count per message (1..=128)
    pub max_chunks: u8,

    /// Maximum number of messages being assembled at once
    pub max_pending: usize,

    /// Maximum size of an assembled message in bytes
    pub max_message_size: usize,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(5),
            sweep_interval: Duration::from_secs(1),
            max_chunks: 128,
            max_pending: 65536,
            max_message_size: 1024 * 1024,
        }
    }
}
