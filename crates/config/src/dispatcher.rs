//! Processing stage and output dispatcher configuration

use serde::Deserialize;
use std::time::Duration;

/// Processing stage settings
///
/// ```toml
/// [processing]
/// workers = 4
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Number of process-stage workers
    /// Default: number of CPU cores
    pub workers: usize,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            workers: num_cpus(),
        }
    }
}

/// Output dispatcher settings
///
/// ```toml
/// [dispatcher]
/// batch_size = 500
/// flush_interval = "1s"
/// max_retries = 3
/// initial_backoff = "100ms"
/// max_backoff = "5s"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Maximum messages per sink write
    pub batch_size: usize,

    /// Tick interval for flushing partial batches
    #[serde(with = "humantime_serde")]
    pub flush_interval: Duration,

    /// Retries after the first failed write (0 = no retry)
    pub max_retries: u32,

    /// Backoff before the first retry; doubles per attempt
    #[serde(with = "humantime_serde")]
    pub initial_backoff: Duration,

    /// Upper bound for the retry backoff
    #[serde(with = "humantime_serde")]
    pub max_backoff: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            batch_size: 500,
            flush_interval: Duration::from_secs(1),
            max_retries: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(5),
        }
    }
}

/// Get the number of available CPUs, defaulting to 4 if detection fails
fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}
