//! Journal configuration
//!
//! Controls where the commit log lives, how large its segments grow,
//! how often it is fsynced, and how long committed segments are kept.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Default maximum segment size (100MB)
const DEFAULT_MAX_SEGMENT_SIZE: u64 = 100 * 1024 * 1024;

/// Default retention size (5GB)
const DEFAULT_RETENTION_MAX_SIZE: u64 = 5 * 1024 * 1024 * 1024;

/// When the journal calls fsync on the active segment
///
/// ```toml
/// fsync = "never"          # rely on periodic flush
/// fsync = "every_append"   # fsync each record
/// fsync = { every_n = 500 }
/// ```
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FsyncMode {
    /// Only fsync on periodic flush and shutdown (default)
    #[default]
    Never,
    /// fsync after every append
    EveryAppend,
    /// fsync after every N appends
    EveryN(u64),
}

/// Retention settings for committed segments
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    /// Committed segments older than this are deleted
    /// Default: 12h
    #[serde(with = "humantime_serde")]
    pub max_age: Duration,

    /// Committed segments are deleted (oldest first) while the journal exceeds this size
    /// Default: 5GB
    pub max_size: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            max_age: Duration::from_secs(12 * 3600),
            max_size: DEFAULT_RETENTION_MAX_SIZE,
        }
    }
}

/// Journal configuration
///
/// # Example
///
/// ```toml
/// [journal]
/// path = "/var/lib/sluice/journal"
/// max_segment_size = 104857600
/// flush_interval = "1s"
///
/// [journal.retention]
/// max_age = "12h"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JournalConfig {
    /// Directory holding segment files and the committed offset
    /// Default: "data/journal"
    pub path: PathBuf,

    /// Segment rollover threshold in bytes
    pub max_segment_size: u64,

    /// fsync policy for appends
    pub fsync: FsyncMode,

    /// Interval for flushing buffered writes and persisting the committed offset
    #[serde(with = "humantime_serde")]
    pub flush_interval: Duration,

    /// Interval between retention passes
    #[serde(with = "humantime_serde")]
    pub cleanup_interval: Duration,

    /// Retention policy for committed segments
    pub retention: RetentionConfig,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/journal"),
            max_segment_size: DEFAULT_MAX_SEGMENT_SIZE,
            fsync: FsyncMode::Never,
            flush_interval: Duration::from_secs(1),
            cleanup_interval: Duration::from_secs(60),
            retention: RetentionConfig::default(),
        }
    }
}
