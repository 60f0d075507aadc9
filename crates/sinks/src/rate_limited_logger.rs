//! Rate-limited failure logging
//!
//! A sink that is down fails every write attempt. Logging each one would
//! bury everything else, so failures are logged at most once per interval
//! with a count of what was suppressed in between.

use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Default interval between logged failures
pub const DEFAULT_LOG_INTERVAL: Duration = Duration::from_secs(10);

/// Logs repeated failures at most once per interval
#[derive(Debug)]
pub struct RateLimitedLogger {
    min_interval: Duration,
    last_log_time: Mutex<Option<Instant>>,
    /// Failures since the last emitted log line
    suppressed: AtomicU64,
    total: AtomicU64,
}

impl RateLimitedLogger {
    /// Create a logger that emits at most once per `min_interval`
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_log_time: Mutex::new(None),
            suppressed: AtomicU64::new(0),
            total: AtomicU64::new(0),
        }
    }

    /// Record a failure and log it unless one was logged recently
    ///
    /// Returns true if a log line was emitted.
    pub fn error(&self, sink: &str, message: &str, error: &dyn Display) -> bool {
        self.total.fetch_add(1, Ordering::Relaxed);

        if !self.claim_slot(Instant::now()) {
            self.suppressed.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        let suppressed = self.suppressed.swap(0, Ordering::Relaxed);
        let total = self.total.load(Ordering::Relaxed);
        if suppressed > 0 {
            tracing::error!(
                sink,
                error = %error,
                suppressed,
                total_errors = total,
                "{} (rate-limited)",
                message
            );
        } else {
            tracing::error!(sink, error = %error, total_errors = total, "{}", message);
        }
        true
    }

    fn claim_slot(&self, now: Instant) -> bool {
        let mut last = self.last_log_time.lock();
        match *last {
            Some(prev) if now.duration_since(prev) < self.min_interval => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }

    /// Failures not yet reported in a log line
    pub fn suppressed_count(&self) -> u64 {
        self.suppressed.load(Ordering::Relaxed)
    }

    /// All failures ever recorded
    pub fn total_count(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }
}

impl Default for RateLimitedLogger {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_first_error_always_logs() {
        let logger = RateLimitedLogger::new(Duration::from_secs(10));
        let error = io::Error::other("connection refused");

        assert!(logger.error("file", "sink write failed", &error));
        assert_eq!(logger.total_count(), 1);
        assert_eq!(logger.suppressed_count(), 0);
    }

    #[test]
    fn test_rapid_errors_suppressed() {
        let logger = RateLimitedLogger::new(Duration::from_secs(10));
        let error = io::Error::other("disk full");

        assert!(logger.error("file", "sink write failed", &error));
        for _ in 0..10 {
            assert!(!logger.error("file", "sink write failed", &error));
        }

        assert_eq!(logger.total_count(), 11);
        assert_eq!(logger.suppressed_count(), 10);
    }

    #[test]
    fn test_logs_again_after_interval() {
        let logger = RateLimitedLogger::new(Duration::from_millis(10));
        let error = io::Error::other("timeout");

        assert!(logger.error("stdout", "sink write failed", &error));
        assert!(!logger.error("stdout", "sink write failed", &error));

        std::thread::sleep(Duration::from_millis(20));
        assert!(logger.error("stdout", "sink write failed", &error));
        // The emitted line carried the suppressed count
        assert_eq!(logger.suppressed_count(), 0);
    }

    #[test]
    fn test_default_interval() {
        let logger = RateLimitedLogger::default();
        assert_eq!(logger.min_interval, DEFAULT_LOG_INTERVAL);
    }
}
