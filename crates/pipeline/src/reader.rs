//! Journal reader
//!
//! Replays the journal into the process buffer. The cursor starts just past
//! the committed offset (or at the oldest retained entry when nothing is
//! committed), so anything appended but not delivered before a restart is
//! read again.

use std::sync::Arc;
use std::time::Duration;

use sluice_buffer::RingBuffer;
use sluice_journal::{CommitLogJournal, JournalEntry};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::ack::AckTracker;
use crate::blocking::with_journal;
use crate::metrics::PipelineMetrics;

/// Entries read from the journal per pass
pub const DEFAULT_READ_BATCH: usize = 1024;

/// Fallback wake-up when no append notification arrives
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Moves journal entries into the process buffer
#[derive(Debug)]
pub struct JournalReader {
    journal: Arc<CommitLogJournal>,
    process: Arc<RingBuffer<JournalEntry>>,
    acks: Arc<AckTracker>,
    metrics: Arc<PipelineMetrics>,
    read_batch: usize,
    poll_interval: Duration,
}

impl JournalReader {
    pub(crate) fn new(
        journal: Arc<CommitLogJournal>,
        process: Arc<RingBuffer<JournalEntry>>,
        acks: Arc<AckTracker>,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Self {
            journal,
            process,
            acks,
            metrics,
            read_batch: DEFAULT_READ_BATCH,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Override the number of entries read per pass
    pub fn with_read_batch(mut self, read_batch: usize) -> Self {
        self.read_batch = read_batch.max(1);
        self
    }

    /// Override the fallback poll interval
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// First offset to read after (re)start
    pub fn start_offset(&self) -> u64 {
        match self.journal.committed_read_offset() {
            Some(committed) => committed + 1,
            None => self.journal.first_offset().unwrap_or(0),
        }
    }

    /// Read until cancelled
    ///
    /// Entries that were read but not yet placed into the process buffer
    /// when cancellation arrives stay uncommitted and are replayed on the
    /// next start.
    pub async fn run(self, cancel: CancellationToken) {
        let mut cursor = self.start_offset();
        info!(cursor, "journal reader started");

        loop {
            if cancel.is_cancelled() {
                break;
            }

            // Every entry below this offset is visible to the read that follows
            let log_end = self.journal.log_end_offset();
            let read_batch = self.read_batch;
            let read = with_journal("journal-read", &self.journal, move |j| {
                j.read(cursor, read_batch)
            });
            let entries = match read.await {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(cursor, error = %e, "journal read failed");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.poll_interval) => continue,
                    }
                }
            };

            let Some(last) = entries.last().map(|e| e.offset) else {
                // Caught up; offsets below log_end without entries were burned
                cursor = cursor.max(log_end);
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = self.journal.wait_for_append(cursor) => {}
                    _ = tokio::time::sleep(self.poll_interval) => {}
                }
                continue;
            };

            self.metrics.record_read(entries.len());
            if !self.hand_off(entries, &cancel).await {
                break;
            }
            cursor = last + 1;
        }

        info!(
            cursor,
            in_flight = self.acks.in_flight(),
            "journal reader stopped"
        );
    }

    /// Put entries into the process buffer, waiting for space as needed
    ///
    /// Returns false if cancelled before every entry was placed.
    async fn hand_off(&self, entries: Vec<JournalEntry>, cancel: &CancellationToken) -> bool {
        for entry in entries {
            self.acks.register(entry.offset);
            let mut pending = entry;
            loop {
                match self.process.put(pending) {
                    Ok(()) => break,
                    Err(back) => {
                        pending = back;
                        debug!(offset = pending.offset, "process buffer full, waiting");
                        tokio::select! {
                            _ = cancel.cancelled() => return false,
                            _ = self.process.wait_for_space() => {}
                        }
                    }
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_config::JournalConfig;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        journal: Arc<CommitLogJournal>,
        process: Arc<RingBuffer<JournalEntry>>,
        acks: Arc<AckTracker>,
        reader: JournalReader,
    }

    fn fixture(capacity: usize) -> Fixture {
        let dir = TempDir::new().unwrap();
        let journal = Arc::new(
            CommitLogJournal::open(&JournalConfig {
                path: dir.path().to_path_buf(),
                ..Default::default()
            })
            .unwrap(),
        );
        let process = Arc::new(RingBuffer::new("process", capacity));
        let acks = Arc::new(AckTracker::new(journal.clone()));
        let reader = JournalReader::new(
            journal.clone(),
            process.clone(),
            acks.clone(),
            Arc::new(PipelineMetrics::new()),
        )
        .with_poll_interval(Duration::from_millis(10));

        Fixture {
            _dir: dir,
            journal,
            process,
            acks,
            reader,
        }
    }

    async fn take_within(buffer: &RingBuffer<JournalEntry>, wait: Duration) -> JournalEntry {
        tokio::time::timeout(wait, async {
            loop {
                if let Some(entry) = buffer.take() {
                    return entry;
                }
                buffer.wait_for_items().await;
            }
        })
        .await
        .expect("entry should arrive")
    }

    #[test]
    fn test_start_offset() {
        let f = fixture(8);
        assert_eq!(f.reader.start_offset(), 0);

        for _ in 0..5 {
            f.journal.append(b"x").unwrap();
        }
        assert_eq!(f.reader.start_offset(), 0);

        f.journal.commit(2).unwrap();
        assert_eq!(f.reader.start_offset(), 3);
    }

    #[tokio::test]
    async fn test_replays_existing_and_follows_appends() {
        let f = fixture(8);
        f.journal.append(b"a").unwrap();
        f.journal.append(b"b").unwrap();

        let cancel = CancellationToken::new();
        let task = tokio::spawn(f.reader.run(cancel.clone()));

        let wait = Duration::from_secs(2);
        assert_eq!(&take_within(&f.process, wait).await.payload[..], b"a");
        assert_eq!(&take_within(&f.process, wait).await.payload[..], b"b");

        f.journal.append(b"c").unwrap();
        let entry = take_within(&f.process, wait).await;
        assert_eq!(entry.offset, 2);
        assert_eq!(f.acks.in_flight(), 3);

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_resumes_after_committed_offset() {
        let f = fixture(8);
        for payload in [b"a", b"b", b"c"] {
            f.journal.append(payload).unwrap();
        }
        f.journal.commit(1).unwrap();

        let cancel = CancellationToken::new();
        let task = tokio::spawn(f.reader.run(cancel.clone()));

        let entry = take_within(&f.process, Duration::from_secs(2)).await;
        assert_eq!(entry.offset, 2);

        cancel.cancel();
        task.await.unwrap();
        assert!(f.process.is_empty());
    }

    #[tokio::test]
    async fn test_waits_for_space_when_full() {
        let f = fixture(2);
        for i in 0..5u8 {
            f.journal.append(&[i]).unwrap();
        }

        let cancel = CancellationToken::new();
        let task = tokio::spawn(f.reader.run(cancel.clone()));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(f.process.is_full());

        let wait = Duration::from_secs(2);
        let offsets: Vec<u64> = {
            let mut out = Vec::new();
            for _ in 0..5 {
                out.push(take_within(&f.process, wait).await.offset);
            }
            out
        };
        assert_eq!(offsets, vec![0, 1, 2, 3, 4]);

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_cancel_while_blocked_on_full_buffer() {
        let f = fixture(1);
        for _ in 0..3 {
            f.journal.append(b"x").unwrap();
        }

        let cancel = CancellationToken::new();
        let task = tokio::spawn(f.reader.run(cancel.clone()));
        tokio::time::sleep(Duration::from_millis(50)).await;

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("reader should stop")
            .unwrap();
        assert_eq!(f.journal.committed_read_offset(), None);
    }
}
