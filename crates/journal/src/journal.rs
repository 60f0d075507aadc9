//! Commit log journal
//!
//! Every accepted message is appended here before anything else sees it.
//! Offsets are dense and strictly increasing, the committed read offset
//! only moves forward, and segments are deleted only once every record in
//! them has been committed.
//!
//! # Locking
//!
//! Appends, rollover and retention serialize on one writer mutex. Gauges and
//! counters live in a shared atomic state so the metrics handle and
//! `log_end_offset()` never touch the lock. Reads take the lock only long
//! enough to flush the active writer and capture byte ranges, then decode
//! outside it.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use bytes::BytesMut;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use sluice_config::{FsyncMode, JournalConfig};
use sluice_metrics::{Counter, JournalMetricsProvider, JournalMetricsSnapshot};
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::error::{JournalError, Result};
use crate::record::{self, JournalEntry, RECORD_HEADER_SIZE};
use crate::segment::{self, ReadView, Recovery, Segment};

/// File holding the persisted committed read offset
pub const COMMITTED_OFFSET_FILE: &str = "committed-read-offset";

/// Information about one segment, for inspection
#[derive(Debug, Clone)]
pub struct SegmentInfo {
    pub base_offset: u64,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub first_offset: Option<u64>,
    pub last_offset: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub active: bool,
}

/// Gauges and counters shared with metrics handles
#[derive(Debug, Default)]
struct JournalState {
    log_end_offset: AtomicU64,
    /// Committed offset plus one; zero means nothing committed yet
    committed_next: AtomicU64,
    size_bytes: AtomicU64,
    segments: AtomicU64,
    appends: Counter,
    bytes_appended: Counter,
    append_errors: Counter,
    segments_deleted: Counter,
    corrupt_segments: Counter,
}

impl JournalState {
    fn committed(&self) -> Option<u64> {
        self.committed_next.load(Ordering::Acquire).checked_sub(1)
    }
}

struct JournalInner {
    sealed: Vec<Segment>,
    active: Segment,
    encode_buf: BytesMut,
    writes_since_sync: u64,
    /// Set after a failed write; the next append starts a fresh segment
    needs_roll: bool,
    closed: bool,
}

impl JournalInner {
    fn segments(&self) -> impl Iterator<Item = &Segment> {
        self.sealed.iter().chain(std::iter::once(&self.active))
    }

    fn total_size(&self) -> u64 {
        self.segments().map(Segment::size).sum()
    }

    fn segment_count(&self) -> u64 {
        self.sealed.len() as u64 + 1
    }
}

/// Append-only, segmented, crash-recoverable message journal
pub struct CommitLogJournal {
    dir: PathBuf,
    config: JournalConfig,
    inner: Mutex<JournalInner>,
    state: Arc<JournalState>,
    appended: Notify,
    /// Last committed offset written to disk
    persisted_commit: Mutex<Option<u64>>,
}

impl std::fmt::Debug for CommitLogJournal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommitLogJournal")
            .field("dir", &self.dir)
            .field("log_end_offset", &self.log_end_offset())
            .field("committed", &self.committed_read_offset())
            .finish()
    }
}

impl CommitLogJournal {
    /// Open the journal at `config.path`, recovering whatever is on disk
    ///
    /// Trailing partial records are truncated away. Sealed segments that
    /// fail validation are renamed to `*.corrupt` and skipped. The
    /// committed offset is restored from disk, and the log end offset
    /// resumes one past the highest offset seen.
    pub fn open(config: &JournalConfig) -> Result<Self> {
        let dir = config.path.clone();
        fs::create_dir_all(&dir).map_err(|e| JournalError::io(&dir, e))?;

        let files = list_segment_files(&dir)?;
        let state = Arc::new(JournalState::default());
        let last_index = files.len().checked_sub(1);
        let mut recovered: Vec<Segment> = Vec::with_capacity(files.len());

        for (i, (base_offset, path)) in files.into_iter().enumerate() {
            let is_last = Some(i) == last_index;
            let reason = match Segment::recover(&path, base_offset, is_last) {
                Ok(Recovery::Clean(segment)) => {
                    if let Some(reason) = overlap(&recovered, &segment) {
                        reason
                    } else {
                        recovered.push(segment);
                        continue;
                    }
                }
                Ok(Recovery::Truncated {
                    segment,
                    dropped_bytes,
                    reason,
                }) => {
                    warn!(
                        segment = %path.display(),
                        dropped_bytes,
                        reason,
                        "truncated journal segment to last valid record"
                    );
                    if let Some(reason) = overlap(&recovered, &segment) {
                        reason
                    } else {
                        recovered.push(segment);
                        continue;
                    }
                }
                Ok(Recovery::Corrupt { reason }) => reason,
                Err(e) => {
                    warn!(segment = %path.display(), error = %e, "failed to read journal segment");
                    "unreadable"
                }
            };

            state.corrupt_segments.inc();
            match segment::quarantine(&path) {
                Ok(target) => warn!(
                    segment = %path.display(),
                    moved_to = %target.display(),
                    reason,
                    "quarantined corrupt journal segment"
                ),
                Err(e) => warn!(
                    segment = %path.display(),
                    reason,
                    error = %e,
                    "corrupt journal segment could not be renamed"
                ),
            }
        }

        let committed = read_committed_offset(&dir);
        let highest_next = recovered.last().map_or(0, Segment::next_offset);
        let log_end = highest_next.max(committed.map_or(0, |c| c + 1));

        let reuse_last = recovered
            .last()
            .is_some_and(|segment| segment.next_offset() == log_end);
        let active = match recovered.pop() {
            Some(mut segment) if reuse_last => {
                segment.open_for_append()?;
                segment
            }
            Some(segment) => {
                recovered.push(segment);
                Segment::create(&dir, log_end)?
            }
            None => Segment::create(&dir, log_end)?,
        };

        let inner = JournalInner {
            sealed: recovered,
            active,
            encode_buf: BytesMut::with_capacity(4096),
            writes_since_sync: 0,
            needs_roll: false,
            closed: false,
        };

        state.log_end_offset.store(log_end, Ordering::Release);
        state
            .committed_next
            .store(committed.map_or(0, |c| c + 1), Ordering::Release);
        state.size_bytes.store(inner.total_size(), Ordering::Relaxed);
        state.segments.store(inner.segment_count(), Ordering::Relaxed);

        info!(
            path = %dir.display(),
            segments = inner.segment_count(),
            log_end_offset = log_end,
            committed = ?committed,
            "journal opened"
        );

        Ok(Self {
            dir,
            config: config.clone(),
            inner: Mutex::new(inner),
            state,
            appended: Notify::new(),
            persisted_commit: Mutex::new(committed),
        })
    }

    /// Append one message and return its offset
    ///
    /// A failed write still consumes its offset so offsets already handed
    /// out are never reused; the next append starts a fresh segment.
    pub fn append(&self, payload: &[u8]) -> Result<u64> {
        if payload.len() > u32::MAX as usize {
            return Err(JournalError::RecordTooLarge {
                size: payload.len() as u64,
                max: u32::MAX as u64,
            });
        }

        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        if inner.closed {
            return Err(JournalError::Closed);
        }

        let record_len = (RECORD_HEADER_SIZE + payload.len()) as u64;
        let active_size = inner.active.size();
        if inner.needs_roll
            || (active_size > 0 && active_size + record_len > self.config.max_segment_size)
        {
            self.roll(inner)?;
        }

        let offset = self.state.log_end_offset.load(Ordering::Acquire);
        let now = SystemTime::now();
        record::encode(
            &mut inner.encode_buf,
            offset,
            DateTime::<Utc>::from(now).timestamp_millis(),
            payload,
        );

        let written = inner
            .active
            .append(&inner.encode_buf, offset, now)
            .and_then(|()| self.apply_fsync_policy(inner));

        self.state.log_end_offset.store(offset + 1, Ordering::Release);

        match written {
            Ok(()) => {
                self.state.appends.inc();
                self.state.bytes_appended.add(payload.len() as u64);
                self.state
                    .size_bytes
                    .fetch_add(record_len, Ordering::Relaxed);
                drop(guard);
                self.appended.notify_waiters();
                Ok(offset)
            }
            Err(e) => {
                inner.needs_roll = true;
                self.state.append_errors.inc();
                let path = inner.active.path().to_path_buf();
                drop(guard);
                // Readers skip the burned offset; wake them anyway
                self.appended.notify_waiters();
                Err(JournalError::io(path, e))
            }
        }
    }

    fn apply_fsync_policy(&self, inner: &mut JournalInner) -> io::Result<()> {
        match self.config.fsync {
            FsyncMode::Never => Ok(()),
            FsyncMode::EveryAppend => inner.active.flush(true),
            FsyncMode::EveryN(n) => {
                inner.writes_since_sync += 1;
                if inner.writes_since_sync >= n {
                    inner.writes_since_sync = 0;
                    inner.active.flush(true)
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Seal the active segment and start a new one at the log end offset
    fn roll(&self, inner: &mut JournalInner) -> Result<()> {
        inner.needs_roll = true;
        inner
            .active
            .seal()
            .map_err(|e| JournalError::io(inner.active.path(), e))?;

        let base_offset = self.state.log_end_offset.load(Ordering::Acquire);
        let fresh = Segment::create(&self.dir, base_offset)?;
        let old = std::mem::replace(&mut inner.active, fresh);
        debug!(
            sealed = %old.path().display(),
            base_offset,
            "rolled journal segment"
        );
        inner.sealed.push(old);
        inner.needs_roll = false;
        inner.writes_since_sync = 0;
        self.state
            .segments
            .store(inner.segment_count(), Ordering::Relaxed);
        Ok(())
    }

    /// Read up to `max` entries with offset `>= from`, in offset order
    ///
    /// Offsets burned by failed appends are simply absent, so callers must
    /// not assume the result is gap-free.
    pub fn read(&self, from: u64, max: usize) -> Result<Vec<JournalEntry>> {
        if max == 0 {
            return Ok(Vec::new());
        }

        // Appends reach the OS before returning, so the files are current
        let views: Vec<ReadView> = {
            let inner = self.inner.lock();
            inner
                .segments()
                .filter(|s| !s.is_empty() && s.next_offset() > from)
                .map(|s| s.read_view(from))
                .collect()
        };

        let mut out = Vec::new();
        for view in views {
            if out.len() >= max {
                break;
            }
            match segment::read_entries(&view, from, max, &mut out) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    debug!(segment = %view.path.display(), "segment removed during read");
                }
                Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                    warn!(
                        segment = %view.path.display(),
                        error = %e,
                        "skipping unreadable remainder of journal segment"
                    );
                }
                Err(e) => return Err(JournalError::io(&view.path, e)),
            }
        }

        Ok(out)
    }

    /// Wait until an entry with offset `> offset` may exist
    ///
    /// Returns immediately if the log end offset is already past `offset`.
    pub async fn wait_for_append(&self, offset: u64) {
        loop {
            let notified = self.appended.notified();
            if self.state.log_end_offset.load(Ordering::Acquire) > offset {
                return;
            }
            notified.await;
        }
    }

    /// Offset of the oldest entry still on disk
    pub fn first_offset(&self) -> Option<u64> {
        self.inner.lock().segments().find_map(Segment::first_offset)
    }

    /// Next offset to be assigned
    #[inline]
    pub fn log_end_offset(&self) -> u64 {
        self.state.log_end_offset.load(Ordering::Acquire)
    }

    /// Mark everything up to and including `offset` as delivered
    ///
    /// The committed offset only moves forward: an older offset is a no-op
    /// and returns `Ok(false)`. Committing an offset that was never
    /// appended is an error.
    pub fn commit(&self, offset: u64) -> Result<bool> {
        let log_end_offset = self.log_end_offset();
        if offset >= log_end_offset {
            return Err(JournalError::CommitBeyondEnd {
                offset,
                log_end_offset,
            });
        }
        let previous = self
            .state
            .committed_next
            .fetch_max(offset + 1, Ordering::AcqRel);
        Ok(previous < offset + 1)
    }

    /// Highest committed offset, if anything has been committed
    #[inline]
    pub fn committed_read_offset(&self) -> Option<u64> {
        self.state.committed()
    }

    /// Flush and fsync the active segment, then persist the committed offset
    pub fn flush(&self) -> Result<()> {
        {
            let mut inner = self.inner.lock();
            if !inner.closed {
                inner
                    .active
                    .flush(true)
                    .map_err(|e| JournalError::io(inner.active.path(), e))?;
                inner.writes_since_sync = 0;
            }
        }
        self.persist_committed()
    }

    fn persist_committed(&self) -> Result<()> {
        let Some(committed) = self.committed_read_offset() else {
            return Ok(());
        };
        let mut persisted = self.persisted_commit.lock();
        if *persisted == Some(committed) {
            return Ok(());
        }

        let target = self.dir.join(COMMITTED_OFFSET_FILE);
        let tmp = self.dir.join(format!("{}.tmp", COMMITTED_OFFSET_FILE));
        write_synced(&tmp, committed.to_string().as_bytes())
            .map_err(|e| JournalError::io(&tmp, e))?;
        fs::rename(&tmp, &target).map_err(|e| JournalError::io(&target, e))?;

        *persisted = Some(committed);
        Ok(())
    }

    /// Delete sealed segments that are fully committed and past retention
    ///
    /// Segments go oldest first, while the oldest is older than
    /// `retention.max_age` or the journal is larger than
    /// `retention.max_size`. The active segment is never deleted. Deletion
    /// failures are logged and end the pass. Returns the number of
    /// segments removed.
    pub fn cleanup(&self) -> usize {
        let Some(committed) = self.committed_read_offset() else {
            return 0;
        };
        let retention = &self.config.retention;
        let now = SystemTime::now();

        let mut inner = self.inner.lock();
        let mut total = inner.total_size();
        let mut removed = 0;

        while let Some(oldest) = inner.sealed.first() {
            if oldest.next_offset() > committed + 1 {
                break;
            }
            let expired = now
                .duration_since(oldest.last_modified())
                .is_ok_and(|age| age > retention.max_age);
            let oversized = total > retention.max_size;
            if !expired && !oversized {
                break;
            }

            match fs::remove_file(oldest.path()) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(
                        segment = %oldest.path().display(),
                        error = %e,
                        "failed to delete journal segment"
                    );
                    break;
                }
            }

            let segment = inner.sealed.remove(0);
            total -= segment.size();
            removed += 1;
            self.state.segments_deleted.inc();
            debug!(
                segment = %segment.path().display(),
                last_offset = ?segment.last_offset(),
                expired,
                oversized,
                "deleted journal segment"
            );
        }

        self.state.size_bytes.store(total, Ordering::Relaxed);
        self.state
            .segments
            .store(inner.segment_count(), Ordering::Relaxed);

        if removed > 0 {
            info!(removed, size_bytes = total, "journal retention pass");
        }
        removed
    }

    /// Total bytes across all segments
    #[inline]
    pub fn size(&self) -> u64 {
        self.state.size_bytes.load(Ordering::Relaxed)
    }

    /// Number of segments, including the active one
    #[inline]
    pub fn number_of_segments(&self) -> usize {
        self.state.segments.load(Ordering::Relaxed) as usize
    }

    /// Journal directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Describe every segment, oldest first
    pub fn segments(&self) -> Vec<SegmentInfo> {
        let inner = self.inner.lock();
        let active_base = inner.active.base_offset();
        inner
            .segments()
            .map(|s| SegmentInfo {
                base_offset: s.base_offset(),
                path: s.path().to_path_buf(),
                size_bytes: s.size(),
                first_offset: s.first_offset(),
                last_offset: s.last_offset(),
                created_at: s.created_at().into(),
                last_modified: s.last_modified().into(),
                active: s.base_offset() == active_base && !s.is_sealed(),
            })
            .collect()
    }

    /// Flush everything, persist the committed offset and refuse further appends
    ///
    /// Closing twice is a no-op.
    pub fn close(&self) -> Result<()> {
        if self.inner.lock().closed {
            return Ok(());
        }
        self.flush()?;

        let mut inner = self.inner.lock();
        if inner.closed {
            return Ok(());
        }
        inner.closed = true;
        inner
            .active
            .seal()
            .map_err(|e| JournalError::io(inner.active.path(), e))?;
        drop(inner);

        self.appended.notify_waiters();
        info!(
            log_end_offset = self.log_end_offset(),
            committed = ?self.committed_read_offset(),
            "journal closed"
        );
        Ok(())
    }

    /// Whether `close()` has been called
    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Get a metrics handle for the reporter
    pub fn metrics_handle(&self) -> JournalMetricsHandle {
        JournalMetricsHandle {
            state: Arc::clone(&self.state),
        }
    }
}

/// Handle for reading journal metrics
#[derive(Debug, Clone)]
pub struct JournalMetricsHandle {
    state: Arc<JournalState>,
}

impl JournalMetricsProvider for JournalMetricsHandle {
    fn snapshot(&self) -> JournalMetricsSnapshot {
        JournalMetricsSnapshot {
            log_end_offset: self.state.log_end_offset.load(Ordering::Acquire),
            committed_offset: self.state.committed(),
            size_bytes: self.state.size_bytes.load(Ordering::Relaxed),
            segments: self.state.segments.load(Ordering::Relaxed),
            appends: self.state.appends.get(),
            bytes_appended: self.state.bytes_appended.get(),
            append_errors: self.state.append_errors.get(),
            segments_deleted: self.state.segments_deleted.get(),
            corrupt_segments: self.state.corrupt_segments.get(),
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Segment files in `dir`, sorted by base offset
fn list_segment_files(dir: &Path) -> Result<Vec<(u64, PathBuf)>> {
    let entries = fs::read_dir(dir).map_err(|e| JournalError::io(dir, e))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| JournalError::io(dir, e))?;
        let name = entry.file_name();
        if let Some(base_offset) = name.to_str().and_then(segment::parse_segment_file_name) {
            files.push((base_offset, entry.path()));
        }
    }
    files.sort_unstable_by_key(|(base_offset, _)| *base_offset);
    Ok(files)
}

/// Reason a recovered segment conflicts with the ones before it
fn overlap(previous: &[Segment], segment: &Segment) -> Option<&'static str> {
    let prev = previous.last()?;
    match segment.first_offset() {
        Some(first) if first < prev.next_offset() => Some("offsets overlap previous segment"),
        _ => None,
    }
}

fn read_committed_offset(dir: &Path) -> Option<u64> {
    let path = dir.join(COMMITTED_OFFSET_FILE);
    match fs::read_to_string(&path) {
        Ok(contents) => match contents.trim().parse::<u64>() {
            Ok(offset) => Some(offset),
            Err(_) => {
                warn!(
                    path = %path.display(),
                    "ignoring unparseable committed offset"
                );
                None
            }
        },
        Err(e) if e.kind() == io::ErrorKind::NotFound => None,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read committed offset");
            None
        }
    }
}

fn write_synced(path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(contents)?;
    file.sync_all()
}

#[cfg(test)]
#[path = "journal_test.rs"]
mod journal_test;
