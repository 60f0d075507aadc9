//! Sluice - Journal
//!
//! Durable, append-only commit log that sits between ingest and delivery.
//!
//! # Overview
//!
//! - Messages are appended to segment files and get dense, strictly
//!   increasing offsets
//! - Delivery progress is tracked with a monotonic committed read offset,
//!   persisted on flush
//! - On open, partially written records are truncated and damaged sealed
//!   segments are quarantined
//! - Retention deletes fully committed segments by age or total size
//!
//! # Layout
//!
//! ```text
//! data/journal/
//! ├── 00000000000000000000.log     sealed
//! ├── 00000000000000004213.log     active
//! └── committed-read-offset        "4200"
//! ```
//!
//! # Example
//!
//! ```no_run
//! use sluice_config::JournalConfig;
//! use sluice_journal::CommitLogJournal;
//!
//! let journal = CommitLogJournal::open(&JournalConfig::default())?;
//! let offset = journal.append(b"hello")?;
//! let entries = journal.read(offset, 10)?;
//! assert_eq!(&entries[0].payload[..], b"hello");
//! journal.commit(offset)?;
//! journal.close()?;
//! # Ok::<(), sluice_journal::JournalError>(())
//! ```

mod error;
mod journal;
mod record;
mod segment;

pub use error::{JournalError, Result};
pub use journal::{COMMITTED_OFFSET_FILE, CommitLogJournal, JournalMetricsHandle, SegmentInfo};
pub use record::{JournalEntry, RECORD_HEADER_SIZE};
pub use segment::{INDEX_INTERVAL_BYTES, segment_file_name};
