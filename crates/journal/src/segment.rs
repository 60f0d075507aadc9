//! Journal segments
//!
//! A segment is one append-only file named after the offset of its first
//! record (`{base_offset:020}.log`). Only the active segment holds a writer;
//! sealed segments are immutable until retention deletes them.
//!
//! Each segment keeps a sparse in-memory index of `(offset, position)`
//! pairs, one every [`INDEX_INTERVAL_BYTES`], so reads can seek close to the
//! requested offset instead of scanning from the start of the file.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::{JournalError, Result};
use crate::record::{self, Decoded, JournalEntry, RECORD_HEADER_SIZE, RecordHeader};

/// Index one record every 4KB of segment data
pub const INDEX_INTERVAL_BYTES: u64 = 4096;

const LOG_SUFFIX: &str = ".log";
const CORRUPT_SUFFIX: &str = ".corrupt";
const WRITE_BUFFER_SIZE: usize = 64 * 1024;
const READ_BUFFER_SIZE: usize = 64 * 1024;

/// File name for a segment starting at `base_offset`
pub fn segment_file_name(base_offset: u64) -> String {
    format!("{:020}{}", base_offset, LOG_SUFFIX)
}

/// Parse the base offset out of a segment file name
pub fn parse_segment_file_name(name: &str) -> Option<u64> {
    let stem = name.strip_suffix(LOG_SUFFIX)?;
    if stem.len() != 20 || !stem.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    stem.parse().ok()
}

/// Rename a damaged segment out of the way, returning its new path
pub fn quarantine(path: &Path) -> io::Result<PathBuf> {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(CORRUPT_SUFFIX);
    let target = path.with_file_name(name);
    fs::rename(path, &target)?;
    Ok(target)
}

/// Outcome of scanning an existing segment file on open
#[derive(Debug)]
pub enum Recovery {
    /// Every record validated
    Clean(Segment),
    /// Trailing bytes did not form a valid record and were cut off
    Truncated {
        segment: Segment,
        dropped_bytes: u64,
        reason: &'static str,
    },
    /// A sealed segment failed validation and must not be used
    Corrupt { reason: &'static str },
}

/// Location of the bytes a read has to scan in one segment
#[derive(Debug, Clone)]
pub struct ReadView {
    pub path: PathBuf,
    pub start_position: u64,
    pub end_position: u64,
}

/// One segment file and its in-memory bookkeeping
#[derive(Debug)]
pub struct Segment {
    base_offset: u64,
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    size: u64,
    first_offset: Option<u64>,
    /// One past the last record's offset, or the base offset when empty
    next_offset: u64,
    index: Vec<(u64, u64)>,
    last_indexed_position: Option<u64>,
    created_at: SystemTime,
    last_modified: SystemTime,
}

impl Segment {
    /// Create a new, empty active segment in `dir`
    pub fn create(dir: &Path, base_offset: u64) -> Result<Self> {
        let path = dir.join(segment_file_name(base_offset));
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| JournalError::io(&path, e))?;

        let now = SystemTime::now();
        Ok(Self {
            base_offset,
            path,
            writer: Some(BufWriter::with_capacity(WRITE_BUFFER_SIZE, file)),
            size: 0,
            first_offset: None,
            next_offset: base_offset,
            index: Vec::new(),
            last_indexed_position: None,
            created_at: now,
            last_modified: now,
        })
    }

    /// Scan an existing segment file, validating every record
    ///
    /// Incomplete trailing records are always cut off. A checksum or
    /// ordering failure truncates the active segment but condemns a sealed
    /// one, since later records in it can no longer be trusted.
    pub fn recover(path: &Path, base_offset: u64, is_active: bool) -> Result<Recovery> {
        let data = fs::read(path).map_err(|e| JournalError::io(path, e))?;
        let metadata = fs::metadata(path).map_err(|e| JournalError::io(path, e))?;
        let last_modified = metadata.modified().unwrap_or_else(|_| SystemTime::now());
        let created_at = metadata.created().unwrap_or(last_modified);

        let mut segment = Self {
            base_offset,
            path: path.to_path_buf(),
            writer: None,
            size: 0,
            first_offset: None,
            next_offset: base_offset,
            index: Vec::new(),
            last_indexed_position: None,
            created_at,
            last_modified,
        };

        let max_payload = data.len();
        let mut position = 0usize;
        let mut failure: Option<(&'static str, bool)> = None;

        while position < data.len() {
            match record::decode(&data[position..], max_payload) {
                Decoded::Record(entry, len) => {
                    if entry.offset < segment.next_offset {
                        failure = Some(("offset out of order", false));
                        break;
                    }
                    segment.track_record(entry.offset, position as u64, len as u64);
                    position += len;
                }
                Decoded::Incomplete => {
                    failure = Some(("incomplete trailing record", true));
                    break;
                }
                Decoded::Corrupt(reason) => {
                    failure = Some((reason, false));
                    break;
                }
            }
        }

        let Some((reason, torn)) = failure else {
            return Ok(Recovery::Clean(segment));
        };

        if !torn && !is_active {
            return Ok(Recovery::Corrupt { reason });
        }

        let file = OpenOptions::new()
            .write(true)
            .open(path)
            .map_err(|e| JournalError::io(path, e))?;
        file.set_len(position as u64)
            .map_err(|e| JournalError::io(path, e))?;
        file.sync_all().map_err(|e| JournalError::io(path, e))?;

        Ok(Recovery::Truncated {
            dropped_bytes: (data.len() - position) as u64,
            segment,
            reason,
        })
    }

    /// Reopen a recovered segment so it can take appends
    pub fn open_for_append(&mut self) -> Result<()> {
        if self.writer.is_some() {
            return Ok(());
        }
        let file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|e| JournalError::io(&self.path, e))?;
        self.writer = Some(BufWriter::with_capacity(WRITE_BUFFER_SIZE, file));
        Ok(())
    }

    /// Append one encoded record
    ///
    /// The record reaches the OS before this returns, so it survives a
    /// process crash; fsync is left to the caller's policy.
    pub fn append(&mut self, encoded: &[u8], offset: u64, now: SystemTime) -> io::Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| io::Error::other("segment is sealed"))?;
        writer.write_all(encoded)?;
        writer.flush()?;

        self.track_record(offset, self.size, encoded.len() as u64);
        self.last_modified = now;
        Ok(())
    }

    fn track_record(&mut self, offset: u64, position: u64, len: u64) {
        let due = self
            .last_indexed_position
            .is_none_or(|last| position - last >= INDEX_INTERVAL_BYTES);
        if due {
            self.index.push((offset, position));
            self.last_indexed_position = Some(position);
        }
        self.first_offset.get_or_insert(offset);
        self.next_offset = offset + 1;
        self.size = position + len;
    }

    /// Push buffered bytes to the OS, optionally fsyncing
    pub fn flush(&mut self, sync: bool) -> io::Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush()?;
            if sync {
                writer.get_ref().sync_data()?;
            }
        }
        Ok(())
    }

    /// Flush, fsync and drop the writer; the segment becomes immutable
    pub fn seal(&mut self) -> io::Result<()> {
        self.flush(true)?;
        self.writer = None;
        Ok(())
    }

    /// Byte range a read starting at `from` has to scan
    pub fn read_view(&self, from: u64) -> ReadView {
        let idx = self.index.partition_point(|(offset, _)| *offset <= from);
        let start_position = if idx == 0 { 0 } else { self.index[idx - 1].1 };
        ReadView {
            path: self.path.clone(),
            start_position,
            end_position: self.size,
        }
    }

    pub fn base_offset(&self) -> u64 {
        self.base_offset
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn first_offset(&self) -> Option<u64> {
        self.first_offset
    }

    /// Offset of the last record, if the segment holds any
    pub fn last_offset(&self) -> Option<u64> {
        self.first_offset.map(|_| self.next_offset - 1)
    }

    pub fn next_offset(&self) -> u64 {
        self.next_offset
    }

    pub fn is_empty(&self) -> bool {
        self.first_offset.is_none()
    }

    pub fn is_sealed(&self) -> bool {
        self.writer.is_none()
    }

    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    pub fn last_modified(&self) -> SystemTime {
        self.last_modified
    }

    #[cfg(test)]
    pub fn index_len(&self) -> usize {
        self.index.len()
    }
}

/// Read entries with `offset >= from` from one segment into `out`
///
/// Stops at `end_position` so bytes appended after the view was taken are
/// never half-read, and once `out` holds `max` entries.
pub fn read_entries(
    view: &ReadView,
    from: u64,
    max: usize,
    out: &mut Vec<JournalEntry>,
) -> io::Result<()> {
    let mut file = File::open(&view.path)?;
    file.seek(SeekFrom::Start(view.start_position))?;
    let mut reader = BufReader::with_capacity(READ_BUFFER_SIZE, file);

    let mut position = view.start_position;
    let mut header_buf = [0u8; RECORD_HEADER_SIZE];

    while out.len() < max && position + RECORD_HEADER_SIZE as u64 <= view.end_position {
        reader.read_exact(&mut header_buf)?;
        let header = RecordHeader::parse(&header_buf);
        let record_len = header.record_len() as u64;
        if position + record_len > view.end_position {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "record extends past segment end",
            ));
        }

        if header.offset < from {
            reader.seek_relative(header.length as i64)?;
        } else {
            let mut payload = vec![0u8; header.length as usize];
            reader.read_exact(&mut payload)?;
            if !header.verify(&payload) {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("checksum mismatch at offset {}", header.offset),
                ));
            }
            out.push(JournalEntry {
                offset: header.offset,
                payload: payload.into(),
                received_at: record::timestamp_from_millis(header.timestamp_ms),
            });
        }
        position += record_len;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;
    use tempfile::TempDir;

    fn append(segment: &mut Segment, offset: u64, payload: &[u8]) {
        let mut buf = BytesMut::new();
        record::encode(&mut buf, offset, 0, payload);
        segment.append(&buf, offset, SystemTime::now()).unwrap();
    }

    #[test]
    fn test_file_name_round_trip() {
        assert_eq!(segment_file_name(42), "00000000000000000042.log");
        assert_eq!(parse_segment_file_name("00000000000000000042.log"), Some(42));
        assert_eq!(parse_segment_file_name("42.log"), None);
        assert_eq!(
            parse_segment_file_name("00000000000000000042.log.corrupt"),
            None
        );
        assert_eq!(parse_segment_file_name("committed-read-offset"), None);
    }

    #[test]
    fn test_create_refuses_existing_file() {
        let dir = TempDir::new().unwrap();
        Segment::create(dir.path(), 0).unwrap();
        assert!(Segment::create(dir.path(), 0).is_err());
    }

    #[test]
    fn test_append_and_read_back() {
        let dir = TempDir::new().unwrap();
        let mut segment = Segment::create(dir.path(), 10).unwrap();
        for offset in 10..15 {
            append(&mut segment, offset, format!("msg-{}", offset).as_bytes());
        }
        segment.flush(false).unwrap();

        assert_eq!(segment.first_offset(), Some(10));
        assert_eq!(segment.last_offset(), Some(14));
        assert_eq!(segment.next_offset(), 15);

        let mut out = Vec::new();
        read_entries(&segment.read_view(12), 12, 10, &mut out).unwrap();
        let offsets: Vec<_> = out.iter().map(|e| e.offset).collect();
        assert_eq!(offsets, vec![12, 13, 14]);
        assert_eq!(&out[0].payload[..], b"msg-12");
    }

    #[test]
    fn test_read_respects_max() {
        let dir = TempDir::new().unwrap();
        let mut segment = Segment::create(dir.path(), 0).unwrap();
        for offset in 0..10 {
            append(&mut segment, offset, b"x");
        }
        segment.flush(false).unwrap();

        let mut out = Vec::new();
        read_entries(&segment.read_view(0), 0, 3, &mut out).unwrap();
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn test_sparse_index_used_for_seek() {
        let dir = TempDir::new().unwrap();
        let mut segment = Segment::create(dir.path(), 0).unwrap();
        let payload = vec![7u8; 1000];
        for offset in 0..20 {
            append(&mut segment, offset, &payload);
        }
        segment.flush(false).unwrap();

        // ~1KB records, one index entry per 4KB
        assert!(segment.index_len() > 1);
        assert!(segment.index_len() < 20);

        let view = segment.read_view(19);
        assert!(view.start_position > 0);

        let mut out = Vec::new();
        read_entries(&view, 19, 10, &mut out).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].offset, 19);
    }

    #[test]
    fn test_recover_clean() {
        let dir = TempDir::new().unwrap();
        let path = {
            let mut segment = Segment::create(dir.path(), 5).unwrap();
            append(&mut segment, 5, b"a");
            append(&mut segment, 6, b"b");
            segment.seal().unwrap();
            segment.path().to_path_buf()
        };

        match Segment::recover(&path, 5, false).unwrap() {
            Recovery::Clean(segment) => {
                assert_eq!(segment.first_offset(), Some(5));
                assert_eq!(segment.next_offset(), 7);
                assert!(segment.is_sealed());
            }
            other => panic!("expected clean recovery, got {:?}", other),
        }
    }

    #[test]
    fn test_recover_truncates_torn_tail() {
        let dir = TempDir::new().unwrap();
        let path = {
            let mut segment = Segment::create(dir.path(), 0).unwrap();
            append(&mut segment, 0, b"complete");
            segment.seal().unwrap();
            segment.path().to_path_buf()
        };
        let valid_len = fs::metadata(&path).unwrap().len();

        // Half a header from a write that never finished
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&[0u8; 10]).unwrap();
        drop(file);

        match Segment::recover(&path, 0, true).unwrap() {
            Recovery::Truncated {
                segment,
                dropped_bytes,
                ..
            } => {
                assert_eq!(dropped_bytes, 10);
                assert_eq!(segment.next_offset(), 1);
            }
            other => panic!("expected truncation, got {:?}", other),
        }
        assert_eq!(fs::metadata(&path).unwrap().len(), valid_len);
    }

    #[test]
    fn test_recover_sealed_checksum_failure_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = {
            let mut segment = Segment::create(dir.path(), 0).unwrap();
            append(&mut segment, 0, b"first");
            append(&mut segment, 1, b"second");
            segment.seal().unwrap();
            segment.path().to_path_buf()
        };

        let mut data = fs::read(&path).unwrap();
        data[RECORD_HEADER_SIZE] ^= 0xff;
        fs::write(&path, &data).unwrap();

        assert!(matches!(
            Segment::recover(&path, 0, false).unwrap(),
            Recovery::Corrupt { .. }
        ));
    }

    #[test]
    fn test_quarantine_renames() {
        let dir = TempDir::new().unwrap();
        let segment = Segment::create(dir.path(), 3).unwrap();
        let path = segment.path().to_path_buf();
        drop(segment);

        let target = quarantine(&path).unwrap();
        assert!(!path.exists());
        assert!(target.exists());
        assert!(
            target
                .to_string_lossy()
                .ends_with("00000000000000000003.log.corrupt")
        );
    }
}
