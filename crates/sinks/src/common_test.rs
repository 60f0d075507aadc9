//! Tests for common sink types and line formatting

use super::*;
use bytes::Bytes;
use chrono::{TimeZone, Utc};

fn entry(offset: u64, payload: &'static [u8]) -> JournalEntry {
    JournalEntry {
        offset,
        payload: Bytes::from_static(payload),
        received_at: Utc.timestamp_millis_opt(1_700_000_000_123).unwrap(),
    }
}

#[test]
fn test_format_line_plain() {
    let mut buf = String::new();
    format_line(&entry(7, b"hello world"), false, &mut buf);
    assert_eq!(buf, "2023-11-14T22:13:20.123Z hello world\n");
}

#[test]
fn test_format_line_with_offset() {
    let mut buf = String::new();
    format_line(&entry(42, b"msg"), true, &mut buf);
    assert!(buf.starts_with("[42] 2023-11-14T22:13:20.123Z "));
}

#[test]
fn test_format_line_escapes_control_chars() {
    let mut buf = String::new();
    format_line(&entry(0, b"line1\nline2\tx\\y\x07"), false, &mut buf);
    assert!(buf.ends_with("line1\\nline2\\tx\\\\y\\x07\n"));
    assert_eq!(buf.matches('\n').count(), 1);
}

#[test]
fn test_format_line_binary_as_hex() {
    let mut buf = String::new();
    format_line(&entry(0, &[0xff, 0x00, 0xfe]), false, &mut buf);
    assert!(buf.ends_with(" 0xff00fe\n"));
}

#[test]
fn test_format_line_truncates_long_binary() {
    let payload: &'static [u8] = Box::leak(vec![0xffu8; 300].into_boxed_slice());
    let mut buf = String::new();
    format_line(&entry(0, payload), false, &mut buf);
    assert!(buf.ends_with("...(+44 bytes)\n"));
}

#[test]
fn test_format_batch() {
    let batch = vec![entry(1, b"a"), entry(2, b"b")];
    let out = format_batch(&batch, true);
    assert_eq!(out.lines().count(), 2);
    assert!(out.lines().nth(1).unwrap().starts_with("[2] "));
}

#[test]
fn test_error_helpers() {
    assert_eq!(SinkError::write("boom").to_string(), "write failed: boom");
    assert_eq!(
        SinkError::init("no path").to_string(),
        "failed to initialize sink: no path"
    );

    let io: SinkError = std::io::Error::other("disk full").into();
    assert!(matches!(io, SinkError::Io(_)));
}
