//! Tests for the null sink

use super::*;
use bytes::Bytes;
use chrono::Utc;

fn batch(count: usize) -> Vec<JournalEntry> {
    (0..count)
        .map(|i| JournalEntry {
            offset: i as u64,
            payload: Bytes::from(format!("test message {}", i)),
            received_at: Utc::now(),
        })
        .collect()
}

#[test]
fn test_metrics_record_batch() {
    let metrics = NullSinkMetrics::default();

    metrics.record_batch(100, 5000);
    metrics.record_batch(200, 10000);

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.batches_received, 2);
    assert_eq!(snapshot.messages_received, 300);
    assert_eq!(snapshot.bytes_received, 15000);
}

#[tokio::test]
async fn test_null_sink_counts_batches() {
    let sink = NullSink::new();

    sink.write(&batch(10)).await.unwrap();
    sink.write(&batch(20)).await.unwrap();

    let snapshot = sink.metrics().snapshot();
    assert_eq!(snapshot.batches_received, 2);
    assert_eq!(snapshot.messages_received, 30);
    assert!(snapshot.bytes_received > 0);
}

#[tokio::test]
async fn test_null_sink_empty_batch() {
    let sink = NullSink::new();
    sink.write(&[]).await.unwrap();
    sink.flush().await.unwrap();

    assert_eq!(
        sink.metrics().snapshot(),
        MetricsSnapshot {
            batches_received: 1,
            messages_received: 0,
            bytes_received: 0,
        }
    );
}
