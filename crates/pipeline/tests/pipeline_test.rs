//! End-to-end pipeline tests: ingest, journal, replay and delivery

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use sluice_config::{
    BuffersConfig, Config, DispatcherConfig, FileSinkConfig, JournalConfig, ProcessingConfig,
    SinkConfig,
};
use sluice_journal::{CommitLogJournal, JournalEntry};
use sluice_metrics::{BufferMetricsProvider, DispatcherMetricsProvider, PipelineMetricsProvider};
use sluice_pipeline::{IngestOutcome, Pipeline};
use sluice_sinks::{Sink, SinkError};
use tempfile::TempDir;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// Keeps every delivered payload
#[derive(Default)]
struct CollectingSink {
    delivered: Mutex<Vec<(u64, Bytes)>>,
}

impl CollectingSink {
    fn payloads(&self) -> Vec<Bytes> {
        let mut delivered = self.delivered.lock().clone();
        delivered.sort_by_key(|(offset, _)| *offset);
        delivered.into_iter().map(|(_, payload)| payload).collect()
    }

    fn len(&self) -> usize {
        self.delivered.lock().len()
    }
}

#[async_trait]
impl Sink for CollectingSink {
    fn name(&self) -> &'static str {
        "collecting"
    }

    async fn write(&self, batch: &[JournalEntry]) -> Result<(), SinkError> {
        self.delivered
            .lock()
            .extend(batch.iter().map(|e| (e.offset, e.payload.clone())));
        Ok(())
    }
}

/// Holds every write until released
struct GatedSink {
    open: Semaphore,
    delivered: AtomicUsize,
}

impl Default for GatedSink {
    fn default() -> Self {
        Self {
            open: Semaphore::new(0),
            delivered: AtomicUsize::new(0),
        }
    }
}

impl GatedSink {
    fn release(&self) {
        self.open.add_permits(Semaphore::MAX_PERMITS / 2);
    }

    fn len(&self) -> usize {
        self.delivered.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Sink for GatedSink {
    fn name(&self) -> &'static str {
        "gated"
    }

    async fn write(&self, batch: &[JournalEntry]) -> Result<(), SinkError> {
        let _permit = self.open.acquire().await.map_err(|_| SinkError::Closed)?;
        self.delivered.fetch_add(batch.len(), Ordering::SeqCst);
        Ok(())
    }
}

fn test_config(dir: &TempDir) -> Config {
    Config {
        journal: JournalConfig {
            path: dir.path().join("journal"),
            max_segment_size: 4096,
            flush_interval: Duration::from_millis(20),
            ..Default::default()
        },
        processing: ProcessingConfig { workers: 2 },
        dispatcher: DispatcherConfig {
            batch_size: 16,
            flush_interval: Duration::from_millis(10),
            ..Default::default()
        },
        ..Default::default()
    }
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition should hold");
}

#[tokio::test]
async fn test_messages_flow_to_sink_and_commit() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);
    let sink = Arc::new(CollectingSink::default());
    let pipeline = Pipeline::with_sink(&config, sink.clone())
        .unwrap()
        .with_reader_poll_interval(Duration::from_millis(5));
    let ingestor = pipeline.ingestor();
    let counters = pipeline.pipeline_metrics();
    let delivered = pipeline.dispatcher_metrics();

    let cancel = CancellationToken::new();
    let tasks = pipeline.spawn(cancel.clone());

    for i in 0..100 {
        let outcome = ingestor.ingest(format!("message {i}").as_bytes()).unwrap();
        assert!(outcome.is_accepted());
    }

    // One chunked message in shuffled order
    let id = b"chunked!";
    for (index, part) in [(2u8, "c"), (0, "a"), (1, "b")] {
        ingestor
            .on_chunk(id, index, 3, Bytes::copy_from_slice(part.as_bytes()))
            .unwrap();
    }

    wait_until(|| sink.len() == 101).await;
    cancel.cancel();
    tasks.join().await.unwrap();

    let payloads = sink.payloads();
    assert_eq!(&payloads[0][..], b"message 0");
    assert_eq!(&payloads[99][..], b"message 99");
    assert_eq!(&payloads[100][..], b"abc");

    let snapshot = counters.pipeline_snapshot();
    assert_eq!(snapshot.messages_accepted, 101);
    assert_eq!(snapshot.messages_read, 101);
    assert_eq!(delivered.snapshot().messages_written, 101);

    let journal = CommitLogJournal::open(&config.journal).unwrap();
    assert_eq!(journal.committed_read_offset(), Some(100));
    assert_eq!(journal.log_end_offset(), 101);
}

#[tokio::test]
async fn test_undelivered_entries_replay_after_restart() {
    let dir = TempDir::new().unwrap();
    let config = test_config(&dir);

    // Accept without running any loops, then stop
    {
        let pipeline = Pipeline::with_sink(&config, Arc::new(CollectingSink::default())).unwrap();
        let ingestor = pipeline.ingestor();
        for i in 0..10u8 {
            ingestor.ingest(&[b'0' + i]).unwrap();
        }
        pipeline.journal().close().unwrap();
    }

    let sink = Arc::new(CollectingSink::default());
    let pipeline = Pipeline::with_sink(&config, sink.clone())
        .unwrap()
        .with_reader_poll_interval(Duration::from_millis(5));
    let cancel = CancellationToken::new();
    let tasks = pipeline.spawn(cancel.clone());

    wait_until(|| sink.len() == 10).await;
    cancel.cancel();
    tasks.join().await.unwrap();
    assert_eq!(&sink.payloads()[9][..], b"9");

    // Everything was committed, so a third run replays nothing
    let sink = Arc::new(CollectingSink::default());
    let pipeline = Pipeline::with_sink(&config, sink.clone())
        .unwrap()
        .with_reader_poll_interval(Duration::from_millis(5));
    let ingestor = pipeline.ingestor();
    let cancel = CancellationToken::new();
    let tasks = pipeline.spawn(cancel.clone());

    assert_eq!(
        ingestor.ingest(b"fresh").unwrap(),
        IngestOutcome::Accepted { offset: 10 }
    );
    wait_until(|| sink.len() == 1).await;
    cancel.cancel();
    tasks.join().await.unwrap();
    assert_eq!(&sink.payloads()[0][..], b"fresh");
}

#[tokio::test]
async fn test_stalled_sink_throttles_ingest_until_drained() {
    let dir = TempDir::new().unwrap();
    let config = Config {
        buffers: BuffersConfig {
            process_capacity: 4,
            output_capacity: 4,
        },
        ..test_config(&dir)
    };
    let sink = Arc::new(GatedSink::default());
    let pipeline = Pipeline::with_sink(&config, sink.clone())
        .unwrap()
        .with_reader_poll_interval(Duration::from_millis(5));
    let ingestor = pipeline.ingestor();
    let counters = pipeline.pipeline_metrics();
    let process = pipeline.process_buffer_metrics();

    let cancel = CancellationToken::new();
    let tasks = pipeline.spawn(cancel.clone());

    // The sink holds every write, so both buffers fill and the gate closes
    let mut accepted = 0u64;
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match ingestor.ingest(b"payload").unwrap() {
                IngestOutcome::Accepted { .. } => accepted += 1,
                IngestOutcome::Throttled => break,
                IngestOutcome::Pending => unreachable!(),
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("ingest should be throttled");

    assert!(ingestor.is_throttled());
    assert_eq!(process.snapshot().utilization_percent, 100.0);
    assert!(counters.pipeline_snapshot().throttle_active);
    assert_eq!(counters.pipeline_snapshot().messages_throttled, 1);

    sink.release();
    wait_until(|| sink.len() as u64 == accepted).await;
    wait_until(|| ingestor.ingest(b"again").unwrap().is_accepted()).await;
    assert!(!counters.pipeline_snapshot().throttle_active);

    cancel.cancel();
    tasks.join().await.unwrap();
}

#[tokio::test]
async fn test_file_sink_end_to_end() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("out").join("messages.log");
    let config = Config {
        sink: SinkConfig::File(FileSinkConfig {
            path: out.clone(),
            sync: false,
        }),
        ..test_config(&dir)
    };
    let pipeline = Pipeline::new(&config)
        .unwrap()
        .with_reader_poll_interval(Duration::from_millis(5));
    let ingestor = pipeline.ingestor();
    let delivered = pipeline.dispatcher_metrics();
    assert_eq!(delivered.sink_type(), "file");

    let cancel = CancellationToken::new();
    let tasks = pipeline.spawn(cancel.clone());

    ingestor.ingest(b"{\"short_message\":\"one\"}").unwrap();
    ingestor.ingest(b"two\nlines").unwrap();
    wait_until(|| delivered.snapshot().messages_written == 2).await;

    cancel.cancel();
    tasks.join().await.unwrap();

    let written = std::fs::read_to_string(&out).unwrap();
    let lines: Vec<&str> = written.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].ends_with("{\"short_message\":\"one\"}"));
    assert!(lines[1].ends_with("two\\nlines"));
}
