use super::*;
use std::collections::HashSet;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

#[test]
fn test_capacity_four_rejects_fifth() {
    let buffer = RingBuffer::new("test", 4);

    for i in 1..=4 {
        assert!(buffer.put(i).is_ok());
    }
    assert!(buffer.is_full());
    assert_eq!(buffer.put(5), Err(5));

    assert_eq!(buffer.take(), Some(1));
    assert!(buffer.put(5).is_ok());

    let drained: Vec<_> = std::iter::from_fn(|| buffer.take()).collect();
    assert_eq!(drained, vec![2, 3, 4, 5]);
    assert!(buffer.is_empty());
}

#[test]
fn test_take_empty() {
    let buffer = RingBuffer::<u8>::new("test", 2);
    assert_eq!(buffer.take(), None);
    assert!(buffer.drain_batch(10).is_empty());
}

#[test]
fn test_zero_capacity_raised_to_one() {
    let buffer = RingBuffer::new("test", 0);
    assert_eq!(buffer.capacity(), 1);
    assert!(buffer.put(1).is_ok());
    assert!(buffer.put(2).is_err());
}

#[test]
fn test_drain_batch_fifo_and_bounded() {
    let buffer = RingBuffer::new("test", 8);
    for i in 0..6 {
        buffer.put(i).unwrap();
    }

    assert_eq!(buffer.drain_batch(4), vec![0, 1, 2, 3]);
    assert_eq!(buffer.len(), 2);
    assert_eq!(buffer.drain_batch(10), vec![4, 5]);
    assert!(buffer.is_empty());
}

#[test]
fn test_wraparound_preserves_order() {
    let buffer = RingBuffer::new("test", 3);
    let mut expected = Vec::new();
    let mut taken = Vec::new();

    for round in 0..10 {
        buffer.put(round * 2).unwrap();
        buffer.put(round * 2 + 1).unwrap();
        expected.extend([round * 2, round * 2 + 1]);
        taken.extend(buffer.drain_batch(2));
    }

    assert_eq!(taken, expected);
}

#[test]
fn test_metrics_handle_counts() {
    let buffer = RingBuffer::new("output", 2);
    let handle = buffer.metrics_handle();

    buffer.put(1).unwrap();
    buffer.put(2).unwrap();
    let _ = buffer.put(3);
    buffer.take();

    let snapshot = handle.snapshot();
    assert_eq!(handle.buffer_name(), "output");
    assert_eq!(snapshot.capacity, 2);
    assert_eq!(snapshot.len, 1);
    assert_eq!(snapshot.puts, 2);
    assert_eq!(snapshot.rejected, 1);
    assert_eq!(snapshot.taken, 1);
    assert_eq!(snapshot.utilization_percent, 50.0);
}

#[test]
fn test_concurrent_producers_consumers_exact() {
    const PRODUCERS: usize = 4;
    const PER_PRODUCER: usize = 5_000;

    let buffer = Arc::new(RingBuffer::new("test", 64));
    let done = Arc::new(AtomicBool::new(false));

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let buffer = Arc::clone(&buffer);
            std::thread::spawn(move || {
                for i in 0..PER_PRODUCER {
                    let mut item = p * PER_PRODUCER + i;
                    while let Err(back) = buffer.put(item) {
                        item = back;
                        std::thread::yield_now();
                    }
                }
            })
        })
        .collect();

    let consumers: Vec<_> = (0..2)
        .map(|_| {
            let buffer = Arc::clone(&buffer);
            let done = Arc::clone(&done);
            std::thread::spawn(move || {
                let mut seen = Vec::new();
                loop {
                    let finished = done.load(Ordering::Acquire);
                    match buffer.take() {
                        Some(item) => seen.push(item),
                        None if finished => break,
                        None => std::thread::yield_now(),
                    }
                }
                seen
            })
        })
        .collect();

    for producer in producers {
        producer.join().unwrap();
    }
    done.store(true, Ordering::Release);

    let mut all = HashSet::new();
    let mut total = 0;
    for consumer in consumers {
        let seen = consumer.join().unwrap();
        total += seen.len();
        all.extend(seen);
    }

    // Every item handed out exactly once
    assert_eq!(total, PRODUCERS * PER_PRODUCER);
    assert_eq!(all.len(), PRODUCERS * PER_PRODUCER);
    assert!(buffer.is_empty());
}

#[tokio::test]
async fn test_wait_for_items_wakes_on_put() {
    let buffer = Arc::new(RingBuffer::new("test", 4));

    let waiter = {
        let buffer = Arc::clone(&buffer);
        tokio::spawn(async move {
            buffer.wait_for_items().await;
            buffer.take()
        })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    buffer.put(42).unwrap();

    let got = tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .expect("waiter should wake")
        .unwrap();
    assert_eq!(got, Some(42));
}

#[tokio::test]
async fn test_wait_for_space_wakes_on_take() {
    let buffer = Arc::new(RingBuffer::new("test", 1));
    buffer.put(1).unwrap();

    let waiter = {
        let buffer = Arc::clone(&buffer);
        tokio::spawn(async move {
            buffer.wait_for_space().await;
            buffer.put(2)
        })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(buffer.take(), Some(1));

    let result = tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .expect("waiter should wake")
        .unwrap();
    assert!(result.is_ok());
    assert_eq!(buffer.take(), Some(2));
}

#[tokio::test]
async fn test_wait_returns_immediately_when_ready() {
    let buffer = RingBuffer::new("test", 2);
    buffer.put(1).unwrap();

    tokio::time::timeout(Duration::from_millis(100), buffer.wait_for_items())
        .await
        .expect("items already present");
    tokio::time::timeout(Duration::from_millis(100), buffer.wait_for_space())
        .await
        .expect("space already present");
}

#[tokio::test]
async fn test_wait_for_len_needs_threshold() {
    let buffer = Arc::new(RingBuffer::new("test", 8));

    let waiter = {
        let buffer = Arc::clone(&buffer);
        tokio::spawn(async move { buffer.wait_for_len(3).await })
    };

    buffer.put(1).unwrap();
    buffer.put(2).unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!waiter.is_finished());

    buffer.put(3).unwrap();
    tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .expect("threshold reached")
        .unwrap();
}

#[tokio::test]
async fn test_wait_for_len_clamped_to_capacity() {
    let buffer = RingBuffer::new("test", 2);
    buffer.put(1).unwrap();
    buffer.put(2).unwrap();

    tokio::time::timeout(Duration::from_millis(100), buffer.wait_for_len(500))
        .await
        .expect("full buffer satisfies any threshold");
}
