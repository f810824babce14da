//! Load testing for the breaker under concurrent callers.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tripwire::notification::EventKind;
use tripwire::{BreakerOptions, BreakerState, CircuitBreaker, LocalEventBus};

mod common;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_failures_open_once() {
    let bus = LocalEventBus::with_capacity(1024);
    let mut rx = bus.subscribe("cb.load");
    let breaker = CircuitBreaker::with_channel(
        "load",
        BreakerOptions::new()
            .with_max_failures(5)
            .with_notification_address("cb.load"),
        Arc::new(bus),
    );

    let concurrency = 20;
    let requests_per_task = 10;
    let invoked = Arc::new(AtomicU32::new(0));

    let mut tasks = Vec::new();
    for _ in 0..concurrency {
        let breaker = breaker.clone();
        let invoked = invoked.clone();
        tasks.push(tokio::spawn(async move {
            let mut rejected = 0;
            for _ in 0..requests_per_task {
                let invoked = invoked.clone();
                let result = breaker
                    .execute(|| async move {
                        invoked.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(1)).await;
                        Err::<(), _>("unavailable")
                    })
                    .await;
                if matches!(result, Err(ref e) if e.is_open_circuit()) {
                    rejected += 1;
                }
            }
            rejected
        }));
    }

    let mut rejected = 0;
    for task in tasks {
        rejected += task.await.unwrap();
    }

    assert_eq!(breaker.state(), BreakerState::Open);
    assert_eq!(breaker.failure_count(), 5);
    let total = (concurrency * requests_per_task) as u32;
    assert_eq!(invoked.load(Ordering::SeqCst) + rejected, total);

    // Events are delivered by the breaker's background task.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let kinds = common::drain_kinds(&mut rx);
    let opens = kinds.iter().filter(|k| **k == EventKind::Open).count();
    assert_eq!(opens, 1, "events: {kinds:?}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_closed_throughput() {
    let breaker = CircuitBreaker::new("hot", BreakerOptions::new().with_timeout_ms(1_000));

    let concurrency = 20;
    let requests_per_task = 50;
    let total_requests = concurrency * requests_per_task;
    let start = Instant::now();

    let mut tasks = Vec::new();
    for _ in 0..concurrency {
        let breaker = breaker.clone();
        tasks.push(tokio::spawn(async move {
            let mut latencies = Vec::new();
            for i in 0..requests_per_task {
                let req_start = Instant::now();
                if breaker.execute(|| async move { Ok::<_, ()>(i) }).await.is_ok() {
                    latencies.push(req_start.elapsed());
                }
            }
            latencies
        }));
    }

    let mut all_latencies = Vec::new();
    for task in tasks {
        all_latencies.extend(task.await.unwrap());
    }
    let duration = start.elapsed();

    assert_eq!(all_latencies.len(), total_requests);
    assert_eq!(breaker.state(), BreakerState::Closed);
    assert_eq!(breaker.failure_count(), 0);

    all_latencies.sort();
    let p50 = all_latencies[all_latencies.len() / 2];
    let p99 = all_latencies[(all_latencies.len() as f64 * 0.99) as usize];

    println!("\n--- Breaker Load Results ---");
    println!("Total Calls:    {}", total_requests);
    println!("Concurrency:    {}", concurrency);
    println!("Total Duration: {:?}", duration);
    println!("Calls/sec:      {:.2}", total_requests as f64 / duration.as_secs_f64());
    println!("P50 Latency:    {:?}", p50);
    println!("P99 Latency:    {:?}", p99);
    println!("----------------------------\n");
}
