//! Benchmarks for guarded call overhead
//!
//! This benchmark measures:
//! - Admission cost added on top of a bare async operation
//! - Failure accounting in the sliding window
//! - Fast rejection while the circuit is OPEN
//! - Snapshot cost under accumulated counters

use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tokio::runtime::Runtime;

use callguard::{CircuitBreaker, CircuitBreakerConfig};

fn wide_open_config() -> CircuitBreakerConfig {
    // High enough that benchmark iterations never trip the circuit.
    CircuitBreakerConfig::new()
        .with_failure_threshold(u32::MAX)
        .with_window(Duration::from_secs(1))
}

fn bench_guarded_call(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("guarded_call");

    group.bench_function("raw_future", |b| {
        b.to_async(&rt)
            .iter(|| async { black_box(Ok::<u64, &'static str>(42)) })
    });

    let breaker = CircuitBreaker::new("bench", wide_open_config()).unwrap();
    group.bench_function("closed_success", |b| {
        b.to_async(&rt).iter(|| async {
            breaker
                .call(|| async { Ok::<u64, &'static str>(black_box(42)) })
                .await
                .unwrap()
        })
    });

    let throttled = CircuitBreaker::new(
        "bench_throttled",
        wide_open_config().with_rate_limit(1_000_000_000.0, 1_000_000),
    )
    .unwrap();
    group.bench_function("closed_success_throttled", |b| {
        b.to_async(&rt).iter(|| async {
            throttled
                .call(|| async { Ok::<u64, &'static str>(black_box(42)) })
                .await
                .unwrap()
        })
    });

    let failing = CircuitBreaker::new("bench_failing", wide_open_config()).unwrap();
    group.bench_function("closed_failure", |b| {
        b.to_async(&rt).iter(|| async {
            let _ = failing
                .call(|| async { Err::<u64, &'static str>(black_box("boom")) })
                .await;
        })
    });

    let tripped = CircuitBreaker::new(
        "bench_tripped",
        CircuitBreakerConfig::new()
            .with_failure_threshold(1)
            .with_timeout(Duration::from_secs(3_600)),
    )
    .unwrap();
    rt.block_on(async {
        let _ = tripped
            .call(|| async { Err::<u64, &'static str>("trip") })
            .await;
    });
    group.bench_function("open_rejection", |b| {
        b.to_async(&rt).iter(|| async {
            let _ = tripped
                .call(|| async { Ok::<u64, &'static str>(42) })
                .await;
        })
    });

    group.finish();
}

fn bench_snapshot(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let breaker = CircuitBreaker::new("bench_snapshot", wide_open_config()).unwrap();
    rt.block_on(async {
        for i in 0..1_000u64 {
            let _ = breaker
                .call(|| async move {
                    if i % 3 == 0 {
                        Err::<u64, &'static str>("boom")
                    } else {
                        Ok(i)
                    }
                })
                .await;
        }
    });

    c.bench_function("breaker_snapshot", |b| {
        b.iter(|| black_box(breaker.snapshot()))
    });
}

criterion_group!(benches, bench_guarded_call, bench_snapshot);
criterion_main!(benches);
