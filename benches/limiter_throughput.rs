//! Benchmarks for token bucket throughput
//!
//! This benchmark measures:
//! - Acquisition cost with throttling disabled versus enabled
//! - Fast-fail cost against an empty bucket
//! - Snapshot and wait-estimate overhead

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use callguard::RateLimiter;

fn bench_try_acquire(c: &mut Criterion) {
    let mut group = c.benchmark_group("try_acquire");
    group.throughput(Throughput::Elements(1));

    let unlimited = RateLimiter::new(0.0, 0.0).unwrap();
    group.bench_function("unlimited", |b| {
        b.iter(|| black_box(unlimited.try_acquire(1)))
    });

    // Refill outpaces the benchmark loop, so the bucket never empties.
    let replenished = RateLimiter::new(1_000_000_000.0, 1_000_000.0).unwrap();
    group.bench_function("replenished", |b| {
        b.iter(|| black_box(replenished.try_acquire(1)))
    });

    let drained = RateLimiter::new(0.000_001, 1.0).unwrap();
    assert!(drained.try_acquire(1));
    group.bench_function("empty_bucket", |b| {
        b.iter(|| black_box(drained.try_acquire(1)))
    });

    group.finish();
}

fn bench_acquire_batch(c: &mut Criterion) {
    const BATCH: u64 = 1_000;
    let mut group = c.benchmark_group("acquire_batch");
    group.throughput(Throughput::Elements(BATCH));

    let limiter = RateLimiter::new(1_000_000_000.0, 1_000_000.0).unwrap();
    group.bench_function("replenished_1000", |b| {
        b.iter(|| {
            for _ in 0..BATCH {
                black_box(limiter.try_acquire(1));
            }
        })
    });

    group.finish();
}

fn bench_observation(c: &mut Criterion) {
    // Refill is negligible over the run, so the bucket stays empty throughout.
    let drained = RateLimiter::new(0.000_001, 4.0).unwrap();
    while drained.try_acquire(1) {}

    c.bench_function("estimated_wait_empty", |b| {
        b.iter(|| black_box(drained.estimated_wait(1)))
    });
    c.bench_function("limiter_snapshot", |b| {
        b.iter(|| black_box(drained.snapshot()))
    });
}

criterion_group!(benches, bench_try_acquire, bench_acquire_batch, bench_observation);
criterion_main!(benches);
