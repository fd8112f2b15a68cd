//! # Redemption Engine Benchmarks
//!
//! Hot paths of the engine over the in-memory adapters:
//!
//! | Group | Operation | Notes |
//! |-------|-----------|-------|
//! | validate | `validate` on a live token | records a Scan per call |
//! | redeem | `redeem` on a fresh token | conditional batch commit |
//! | generate | `generate_batch` | one atomic batch per call |

use criterion::{
    black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput,
};
use redemption_engine::test_utils::{admin, operator, TestHarness, TINY_PNG_DATA_URL};
use redemption_engine::{AdministrationApi, RedemptionApi, ScanContext};
use std::time::Duration;

fn bench_validate(c: &mut Criterion) {
    let mut group = c.benchmark_group("validate");
    group.measurement_time(Duration::from_secs(5));

    let harness = TestHarness::new();
    let voucher = harness.open_voucher();
    let token = harness.issue_one(voucher.id);
    let context = ScanContext::new("10.0.0.1", "bench");

    group.bench_function("live_token", |b| {
        b.iter(|| {
            black_box(
                harness
                    .service
                    .validate(token.as_str(), &operator(), &context)
                    .is_ok(),
            )
        })
    });

    group.bench_function("unknown_token", |b| {
        b.iter(|| {
            black_box(
                harness
                    .service
                    .validate("no-such-token", &operator(), &context)
                    .is_err(),
            )
        })
    });

    group.finish();
}

fn bench_redeem(c: &mut Criterion) {
    let mut group = c.benchmark_group("redeem");
    group.measurement_time(Duration::from_secs(5));

    let harness = TestHarness::new();
    let voucher = harness.open_voucher();

    group.bench_function("unsigned", |b| {
        b.iter_batched(
            || harness.issue_one(voucher.id),
            |token| black_box(harness.service.redeem(token.as_str(), &operator(), None).is_ok()),
            BatchSize::SmallInput,
        )
    });

    group.bench_function("signed", |b| {
        b.iter_batched(
            || harness.issue_one(voucher.id),
            |token| {
                black_box(
                    harness
                        .service
                        .redeem(token.as_str(), &operator(), Some(TINY_PNG_DATA_URL))
                        .is_ok(),
                )
            },
            BatchSize::SmallInput,
        )
    });

    group.finish();
}

fn bench_generate_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("generate");
    group.measurement_time(Duration::from_secs(10));
    group.sample_size(20);

    for size in [10u32, 100, 1000] {
        let harness = TestHarness::new();
        let voucher = harness.open_voucher();

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("batch", size), &size, |b, &size| {
            b.iter(|| {
                black_box(
                    harness
                        .service
                        .generate_batch(&admin(), voucher.id, size, None)
                        .is_ok(),
                )
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_validate, bench_redeem, bench_generate_batch);

criterion_main!(benches);
