//! Benchmarks for trend bucketing and date parsing
//!
//! Run with: cargo bench

use chrono::{Duration, Local, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use healthbridge::health::parse_instant_at;
use healthbridge::query::{bucketize, GroupBy};

fn create_test_points(count: usize) -> Vec<(chrono::DateTime<Utc>, f64)> {
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    (0..count)
        .map(|i| (base + Duration::minutes(i as i64 * 7), (i % 180) as f64))
        .collect()
}

fn bench_bucketize(c: &mut Criterion) {
    let mut group = c.benchmark_group("bucketize");

    for size in [1_000, 10_000, 100_000] {
        let points = create_test_points(size);
        group.throughput(Throughput::Elements(size as u64));

        for group_by in [GroupBy::Day, GroupBy::Week, GroupBy::Month] {
            group.bench_function(format!("{}_{}", group_by, size), |b| {
                b.iter(|| bucketize(black_box(&points), group_by))
            });
        }
    }

    group.finish();
}

fn bench_date_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("dates");
    let now = Local.with_ymd_and_hms(2024, 3, 5, 12, 0, 0).unwrap();

    for input in ["now", "today", "7d", "3m", "2024-03-01", "2024-03-01T08:30:00Z"] {
        group.bench_function(input, |b| {
            b.iter(|| parse_instant_at(black_box(input), now).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_bucketize, bench_date_parsing);
criterion_main!(benches);
