use std::sync::Arc;

use cardinality_analytics::{AnalyticsConfig, AnalyticsService, MemoryStore, Sketch};
use criterion::measurement::WallTime;
use criterion::{
    black_box, criterion_group, criterion_main, BenchmarkGroup, BenchmarkId, Criterion, Throughput,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Add and estimate operations are benchmarked against cardinalities ranging from 0 to
/// `DEFAULT_MAX_CARDINALITY` or environment variable `N` (if defined) with cardinality
/// doubled with every iteration as [0, 1, 2, ..., N].
const DEFAULT_MAX_CARDINALITY: usize = 1 << 16;
/// Precisions benchmarked for every operation
const PRECISIONS: [u8; 3] = [10, 14, 16];

criterion_group!(benches, benchmark);
criterion_main!(benches);

fn benchmark(c: &mut Criterion) {
    let max_cardinality = std::env::var("N")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_MAX_CARDINALITY);

    let cardinalities: Vec<usize> = std::iter::once(0)
        .chain((0..).map(|c| 1 << c))
        .take_while(|&c| c <= max_cardinality)
        .step_by(4)
        .collect();

    let mut group = c.benchmark_group("add");
    for &precision in &PRECISIONS {
        for &cardinality in &cardinalities {
            group.throughput(Throughput::Elements(cardinality.max(1) as u64));
            bench_add(&mut group, precision, cardinality);
        }
    }
    group.finish();

    let mut group = c.benchmark_group("estimate");
    group.throughput(Throughput::Elements(1));
    for &precision in &PRECISIONS {
        for &cardinality in &cardinalities {
            bench_estimate(&mut group, precision, cardinality);
        }
    }
    group.finish();

    let mut group = c.benchmark_group("merge");
    group.throughput(Throughput::Elements(1));
    for &precision in &PRECISIONS {
        bench_merge(&mut group, precision, max_cardinality);
    }
    group.finish();

    let mut group = c.benchmark_group("ingest");
    for &keys in &[1usize, 16, 256] {
        group.throughput(Throughput::Elements(1_000));
        bench_ingest(&mut group, keys);
    }
    group.finish();
}

fn values(cardinality: usize) -> Vec<String> {
    let mut rng = StdRng::seed_from_u64(12345);
    (0..cardinality)
        .map(|_| format!("user_{}", rng.gen::<u64>()))
        .collect()
}

fn filled(precision: u8, values: &[String]) -> Sketch {
    let mut sketch = Sketch::new(precision).unwrap();
    for v in values {
        sketch.add(v);
    }
    sketch
}

fn bench_add(group: &mut BenchmarkGroup<WallTime>, precision: u8, cardinality: usize) {
    let values = values(cardinality);
    group.bench_with_input(
        BenchmarkId::new(format!("p{precision}"), cardinality),
        &values,
        |b, values| {
            b.iter(|| {
                let mut sketch = Sketch::new(precision).unwrap();
                for v in values {
                    sketch.add(black_box(v));
                }
                sketch
            });
        },
    );
}

fn bench_estimate(group: &mut BenchmarkGroup<WallTime>, precision: u8, cardinality: usize) {
    let sketch = filled(precision, &values(cardinality));
    group.bench_with_input(
        BenchmarkId::new(format!("p{precision}"), cardinality),
        &sketch,
        |b, sketch| b.iter(|| black_box(sketch).estimate()),
    );
}

fn bench_merge(group: &mut BenchmarkGroup<WallTime>, precision: u8, cardinality: usize) {
    let all = values(cardinality * 2);
    let (lhs_values, rhs_values) = all.split_at(cardinality);
    let lhs = filled(precision, lhs_values);
    let rhs = filled(precision, rhs_values);
    group.bench_function(BenchmarkId::new(format!("p{precision}"), cardinality), |b| {
        b.iter(|| {
            let mut merged = lhs.clone();
            merged.merge(black_box(&rhs)).unwrap();
            merged
        });
    });
}

fn bench_ingest(group: &mut BenchmarkGroup<WallTime>, keys: usize) {
    let service =
        AnalyticsService::new(Arc::new(MemoryStore::new()), AnalyticsConfig::default()).unwrap();
    let dimensions: Vec<String> = (0..keys).map(|k| format!("dim{k}")).collect();
    let values = values(1_000);
    group.bench_with_input(BenchmarkId::new("keys", keys), &values, |b, values| {
        b.iter(|| {
            for (i, v) in values.iter().enumerate() {
                let dimension = &dimensions[i % dimensions.len()];
                service
                    .ingest("page_view", Some(dimension), black_box(v))
                    .unwrap();
            }
        });
    });
}
