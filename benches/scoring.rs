//! Scoring and explanation benchmark
//!
//! Distance index construction is quadratic in the number of experiments and
//! runs once per analysis; scoring reuses it. Explanation recomputes restricted
//! neighborhoods per candidate subspace and dominates end-to-end runtime.
//!
//! # Run Instructions
//!
//! ```bash
//! cargo bench --bench scoring
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use qc_outliers::distance::Manhattan;
use qc_outliers::explainer::SubspaceExplainer;
use qc_outliers::{analyze, DistanceIndex, EngineConfig, MetricMatrix, OutlierScorer};

/// Deterministic pseudo-random table with a few shifted runs at the end
fn synthetic_matrix(n: usize, m: usize) -> MetricMatrix {
    let mut state: u64 = 0x9e37_79b9_7f4a_7c15;
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        (state % 10_000) as f64 / 10_000.0 - 0.5
    };
    let rows: Vec<Vec<f64>> = (0..n)
        .map(|i| {
            (0..m)
                .map(|j| {
                    let v = next();
                    if i + 3 >= n && j == i % m {
                        v + 8.0
                    } else {
                        v
                    }
                })
                .collect()
        })
        .collect();
    MetricMatrix::new(
        (0..n).map(|i| format!("run{:04}", i)).collect(),
        (0..m).map(|j| format!("metric{:02}", j)).collect(),
        rows,
    )
    .expect("synthetic matrix is valid")
}

fn bench_distance_index(c: &mut Criterion) {
    let mut group = c.benchmark_group("distance_index");
    for n in [50, 200, 500] {
        let matrix = synthetic_matrix(n, 12);
        group.bench_with_input(BenchmarkId::from_parameter(n), &matrix, |b, matrix| {
            b.iter(|| DistanceIndex::build(black_box(matrix), &Manhattan))
        });
    }
    group.finish();
}

fn bench_scoring(c: &mut Criterion) {
    let mut group = c.benchmark_group("loop_scores");
    for n in [50, 200, 500] {
        let matrix = synthetic_matrix(n, 12);
        let index = DistanceIndex::build(&matrix, &Manhattan).expect("index builds");
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| OutlierScorer::new(10).score(black_box(&matrix), &index))
        });
    }
    group.finish();
}

fn bench_explanation(c: &mut Criterion) {
    let matrix = synthetic_matrix(100, 8);
    let index = DistanceIndex::build(&matrix, &Manhattan).expect("index builds");
    let explainer = SubspaceExplainer::new(&matrix, &Manhattan, &index, 5).expect("valid k");
    let rows: Vec<usize> = (97..100).collect();

    let mut group = c.benchmark_group("explain_outliers");
    for workers in [1, 3] {
        group.bench_with_input(BenchmarkId::from_parameter(workers), &workers, |b, &w| {
            b.iter(|| explainer.explain_all(black_box(&rows), w))
        });
    }
    group.finish();
}

fn bench_full_analysis(c: &mut Criterion) {
    let matrix = synthetic_matrix(200, 10);
    let config = EngineConfig::new(10);
    c.bench_function("analyze_200x10", |b| {
        b.iter(|| analyze(black_box(&matrix), &config))
    });
}

criterion_group!(
    benches,
    bench_distance_index,
    bench_scoring,
    bench_explanation,
    bench_full_analysis
);
criterion_main!(benches);
