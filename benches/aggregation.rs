use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::Array2;
use siege_fl::aggregators::AggregationRule;
use siege_fl::attacks::DeviationSearch;
use siege_fl::{fedavg, multi_krum, rank_vote, trimmed_mean};

fn sin_batch(n_clients: usize, n_params: usize) -> Array2<f32> {
    Array2::from_shape_fn((n_clients, n_params), |(i, j)| {
        ((i * n_params + j) as f32).sin()
    })
}

fn bench_aggregation(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregation");

    for &n_clients in &[10, 50] {
        for &n_params in &[1_000usize, 100_000] {
            let updates = sin_batch(n_clients, n_params);
            let f = n_clients / 5;
            let id = format!("{}c_{}p", n_clients, n_params);

            group.bench_with_input(
                BenchmarkId::new("fedavg", &id),
                &updates,
                |b, updates| b.iter(|| fedavg(updates).unwrap()),
            );

            group.bench_with_input(
                BenchmarkId::new("trimmed_mean", &id),
                &updates,
                |b, updates| b.iter(|| trimmed_mean(updates, f).unwrap()),
            );

            group.bench_with_input(
                BenchmarkId::new("multi_krum", &id),
                &updates,
                |b, updates| b.iter(|| multi_krum(updates, f).unwrap()),
            );
        }
    }
    group.finish();
}

fn bench_rank_vote(c: &mut Criterion) {
    let mut group = c.benchmark_group("rank_vote");

    for &len in &[1_000usize, 100_000] {
        // rotated identities: every row is a valid ranking
        let layer = Array2::from_shape_fn((10, len), |(i, j)| ((i * 37 + j) % len) as u32);
        group.bench_with_input(BenchmarkId::from_parameter(len), &layer, |b, layer| {
            b.iter(|| rank_vote(std::slice::from_ref(layer)).unwrap())
        });
    }
    group.finish();
}

fn bench_deviation_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("deviation_search");
    let reference = sin_batch(5, 10_000);

    for rule in [AggregationRule::TrimmedMean, AggregationRule::MultiKrum] {
        group.bench_function(rule.name(), |b| {
            b.iter(|| {
                DeviationSearch::default()
                    .search(&reference, 2, rule)
                    .unwrap()
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_aggregation, bench_rank_vote, bench_deviation_search);
criterion_main!(benches);
