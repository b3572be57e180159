// ========================================================================================
//
//                 BAYESBOUND MONTE-CARLO SPLIT BOUND BENCHMARK
//
// ========================================================================================
//
// Measures how the resampling estimator scales with the number of mixed-label vectors,
// the only buckets that cost binomial draws per trial. Pure buckets are pooled and
// should not move the timings.
//
// ========================================================================================

use bayesbound::distribution::AggregateCounts;
use bayesbound::montecarlo::{MonteCarloConfig, estimate_split_bounds};
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// --- Benchmark Tuning Parameters ---

/// Trials per fraction; small enough for criterion's repeated sampling.
const TRIALS: usize = 10_000;
/// Mixed-vector counts on the x-axis.
const MIXED_VECTORS: [usize; 4] = [10, 100, 1_000, 5_000];

fn synthetic_aggregate(mixed_vectors: usize) -> AggregateCounts {
    let mut rng = StdRng::seed_from_u64(1234);
    let mixed: Vec<(u64, u64)> = (0..mixed_vectors)
        .map(|_| (rng.gen_range(1..40), rng.gen_range(1..40)))
        .collect();
    let pure_negative = 5_000;
    let pure_positive = 3_000;
    let total = mixed.iter().map(|&(a, b)| a + b).sum::<u64>() + pure_negative + pure_positive;
    AggregateCounts {
        mixed,
        pure_negative,
        pure_positive,
        total,
    }
}

fn benchmark_split_bounds(c: &mut Criterion) {
    let mut group = c.benchmark_group("split_bounds");
    group.sample_size(10);

    let config = MonteCarloConfig {
        fractions: vec![0.5],
        trials: Some(TRIALS),
        seed: Some(7),
        ..MonteCarloConfig::default()
    };

    for &mixed_vectors in &MIXED_VECTORS {
        let aggregate = synthetic_aggregate(mixed_vectors);
        group.throughput(Throughput::Elements((mixed_vectors * TRIALS) as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(mixed_vectors),
            &aggregate,
            |b, aggregate| {
                b.iter(|| estimate_split_bounds(black_box(aggregate), black_box(&config)).unwrap())
            },
        );
    }

    group.finish();
}

criterion_group!(benches, benchmark_split_bounds);
criterion_main!(benches);
