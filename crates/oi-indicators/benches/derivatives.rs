//! Benchmarks for the derivative engine.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use oi_core::types::Bar;
use oi_indicators::{compute_series, DerivativeConfig, DerivativeEngine};

fn generate_test_bars(size: usize) -> Vec<Bar> {
    (0..size)
        .map(|i| {
            let oi = 1_000_000.0 + (i as f64 * 0.05).sin() * 50_000.0;
            Bar::new(i as i64 * 180_000, 100.0, 101.0, 99.0, 100.0, 500, oi as u64)
        })
        .collect()
}

fn benchmark_derivatives(c: &mut Criterion) {
    let mut group = c.benchmark_group("derivatives");
    let config = DerivativeConfig::new(3.0, 50);

    for size in [1000, 10000, 100000].iter() {
        let bars = generate_test_bars(*size);

        group.bench_with_input(BenchmarkId::new("batch", size), &bars, |b, bars| {
            b.iter(|| compute_series(black_box(bars), &config))
        });

        group.bench_with_input(BenchmarkId::new("streaming", size), &bars, |b, bars| {
            b.iter(|| {
                let mut engine = DerivativeEngine::new(config).unwrap();
                for bar in bars {
                    black_box(engine.update(bar).unwrap());
                }
            })
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_derivatives);
criterion_main!(benches);
