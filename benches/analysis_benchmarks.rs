//! Benchmarks for the analysis and scenario engines
//!
//! Compares cost of:
//! - Trend fitting methods (OLS vs Theil-Sen vs Mann-Kendall)
//! - Extreme-event detection with and without the spatial breakdown
//! - Ensemble sampling (independent random vs Latin hypercube)

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use climas_core::{
    create_ensemble, trend, ExtremeEventDetector, ParameterRanges, Parameters, SamplingMode,
    ScenarioStore, SyntheticModel, ThresholdSpec, TrendMethod,
};

/// Noisy warming series of n points
fn generate_series(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| {
            let t = i as f64;
            // Deterministic pseudo-noise for reproducibility
            10.0 + 0.01 * t + 0.5 * (17.3 * t).sin()
        })
        .collect()
}

fn bench_trend_methods(c: &mut Criterion) {
    let mut group = c.benchmark_group("trend_fit");
    for &n in &[120usize, 600, 2400] {
        let series = generate_series(n);
        for method in [
            TrendMethod::Linear,
            TrendMethod::Robust,
            TrendMethod::Nonparametric,
        ] {
            group.bench_with_input(
                BenchmarkId::new(method.as_str(), n),
                &series,
                |b, series| b.iter(|| trend::fit_series(black_box(series), method).unwrap()),
            );
        }
    }
    group.finish();
}

fn bench_extreme_detection(c: &mut Criterion) {
    let mut group = c.benchmark_group("extremes");
    for &(nlat, nlon) in &[(9usize, 18usize), (18, 36)] {
        let model = SyntheticModel::new(42).with_resolution(nlat, nlon);
        let detector = ExtremeEventDetector::new(&model);
        let label = format!("{}x{}", nlat, nlon);
        group.bench_with_input(BenchmarkId::new("mask_only", &label), &detector, |b, d| {
            b.iter(|| {
                d.detect("temperature", &ThresholdSpec::Percentile(95.0), 3, false)
                    .unwrap()
            })
        });
        group.bench_with_input(BenchmarkId::new("spatial", &label), &detector, |b, d| {
            b.iter(|| {
                d.detect("temperature", &ThresholdSpec::Percentile(95.0), 3, true)
                    .unwrap()
            })
        });
    }
    group.finish();
}

fn bench_ensemble_sampling(c: &mut Criterion) {
    let mut group = c.benchmark_group("ensemble");
    let mut ranges = ParameterRanges::new();
    ranges.insert("warming_rate".to_string(), (0.0, 0.1));
    ranges.insert("seasonal_amplitude".to_string(), (2.0, 8.0));
    ranges.insert("noise_level".to_string(), (0.0, 1.0));

    for &n in &[16usize, 128] {
        for mode in [SamplingMode::Random, SamplingMode::Latin] {
            group.bench_with_input(
                BenchmarkId::new(mode.as_str(), n),
                &n,
                |b, &n| {
                    b.iter(|| {
                        let mut store = ScenarioStore::new();
                        let mut params = Parameters::new();
                        params.insert("warming_rate".to_string(), 0.03);
                        params.insert("seasonal_amplitude".to_string(), 5.0);
                        params.insert("noise_level".to_string(), 0.5);
                        store.add("baseline", params, None);
                        create_ensemble(
                            &mut store,
                            "baseline",
                            black_box(&ranges),
                            n,
                            mode,
                            None,
                            42,
                        )
                        .unwrap()
                    })
                },
            );
        }
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_trend_methods,
    bench_extreme_detection,
    bench_ensemble_sampling
);
criterion_main!(benches);
