//! Valuation Benchmarks
//!
//! Analytic path construction and Monte Carlo throughput on a synthetic set.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use pf_pack_lab::{presets, CardRecord, PackValuator, SimulationConfig};

fn synthetic_set() -> Vec<CardRecord> {
    let tiers: [(&str, usize, f64); 9] = [
        ("Common", 80, 0.05),
        ("Uncommon", 60, 0.1),
        ("Rare", 30, 0.4),
        ("Double Rare", 15, 3.0),
        ("Ultra Rare", 12, 9.0),
        ("Illustration Rare", 20, 6.0),
        ("Special Illustration Rare", 10, 45.0),
        ("Hyper Rare", 5, 20.0),
        ("ACE SPEC Rare", 6, 2.5),
    ];
    tiers
        .iter()
        .flat_map(|(rarity, count, price)| {
            (0..*count).map(move |i| {
                CardRecord::new(format!("{} {}", rarity, i), *rarity, Some(price * (1.0 + (i % 7) as f64 * 0.1)))
                    .with_reverse_price(price * 2.0)
            })
        })
        .collect()
}

/// Benchmark building the valuator (ingest, pools, resolve, EV, variance)
fn bench_analytic(c: &mut Criterion) {
    let records = synthetic_set();
    c.bench_function("analytic_valuation", |b| {
        b.iter(|| {
            let valuator =
                PackValuator::new(presets::scarlet_violet_booster(), records.clone()).ok();
            black_box(valuator.map(|v| v.valuate(Some(4.5))))
        })
    });
}

/// Benchmark simulated packs per second
fn bench_simulation(c: &mut Criterion) {
    let mut group = c.benchmark_group("monte_carlo");
    let Ok(valuator) = PackValuator::new(presets::scarlet_violet_booster(), synthetic_set()) else {
        return;
    };

    for &trials in &[10_000u64, 100_000] {
        group.throughput(Throughput::Elements(trials));
        for parallel in [false, true] {
            let config = SimulationConfig::default()
                .with_trials(trials)
                .with_seed(42)
                .with_parallel(parallel);
            let label = if parallel { "parallel" } else { "serial" };
            group.bench_with_input(BenchmarkId::new(label, trials), &config, |b, config| {
                b.iter(|| black_box(valuator.simulate(config)))
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_analytic, bench_simulation);
criterion_main!(benches);
