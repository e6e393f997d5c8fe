//! Sizing benchmarks: drift, prioritization and order sizing for one account.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use driftwise::{
    AccountSnapshot, ModelMix, ModelPortfolio, Prices, RebalanceConfig, Symbol, TargetWeights,
    TriggerMode, build_targets, compute_drift, prioritize_by_drift, select_eligible, size_orders,
};

/// Targets spread evenly over `n` symbols, plus a synthetic account whose
/// holdings wander around those targets.
///
/// Values drift using a simple deterministic RNG.
fn setup(n: usize) -> (TargetWeights, AccountSnapshot, Prices) {
    let names: Vec<String> = (0..n).map(|i| format!("S{i:04}")).collect();

    let model = names
        .iter()
        .fold(ModelPortfolio::new("even"), |m, s| m.with_weight(s, 1.0 / n as f64));
    let targets = build_targets(&[model], &ModelMix::new().with("even", 1.0));

    let net_liq = 1_000_000.0;
    let per_name = net_liq * 0.95 / n as f64;
    let mut snapshot = AccountSnapshot::new("BENCH", net_liq * 0.05, net_liq);
    let mut prices = Prices::default();

    // Simple deterministic PRNG (xorshift32)
    let mut rng_state: u32 = 42;
    for s in &names {
        rng_state ^= rng_state << 13;
        rng_state ^= rng_state >> 17;
        rng_state ^= rng_state << 5;

        // -20%..+20% around the even weight
        let tilt = (rng_state % 401) as f64 / 1_000.0 - 0.2;
        let price = 20.0 + (rng_state % 480) as f64;
        let value = per_name * (1.0 + tilt);
        snapshot = snapshot.with_holding(s, (value / price).floor(), value);
        prices.insert(Symbol::new(s), price);
    }

    (targets, snapshot, prices)
}

fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("sizing/pipeline");
    let config = RebalanceConfig {
        trigger: TriggerMode::PerHolding { band_bps: 25 },
        ..Default::default()
    };

    for n in [10usize, 100, 1_000] {
        let (targets, snapshot, prices) = setup(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| {
                let drifts = compute_drift(&snapshot, &targets);
                let eligible = select_eligible(&drifts, config.trigger);
                let ranked = prioritize_by_drift(&eligible, config.min_order_usd);
                black_box(size_orders("BENCH", &ranked, &snapshot, &prices, &config))
            });
        });
    }

    group.finish();
}

fn bench_leverage_trim(c: &mut Criterion) {
    let mut group = c.benchmark_group("sizing/leverage_trim");
    let (targets, snapshot, prices) = setup(500);

    // A tight ceiling forces the guard to walk the tail on every iteration.
    let config = RebalanceConfig {
        trigger: TriggerMode::PerHolding { band_bps: 0 },
        allow_fractional: true,
        max_leverage: 0.9,
        ..Default::default()
    };
    let drifts = compute_drift(&snapshot, &targets);
    let ranked = prioritize_by_drift(&drifts, config.min_order_usd);

    group.bench_function("500_symbols", |b| {
        b.iter(|| black_box(size_orders("BENCH", &ranked, &snapshot, &prices, &config)));
    });

    group.finish();
}

criterion_group!(benches, bench_pipeline, bench_leverage_trim);
criterion_main!(benches);
