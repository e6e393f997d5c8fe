//! End-to-end scenarios for the planning pipeline.
//!
//! Each test drives the public API from model portfolios through sizing,
//! checking the worked examples the engine is expected to reproduce exactly.

use driftwise::{
    AccountSnapshot, Action, CashBuffer, DriftRecord, ModelMix, ModelPortfolio, Prices,
    RebalanceConfig, Side, SizingResult, SizingWarning, SkipReason, Symbol, TargetWeights,
    TriggerMode, build_targets, compute_drift, prioritize_by_drift, select_eligible, size_orders,
};

fn sym(s: &str) -> Symbol {
    Symbol::new(s)
}

fn prices(pairs: &[(&str, f64)]) -> Prices {
    pairs.iter().map(|(s, p)| (sym(s), *p)).collect()
}

fn single_model(pairs: &[(&str, f64)]) -> TargetWeights {
    let model = pairs
        .iter()
        .fold(ModelPortfolio::new("m"), |m, (s, w)| m.with_weight(s, *w));
    build_targets(&[model], &ModelMix::new().with("m", 1.0))
}

fn plan(
    snapshot: &AccountSnapshot,
    targets: &TargetWeights,
    prices: &Prices,
    config: &RebalanceConfig,
) -> SizingResult {
    let drifts = compute_drift(snapshot, targets);
    let eligible = select_eligible(&drifts, config.trigger);
    let ranked = prioritize_by_drift(&eligible, config.min_order_usd);
    size_orders(&snapshot.account_id, &ranked, snapshot, prices, config)
}

fn find<'a>(records: &'a [DriftRecord], s: &str) -> &'a DriftRecord {
    records
        .iter()
        .find(|r| r.symbol.as_str() == s)
        .unwrap_or_else(|| panic!("no record for {s}"))
}

// ============================================================================
// Targets
// ============================================================================

#[test]
fn scenario_a_blended_spy_weight() {
    let models = [
        ModelPortfolio::new("core")
            .with_weight("SPY", 0.60)
            .with_weight("AGG", 0.40),
        ModelPortfolio::new("growth")
            .with_weight("SPY", 0.40)
            .with_weight("QQQ", 0.60),
        ModelPortfolio::new("income")
            .with_weight("AGG", 0.90)
            .with_weight("CASH", 0.10),
    ];
    let mix = ModelMix::new()
        .with("core", 0.5)
        .with("growth", 0.3)
        .with("income", 0.2);

    let targets = build_targets(&models, &mix);
    assert!((targets.get(&sym("SPY")) - 0.42).abs() < 1e-12);
    assert!((targets.total() - 1.0).abs() < 0.01);
}

// ============================================================================
// Drift
// ============================================================================

#[test]
fn scenario_b_underweight_aapl() {
    let targets = single_model(&[("AAPL", 0.20), ("CASH", 0.80)]);
    let snapshot = AccountSnapshot::new("DU1", 8_500.0, 10_000.0).with_holding("AAPL", 8.0, 1_500.0);

    let drifts = compute_drift(&snapshot, &targets);
    let aapl = find(&drifts, "AAPL");
    assert!((aapl.drift_pct + 0.05).abs() < 1e-12);
    assert!((aapl.drift_usd + 500.0).abs() < 1e-9);
    assert_eq!(aapl.action, Action::Buy);
}

// ============================================================================
// Prioritization
// ============================================================================

#[test]
fn scenario_c_minimum_order_filter() {
    let targets = single_model(&[("AAA", 0.25), ("BBB", 0.25), ("CCC", 0.25), ("DDD", 0.25)]);
    // Drifts: AAA -$30, BBB +$70, CCC -$55, DDD +$15.
    let snapshot = AccountSnapshot::new("DU1", 0.0, 10_000.0)
        .with_holding("AAA", 1.0, 2_470.0)
        .with_holding("BBB", 1.0, 2_570.0)
        .with_holding("CCC", 1.0, 2_445.0)
        .with_holding("DDD", 1.0, 2_515.0);

    let drifts = compute_drift(&snapshot, &targets);
    let ranked = prioritize_by_drift(&drifts, 50.0);
    let names: Vec<&str> = ranked.iter().map(|r| r.symbol.as_str()).collect();
    assert_eq!(names, ["BBB", "CCC"]);
}

// ============================================================================
// Sizing
// ============================================================================

#[test]
fn scenario_d_cash_buffer_scales_buy() {
    let targets = single_model(&[("SPY", 0.30), ("AGG", 0.71), ("CASH", -0.01)]);
    let snapshot = AccountSnapshot::new("DU1", 200.0, 10_000.0)
        .with_holding("SPY", 54.0, 2_700.0)
        .with_holding("AGG", 71.0, 7_100.0);
    let config = RebalanceConfig {
        min_order_usd: 50.0,
        cash_buffer: CashBuffer::Pct(0.01),
        allow_fractional: true,
        ..Default::default()
    };

    let result = plan(&snapshot, &targets, &prices(&[("SPY", 50.0), ("AGG", 100.0)]), &config);
    assert_eq!(result.cash_available, 100.0);
    assert_eq!(result.orders.len(), 1);
    let order = &result.orders[0];
    assert_eq!(order.symbol, sym("SPY"));
    assert_eq!(order.side, Side::Buy);
    assert_eq!(order.est_value, 100.0);
    assert!((order.quantity - 2.0).abs() < 1e-12);
}

#[test]
fn scenario_e_leverage_trims_lowest_priority() {
    // Long $9,000 / short $4,000 / cash $5,000: NetLiq $10,000, gross $13,000.
    let targets = single_model(&[
        ("AAA", 0.90),
        ("BBB", -0.40),
        ("CCC", 0.15),
        ("DDD", 0.10),
        ("CASH", 0.25),
    ]);
    let snapshot = AccountSnapshot::new("DU1", 5_000.0, 10_000.0)
        .with_holding("AAA", 90.0, 9_000.0)
        .with_holding("BBB", -40.0, -4_000.0);
    let config = RebalanceConfig {
        max_leverage: 1.5,
        ..Default::default()
    };

    let px = prices(&[("AAA", 100.0), ("BBB", 100.0), ("CCC", 50.0), ("DDD", 50.0)]);
    let result = plan(&snapshot, &targets, &px, &config);

    // CCC $1,500 + DDD $1,000 would reach $15,500; DDD gives back $500.
    assert_eq!(result.orders.len(), 2);
    assert_eq!(result.orders[0].symbol, sym("CCC"));
    assert_eq!(result.orders[0].quantity, 30.0);
    assert_eq!(result.orders[1].symbol, sym("DDD"));
    assert_eq!(result.orders[1].quantity, 10.0);
    assert_eq!(result.orders[1].est_value, 500.0);

    assert_eq!(result.trimmed.len(), 1);
    assert_eq!(result.trimmed[0].symbol, sym("DDD"));
    assert!((result.pre_leverage - 1.3).abs() < 1e-12);
    assert!(result.post_gross_exposure <= 15_000.0 + 1e-6);
    assert!(result.post_leverage <= 1.5 + 1e-9);
    assert!(result.warning.is_none());
}

#[test]
fn leverage_unsatisfiable_still_sells() {
    // Gross $13,000 against a 1.0x ceiling. Selling $1,000 of AAA is not enough.
    let targets = single_model(&[
        ("AAA", 0.80),
        ("BBB", -0.40),
        ("CCC", 0.10),
        ("CASH", 0.50),
    ]);
    let snapshot = AccountSnapshot::new("DU1", 5_000.0, 10_000.0)
        .with_holding("AAA", 90.0, 9_000.0)
        .with_holding("BBB", -40.0, -4_000.0);
    let config = RebalanceConfig {
        max_leverage: 1.0,
        ..Default::default()
    };

    let px = prices(&[("AAA", 100.0), ("BBB", 100.0), ("CCC", 50.0)]);
    let result = plan(&snapshot, &targets, &px, &config);

    let sides: Vec<(&str, Side)> = result
        .orders
        .iter()
        .map(|o| (o.symbol.as_str(), o.side))
        .collect();
    assert_eq!(sides, [("AAA", Side::Sell)]);
    assert!(matches!(
        result.warning,
        Some(SizingWarning::LeverageUnsatisfiable { .. })
    ));
    assert!(
        result
            .skipped
            .iter()
            .any(|s| s.symbol == sym("CCC") && s.reason == SkipReason::LeverageLimit)
    );
}

#[test]
fn sells_before_buys_and_proceeds_fund_buys() {
    let targets = single_model(&[("SPY", 0.60), ("AGG", 0.40)]);
    let snapshot = AccountSnapshot::new("DU1", 0.0, 10_000.0)
        .with_holding("SPY", 10.0, 4_000.0)
        .with_holding("AGG", 60.0, 6_000.0);
    let config = RebalanceConfig::default();

    let result = plan(&snapshot, &targets, &prices(&[("SPY", 400.0), ("AGG", 100.0)]), &config);
    assert_eq!(result.orders.len(), 2);
    assert_eq!(result.orders[0].side, Side::Sell);
    assert_eq!(result.orders[0].symbol, sym("AGG"));
    assert_eq!(result.orders[0].quantity, 20.0);
    assert_eq!(result.orders[1].side, Side::Buy);
    assert_eq!(result.orders[1].quantity, 5.0);
    assert!(result.buy_usd <= result.cash_available + result.sell_usd + 1e-9);
}

#[test]
fn total_drift_trigger_ignores_small_total() {
    let targets = single_model(&[("SPY", 0.50), ("AGG", 0.50)]);
    let snapshot = AccountSnapshot::new("DU1", 0.0, 10_000.0)
        .with_holding("SPY", 10.0, 5_100.0)
        .with_holding("AGG", 49.0, 4_900.0);
    let config = RebalanceConfig {
        trigger: TriggerMode::TotalDrift { band_bps: 500 },
        ..Default::default()
    };

    let result = plan(&snapshot, &targets, &prices(&[("SPY", 510.0), ("AGG", 100.0)]), &config);
    assert!(result.is_empty());
}

#[test]
fn pipeline_is_pure() {
    let targets = single_model(&[("SPY", 0.60), ("AGG", 0.40)]);
    let snapshot = AccountSnapshot::new("DU1", 1_000.0, 10_000.0)
        .with_holding("SPY", 10.0, 3_000.0)
        .with_holding("AGG", 60.0, 6_000.0);
    let px = prices(&[("SPY", 300.0), ("AGG", 100.0)]);
    let config = RebalanceConfig::default();

    assert_eq!(
        plan(&snapshot, &targets, &px, &config),
        plan(&snapshot, &targets, &px, &config)
    );
}
