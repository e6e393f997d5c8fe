//! Edge-case tests: adversarial inputs to every public API.

use driftwise::{
    AccountSnapshot, Action, CashBuffer, ModelMix, ModelPortfolio, Prices, RebalanceConfig, Side,
    SkipReason, Symbol, TargetWeights, TriggerMode, build_targets, compute_drift,
    prioritize_by_drift, select_eligible, size_orders,
};

fn sym(s: &str) -> Symbol {
    Symbol::new(s)
}

fn targets(pairs: &[(&str, f64)]) -> TargetWeights {
    pairs.iter().map(|(s, w)| (sym(s), *w)).collect()
}

fn prices(pairs: &[(&str, f64)]) -> Prices {
    pairs.iter().map(|(s, p)| (sym(s), *p)).collect()
}

fn ranked(snapshot: &AccountSnapshot, targets: &TargetWeights, min: f64) -> Vec<driftwise::DriftRecord> {
    prioritize_by_drift(&compute_drift(snapshot, targets), min)
}

// ============================================================================
// Empty and degenerate inputs
// ============================================================================

#[test]
fn empty_models_and_mix() {
    let t = build_targets(&[], &ModelMix::new());
    assert!(t.is_empty());
    assert_eq!(t.total(), 0.0);
}

#[test]
fn empty_snapshot_against_empty_targets() {
    let drifts = compute_drift(&AccountSnapshot::new("A", 0.0, 0.0), &TargetWeights::default());
    // CASH is always reported.
    assert_eq!(drifts.len(), 1);
    assert!(drifts[0].is_cash);
    assert_eq!(drifts[0].action, Action::Hold);
}

#[test]
fn negative_net_liq_produces_no_orders() {
    let snapshot = AccountSnapshot::new("A", -20_000.0, -5_000.0).with_holding("SPY", 30.0, 15_000.0);
    let t = targets(&[("SPY", 1.0)]);
    let r = ranked(&snapshot, &t, 1.0);
    assert!(r.is_empty());

    let result = size_orders("A", &r, &snapshot, &prices(&[("SPY", 500.0)]), &RebalanceConfig::default());
    assert!(result.orders.is_empty());
    assert_eq!(result.pre_leverage, 0.0);
}

#[test]
fn nan_net_liq_is_unusable() {
    let snapshot = AccountSnapshot::new("A", 100.0, f64::NAN).with_holding("SPY", 1.0, 500.0);
    let drifts = compute_drift(&snapshot, &targets(&[("SPY", 1.0)]));
    assert!(drifts.iter().all(|d| d.drift_usd == 0.0));
}

#[test]
fn empty_priority_list() {
    let snapshot = AccountSnapshot::new("A", 1_000.0, 1_000.0);
    let result = size_orders("A", &[], &snapshot, &Prices::default(), &RebalanceConfig::default());
    assert!(result.is_empty());
    assert!(result.skipped.is_empty());
    assert_eq!(result.cash_remaining(), 1_000.0);
}

// ============================================================================
// Symbols
// ============================================================================

#[test]
fn symbols_normalize_case_and_whitespace() {
    assert_eq!(sym(" spy "), sym("SPY"));
    assert!(sym("cash").is_cash());

    let model = ModelPortfolio::new("m").with_weight("spy", 0.5).with_weight("SPY", 0.5);
    // Same symbol twice: the later weight wins.
    assert_eq!(model.weights.len(), 1);
    assert_eq!(model.weight(&sym("SPY")), 0.5);
}

#[test]
fn duplicate_holding_rows_are_summed() {
    let snapshot = AccountSnapshot::new("A", 0.0, 10_000.0)
        .with_holding("SPY", 5.0, 2_500.0)
        .with_holding("SPY", 5.0, 2_500.0)
        .with_holding("AGG", 50.0, 5_000.0);
    let drifts = compute_drift(&snapshot, &targets(&[("SPY", 0.5), ("AGG", 0.5)]));
    assert!(drifts.iter().all(|d| d.drift_usd.abs() < 1e-9));
}

// ============================================================================
// Targets outside [0, 1]
// ============================================================================

#[test]
fn negative_cash_target_is_margin() {
    // 110% invested, -10% cash.
    let snapshot = AccountSnapshot::new("A", 10_000.0, 10_000.0);
    let t = targets(&[("SPY", 1.1), ("CASH", -0.1)]);
    let drifts = compute_drift(&snapshot, &t);

    let cash = drifts.iter().find(|d| d.is_cash).map(|d| d.drift_pct);
    assert!((cash.unwrap_or_default() - 1.1).abs() < 1e-12);

    let spy = drifts.iter().find(|d| d.symbol == sym("SPY")).map(|d| d.drift_usd);
    assert!((spy.unwrap_or_default() + 11_000.0).abs() < 1e-6);
}

#[test]
fn untargeted_holding_is_sold_entirely() {
    let snapshot = AccountSnapshot::new("A", 0.0, 10_000.0)
        .with_holding("SPY", 10.0, 8_000.0)
        .with_holding("XLE", 20.0, 2_000.0);
    let t = targets(&[("SPY", 1.0)]);
    let result = size_orders(
        "A",
        &ranked(&snapshot, &t, 100.0),
        &snapshot,
        &prices(&[("SPY", 800.0), ("XLE", 100.0)]),
        &RebalanceConfig::default(),
    );
    let xle = result.orders.iter().find(|o| o.symbol == sym("XLE"));
    assert!(matches!(xle, Some(o) if o.side == Side::Sell && o.quantity == 20.0));
}

// ============================================================================
// Prices
// ============================================================================

#[test]
fn bad_prices_skip_each_trade() {
    let snapshot = AccountSnapshot::new("A", 10_000.0, 10_000.0);
    let t = targets(&[("AAA", 0.25), ("BBB", 0.25), ("CCC", 0.25), ("DDD", 0.25)]);
    let px = prices(&[("AAA", 0.0), ("BBB", -5.0), ("CCC", f64::INFINITY)]);

    let result = size_orders("A", &ranked(&snapshot, &t, 100.0), &snapshot, &px, &RebalanceConfig::default());
    assert!(result.orders.is_empty());
    assert_eq!(result.skipped.len(), 4);
    assert!(result.skipped.iter().all(|s| s.reason == SkipReason::PriceUnavailable));
}

#[test]
fn price_above_allocation_drops_whole_share_buy() {
    let snapshot = AccountSnapshot::new("A", 10_000.0, 10_000.0);
    let t = targets(&[("BRK", 0.04), ("CASH", 0.96)]);
    let result = size_orders(
        "A",
        &ranked(&snapshot, &t, 100.0),
        &snapshot,
        &prices(&[("BRK", 600_000.0)]),
        &RebalanceConfig::default(),
    );
    assert!(result.orders.is_empty());
    assert_eq!(result.skipped[0].reason, SkipReason::BelowMinimum);
}

#[test]
fn same_price_allows_fractional_buy() {
    let snapshot = AccountSnapshot::new("A", 10_000.0, 10_000.0);
    let t = targets(&[("BRK", 0.04), ("CASH", 0.96)]);
    let config = RebalanceConfig {
        allow_fractional: true,
        ..Default::default()
    };
    let result = size_orders("A", &ranked(&snapshot, &t, 100.0), &snapshot, &prices(&[("BRK", 600_000.0)]), &config);
    assert_eq!(result.orders.len(), 1);
    assert!((result.orders[0].est_value - 400.0).abs() < 1e-9);
}

// ============================================================================
// Cash and rounding
// ============================================================================

#[test]
fn buffer_larger_than_cash_blocks_buys() {
    let snapshot = AccountSnapshot::new("A", 1_000.0, 10_000.0).with_holding("AGG", 90.0, 9_000.0);
    let t = targets(&[("AGG", 0.9), ("SPY", 0.1)]);
    let config = RebalanceConfig {
        cash_buffer: CashBuffer::Abs(2_000.0),
        ..Default::default()
    };
    let result = size_orders("A", &ranked(&snapshot, &t, 100.0), &snapshot, &prices(&[("SPY", 50.0)]), &config);
    assert!(result.orders.is_empty());
    assert_eq!(result.cash_available, 0.0);
    assert_eq!(result.skipped[0].reason, SkipReason::InsufficientCash);
}

#[test]
fn fractional_sell_capped_at_fractional_holding() {
    let snapshot = AccountSnapshot::new("A", 0.0, 1_000.0).with_holding("SPY", 1.5, 750.0);
    let t = targets(&[("CASH", 1.0)]);
    let config = RebalanceConfig {
        allow_fractional: true,
        ..Default::default()
    };
    // $750 of drift at $400 asks for 1.875 shares; only 1.5 are held.
    let result = size_orders("A", &ranked(&snapshot, &t, 100.0), &snapshot, &prices(&[("SPY", 400.0)]), &config);
    assert_eq!(result.orders.len(), 1);
    assert_eq!(result.orders[0].quantity, 1.5);
    assert_eq!(result.orders[0].est_value, 600.0);
}

#[test]
fn whole_share_sell_of_fractional_holding_floors() {
    let snapshot = AccountSnapshot::new("A", 0.0, 1_000.0).with_holding("SPY", 1.5, 750.0);
    let t = targets(&[("CASH", 1.0)]);
    let result = size_orders(
        "A",
        &ranked(&snapshot, &t, 100.0),
        &snapshot,
        &prices(&[("SPY", 400.0)]),
        &RebalanceConfig::default(),
    );
    assert_eq!(result.orders[0].quantity, 1.0);
}

// ============================================================================
// Trigger bands
// ============================================================================

#[test]
fn drift_exactly_at_band_does_not_trigger() {
    let snapshot = AccountSnapshot::new("A", 0.0, 10_000.0)
        .with_holding("SPY", 1.0, 5_000.0)
        .with_holding("AGG", 1.0, 5_000.0);
    let t = targets(&[("SPY", 0.5), ("AGG", 0.5)]);
    let drifts = compute_drift(&snapshot, &t);
    assert!(select_eligible(&drifts, TriggerMode::PerHolding { band_bps: 0 }).is_empty());
}

#[test]
fn zero_band_total_drift_takes_everything_nonzero() {
    let snapshot = AccountSnapshot::new("A", 0.0, 10_000.0)
        .with_holding("SPY", 1.0, 6_000.0)
        .with_holding("AGG", 1.0, 4_000.0);
    let t = targets(&[("SPY", 0.5), ("AGG", 0.5)]);
    let eligible = select_eligible(&compute_drift(&snapshot, &t), TriggerMode::TotalDrift { band_bps: 0 });
    let names: Vec<&str> = eligible.iter().map(|d| d.symbol.as_str()).collect();
    assert_eq!(names, ["AGG", "SPY"]);
}
