//! Drift between target weights and an account snapshot.
//!
//! Weights are fractions of NetLiq. `drift_pct = current - target`, so a
//! positive drift is overweight (sell) and a negative one underweight (buy).
//! The output is always sorted alphabetically by symbol: that order is the
//! tie-break anchor for every later ranking.

use std::collections::BTreeMap;

use rustc_hash::FxHashSet;

use crate::config::TriggerMode;
use crate::side::Action;
use crate::snapshot::AccountSnapshot;
use crate::targets::TargetWeights;
use crate::types::Symbol;

/// Drift of one symbol (or the CASH pseudo-symbol).
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DriftRecord {
    pub symbol: Symbol,
    pub is_cash: bool,
    pub target_pct: f64,
    pub current_pct: f64,
    /// `current_pct - target_pct`
    pub drift_pct: f64,
    /// `drift_pct * NetLiq`
    pub drift_usd: f64,
    pub action: Action,
}

impl DriftRecord {
    #[inline]
    pub fn abs_drift_usd(&self) -> f64 {
        self.drift_usd.abs()
    }

    /// True if this record can become an order.
    #[inline]
    pub fn is_tradable(&self) -> bool {
        !self.is_cash && self.action != Action::Hold
    }
}

/// Compare `targets` against `snapshot`.
///
/// Every symbol that is held or targeted gets a record, and CASH always gets
/// one. Duplicate holding rows are summed, so the result does not depend on
/// the order of `snapshot.holdings`. An unusable NetLiq (zero, negative,
/// non-finite) yields current weights and dollar drifts of 0.
pub fn compute_drift(snapshot: &AccountSnapshot, targets: &TargetWeights) -> Vec<DriftRecord> {
    let net_liq = snapshot.usable_net_liq();

    let mut values: BTreeMap<Symbol, f64> = snapshot.position_values().into_iter().collect();
    values.insert(Symbol::cash(), snapshot.cash_value());
    for symbol in targets.symbols() {
        values.entry(symbol.clone()).or_insert(0.0);
    }

    values
        .into_iter()
        .map(|(symbol, value)| {
            let target_pct = targets.get(&symbol);
            let current_pct = net_liq.map_or(0.0, |nl| value / nl);
            let drift_pct = current_pct - target_pct;
            let drift_usd = net_liq.map_or(0.0, |nl| drift_pct * nl);
            DriftRecord {
                is_cash: symbol.is_cash(),
                symbol,
                target_pct,
                current_pct,
                drift_pct,
                drift_usd,
                action: Action::from_drift_usd(drift_usd),
            }
        })
        .collect()
}

/// Keep the records the trigger policy makes eligible, in their input order.
///
/// - `PerHolding`: `|drift_pct| > band`.
/// - `TotalDrift`: nothing if the total `|drift_pct|` is within the band;
///   otherwise records are taken by descending `|drift_usd|` (input order
///   breaks ties) until the `|drift_pct|` left in the untaken records is
///   at or below the band.
pub fn select_eligible(records: &[DriftRecord], trigger: TriggerMode) -> Vec<DriftRecord> {
    let band = trigger.band();
    match trigger {
        TriggerMode::PerHolding { .. } => records
            .iter()
            .filter(|r| r.drift_pct.abs() > band)
            .cloned()
            .collect(),
        TriggerMode::TotalDrift { .. } => {
            let mut remaining: f64 = records.iter().map(|r| r.drift_pct.abs()).sum();
            if remaining <= band {
                return Vec::new();
            }

            let mut ranked: Vec<usize> = (0..records.len()).collect();
            ranked.sort_by(|&a, &b| {
                records[b]
                    .abs_drift_usd()
                    .total_cmp(&records[a].abs_drift_usd())
            });

            let mut chosen: FxHashSet<usize> = FxHashSet::default();
            for idx in ranked {
                chosen.insert(idx);
                remaining -= records[idx].drift_pct.abs();
                if remaining <= band {
                    break;
                }
            }

            records
                .iter()
                .enumerate()
                .filter(|(i, _)| chosen.contains(i))
                .map(|(_, r)| r.clone())
                .collect()
        }
    }
}
