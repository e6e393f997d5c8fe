//! Leverage guard: keep projected gross exposure under `max_leverage`.
//!
//! Gross exposure is the sum of absolute post-trade position values (cash
//! excluded). Only the exposure-adding part of a buy can be trimmed: a buy
//! that covers a short reduces gross until the position crosses zero.

use std::fmt;

use log::{debug, warn};
use rustc_hash::FxHashMap;

use super::{Candidate, SkipReason, SkippedTrade, TrimmedOrder, fit};
use crate::config::RebalanceConfig;
use crate::snapshot::{self, AccountSnapshot};
use crate::types::Symbol;

/// Relative tolerance on the gross-exposure cap.
pub const LEVERAGE_EPSILON: f64 = 1e-9;

/// Condition surfaced on an account without failing it.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SizingWarning {
    /// Exposure already breaches the ceiling with every exposure-adding buy
    /// removed. Sells still go through; such buys do not.
    LeverageUnsatisfiable { base_leverage: f64, max_leverage: f64 },
}

impl fmt::Display for SizingWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SizingWarning::LeverageUnsatisfiable {
                base_leverage,
                max_leverage,
            } => write!(
                f,
                "leverage unsatisfiable: {base_leverage:.3}x without buys exceeds max {max_leverage:.3}x"
            ),
        }
    }
}

/// Projects exposure from a snapshot and trims buys that push it over the cap.
#[derive(Clone, Debug)]
pub struct LeverageGuard {
    base: FxHashMap<Symbol, f64>,
    net_liq: f64,
    max_leverage: f64,
    min_order_usd: f64,
    allow_fractional: bool,
}

impl LeverageGuard {
    pub fn new(snapshot: &AccountSnapshot, config: &RebalanceConfig) -> Self {
        Self {
            base: snapshot.position_values(),
            net_liq: snapshot.net_liq,
            max_leverage: config.max_leverage,
            min_order_usd: config.min_order_usd,
            allow_fractional: config.allow_fractional,
        }
    }

    /// Gross exposure cap in dollars; 0 when NetLiq is unusable.
    pub fn cap(&self) -> f64 {
        if self.net_liq.is_finite() && self.net_liq > 0.0 {
            self.max_leverage * self.net_liq
        } else {
            0.0
        }
    }

    #[inline]
    pub fn within_cap(&self, gross: f64) -> bool {
        let cap = self.cap();
        gross <= cap + LEVERAGE_EPSILON * cap.max(1.0)
    }

    /// Gross exposure after applying `trades` to the snapshot positions.
    pub(crate) fn gross_after<'a>(&self, trades: impl Iterator<Item = &'a Candidate>) -> f64 {
        let mut values = self.base.clone();
        for t in trades {
            *values.entry(t.symbol.clone()).or_insert(0.0) += t.signed_value();
        }
        values.values().map(|v| v.abs()).sum()
    }

    /// Portion of a buy that adds gross exposure.
    fn trimmable(&self, buy: &Candidate) -> f64 {
        let before = self.base.get(&buy.symbol).copied().unwrap_or(0.0);
        if before >= 0.0 {
            buy.value
        } else {
            (before + buy.value).max(0.0)
        }
    }

    /// Reduce `buy` by `cut` dollars and re-round; `None` if nothing tradable is left.
    fn reduce(&self, buy: &Candidate, cut: f64) -> Option<Candidate> {
        let (quantity, value) = fit((buy.value - cut).max(0.0), buy.price, self.allow_fractional);
        if quantity <= 0.0 || value < self.min_order_usd {
            return None;
        }
        Some(Candidate {
            quantity,
            value,
            ..buy.clone()
        })
    }

    fn apply_cut(
        &self,
        buys: &mut Vec<Candidate>,
        idx: usize,
        cut: f64,
        skipped: &mut Vec<SkippedTrade>,
        trimmed: &mut Vec<TrimmedOrder>,
    ) {
        match self.reduce(&buys[idx], cut) {
            Some(reduced) => {
                debug!(
                    "leverage trim {}: {:.2} -> {:.2}",
                    reduced.symbol, buys[idx].value, reduced.value
                );
                trimmed.push(TrimmedOrder {
                    symbol: reduced.symbol.clone(),
                    from_quantity: buys[idx].quantity,
                    to_quantity: reduced.quantity,
                    from_value: buys[idx].value,
                    to_value: reduced.value,
                });
                buys[idx] = reduced;
            }
            None => {
                let removed = buys.remove(idx);
                debug!("leverage trim {}: removed", removed.symbol);
                skipped.push(removed.skipped(SkipReason::LeverageLimit));
            }
        }
    }

    /// Trim `buys` (priority order) until gross exposure fits under the cap.
    ///
    /// Walks from the lowest-priority buy upward, cutting each by at most the
    /// current excess and recomputing after every step. Returns a warning when
    /// the positions left after sells already breach the cap; every
    /// exposure-adding buy is then removed.
    pub(crate) fn enforce(
        &self,
        sells: &[Candidate],
        buys: &mut Vec<Candidate>,
        skipped: &mut Vec<SkippedTrade>,
        trimmed: &mut Vec<TrimmedOrder>,
    ) -> Option<SizingWarning> {
        let cap = self.cap();
        if self.within_cap(self.gross_after(sells.iter().chain(buys.iter()))) {
            return None;
        }

        let floor: Vec<Candidate> = buys
            .iter()
            .map(|b| Candidate {
                value: b.value - self.trimmable(b),
                ..b.clone()
            })
            .collect();
        let base_gross = self.gross_after(sells.iter().chain(floor.iter()));

        if !self.within_cap(base_gross) {
            let warning = SizingWarning::LeverageUnsatisfiable {
                base_leverage: snapshot::leverage(base_gross, self.net_liq),
                max_leverage: self.max_leverage,
            };
            warn!("{warning}");
            let mut idx = buys.len();
            while idx > 0 {
                idx -= 1;
                let cut = self.trimmable(&buys[idx]);
                if cut > 0.0 {
                    self.apply_cut(buys, idx, cut, skipped, trimmed);
                }
            }
            return Some(warning);
        }

        let mut idx = buys.len();
        while idx > 0 {
            idx -= 1;
            let gross = self.gross_after(sells.iter().chain(buys.iter()));
            if self.within_cap(gross) {
                break;
            }
            let cut = self.trimmable(&buys[idx]).min(gross - cap);
            if cut > 0.0 {
                self.apply_cut(buys, idx, cut, skipped, trimmed);
            }
        }

        let gross = self.gross_after(sells.iter().chain(buys.iter()));
        if self.within_cap(gross) {
            None
        } else {
            // Only reachable when dropping a short-covering buy below the
            // minimum order gives back exposure it was removing.
            let warning = SizingWarning::LeverageUnsatisfiable {
                base_leverage: snapshot::leverage(gross, self.net_liq),
                max_leverage: self.max_leverage,
            };
            warn!("{warning}");
            Some(warning)
        }
    }
}
