//! Account snapshots: holdings, USD cash and NetLiq at the start of a cycle.

use rustc_hash::FxHashMap;

use crate::types::Symbol;

/// One held position as reported by the broker.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Holding {
    pub symbol: Symbol,
    /// Positive = long, negative = short.
    pub quantity: f64,
    /// Current market value in USD (signed like `quantity`).
    pub market_value: f64,
}

/// Point-in-time view of one account.
///
/// Non-USD cash is already excluded by whoever builds the snapshot. The
/// engine reads it but never mutates it.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AccountSnapshot {
    pub account_id: String,
    pub holdings: Vec<Holding>,
    /// USD cash balance (negative when on margin).
    pub cash_usd: f64,
    /// Net liquidation value in USD.
    pub net_liq: f64,
}

impl AccountSnapshot {
    /// Snapshot with no holdings.
    pub fn new(account_id: impl Into<String>, cash_usd: f64, net_liq: f64) -> Self {
        Self {
            account_id: account_id.into(),
            holdings: Vec::new(),
            cash_usd,
            net_liq,
        }
    }

    /// Builder-style holding insertion.
    pub fn with_holding(mut self, symbol: &str, quantity: f64, market_value: f64) -> Self {
        self.holdings.push(Holding {
            symbol: Symbol::new(symbol),
            quantity,
            market_value,
        });
        self
    }

    /// NetLiq usable as a denominator, if positive and finite.
    #[inline]
    pub fn usable_net_liq(&self) -> Option<f64> {
        (self.net_liq.is_finite() && self.net_liq > 0.0).then_some(self.net_liq)
    }

    /// Total quantity held in `symbol` across all holding rows.
    pub fn held_quantity(&self, symbol: &Symbol) -> f64 {
        self.holdings
            .iter()
            .filter(|h| &h.symbol == symbol)
            .map(|h| h.quantity)
            .sum()
    }

    /// Market value of every non-cash symbol, summed across duplicate rows.
    pub fn position_values(&self) -> FxHashMap<Symbol, f64> {
        let mut values: FxHashMap<Symbol, f64> = FxHashMap::default();
        for h in self.holdings.iter().filter(|h| !h.symbol.is_cash()) {
            *values.entry(h.symbol.clone()).or_insert(0.0) += h.market_value;
        }
        values
    }

    /// Value of the CASH pseudo-symbol: USD cash plus any CASH holding rows.
    pub fn cash_value(&self) -> f64 {
        self.cash_usd
            + self
                .holdings
                .iter()
                .filter(|h| h.symbol.is_cash())
                .map(|h| h.market_value)
                .sum::<f64>()
    }

    /// Sum of absolute position values (cash excluded).
    pub fn gross_exposure(&self) -> f64 {
        self.position_values().values().map(|v| v.abs()).sum()
    }

    /// Gross exposure / NetLiq, or 0 when NetLiq is unusable.
    pub fn leverage(&self) -> f64 {
        leverage(self.gross_exposure(), self.net_liq)
    }
}

/// Gross exposure divided by NetLiq; 0 when NetLiq is not positive.
#[inline]
pub fn leverage(gross_exposure: f64, net_liq: f64) -> f64 {
    if net_liq.is_finite() && net_liq > 0.0 {
        gross_exposure / net_liq
    } else {
        0.0
    }
}
