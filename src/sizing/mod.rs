//! Order sizing: turn prioritized drift records into concrete orders.
//!
//! Sells are sized first and their proceeds fund the buys. Buys then draw on
//! the cash ledger in priority order, and finally the [`LeverageGuard`] trims
//! exposure-adding buys from the tail until gross exposure fits under
//! `max_leverage`. Sizing is pure: it reads the snapshot and prices and
//! returns a plan.

pub mod cash;
pub mod leverage;

use std::fmt;

use log::debug;
use rustc_hash::FxHashMap;

use crate::config::RebalanceConfig;
use crate::drift::DriftRecord;
use crate::side::{Action, Side};
use crate::snapshot::{self, AccountSnapshot};
use crate::types::Symbol;

pub use cash::{CashLedger, available_cash};
pub use leverage::{LeverageGuard, SizingWarning};

/// Unit price per symbol used for sizing.
pub type Prices = FxHashMap<Symbol, f64>;

/// Slack added before flooring share quantities, so `300.0 / 100.0` style
/// divisions that land a hair under an integer still round to it.
const QTY_EPSILON: f64 = 1e-9;

/// A sized order, ready for confirmation and submission.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Order {
    pub account_id: String,
    pub symbol: Symbol,
    pub side: Side,
    /// Always positive; whole when fractional trading is off.
    pub quantity: f64,
    pub est_price: f64,
    /// `quantity * est_price`, or the exact dollar allocation for
    /// fractional orders.
    pub est_value: f64,
}

impl Order {
    /// Change in position value this order causes (+buy, -sell).
    #[inline]
    pub fn signed_value(&self) -> f64 {
        self.side.sign() * self.est_value
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<4} {:>12.4} {:<8} @ ${:>10.2} = ${:>12.2}",
            self.side, self.quantity, self.symbol, self.est_price, self.est_value
        )
    }
}

/// Why an eligible trade produced no order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SkipReason {
    /// No finite, positive price for the symbol.
    PriceUnavailable,
    /// Sell requested for a symbol the account does not hold.
    NothingHeld,
    /// Rounded order value fell below `min_order_usd`.
    BelowMinimum,
    /// No cash left (after buffer and sell proceeds) to fund the buy.
    InsufficientCash,
    /// Removed while bringing gross exposure under `max_leverage`.
    LeverageLimit,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            SkipReason::PriceUnavailable => "price unavailable",
            SkipReason::NothingHeld => "nothing held",
            SkipReason::BelowMinimum => "below minimum order",
            SkipReason::InsufficientCash => "insufficient cash",
            SkipReason::LeverageLimit => "leverage limit",
        })
    }
}

/// An eligible trade that was not turned into an order.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SkippedTrade {
    pub symbol: Symbol,
    pub side: Side,
    /// Dollar amount the drift asked for.
    pub desired_usd: f64,
    pub reason: SkipReason,
}

/// A buy reduced by the leverage guard but still submitted.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrimmedOrder {
    pub symbol: Symbol,
    pub from_quantity: f64,
    pub to_quantity: f64,
    pub from_value: f64,
    pub to_value: f64,
}

/// Result of sizing one account.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SizingResult {
    /// Sells in priority order, then buys in priority order.
    pub orders: Vec<Order>,
    pub skipped: Vec<SkippedTrade>,
    pub trimmed: Vec<TrimmedOrder>,
    /// Cash after the buffer, before sell proceeds.
    pub cash_available: f64,
    pub sell_usd: f64,
    pub buy_usd: f64,
    pub pre_gross_exposure: f64,
    pub pre_leverage: f64,
    pub post_gross_exposure: f64,
    pub post_leverage: f64,
    pub warning: Option<SizingWarning>,
}

impl SizingResult {
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn sells(&self) -> impl Iterator<Item = &Order> {
        self.orders.iter().filter(|o| o.side == Side::Sell)
    }

    pub fn buys(&self) -> impl Iterator<Item = &Order> {
        self.orders.iter().filter(|o| o.side == Side::Buy)
    }

    /// Cash expected to remain once every order fills at its estimate.
    pub fn cash_remaining(&self) -> f64 {
        self.cash_available + self.sell_usd - self.buy_usd
    }
}

/// Working state of one order while sizing.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Candidate {
    pub(crate) symbol: Symbol,
    pub(crate) side: Side,
    pub(crate) price: f64,
    pub(crate) quantity: f64,
    pub(crate) value: f64,
    pub(crate) desired_usd: f64,
}

impl Candidate {
    #[inline]
    pub(crate) fn signed_value(&self) -> f64 {
        self.side.sign() * self.value
    }

    fn into_order(self, account_id: &str) -> Order {
        Order {
            account_id: account_id.to_string(),
            symbol: self.symbol,
            side: self.side,
            quantity: self.quantity,
            est_price: self.price,
            est_value: self.value,
        }
    }

    pub(crate) fn skipped(&self, reason: SkipReason) -> SkippedTrade {
        SkippedTrade {
            symbol: self.symbol.clone(),
            side: self.side,
            desired_usd: self.desired_usd,
            reason,
        }
    }
}

/// Quantity and value for spending `value` dollars at `price`.
///
/// Fractional: the exact allocation. Whole shares: floored, and the value
/// shrinks to what the whole shares cost.
pub(crate) fn fit(value: f64, price: f64, allow_fractional: bool) -> (f64, f64) {
    let raw = value / price;
    if allow_fractional {
        (raw, value)
    } else {
        let qty = (raw + QTY_EPSILON).floor().max(0.0);
        (qty, qty * price)
    }
}

#[inline]
fn usable_price(prices: &Prices, symbol: &Symbol) -> Option<f64> {
    prices
        .get(symbol)
        .copied()
        .filter(|p| p.is_finite() && *p > 0.0)
}

/// Size `prioritized` into orders for `account_id`.
///
/// `prioritized` is the output of
/// [`prioritize_by_drift`](crate::prioritize::prioritize_by_drift); its order
/// is the priority order used for cash allocation and leverage trimming.
/// CASH and HOLD records never produce orders.
pub fn size_orders(
    account_id: &str,
    prioritized: &[DriftRecord],
    snapshot: &AccountSnapshot,
    prices: &Prices,
    config: &RebalanceConfig,
) -> SizingResult {
    let min = config.min_order_usd;
    let mut skipped = Vec::new();
    let mut ledger = CashLedger::new(snapshot.cash_usd, snapshot.net_liq, config.cash_buffer);

    let tradable: Vec<&DriftRecord> = prioritized.iter().filter(|r| r.is_tradable()).collect();

    // Sells first.
    let mut sells: Vec<Candidate> = Vec::new();
    for record in tradable.iter().filter(|r| r.action == Action::Sell) {
        let desired = record.abs_drift_usd();
        let skip = |reason| SkippedTrade {
            symbol: record.symbol.clone(),
            side: Side::Sell,
            desired_usd: desired,
            reason,
        };

        let Some(price) = usable_price(prices, &record.symbol) else {
            skipped.push(skip(SkipReason::PriceUnavailable));
            continue;
        };
        let held = snapshot.held_quantity(&record.symbol);
        if held <= 0.0 {
            skipped.push(skip(SkipReason::NothingHeld));
            continue;
        }

        let capped = desired / price > held;
        let (quantity, value) = if capped {
            let qty = if config.allow_fractional {
                held
            } else {
                held.floor()
            };
            (qty, qty * price)
        } else {
            fit(desired, price, config.allow_fractional)
        };

        if quantity <= 0.0 || value < min {
            skipped.push(skip(SkipReason::BelowMinimum));
            continue;
        }

        debug!(
            "{account_id}: sell {quantity} {} @ {price:.2} = {value:.2}{}",
            record.symbol,
            if capped { " (capped at held)" } else { "" }
        );
        ledger.credit(value);
        sells.push(Candidate {
            symbol: record.symbol.clone(),
            side: Side::Sell,
            price,
            quantity,
            value,
            desired_usd: desired,
        });
    }

    // Buys draw on cash after buffer plus sell proceeds, in priority order.
    let mut buys: Vec<Candidate> = Vec::new();
    for record in tradable.iter().filter(|r| r.action == Action::Buy) {
        let desired = record.abs_drift_usd();
        let skip = |reason| SkippedTrade {
            symbol: record.symbol.clone(),
            side: Side::Buy,
            desired_usd: desired,
            reason,
        };

        let Some(price) = usable_price(prices, &record.symbol) else {
            skipped.push(skip(SkipReason::PriceUnavailable));
            continue;
        };
        let alloc = ledger.allocation(desired);
        if alloc <= 0.0 {
            skipped.push(skip(SkipReason::InsufficientCash));
            continue;
        }

        let (quantity, value) = fit(alloc, price, config.allow_fractional);
        if quantity <= 0.0 || value < min {
            let reason = if alloc < desired {
                SkipReason::InsufficientCash
            } else {
                SkipReason::BelowMinimum
            };
            skipped.push(skip(reason));
            continue;
        }

        debug!("{account_id}: buy {quantity} {} @ {price:.2} = {value:.2}", record.symbol);
        ledger.spend(value);
        buys.push(Candidate {
            symbol: record.symbol.clone(),
            side: Side::Buy,
            price,
            quantity,
            value,
            desired_usd: desired,
        });
    }

    let guard = LeverageGuard::new(snapshot, config);
    let mut trimmed = Vec::new();
    let spent_before = buys.iter().map(|b| b.value).sum::<f64>();
    let warning = guard.enforce(&sells, &mut buys, &mut skipped, &mut trimmed);
    ledger.release(spent_before - buys.iter().map(|b| b.value).sum::<f64>());

    let pre_gross_exposure = snapshot.gross_exposure();
    let post_gross_exposure = guard.gross_after(sells.iter().chain(buys.iter()));
    let sell_usd: f64 = sells.iter().map(|s| s.value).sum();
    let buy_usd = ledger.spent();

    let orders: Vec<Order> = sells
        .into_iter()
        .chain(buys)
        .map(|c| c.into_order(account_id))
        .collect();

    SizingResult {
        orders,
        skipped,
        trimmed,
        cash_available: ledger.available(),
        sell_usd,
        buy_usd,
        pre_gross_exposure,
        pre_leverage: snapshot::leverage(pre_gross_exposure, snapshot.net_liq),
        post_gross_exposure,
        post_leverage: snapshot::leverage(post_gross_exposure, snapshot.net_liq),
        warning,
    }
}
