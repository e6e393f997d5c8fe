//! Price lookup for sizing.
//!
//! Prices come from the account's own broker session. A symbol without a
//! usable price is simply left out of the map; the sizer then skips its trade
//! as `PriceUnavailable`. Only unexpected broker failures fail the account.

use std::collections::BTreeSet;

use driftwise::{AccountSnapshot, Prices, Symbol, TargetWeights};
use driftwise_broker::{BrokerError, BrokerSession, Quote};
use log::{debug, warn};
use serde::Deserialize;

use crate::config::PricingConfig;
use crate::error::AccountError;

/// Quote field used as the sizing price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceSource {
    Last,
    Mid,
    Bid,
    Ask,
    Close,
}

impl PriceSource {
    /// The selected field, if present, finite and positive.
    pub fn select(self, quote: &Quote) -> Option<f64> {
        let value = match self {
            PriceSource::Last => quote.last,
            PriceSource::Mid => quote.mid(),
            PriceSource::Bid => quote.bid,
            PriceSource::Ask => quote.ask,
            PriceSource::Close => quote.close,
        }?;
        (value.is_finite() && value > 0.0).then_some(value)
    }
}

/// Symbols that need a price: everything held plus every non-cash target.
pub fn symbols_to_price(snapshot: &AccountSnapshot, targets: &TargetWeights) -> Vec<Symbol> {
    let mut symbols: BTreeSet<Symbol> = snapshot
        .holdings
        .iter()
        .map(|h| h.symbol.clone())
        .filter(|s| !s.is_cash())
        .collect();
    symbols.extend(targets.symbols().filter(|s| !s.is_cash()).cloned());
    symbols.into_iter().collect()
}

/// Price of one symbol, or `None` when the feed has nothing usable.
fn quote_price(
    session: &dyn BrokerSession,
    symbol: &Symbol,
    delayed: bool,
    source: PriceSource,
) -> Result<Option<f64>, AccountError> {
    match session.quote(symbol, delayed) {
        Ok(quote) => Ok(source.select(&quote)),
        Err(BrokerError::NoPrice(_) | BrokerError::InvalidSymbol(_)) => Ok(None),
        Err(e) => Err(AccountError::Pricing(e)),
    }
}

/// Fetch sizing prices for `symbols` on `session`.
///
/// With `fallback_to_snapshot`, a symbol with no usable live price is retried
/// against delayed data before being left unpriced.
pub fn fetch_prices(
    session: &dyn BrokerSession,
    symbols: &[Symbol],
    config: &PricingConfig,
) -> Result<Prices, AccountError> {
    let mut prices = Prices::default();
    for symbol in symbols {
        let mut price = quote_price(session, symbol, false, config.price_source)?;
        if price.is_none() && config.fallback_to_snapshot {
            debug!("{symbol}: no live {:?} price, trying delayed", config.price_source);
            price = quote_price(session, symbol, true, config.price_source)?;
        }
        match price {
            Some(p) => {
                prices.insert(symbol.clone(), p);
            }
            None => warn!("{symbol}: no usable price"),
        }
    }
    Ok(prices)
}
