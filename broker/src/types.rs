//! Shared broker types: positions, accounts, orders, quotes.

use driftwise::{Order, Side, Symbol};

/// Broker-level position.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub symbol: Symbol,
    /// Positive = long, negative = short.
    pub quantity: f64,
    pub avg_cost: f64,
    pub market_value: f64,
}

/// Account summary from the broker, USD only.
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    pub net_liq: f64,
    pub cash_usd: f64,
    pub buying_power: f64,
    pub gross_position_value: f64,
}

/// Order to submit to a broker.
#[derive(Debug, Clone, PartialEq)]
pub struct BrokerOrder {
    /// Account the order is for; sessions refuse orders for other accounts.
    pub account_id: String,
    pub symbol: Symbol,
    pub side: Side,
    pub quantity: f64,
    pub order_type: BrokerOrderType,
}

impl BrokerOrder {
    /// Market order for a sized plan order.
    pub fn market(order: &Order) -> Self {
        Self {
            account_id: order.account_id.clone(),
            symbol: order.symbol.clone(),
            side: order.side,
            quantity: order.quantity,
            order_type: BrokerOrderType::Market,
        }
    }
}

/// Market or limit order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BrokerOrderType {
    Market,
    Limit(f64),
}

/// Quote from the broker. Fields the feed did not supply are `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub symbol: Symbol,
    pub bid: Option<f64>,
    pub ask: Option<f64>,
    pub last: Option<f64>,
    pub close: Option<f64>,
}

impl Quote {
    pub fn new(symbol: Symbol) -> Self {
        Self {
            symbol,
            bid: None,
            ask: None,
            last: None,
            close: None,
        }
    }

    /// Midpoint of bid and ask, if both are present.
    pub fn mid(&self) -> Option<f64> {
        Some((self.bid? + self.ask?) / 2.0)
    }
}

/// Opaque order ID returned by the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OrderId(pub u64);

/// Status of a submitted order.
#[derive(Debug, Clone, PartialEq)]
pub struct BrokerOrderStatus {
    pub id: OrderId,
    pub status: OrderState,
    pub filled_quantity: f64,
    pub remaining_quantity: f64,
    pub avg_fill_price: Option<f64>,
}

/// Lifecycle state of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderState {
    Pending,
    Submitted,
    PartiallyFilled,
    Filled,
    Cancelled,
    Rejected,
}

impl OrderState {
    /// No further fills can happen.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderState::Filled | OrderState::Cancelled | OrderState::Rejected
        )
    }
}
