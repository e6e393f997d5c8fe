//! Broker session traits and implementations for driftwise.
//!
//! A [`Connector`] opens one [`BrokerSession`] per account. Sessions are
//! scoped to a single account: the rebalancer disconnects and drops a
//! session before connecting the next account, so no broker state is shared
//! across accounts.
//!
//! Implementations:
//!
//! - [`mock::MockBroker`]: scriptable in-memory broker that records orders
//! - [`paper`] (feature `paper`): loads a mock broker from a JSON file

pub mod error;
pub mod mock;
#[cfg(feature = "paper")]
pub mod paper;
pub mod types;

pub use error::BrokerError;
pub use types::*;

use driftwise::{AccountSnapshot, Holding, Symbol};

/// Opens per-account broker sessions.
pub trait Connector {
    /// Connect to the broker for `account_id`.
    fn connect(&self, account_id: &str) -> Result<Box<dyn BrokerSession>, BrokerError>;
}

/// A connection bound to one account.
pub trait BrokerSession {
    /// The account this session was opened for.
    fn account_id(&self) -> &str;

    /// Get all current positions.
    fn positions(&self) -> Result<Vec<Position>, BrokerError>;

    /// Get account summary (NetLiq, USD cash, etc.).
    fn account(&self) -> Result<Account, BrokerError>;

    /// Get a quote. `delayed` asks for delayed/snapshot data instead of live.
    fn quote(&self, symbol: &Symbol, delayed: bool) -> Result<Quote, BrokerError>;

    /// Submit an order. Returns order ID.
    fn submit_order(&self, order: &BrokerOrder) -> Result<OrderId, BrokerError>;

    /// Get status of a submitted order.
    fn order_status(&self, id: OrderId) -> Result<BrokerOrderStatus, BrokerError>;

    /// Cancel a pending order.
    fn cancel_order(&self, id: OrderId) -> Result<(), BrokerError>;

    /// Disconnect gracefully.
    fn disconnect(&mut self) -> Result<(), BrokerError>;

    /// Positions and account summary combined into a planning snapshot.
    fn snapshot(&self) -> Result<AccountSnapshot, BrokerError> {
        let account = self.account()?;
        let positions = self.positions()?;
        let mut snapshot = AccountSnapshot::new(self.account_id(), account.cash_usd, account.net_liq);
        snapshot.holdings = positions
            .into_iter()
            .map(|p| Holding {
                symbol: p.symbol,
                quantity: p.quantity,
                market_value: p.market_value,
            })
            .collect();
        Ok(snapshot)
    }
}
