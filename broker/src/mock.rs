//! Mock broker for testing: implements [`Connector`] with configurable behavior.
//!
//! Use this in integration tests to simulate broker responses without
//! network calls. Every session shares one in-memory state, so a test can
//! inspect what was submitted, on which session, and how many sessions were
//! open at once.
//!
//! ```
//! use driftwise_broker::mock::{FillMode, MockBroker};
//! use driftwise_broker::{BrokerSession, Connector};
//!
//! let broker = MockBroker::builder()
//!     .fill_mode(FillMode::ImmediateFull)
//!     .with_account("DU111", 5_000.0)
//!     .with_position("DU111", "AAPL", 10.0, 150.0)
//!     .with_quote("AAPL", 149.5, 150.5)
//!     .build();
//!
//! let session = broker.connect("DU111").unwrap();
//! let snapshot = session.snapshot().unwrap();
//! assert_eq!(snapshot.net_liq, 6_500.0);
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use driftwise::{Side, Symbol};
use log::debug;

use crate::error::BrokerError;
use crate::types::*;
use crate::{BrokerSession, Connector};

/// How the mock broker handles submitted orders.
#[derive(Clone, Debug, PartialEq)]
pub enum FillMode {
    /// Orders are immediately fully filled.
    ImmediateFull,
    /// Orders are partially filled (the given fraction, e.g., 0.5 = 50%) and
    /// the rest stays working.
    ImmediatePartial(f64),
    /// All orders are rejected.
    Reject,
}

/// A recorded order submission for assertion in tests.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedOrder {
    pub id: OrderId,
    /// Account of the session the order was submitted on.
    pub session_account: String,
    /// Account the order itself named.
    pub account_id: String,
    pub symbol: Symbol,
    pub side: Side,
    pub quantity: f64,
    pub order_type: BrokerOrderType,
}

#[derive(Clone, Debug, Default)]
struct MockAccount {
    cash_usd: f64,
    net_liq: Option<f64>,
    positions: Vec<Position>,
}

impl MockAccount {
    fn summary(&self) -> Account {
        let gross: f64 = self.positions.iter().map(|p| p.market_value.abs()).sum();
        let net: f64 = self.positions.iter().map(|p| p.market_value).sum();
        Account {
            net_liq: self.net_liq.unwrap_or(self.cash_usd + net),
            cash_usd: self.cash_usd,
            buying_power: self.cash_usd.max(0.0),
            gross_position_value: gross,
        }
    }
}

#[derive(Debug)]
struct MockState {
    fill_mode: FillMode,
    accounts: BTreeMap<String, MockAccount>,
    quotes: BTreeMap<Symbol, Quote>,
    delayed_quotes: BTreeMap<Symbol, Quote>,
    unreachable: bool,
    fail_connect: BTreeSet<String>,
    fail_snapshot: BTreeSet<String>,
    reject_symbols: BTreeSet<Symbol>,
    next_order_id: u64,
    orders: Vec<RecordedOrder>,
    cancelled: Vec<OrderId>,
    connects: Vec<String>,
    disconnects: usize,
    open_sessions: usize,
    max_open_sessions: usize,
}

/// Builder for `MockBroker`.
pub struct MockBrokerBuilder {
    state: MockState,
}

impl MockBrokerBuilder {
    pub fn fill_mode(mut self, mode: FillMode) -> Self {
        self.state.fill_mode = mode;
        self
    }

    /// Add (or reset the cash of) an account.
    pub fn with_account(mut self, account_id: &str, cash_usd: f64) -> Self {
        self.state
            .accounts
            .entry(account_id.to_string())
            .or_default()
            .cash_usd = cash_usd;
        self
    }

    /// Override the NetLiq reported for an account (default: cash + positions).
    pub fn with_net_liq(mut self, account_id: &str, net_liq: f64) -> Self {
        self.state
            .accounts
            .entry(account_id.to_string())
            .or_default()
            .net_liq = Some(net_liq);
        self
    }

    pub fn with_position(mut self, account_id: &str, symbol: &str, quantity: f64, price: f64) -> Self {
        self.state
            .accounts
            .entry(account_id.to_string())
            .or_default()
            .positions
            .push(Position {
                symbol: Symbol::new(symbol),
                quantity,
                avg_cost: price,
                market_value: quantity * price,
            });
        self
    }

    /// Live quote with last and close at the midpoint.
    pub fn with_quote(self, symbol: &str, bid: f64, ask: f64) -> Self {
        let mid = (bid + ask) / 2.0;
        self.with_full_quote(Quote {
            symbol: Symbol::new(symbol),
            bid: Some(bid),
            ask: Some(ask),
            last: Some(mid),
            close: Some(mid),
        })
    }

    pub fn with_full_quote(mut self, quote: Quote) -> Self {
        self.state.quotes.insert(quote.symbol.clone(), quote);
        self
    }

    /// Quote served only when delayed data is requested.
    pub fn with_delayed_quote(mut self, quote: Quote) -> Self {
        self.state.delayed_quotes.insert(quote.symbol.clone(), quote);
        self
    }

    /// Every connect fails with [`BrokerError::Unreachable`].
    pub fn unreachable(mut self) -> Self {
        self.state.unreachable = true;
        self
    }

    pub fn fail_connect(mut self, account_id: &str) -> Self {
        self.state.fail_connect.insert(account_id.to_string());
        self
    }

    /// Account summary and positions fail for this account.
    pub fn fail_snapshot(mut self, account_id: &str) -> Self {
        self.state.fail_snapshot.insert(account_id.to_string());
        self
    }

    /// Orders for this symbol are rejected on submit.
    pub fn reject_symbol(mut self, symbol: &str) -> Self {
        self.state.reject_symbols.insert(Symbol::new(symbol));
        self
    }

    pub fn build(self) -> MockBroker {
        MockBroker {
            state: Arc::new(Mutex::new(self.state)),
        }
    }
}

/// A mock broker that records submitted orders and returns configurable responses.
#[derive(Clone, Debug)]
pub struct MockBroker {
    state: Arc<Mutex<MockState>>,
}

fn lock(state: &Mutex<MockState>) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockBroker {
    pub fn builder() -> MockBrokerBuilder {
        MockBrokerBuilder {
            state: MockState {
                fill_mode: FillMode::ImmediateFull,
                accounts: BTreeMap::new(),
                quotes: BTreeMap::new(),
                delayed_quotes: BTreeMap::new(),
                unreachable: false,
                fail_connect: BTreeSet::new(),
                fail_snapshot: BTreeSet::new(),
                reject_symbols: BTreeSet::new(),
                next_order_id: 1,
                orders: Vec::new(),
                cancelled: Vec::new(),
                connects: Vec::new(),
                disconnects: 0,
                open_sessions: 0,
                max_open_sessions: 0,
            },
        }
    }

    /// Get all orders that were submitted (for assertion in tests).
    pub fn submitted_orders(&self) -> Vec<RecordedOrder> {
        lock(&self.state).orders.clone()
    }

    /// Account ids in the order sessions were opened.
    pub fn connect_log(&self) -> Vec<String> {
        lock(&self.state).connects.clone()
    }

    pub fn disconnect_count(&self) -> usize {
        lock(&self.state).disconnects
    }

    pub fn cancelled_orders(&self) -> Vec<OrderId> {
        lock(&self.state).cancelled.clone()
    }

    /// Most sessions that were ever open at the same time.
    pub fn max_open_sessions(&self) -> usize {
        lock(&self.state).max_open_sessions
    }
}

impl Connector for MockBroker {
    fn connect(&self, account_id: &str) -> Result<Box<dyn BrokerSession>, BrokerError> {
        let mut state = lock(&self.state);
        if state.unreachable {
            return Err(BrokerError::Unreachable("mock: gateway down".into()));
        }
        if state.fail_connect.contains(account_id) || !state.accounts.contains_key(account_id) {
            return Err(BrokerError::Connection(format!(
                "mock: cannot connect to {account_id}"
            )));
        }
        state.connects.push(account_id.to_string());
        state.open_sessions += 1;
        state.max_open_sessions = state.max_open_sessions.max(state.open_sessions);
        debug!("mock: session opened for {account_id}");

        Ok(Box::new(MockSession {
            account_id: account_id.to_string(),
            state: Arc::clone(&self.state),
            connected: true,
        }))
    }
}

/// One account's session on a [`MockBroker`].
pub struct MockSession {
    account_id: String,
    state: Arc<Mutex<MockState>>,
    connected: bool,
}

impl MockSession {
    fn live(&self) -> Result<MutexGuard<'_, MockState>, BrokerError> {
        if !self.connected {
            return Err(BrokerError::NotConnected);
        }
        Ok(lock(&self.state))
    }

    fn account_state<'a>(&self, state: &'a MockState) -> Result<&'a MockAccount, BrokerError> {
        if state.fail_snapshot.contains(&self.account_id) {
            return Err(BrokerError::Other(format!(
                "mock: snapshot unavailable for {}",
                self.account_id
            )));
        }
        state
            .accounts
            .get(&self.account_id)
            .ok_or_else(|| BrokerError::Connection(format!("mock: unknown account {}", self.account_id)))
    }
}

impl BrokerSession for MockSession {
    fn account_id(&self) -> &str {
        &self.account_id
    }

    fn positions(&self) -> Result<Vec<Position>, BrokerError> {
        let state = self.live()?;
        Ok(self.account_state(&state)?.positions.clone())
    }

    fn account(&self) -> Result<Account, BrokerError> {
        let state = self.live()?;
        Ok(self.account_state(&state)?.summary())
    }

    fn quote(&self, symbol: &Symbol, delayed: bool) -> Result<Quote, BrokerError> {
        let state = self.live()?;
        let book = if delayed {
            &state.delayed_quotes
        } else {
            &state.quotes
        };
        book.get(symbol)
            .cloned()
            .ok_or_else(|| BrokerError::NoPrice(symbol.to_string()))
    }

    fn submit_order(&self, order: &BrokerOrder) -> Result<OrderId, BrokerError> {
        let mut state = self.live()?;
        if order.account_id != self.account_id {
            return Err(BrokerError::Order(format!(
                "mock: order for {} submitted on session {}",
                order.account_id, self.account_id
            )));
        }

        let id = OrderId(state.next_order_id);
        state.next_order_id += 1;

        // Record the order
        state.orders.push(RecordedOrder {
            id,
            session_account: self.account_id.clone(),
            account_id: order.account_id.clone(),
            symbol: order.symbol.clone(),
            side: order.side,
            quantity: order.quantity,
            order_type: order.order_type,
        });

        if state.fill_mode == FillMode::Reject || state.reject_symbols.contains(&order.symbol) {
            return Err(BrokerError::Order(format!("mock: {} rejected", order.symbol)));
        }
        Ok(id)
    }

    fn order_status(&self, id: OrderId) -> Result<BrokerOrderStatus, BrokerError> {
        let state = self.live()?;
        let order = state
            .orders
            .iter()
            .find(|o| o.id == id && o.session_account == self.account_id)
            .ok_or_else(|| BrokerError::Order(format!("mock: unknown order {}", id.0)))?;
        let fill_price = state.quotes.get(&order.symbol).and_then(|q| q.last.or(q.mid()));
        let cancelled = state.cancelled.contains(&id);

        // Return status based on fill mode
        let (status, filled) = match &state.fill_mode {
            FillMode::ImmediateFull => (OrderState::Filled, order.quantity),
            FillMode::ImmediatePartial(frac) => {
                let filled = order.quantity * frac.clamp(0.0, 1.0);
                let status = if cancelled {
                    OrderState::Cancelled
                } else {
                    OrderState::PartiallyFilled
                };
                (status, filled)
            }
            FillMode::Reject => (OrderState::Rejected, 0.0),
        };

        Ok(BrokerOrderStatus {
            id,
            status,
            filled_quantity: filled,
            remaining_quantity: order.quantity - filled,
            avg_fill_price: if filled > 0.0 { fill_price } else { None },
        })
    }

    fn cancel_order(&self, id: OrderId) -> Result<(), BrokerError> {
        let mut state = self.live()?;
        state.cancelled.push(id);
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), BrokerError> {
        if self.connected {
            let mut state = lock(&self.state);
            state.disconnects += 1;
            state.open_sessions = state.open_sessions.saturating_sub(1);
            debug!("mock: session closed for {}", self.account_id);
        }
        self.connected = false;
        Ok(())
    }
}

impl Drop for MockSession {
    fn drop(&mut self) {
        if self.connected {
            let mut state = lock(&self.state);
            state.open_sessions = state.open_sessions.saturating_sub(1);
        }
    }
}
