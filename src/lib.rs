//! # driftwise
//!
//! Decision engine for drift-based rebalancing of one or more brokerage
//! accounts against a blend of model portfolios.
//!
//! ## Pipeline
//!
//! 1. [`build_targets`] blends model portfolios by a [`ModelMix`] into one
//!    [`TargetWeights`] vector (computed once per run).
//! 2. [`compute_drift`] compares targets with an [`AccountSnapshot`] and
//!    returns one [`DriftRecord`] per symbol, alphabetically.
//! 3. [`select_eligible`] applies the [`TriggerMode`] band.
//! 4. [`prioritize_by_drift`] drops small drifts and ranks the rest.
//! 5. [`size_orders`] turns the ranking into [`Order`]s under the cash buffer
//!    and leverage ceiling.
//!
//! Everything here is pure: no I/O, no broker, no clock. Connectivity,
//! confirmation and execution live in the `driftwise-rebalancer` crate.
//!
//! ## Quick Start
//!
//! ```
//! use driftwise::{
//!     AccountSnapshot, ModelMix, ModelPortfolio, Prices, RebalanceConfig, Side, Symbol,
//!     build_targets, compute_drift, prioritize_by_drift, select_eligible, size_orders,
//! };
//!
//! let models = [ModelPortfolio::new("core")
//!     .with_weight("SPY", 0.6)
//!     .with_weight("AGG", 0.4)];
//! let targets = build_targets(&models, &ModelMix::new().with("core", 1.0));
//!
//! let snapshot = AccountSnapshot::new("DU123", 1_000.0, 10_000.0)
//!     .with_holding("SPY", 10.0, 5_000.0)
//!     .with_holding("AGG", 40.0, 4_000.0);
//! let config = RebalanceConfig::default();
//!
//! let drifts = compute_drift(&snapshot, &targets);
//! let eligible = select_eligible(&drifts, config.trigger);
//! let ranked = prioritize_by_drift(&eligible, config.min_order_usd);
//!
//! let mut prices = Prices::default();
//! prices.insert(Symbol::new("SPY"), 500.0);
//! prices.insert(Symbol::new("AGG"), 100.0);
//!
//! let plan = size_orders("DU123", &ranked, &snapshot, &prices, &config);
//! assert_eq!(plan.orders.len(), 1);
//! assert_eq!(plan.orders[0].side, Side::Buy);
//! assert_eq!(plan.orders[0].quantity, 2.0);
//! ```
//!
//! ## Units
//!
//! Money is `f64` USD and weights are fractions of NetLiq (`0.42` = 42%).
//! Quantities are `f64` so fractional shares can be represented; with
//! fractional trading off they are always whole.

pub mod config;
pub mod drift;
mod error;
pub mod prioritize;
mod side;
pub mod sizing;
pub mod snapshot;
pub mod targets;
mod types;

// Re-export public API
pub use config::{CashBuffer, RebalanceConfig, TriggerMode};
pub use drift::{DriftRecord, compute_drift, select_eligible};
pub use error::ConfigError;
pub use prioritize::prioritize_by_drift;
pub use side::{Action, Side};
pub use sizing::{
    Order, Prices, SizingResult, SizingWarning, SkipReason, SkippedTrade, TrimmedOrder,
    size_orders,
};
pub use snapshot::{AccountSnapshot, Holding};
pub use targets::{ModelMix, ModelPortfolio, TARGET_SUM_TOLERANCE, TargetWeights, build_targets};
pub use types::Symbol;
