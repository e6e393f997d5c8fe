//! driftwise-rebalancer: multi-account drift rebalancing around the driftwise engine.
//!
//! Loads the TOML config and the JSON model file, blends the targets once,
//! then for each configured account opens a broker session, plans orders,
//! asks for confirmation and executes, writing a JSONL audit trail.

pub mod audit;
pub mod config;
pub mod confirm;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod preview;
pub mod pricing;
