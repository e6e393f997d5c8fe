//! Flat, fully resolved rebalance configuration for one account.
//!
//! Layering of global defaults and per-account overrides happens in the
//! config loader; the engine only ever sees this resolved value.

use crate::error::ConfigError;

/// Policy deciding which drift records are eligible to trade.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "mode", rename_all = "snake_case"))]
pub enum TriggerMode {
    /// A holding trades when its own |drift| exceeds the band.
    PerHolding { band_bps: u32 },
    /// Holdings trade, largest first, until the remaining total |drift|
    /// falls to the band.
    TotalDrift { band_bps: u32 },
}

impl TriggerMode {
    /// Band as a weight fraction (50 bps = 0.005).
    #[inline]
    pub fn band(&self) -> f64 {
        let bps = match self {
            TriggerMode::PerHolding { band_bps } | TriggerMode::TotalDrift { band_bps } => {
                *band_bps
            }
        };
        bps as f64 / 10_000.0
    }
}

/// Cash deliberately withheld from trading.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", content = "amount", rename_all = "snake_case"))]
pub enum CashBuffer {
    /// Fraction of NetLiq (0.01 = 1%).
    Pct(f64),
    /// Fixed dollar amount.
    Abs(f64),
}

impl CashBuffer {
    /// Dollars reserved for an account with the given NetLiq.
    pub fn reserve(&self, net_liq: f64) -> f64 {
        match *self {
            CashBuffer::Pct(pct) => pct * net_liq.max(0.0),
            CashBuffer::Abs(abs) => abs,
        }
    }
}

/// Effective sizing/eligibility settings for one account.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RebalanceConfig {
    pub trigger: TriggerMode,
    /// Orders (and drifts) worth less than this are never traded.
    pub min_order_usd: f64,
    pub cash_buffer: CashBuffer,
    /// Fractional share quantities allowed; otherwise quantities are floored.
    pub allow_fractional: bool,
    /// Ceiling on gross exposure / NetLiq after sizing.
    pub max_leverage: f64,
}

impl Default for RebalanceConfig {
    fn default() -> Self {
        Self {
            trigger: TriggerMode::PerHolding { band_bps: 50 },
            min_order_usd: 100.0,
            cash_buffer: CashBuffer::Abs(0.0),
            allow_fractional: false,
            max_leverage: 1.5,
        }
    }
}

impl RebalanceConfig {
    /// Reject nonsensical values before they reach the sizing pipeline.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.min_order_usd.is_finite() || self.min_order_usd <= 0.0 {
            return Err(ConfigError::MinOrder(self.min_order_usd));
        }
        match self.cash_buffer {
            CashBuffer::Pct(pct) if !(0.0..=1.0).contains(&pct) => {
                return Err(ConfigError::CashBufferPct(pct));
            }
            CashBuffer::Abs(abs) if !abs.is_finite() || abs < 0.0 => {
                return Err(ConfigError::CashBufferAbs(abs));
            }
            _ => {}
        }
        if !self.max_leverage.is_finite() || self.max_leverage <= 0.0 {
            return Err(ConfigError::MaxLeverage(self.max_leverage));
        }
        Ok(())
    }
}
