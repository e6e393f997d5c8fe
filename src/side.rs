//! Order side and drift action.

use std::fmt;

/// Side of an order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Sign applied to a position value when this side trades: `+1` buy, `-1` sell.
    #[inline]
    pub fn sign(self) -> f64 {
        match self {
            Side::Buy => 1.0,
            Side::Sell => -1.0,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        })
    }
}

/// Action implied by a drift record.
///
/// Underweight holdings (negative dollar drift) imply a buy, overweight ones a
/// sell. A drift of exactly zero holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Action {
    Buy,
    Sell,
    Hold,
}

impl Action {
    /// Classify a signed dollar drift (`current - target`).
    pub fn from_drift_usd(drift_usd: f64) -> Self {
        if drift_usd < 0.0 {
            Action::Buy
        } else if drift_usd > 0.0 {
            Action::Sell
        } else {
            Action::Hold
        }
    }

    /// The order side this action trades on, if any.
    pub fn side(self) -> Option<Side> {
        match self {
            Action::Buy => Some(Side::Buy),
            Action::Sell => Some(Side::Sell),
            Action::Hold => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Action::Buy => "BUY",
            Action::Sell => "SELL",
            Action::Hold => "HOLD",
        })
    }
}
