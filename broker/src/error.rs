//! Broker error types.

/// Errors that can occur during broker operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BrokerError {
    /// Connecting to one account failed; other accounts may still work.
    #[error("connection error: {0}")]
    Connection(String),

    /// The broker cannot be reached at all.
    #[error("broker unreachable: {0}")]
    Unreachable(String),

    #[error("not connected")]
    NotConnected,

    #[error("invalid symbol: {0}")]
    InvalidSymbol(String),

    #[error("no price for {0}")]
    NoPrice(String),

    #[error("order error: {0}")]
    Order(String),

    #[error("{0}")]
    Other(String),
}

impl BrokerError {
    /// True for errors no other account can recover from.
    pub fn is_fatal(&self) -> bool {
        matches!(self, BrokerError::Unreachable(_))
    }
}
