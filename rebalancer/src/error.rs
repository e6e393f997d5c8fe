//! Error types for the rebalancer.

use std::path::PathBuf;

use driftwise_broker::BrokerError;
use driftwise_broker::paper::PaperError;

/// Run-level errors: anything that stops the process rather than one account.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("model file error: {0}")]
    Models(String),

    #[error("failed to read model file {path}: {source}")]
    ModelsRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse model JSON: {0}")]
    ModelsParse(#[from] serde_json::Error),

    #[error(transparent)]
    Paper(#[from] PaperError),

    #[error("audit log error: {0}")]
    Audit(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Failure confined to one account. Recorded on that account's outcome;
/// the run moves on to the next account.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AccountError {
    #[error("connect failed: {0}")]
    Connect(BrokerError),

    #[error("snapshot failed: {0}")]
    Snapshot(BrokerError),

    #[error("pricing failed: {0}")]
    Pricing(BrokerError),

    #[error("submit failed: {0}")]
    Submit(BrokerError),

    #[error("order for account {order_account} reached session for {session_account}")]
    Misattributed {
        order_account: String,
        session_account: String,
    },

    #[error("invalid settings: {0}")]
    Settings(String),

    #[error("audit log error: {0}")]
    Audit(String),
}

impl AccountError {
    /// Broker error behind this failure, if any.
    pub fn broker_error(&self) -> Option<&BrokerError> {
        match self {
            AccountError::Connect(e)
            | AccountError::Snapshot(e)
            | AccountError::Pricing(e)
            | AccountError::Submit(e) => Some(e),
            _ => None,
        }
    }

    /// True when the broker itself is gone and no later account can succeed.
    pub fn is_fatal(&self) -> bool {
        self.broker_error().is_some_and(BrokerError::is_fatal)
    }
}
