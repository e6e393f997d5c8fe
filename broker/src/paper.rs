//! Paper book: build a [`MockBroker`] from a JSON file.
//!
//! Lets the CLI run the whole pipeline without a live broker.
//!
//! ```json
//! {
//!   "fill_mode": "full",
//!   "accounts": [
//!     { "id": "DU111", "cash_usd": 2000.0,
//!       "positions": [ { "symbol": "SPY", "quantity": 10, "price": 500.0 } ] }
//!   ],
//!   "quotes": [ { "symbol": "SPY", "bid": 499.9, "ask": 500.1, "last": 500.0 } ]
//! }
//! ```

use std::path::{Path, PathBuf};

use driftwise::Symbol;
use serde::Deserialize;

use crate::mock::{FillMode, MockBroker};
use crate::types::Quote;

/// Errors loading a paper book.
#[derive(Debug, thiserror::Error)]
pub enum PaperError {
    #[error("failed to read paper book {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse paper book: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("paper book error: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaperFill {
    #[default]
    Full,
    Partial(f64),
    Reject,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaperPosition {
    pub symbol: String,
    pub quantity: f64,
    pub price: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaperAccount {
    pub id: String,
    pub cash_usd: f64,
    #[serde(default)]
    pub net_liq: Option<f64>,
    #[serde(default)]
    pub positions: Vec<PaperPosition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaperQuote {
    pub symbol: String,
    #[serde(default)]
    pub bid: Option<f64>,
    #[serde(default)]
    pub ask: Option<f64>,
    #[serde(default)]
    pub last: Option<f64>,
    #[serde(default)]
    pub close: Option<f64>,
}

impl From<&PaperQuote> for Quote {
    fn from(q: &PaperQuote) -> Self {
        Quote {
            symbol: Symbol::new(&q.symbol),
            bid: q.bid,
            ask: q.ask,
            last: q.last,
            close: q.close,
        }
    }
}

/// Contents of a paper book file.
#[derive(Debug, Clone, Deserialize)]
pub struct PaperBook {
    #[serde(default)]
    pub fill_mode: PaperFill,
    pub accounts: Vec<PaperAccount>,
    #[serde(default)]
    pub quotes: Vec<PaperQuote>,
    #[serde(default)]
    pub delayed_quotes: Vec<PaperQuote>,
}

impl PaperBook {
    /// Load a paper book file.
    pub fn load(path: &Path) -> Result<Self, PaperError> {
        let contents = std::fs::read_to_string(path).map_err(|e| PaperError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_json(&contents)
    }

    /// Parse from a JSON string (useful for testing).
    pub fn from_json(json: &str) -> Result<Self, PaperError> {
        let book: PaperBook = serde_json::from_str(json)?;
        if book.accounts.iter().any(|a| a.id.trim().is_empty()) {
            return Err(PaperError::Invalid("empty account id".into()));
        }
        Ok(book)
    }

    /// Build the mock broker this book describes.
    pub fn into_broker(self) -> MockBroker {
        let fill_mode = match self.fill_mode {
            PaperFill::Full => FillMode::ImmediateFull,
            PaperFill::Partial(frac) => FillMode::ImmediatePartial(frac),
            PaperFill::Reject => FillMode::Reject,
        };
        let mut builder = MockBroker::builder().fill_mode(fill_mode);

        for account in &self.accounts {
            builder = builder.with_account(&account.id, account.cash_usd);
            if let Some(nl) = account.net_liq {
                builder = builder.with_net_liq(&account.id, nl);
            }
            for p in &account.positions {
                builder = builder.with_position(&account.id, &p.symbol, p.quantity, p.price);
            }
        }
        for q in &self.quotes {
            builder = builder.with_full_quote(q.into());
        }
        for q in &self.delayed_quotes {
            builder = builder.with_delayed_quote(q.into());
        }
        builder.build()
    }
}
