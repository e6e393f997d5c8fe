//! Core types: Symbol and the CASH pseudo-symbol.

use std::borrow::Borrow;
use std::fmt;

/// Ticker of a tradable instrument.
///
/// Symbols are normalized to trimmed uppercase on construction so that
/// `"spy"` and `" SPY "` compare equal. Ordering is plain byte order of the
/// normalized text, which is the alphabetical order every drift table uses.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(from = "String", into = "String"))]
pub struct Symbol(String);

impl Symbol {
    /// Text of the reserved cash (or margin, when negative) pseudo-symbol.
    pub const CASH: &'static str = "CASH";

    /// Create a symbol, normalizing to trimmed uppercase.
    pub fn new(s: &str) -> Self {
        Symbol(s.trim().to_ascii_uppercase())
    }

    /// The CASH pseudo-symbol.
    pub fn cash() -> Self {
        Symbol(Self::CASH.to_string())
    }

    /// True for the CASH pseudo-symbol.
    #[inline]
    pub fn is_cash(&self) -> bool {
        self.0 == Self::CASH
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True if the normalized text is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Pad like a str so table columns line up.
        f.pad(&self.0)
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Symbol::new(s)
    }
}

impl From<String> for Symbol {
    fn from(s: String) -> Self {
        Symbol::new(&s)
    }
}

impl From<Symbol> for String {
    fn from(s: Symbol) -> Self {
        s.0
    }
}

impl Borrow<str> for Symbol {
    fn borrow(&self) -> &str {
        &self.0
    }
}
