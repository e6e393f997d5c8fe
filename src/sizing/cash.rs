//! Cash buffer and the running cash ledger used while sizing buys.

use crate::config::CashBuffer;

/// Cash available to trade: `cash - buffer`, floored at 0.
pub fn available_cash(cash: f64, net_liq: f64, buffer: CashBuffer) -> f64 {
    // f64::max ignores NaN, so a NaN balance yields 0.
    (cash - buffer.reserve(net_liq)).max(0.0)
}

/// Tracks cash while a batch is sized.
///
/// Sell proceeds are credited before buys are sized: they are assumed to
/// settle in time to fund buys in the same batch.
#[derive(Clone, Debug, PartialEq)]
pub struct CashLedger {
    available: f64,
    proceeds: f64,
    spent: f64,
}

impl CashLedger {
    pub fn new(cash: f64, net_liq: f64, buffer: CashBuffer) -> Self {
        Self {
            available: available_cash(cash, net_liq, buffer),
            proceeds: 0.0,
            spent: 0.0,
        }
    }

    /// Cash after the buffer, before any sell proceeds.
    #[inline]
    pub fn available(&self) -> f64 {
        self.available
    }

    #[inline]
    pub fn proceeds(&self) -> f64 {
        self.proceeds
    }

    #[inline]
    pub fn spent(&self) -> f64 {
        self.spent
    }

    /// Cash not yet allocated to a buy.
    pub fn remaining(&self) -> f64 {
        (self.available + self.proceeds - self.spent).max(0.0)
    }

    /// Add sell proceeds.
    pub fn credit(&mut self, proceeds: f64) {
        self.proceeds += proceeds;
    }

    /// Largest amount a buy wanting `desired` dollars may take right now.
    pub fn allocation(&self, desired: f64) -> f64 {
        desired.max(0.0).min(self.remaining())
    }

    /// Record cash actually committed to a buy.
    pub fn spend(&mut self, value: f64) {
        self.spent += value;
    }

    /// Return cash from a buy that was later reduced.
    pub fn release(&mut self, value: f64) {
        self.spent = (self.spent - value).max(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pct_buffer() {
        // $200 cash, 1% of $10,000 reserved
        assert_eq!(available_cash(200.0, 10_000.0, CashBuffer::Pct(0.01)), 100.0);
    }

    #[test]
    fn abs_buffer_clamped_to_zero() {
        assert_eq!(available_cash(200.0, 10_000.0, CashBuffer::Abs(500.0)), 0.0);
        assert_eq!(available_cash(-1_000.0, 10_000.0, CashBuffer::Abs(0.0)), 0.0);
        assert_eq!(available_cash(f64::NAN, 10_000.0, CashBuffer::Abs(0.0)), 0.0);
    }

    #[test]
    fn ledger_flow() {
        let mut ledger = CashLedger::new(200.0, 10_000.0, CashBuffer::Pct(0.01));
        assert_eq!(ledger.allocation(300.0), 100.0);

        ledger.credit(250.0);
        assert_eq!(ledger.remaining(), 350.0);

        ledger.spend(300.0);
        assert_eq!(ledger.remaining(), 50.0);
        assert_eq!(ledger.allocation(80.0), 50.0);

        ledger.release(100.0);
        assert_eq!(ledger.remaining(), 150.0);
        assert_eq!(ledger.spent(), 200.0);
    }

    #[test]
    fn negative_desired_allocates_nothing() {
        let ledger = CashLedger::new(1_000.0, 1_000.0, CashBuffer::Abs(0.0));
        assert_eq!(ledger.allocation(-10.0), 0.0);
    }
}
