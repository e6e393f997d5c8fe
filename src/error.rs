//! Validation errors for the flat rebalance configuration.

/// Errors returned by [`RebalanceConfig::validate`](crate::RebalanceConfig::validate).
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("min_order_usd must be positive and finite, got {0}")]
    MinOrder(f64),

    #[error("cash_buffer_pct must be in [0, 1], got {0}")]
    CashBufferPct(f64),

    #[error("cash_buffer_abs must be >= 0 and finite, got {0}")]
    CashBufferAbs(f64),

    #[error("max_leverage must be positive and finite, got {0}")]
    MaxLeverage(f64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        assert_eq!(
            ConfigError::MaxLeverage(0.0).to_string(),
            "max_leverage must be positive and finite, got 0"
        );
        assert!(ConfigError::CashBufferPct(1.5).to_string().contains("[0, 1]"));
    }

    #[test]
    fn is_error() {
        let err: Box<dyn std::error::Error> = Box::new(ConfigError::MinOrder(-1.0));
        assert!(err.to_string().contains("min_order_usd"));
    }
}
