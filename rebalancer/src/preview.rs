//! Text previews of plans and run summaries.

use std::fmt;

use driftwise::TargetWeights;

use crate::orchestrator::{AccountPlan, RunSummary};

impl fmt::Display for AccountPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snap = &self.snapshot;
        writeln!(
            f,
            "ACCOUNT {}: NetLiq ${:.2}, cash ${:.2}",
            snap.account_id, snap.net_liq, snap.cash_usd
        )?;

        writeln!(f, "\nDRIFT:")?;
        writeln!(
            f,
            "  {:8} {:>9} {:>9} {:>9} {:>12}  {}",
            "Symbol", "Target%", "Current%", "Drift%", "Drift$", "Action"
        )?;
        for d in &self.drifts {
            writeln!(
                f,
                "  {:8} {:>8.2}% {:>8.2}% {:>+8.2}% {:>+12.2}  {}",
                d.symbol,
                d.target_pct * 100.0,
                d.current_pct * 100.0,
                d.drift_pct * 100.0,
                d.drift_usd,
                d.action,
            )?;
        }

        let sizing = &self.sizing;
        if sizing.orders.is_empty() {
            writeln!(f, "\nNo orders.")?;
        } else {
            writeln!(f, "\nORDERS:")?;
            for (i, order) in sizing.orders.iter().enumerate() {
                writeln!(f, "  {:>3}  {order}", i + 1)?;
            }
            writeln!(
                f,
                "\n  Sells ${:.2}, buys ${:.2}, cash available ${:.2}",
                sizing.sell_usd, sizing.buy_usd, sizing.cash_available
            )?;
        }

        writeln!(
            f,
            "  Exposure ${:.2} ({:.3}x) -> ${:.2} ({:.3}x), max {:.3}x",
            sizing.pre_gross_exposure,
            sizing.pre_leverage,
            sizing.post_gross_exposure,
            sizing.post_leverage,
            self.config.max_leverage,
        )?;

        if !sizing.trimmed.is_empty() {
            writeln!(f, "\nTRIMMED:")?;
            for t in &sizing.trimmed {
                writeln!(
                    f,
                    "  {:8} {} -> {} (${:.2} -> ${:.2})",
                    t.symbol, t.from_quantity, t.to_quantity, t.from_value, t.to_value
                )?;
            }
        }
        if !sizing.skipped.is_empty() {
            writeln!(f, "\nSKIPPED:")?;
            for s in &sizing.skipped {
                writeln!(
                    f,
                    "  {:8} {:4} ${:>10.2}  {}",
                    s.symbol, s.side, s.desired_usd, s.reason
                )?;
            }
        }
        if let Some(w) = &sizing.warning {
            writeln!(f, "\nWARNING: {w}")?;
        }
        Ok(())
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "RUN SUMMARY ({}):", self.completion)?;
        for o in &self.outcomes {
            write!(f, "  {:12} {:10}", o.account_id, o.status.to_string())?;
            if !o.order_results.is_empty() {
                let filled = o.order_results.iter().filter(|r| r.is_fully_filled()).count();
                write!(f, " {filled}/{} orders filled", o.order_results.len())?;
            }
            if let Some(e) = &o.error {
                write!(f, " error: {e}")?;
            }
            if let Some(reason) = &o.skip_reason {
                write!(f, " ({reason})")?;
            }
            writeln!(f)?;
            for w in &o.warnings {
                writeln!(f, "      warning: {w}")?;
            }
        }
        Ok(())
    }
}

/// Table of blended target weights.
pub fn format_targets(targets: &TargetWeights) -> String {
    let mut out = String::from("TARGETS:\n");
    for (symbol, weight) in targets.iter() {
        out.push_str(&format!("  {:8} {:>8.2}%\n", symbol, weight * 100.0));
    }
    out.push_str(&format!("  {:8} {:>8.2}%\n", "Total", targets.total() * 100.0));
    out
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use driftwise::{AccountSnapshot, ModelMix, ModelPortfolio, Prices, RebalanceConfig, Symbol, build_targets};

    use super::*;
    use crate::orchestrator::{AccountContext, plan_account};

    fn targets() -> TargetWeights {
        build_targets(
            &[ModelPortfolio::new("core")
                .with_weight("SPY", 0.6)
                .with_weight("AGG", 0.4)],
            &ModelMix::new().with("core", 1.0),
        )
    }

    #[test]
    fn plan_preview_lists_orders_and_skips() {
        let ctx = AccountContext {
            account_id: "DU1".into(),
            targets: Arc::new(targets()),
            config: RebalanceConfig::default(),
        };
        let mut prices = Prices::default();
        prices.insert(Symbol::new("SPY"), 500.0);
        let plan = plan_account(&ctx, AccountSnapshot::new("DU1", 10_000.0, 10_000.0), prices);

        let text = plan.to_string();
        assert!(text.starts_with("ACCOUNT DU1"));
        assert!(text.contains("ORDERS:"));
        assert!(text.contains("SPY"));
        assert!(text.contains("SKIPPED:"));
        assert!(text.contains("AGG"));
    }

    #[test]
    fn targets_table_has_total() {
        let text = format_targets(&targets());
        assert!(text.contains("SPY"));
        assert!(text.contains("100.00%"));
    }
}
