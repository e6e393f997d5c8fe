//! JSONL audit trail logging.
//!
//! Each run appends events to an audit.jsonl file, one JSON object per line.

use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use driftwise::{Order, TargetWeights};
use serde::Serialize;

use crate::confirm::Decision;
use crate::error::Result;
use crate::orchestrator::{AccountOutcome, AccountPlan, OrderResult, RunSummary};

/// An audit event written to the JSONL trail.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub event: &'static str,
    pub ts: DateTime<Utc>,
    #[serde(flatten)]
    pub data: serde_json::Value,
}

/// Append-only audit logger.
pub struct AuditLog {
    writer: Box<dyn Write>,
}

impl AuditLog {
    /// Open (or create) the audit log file for appending.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            writer: Box::new(BufWriter::new(file)),
        })
    }

    /// A log that drops every event.
    pub fn discard() -> Self {
        Self {
            writer: Box::new(std::io::sink()),
        }
    }

    /// Log an event with arbitrary JSON data.
    pub fn log(&mut self, event: &'static str, data: serde_json::Value) -> Result<()> {
        let entry = AuditEvent {
            event,
            ts: Utc::now(),
            data,
        };
        let json = serde_json::to_string(&entry)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        writeln!(self.writer, "{json}")?;
        self.writer.flush()?;
        Ok(())
    }

    /// Log a simple event with no additional data.
    pub fn log_simple(&mut self, event: &'static str) -> Result<()> {
        self.log(event, serde_json::json!({}))
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<serde_json::Value> {
    serde_json::to_value(value)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e).into())
}

fn order_json(order: &Order) -> serde_json::Value {
    serde_json::json!({
        "symbol": order.symbol.as_str(),
        "side": order.side.to_string(),
        "qty": order.quantity,
        "est_price": order.est_price,
        "est_value": order.est_value,
    })
}

/// Convenience: log a run start event.
pub fn log_run_started(
    audit: &mut AuditLog,
    model_file: &str,
    accounts: &[&str],
    mode: &str,
) -> Result<()> {
    audit.log(
        "run_started",
        serde_json::json!({
            "model_file": model_file,
            "accounts": accounts,
            "mode": mode,
        }),
    )
}

/// Convenience: log the blended targets.
pub fn log_targets(audit: &mut AuditLog, targets: &TargetWeights) -> Result<()> {
    let weights: serde_json::Map<_, _> = targets
        .iter()
        .map(|(s, w)| (s.to_string(), serde_json::json!(w)))
        .collect();
    audit.log(
        "targets_built",
        serde_json::json!({
            "targets": weights,
            "total": targets.total(),
        }),
    )
}

/// Convenience: log a computed plan.
pub fn log_plan(audit: &mut AuditLog, plan: &AccountPlan) -> Result<()> {
    let sizing = &plan.sizing;
    let skipped: Vec<_> = sizing
        .skipped
        .iter()
        .map(|s| {
            serde_json::json!({
                "symbol": s.symbol.as_str(),
                "side": s.side.to_string(),
                "desired_usd": s.desired_usd,
                "reason": s.reason.to_string(),
            })
        })
        .collect();

    audit.log(
        "plan_computed",
        serde_json::json!({
            "account": plan.account_id(),
            "net_liq": plan.snapshot.net_liq,
            "cash_available": sizing.cash_available,
            "drifts": to_json(&plan.drifts)?,
            "eligible": to_json(&plan.prioritized)?,
            "orders": to_json(&sizing.orders)?,
            "skipped": skipped,
            "pre_leverage": sizing.pre_leverage,
            "post_leverage": sizing.post_leverage,
            "warning": sizing.warning.as_ref().map(|w| w.to_string()),
        }),
    )
}

/// Convenience: log a confirmation decision. `scope` is an account id or "all".
pub fn log_confirmation(audit: &mut AuditLog, scope: &str, decision: Decision) -> Result<()> {
    audit.log(
        "user_confirmed",
        serde_json::json!({
            "scope": scope,
            "approved": decision == Decision::Approve,
            "decision": format!("{decision:?}").to_lowercase(),
        }),
    )
}

/// Convenience: log the terminal state of one order.
pub fn log_order_result(audit: &mut AuditLog, result: &OrderResult) -> Result<()> {
    let mut data = order_json(&result.order);
    data["account"] = serde_json::json!(result.order.account_id);
    data["order_id"] = serde_json::json!(result.broker_id.map(|id| id.0));
    data["state"] = serde_json::json!(format!("{:?}", result.state));
    data["filled"] = serde_json::json!(result.filled_quantity);
    data["avg_price"] = serde_json::json!(result.avg_fill_price);
    data["message"] = serde_json::json!(result.message);
    audit.log("order_result", data)
}

/// Convenience: log an account's final outcome.
pub fn log_account_completed(audit: &mut AuditLog, outcome: &AccountOutcome) -> Result<()> {
    audit.log(
        "account_completed",
        serde_json::json!({
            "account": outcome.account_id,
            "status": outcome.status.to_string(),
            "orders": outcome.order_results.len(),
            "warnings": outcome.warnings,
            "error": outcome.error.as_ref().map(|e| e.to_string()),
            "skip_reason": outcome.skip_reason,
        }),
    )
}

/// Convenience: log run completion.
pub fn log_run_completed(audit: &mut AuditLog, summary: &RunSummary) -> Result<()> {
    let counts = summary.status_counts();
    let counts: serde_json::Map<_, _> = counts
        .iter()
        .map(|(status, n)| (status.to_string(), serde_json::json!(n)))
        .collect();
    audit.log(
        "run_completed",
        serde_json::json!({
            "completion": summary.completion.to_string(),
            "accounts": counts,
        }),
    )
}
