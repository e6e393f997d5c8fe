//! Account orchestrator: snapshot → plan → confirm → execute, per account.
//!
//! Accounts run strictly one after another in configured order. Each one gets
//! a fresh broker session that is disconnected before the next account is
//! touched; the blended targets are the only state shared between accounts.
//! A failure is recorded on that account's [`AccountOutcome`] and the run
//! moves on, except for an unreachable broker, which stops the run.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use driftwise::{
    AccountSnapshot, DriftRecord, Order, Prices, RebalanceConfig, SizingResult, SkipReason,
    TargetWeights, build_targets, compute_drift, prioritize_by_drift, select_eligible,
    size_orders,
};
use driftwise_broker::{BrokerError, BrokerOrder, BrokerSession, Connector, OrderId, OrderState};
use log::{debug, error, info, warn};

use crate::audit::{self, AuditLog};
use crate::config::{Config, ConfirmationMode, ExecutionConfig};
use crate::confirm::{Confirmer, Decision};
use crate::error::{AccountError, Error, Result};
use crate::models::ModelFile;
use crate::pricing;

/// Lifecycle of one account within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AccountStatus {
    Pending,
    Snapshotted,
    Planned,
    AwaitingConfirmation,
    Submitted,
    Filled,
    Partial,
    Rejected,
    Skipped,
    Failed,
}

impl AccountStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            AccountStatus::Filled
                | AccountStatus::Partial
                | AccountStatus::Rejected
                | AccountStatus::Skipped
                | AccountStatus::Failed
        )
    }

    /// Whether moving from `self` to `next` is a legal step.
    pub fn can_transition_to(self, next: AccountStatus) -> bool {
        use AccountStatus::*;
        if self.is_terminal() {
            return false;
        }
        match (self, next) {
            (_, Failed) => true,
            (Pending, Snapshotted | Skipped) => true,
            (Snapshotted, Planned) => true,
            (Planned, AwaitingConfirmation | Skipped) => true,
            (AwaitingConfirmation, Submitted | Skipped) => true,
            (Submitted, Filled | Partial | Rejected | Skipped) => true,
            _ => false,
        }
    }

    /// True for outcomes that make the run a partial failure.
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            AccountStatus::Failed | AccountStatus::Rejected | AccountStatus::Partial
        )
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AccountStatus::Pending => "pending",
            AccountStatus::Snapshotted => "snapshotted",
            AccountStatus::Planned => "planned",
            AccountStatus::AwaitingConfirmation => "awaiting_confirmation",
            AccountStatus::Submitted => "submitted",
            AccountStatus::Filled => "filled",
            AccountStatus::Partial => "partial",
            AccountStatus::Rejected => "rejected",
            AccountStatus::Skipped => "skipped",
            AccountStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Shared cancellation flag, checked at every account boundary, between
/// orders and while an order is being polled.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything needed to plan one account.
#[derive(Debug, Clone)]
pub struct AccountContext {
    pub account_id: String,
    pub targets: Arc<TargetWeights>,
    /// Global settings with this account's overrides applied.
    pub config: RebalanceConfig,
}

/// Planning result for one account.
#[derive(Debug, Clone)]
pub struct AccountPlan {
    pub snapshot: AccountSnapshot,
    /// Every drift record, alphabetical.
    pub drifts: Vec<DriftRecord>,
    /// Records that passed the trigger and the minimum, highest priority first.
    pub prioritized: Vec<DriftRecord>,
    pub prices: Prices,
    pub config: RebalanceConfig,
    pub sizing: SizingResult,
}

impl AccountPlan {
    pub fn account_id(&self) -> &str {
        &self.snapshot.account_id
    }

    pub fn orders(&self) -> &[Order] {
        &self.sizing.orders
    }

    pub fn has_orders(&self) -> bool {
        !self.sizing.orders.is_empty()
    }

    /// Human-readable warnings: leverage and unpriced symbols.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings: Vec<String> = self
            .sizing
            .warning
            .iter()
            .map(|w| w.to_string())
            .collect();
        warnings.extend(
            self.sizing
                .skipped
                .iter()
                .filter(|s| s.reason == SkipReason::PriceUnavailable)
                .map(|s| format!("{}: {}", s.symbol, s.reason)),
        );
        warnings
    }
}

/// Plan one account from a snapshot and prices. Pure.
pub fn plan_account(ctx: &AccountContext, snapshot: AccountSnapshot, prices: Prices) -> AccountPlan {
    let drifts = compute_drift(&snapshot, &ctx.targets);
    let eligible = select_eligible(&drifts, ctx.config.trigger);
    let prioritized = prioritize_by_drift(&eligible, ctx.config.min_order_usd);
    let sizing = size_orders(&ctx.account_id, &prioritized, &snapshot, &prices, &ctx.config);
    AccountPlan {
        snapshot,
        drifts,
        prioritized,
        prices,
        config: ctx.config.clone(),
        sizing,
    }
}

const FILL_EPSILON: f64 = 1e-9;

/// Terminal state of one submitted (or refused) order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderResult {
    pub order: Order,
    /// `None` when the broker refused the order at submission.
    pub broker_id: Option<OrderId>,
    pub state: OrderState,
    pub filled_quantity: f64,
    pub avg_fill_price: Option<f64>,
    pub message: Option<String>,
}

impl OrderResult {
    pub fn is_fully_filled(&self) -> bool {
        self.state == OrderState::Filled
            || self.filled_quantity >= self.order.quantity - FILL_EPSILON
    }

    pub fn has_fill(&self) -> bool {
        self.filled_quantity > 0.0
    }
}

/// What happened to one account.
#[derive(Debug, Clone)]
pub struct AccountOutcome {
    pub account_id: String,
    pub status: AccountStatus,
    /// Every status the account passed through, starting at `Pending`.
    pub history: Vec<AccountStatus>,
    pub plan: Option<AccountPlan>,
    pub order_results: Vec<OrderResult>,
    pub warnings: Vec<String>,
    pub error: Option<AccountError>,
    pub skip_reason: Option<String>,
}

impl AccountOutcome {
    pub fn new(account_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            status: AccountStatus::Pending,
            history: vec![AccountStatus::Pending],
            plan: None,
            order_results: Vec::new(),
            warnings: Vec::new(),
            error: None,
            skip_reason: None,
        }
    }

    /// Move to `next`. Illegal transitions are refused and logged.
    pub fn advance(&mut self, next: AccountStatus) -> bool {
        if !self.status.can_transition_to(next) {
            error!(
                "account {}: illegal transition {} -> {next}",
                self.account_id, self.status
            );
            return false;
        }
        debug!("account {}: {} -> {next}", self.account_id, self.status);
        self.status = next;
        self.history.push(next);
        true
    }

    fn fail(&mut self, err: AccountError) {
        error!("account {}: {err}", self.account_id);
        self.advance(AccountStatus::Failed);
        self.error = Some(err);
    }

    fn skip(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        info!("account {}: skipped ({reason})", self.account_id);
        self.advance(AccountStatus::Skipped);
        self.skip_reason = Some(reason);
    }

    /// True if the broker is gone and the run must stop.
    pub fn is_fatal(&self) -> bool {
        self.error.as_ref().is_some_and(AccountError::is_fatal)
    }
}

/// How the run as a whole ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Success,
    PartialFailure,
    Cancelled,
    Fatal,
}

impl Completion {
    /// Process exit code for the CLI.
    pub fn exit_code(self) -> i32 {
        match self {
            Completion::Success => 0,
            Completion::Fatal => 1,
            Completion::PartialFailure => 3,
            Completion::Cancelled => 130,
        }
    }
}

impl fmt::Display for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Completion::Success => "success",
            Completion::PartialFailure => "partial_failure",
            Completion::Cancelled => "cancelled",
            Completion::Fatal => "fatal",
        };
        f.write_str(s)
    }
}

/// Aggregate of every account's outcome.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub started: DateTime<Utc>,
    pub finished: DateTime<Utc>,
    pub outcomes: Vec<AccountOutcome>,
    pub completion: Completion,
}

impl RunSummary {
    pub fn outcome(&self, account_id: &str) -> Option<&AccountOutcome> {
        self.outcomes.iter().find(|o| o.account_id == account_id)
    }

    pub fn status_counts(&self) -> BTreeMap<AccountStatus, usize> {
        let mut counts = BTreeMap::new();
        for o in &self.outcomes {
            *counts.entry(o.status).or_insert(0) += 1;
        }
        counts
    }

    pub fn exit_code(&self) -> i32 {
        self.completion.exit_code()
    }
}

/// Options for a rebalance run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Plan and preview only.
    pub dry_run: bool,
    /// Plan and preview only; the account must not be traded.
    pub read_only: bool,
    /// Print plan previews to stdout.
    pub print_previews: bool,
    /// Shown in the audit trail.
    pub model_file: String,
}

impl RunOptions {
    fn no_trade_reason(&self) -> Option<&'static str> {
        if self.read_only {
            Some("read-only")
        } else if self.dry_run {
            Some("dry run")
        } else {
            None
        }
    }
}

/// Runs the rebalance pipeline across every configured account.
pub struct Orchestrator<'a> {
    config: &'a Config,
    connector: &'a dyn Connector,
    confirmer: &'a dyn Confirmer,
    audit: AuditLog,
    cancel: CancelToken,
    options: RunOptions,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        config: &'a Config,
        connector: &'a dyn Connector,
        confirmer: &'a dyn Confirmer,
        audit: AuditLog,
    ) -> Self {
        Self {
            config,
            connector,
            confirmer,
            audit,
            cancel: CancelToken::new(),
            options: RunOptions::default(),
        }
    }

    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Blend the model file by the configured mix.
    pub fn build_targets(config: &Config, models: &ModelFile) -> Result<TargetWeights> {
        let mix = config.mix();
        models.check_mix(&mix)?;
        let targets = build_targets(&models.portfolios(), &mix);
        if !targets.is_balanced() {
            return Err(Error::Models(format!(
                "blended targets sum to {:.4}, expected 1.0",
                targets.total()
            )));
        }
        Ok(targets)
    }

    /// Run every account and return the aggregated summary.
    pub fn run(&mut self, models: &ModelFile) -> Result<RunSummary> {
        let started = Utc::now();
        let config = self.config;
        let account_ids: Vec<&str> = config.account_ids().collect();
        let mode = match self.config.confirmation.mode {
            ConfirmationMode::PerAccount => "per_account",
            ConfirmationMode::Global => "global",
        };
        audit::log_run_started(&mut self.audit, &self.options.model_file, &account_ids, mode)?;

        let targets = Arc::new(Self::build_targets(self.config, models)?);
        audit::log_targets(&mut self.audit, &targets)?;
        info!(
            "targets built: {} symbols across {} models",
            targets.len(),
            models.models.len()
        );

        let outcomes = match self.config.confirmation.mode {
            ConfirmationMode::PerAccount => self.run_per_account(&targets),
            ConfirmationMode::Global => self.run_global(&targets),
        };

        let summary = RunSummary {
            started,
            finished: Utc::now(),
            completion: self.completion(&outcomes),
            outcomes,
        };
        audit::log_run_completed(&mut self.audit, &summary)?;
        info!("run finished: {}", summary.completion);
        Ok(summary)
    }

    fn completion(&self, outcomes: &[AccountOutcome]) -> Completion {
        if outcomes.iter().any(AccountOutcome::is_fatal) {
            Completion::Fatal
        } else if self.cancel.is_cancelled() {
            Completion::Cancelled
        } else if outcomes.iter().any(|o| o.status.is_failure()) {
            Completion::PartialFailure
        } else {
            Completion::Success
        }
    }

    fn context(
        &self,
        account_id: &str,
        targets: &Arc<TargetWeights>,
    ) -> std::result::Result<AccountContext, AccountError> {
        let config = self
            .config
            .effective_for(account_id)
            .map_err(|e| AccountError::Settings(e.to_string()))?;
        Ok(AccountContext {
            account_id: account_id.to_string(),
            targets: Arc::clone(targets),
            config,
        })
    }

    /// Outcomes for accounts never started because the run stopped early.
    fn not_attempted(&mut self, ids: &[&str], reason: &str) -> Vec<AccountOutcome> {
        ids.iter()
            .map(|id| {
                let mut outcome = AccountOutcome::new(*id);
                outcome.skip(reason);
                self.finish(&mut outcome);
                outcome
            })
            .collect()
    }

    fn stop_reason(&self, outcomes: &[AccountOutcome]) -> Option<&'static str> {
        if outcomes.last().is_some_and(AccountOutcome::is_fatal) {
            Some("not attempted: broker unreachable")
        } else if self.cancel.is_cancelled() {
            Some("cancelled")
        } else {
            None
        }
    }

    fn run_per_account(&mut self, targets: &Arc<TargetWeights>) -> Vec<AccountOutcome> {
        let config = self.config;
        let ids: Vec<&str> = config.account_ids().collect();
        let mut outcomes = Vec::with_capacity(ids.len());

        for (i, id) in ids.iter().enumerate() {
            if let Some(reason) = self.stop_reason(&outcomes) {
                outcomes.extend(self.not_attempted(&ids[i..], reason));
                break;
            }
            let outcome = match self.context(id, targets) {
                Ok(ctx) => self.process_account(&ctx),
                Err(e) => {
                    let mut outcome = AccountOutcome::new(*id);
                    outcome.fail(e);
                    self.finish(&mut outcome);
                    outcome
                }
            };
            outcomes.push(outcome);
        }
        outcomes
    }

    /// Plan, confirm and execute one account on its own session.
    pub fn process_account(&mut self, ctx: &AccountContext) -> AccountOutcome {
        let mut outcome = AccountOutcome::new(&ctx.account_id);
        info!("account {}: starting", ctx.account_id);

        let mut session = match self.connect(&ctx.account_id) {
            Ok(s) => s,
            Err(e) => {
                outcome.fail(e);
                self.finish(&mut outcome);
                return outcome;
            }
        };

        self.plan_on_session(session.as_ref(), ctx, &mut outcome);

        if outcome.status == AccountStatus::Planned && self.cancel.is_cancelled() {
            outcome.skip("cancelled");
        }
        if outcome.status == AccountStatus::Planned {
            match self.no_trade(&outcome) {
                Some(reason) => outcome.skip(reason),
                None => {
                    outcome.advance(AccountStatus::AwaitingConfirmation);
                    let decision = self.confirmer.confirm(&format!(
                        "Execute {} orders for account {}?",
                        outcome.plan.as_ref().map_or(0, |p| p.orders().len()),
                        ctx.account_id
                    ));
                    self.apply_decision(&mut outcome, &ctx.account_id, decision);
                    if outcome.status == AccountStatus::AwaitingConfirmation {
                        self.execute(session.as_ref(), &mut outcome);
                    }
                }
            }
        }

        self.disconnect(session.as_mut());
        self.finish(&mut outcome);
        outcome
    }

    fn run_global(&mut self, targets: &Arc<TargetWeights>) -> Vec<AccountOutcome> {
        let config = self.config;
        let ids: Vec<&str> = config.account_ids().collect();
        let mut outcomes: Vec<AccountOutcome> = Vec::with_capacity(ids.len());

        // Phase 1: plan every account, one session at a time
        for (i, id) in ids.iter().enumerate() {
            if let Some(reason) = self.stop_reason(&outcomes) {
                outcomes.extend(self.not_attempted(&ids[i..], reason));
                return self.skip_planned(outcomes, reason);
            }
            let mut outcome = AccountOutcome::new(*id);
            match self.context(id, targets) {
                Ok(ctx) => match self.connect(id) {
                    Ok(mut session) => {
                        self.plan_on_session(session.as_ref(), &ctx, &mut outcome);
                        self.disconnect(session.as_mut());
                    }
                    Err(e) => outcome.fail(e),
                },
                Err(e) => outcome.fail(e),
            }
            if outcome.status == AccountStatus::Planned {
                if let Some(reason) = self.no_trade(&outcome) {
                    outcome.skip(reason);
                }
            }
            if outcome.status.is_terminal() {
                self.finish(&mut outcome);
            }
            outcomes.push(outcome);
        }
        if outcomes.last().is_some_and(AccountOutcome::is_fatal) {
            return self.skip_planned(outcomes, "not attempted: broker unreachable");
        }

        // Phase 2: one confirmation for everything that is left
        let pending: Vec<usize> = outcomes
            .iter()
            .enumerate()
            .filter(|(_, o)| o.status == AccountStatus::Planned)
            .map(|(i, _)| i)
            .collect();
        if pending.is_empty() {
            return outcomes;
        }
        let order_count: usize = pending
            .iter()
            .filter_map(|&i| outcomes[i].plan.as_ref())
            .map(|p| p.orders().len())
            .sum();
        for &i in &pending {
            outcomes[i].advance(AccountStatus::AwaitingConfirmation);
        }
        let decision = self.confirmer.confirm(&format!(
            "Execute {order_count} orders across {} accounts?",
            pending.len()
        ));
        if let Err(e) = audit::log_confirmation(&mut self.audit, "all", decision) {
            warn!("audit: {e}");
        }

        // Phase 3: execute in configured order, each on a fresh session
        for &i in &pending {
            let outcome = &mut outcomes[i];
            match decision {
                Decision::Approve if self.cancel.is_cancelled() => outcome.skip("cancelled"),
                Decision::Approve => {
                    let id = outcome.account_id.clone();
                    match self.connect(&id) {
                        Ok(mut session) => {
                            self.execute(session.as_ref(), outcome);
                            self.disconnect(session.as_mut());
                        }
                        Err(e) => outcome.fail(e),
                    }
                }
                Decision::Decline => outcome.skip("declined"),
                Decision::Cancel => {
                    self.cancel.cancel();
                    outcome.skip("cancelled");
                }
            }
            let fatal = outcome.is_fatal();
            self.finish(&mut outcomes[i]);
            if fatal {
                return self.skip_planned(outcomes, "not attempted: broker unreachable");
            }
        }
        outcomes
    }

    /// Skip every account still waiting to execute.
    fn skip_planned(
        &mut self,
        mut outcomes: Vec<AccountOutcome>,
        reason: &str,
    ) -> Vec<AccountOutcome> {
        for outcome in outcomes.iter_mut().filter(|o| !o.status.is_terminal()) {
            outcome.skip(reason);
            self.finish(outcome);
        }
        outcomes
    }

    fn connect(
        &self,
        account_id: &str,
    ) -> std::result::Result<Box<dyn BrokerSession>, AccountError> {
        self.connector.connect(account_id).map_err(AccountError::Connect)
    }

    fn disconnect(&self, session: &mut dyn BrokerSession) {
        if let Err(e) = session.disconnect() {
            warn!("account {}: disconnect failed: {e}", session.account_id());
        }
    }

    fn no_trade(&self, outcome: &AccountOutcome) -> Option<&'static str> {
        if let Some(reason) = self.options.no_trade_reason() {
            return Some(reason);
        }
        match &outcome.plan {
            Some(plan) if plan.has_orders() => None,
            _ => Some("nothing to trade"),
        }
    }

    /// Snapshot, price and plan on `session`. Leaves the outcome `Planned` or `Failed`.
    fn plan_on_session(
        &mut self,
        session: &dyn BrokerSession,
        ctx: &AccountContext,
        outcome: &mut AccountOutcome,
    ) {
        let snapshot = match session.snapshot() {
            Ok(s) => s,
            Err(e) => return outcome.fail(AccountError::Snapshot(e)),
        };
        outcome.advance(AccountStatus::Snapshotted);
        debug!(
            "account {}: net_liq ${:.2}, cash ${:.2}, {} holdings",
            ctx.account_id,
            snapshot.net_liq,
            snapshot.cash_usd,
            snapshot.holdings.len()
        );

        let symbols = pricing::symbols_to_price(&snapshot, &ctx.targets);
        let prices = match pricing::fetch_prices(session, &symbols, &self.config.pricing) {
            Ok(p) => p,
            Err(e) => return outcome.fail(e),
        };

        let plan = plan_account(ctx, snapshot, prices);
        if let Err(e) = audit::log_plan(&mut self.audit, &plan) {
            return outcome.fail(AccountError::Audit(e.to_string()));
        }
        for w in plan.warnings() {
            warn!("account {}: {w}", ctx.account_id);
        }
        if self.options.print_previews {
            println!("{plan}");
        }
        info!(
            "account {}: planned {} orders ({} skipped)",
            ctx.account_id,
            plan.orders().len(),
            plan.sizing.skipped.len()
        );
        outcome.warnings = plan.warnings();
        outcome.plan = Some(plan);
        outcome.advance(AccountStatus::Planned);
    }

    fn apply_decision(&mut self, outcome: &mut AccountOutcome, scope: &str, decision: Decision) {
        if let Err(e) = audit::log_confirmation(&mut self.audit, scope, decision) {
            return outcome.fail(AccountError::Audit(e.to_string()));
        }
        match decision {
            Decision::Approve if self.cancel.is_cancelled() => outcome.skip("cancelled"),
            Decision::Approve => {}
            Decision::Decline => outcome.skip("declined"),
            Decision::Cancel => {
                self.cancel.cancel();
                outcome.skip("cancelled");
            }
        }
    }

    /// Submit the planned orders, sells first, and fold their terminal states.
    fn execute(&mut self, session: &dyn BrokerSession, outcome: &mut AccountOutcome) {
        let orders: Vec<Order> = match &outcome.plan {
            Some(plan) => plan.orders().to_vec(),
            None => return outcome.fail(AccountError::Settings("no plan to execute".into())),
        };
        outcome.advance(AccountStatus::Submitted);
        let exec = self.config.execution.clone();

        for (i, order) in orders.iter().enumerate() {
            if self.cancel.is_cancelled() {
                let unsent = orders.len() - i;
                warn!("{}: cancelled, {unsent} orders not submitted", outcome.account_id);
                outcome
                    .warnings
                    .push(format!("cancelled with {unsent} orders not submitted"));
                break;
            }
            if let Err(e) = check_attribution(order, session) {
                return outcome.fail(e);
            }
            let result = match submit_and_wait(session, order, &exec, &self.cancel) {
                Ok(result) => result,
                Err(e) => return outcome.fail(e),
            };
            match result.state {
                OrderState::Filled => info!("{}: FILLED {}", outcome.account_id, result.order),
                state => warn!(
                    "{}: {:?} {} ({} filled)",
                    outcome.account_id, state, result.order, result.filled_quantity
                ),
            }
            if let Err(e) = audit::log_order_result(&mut self.audit, &result) {
                outcome.order_results.push(result);
                return outcome.fail(AccountError::Audit(e.to_string()));
            }
            outcome.order_results.push(result);

            if i + 1 < orders.len() && exec.order_interval_ms > 0 {
                thread::sleep(Duration::from_millis(exec.order_interval_ms));
            }
        }

        let results = &outcome.order_results;
        if results.is_empty() {
            return outcome.skip("cancelled");
        }
        let status = if results.len() < orders.len() && results.iter().any(OrderResult::has_fill) {
            AccountStatus::Partial
        } else if results.iter().all(OrderResult::is_fully_filled) {
            AccountStatus::Filled
        } else if !results.iter().any(OrderResult::has_fill) {
            AccountStatus::Rejected
        } else {
            AccountStatus::Partial
        };
        outcome.advance(status);
    }

    fn finish(&mut self, outcome: &mut AccountOutcome) {
        info!("account {}: {}", outcome.account_id, outcome.status);
        if let Err(e) = audit::log_account_completed(&mut self.audit, outcome) {
            warn!("audit: {e}");
        }
    }
}

/// Refuse an order that names a different account than the session.
pub fn check_attribution(
    order: &Order,
    session: &dyn BrokerSession,
) -> std::result::Result<(), AccountError> {
    if order.account_id != session.account_id() {
        return Err(AccountError::Misattributed {
            order_account: order.account_id.clone(),
            session_account: session.account_id().to_string(),
        });
    }
    Ok(())
}

/// Submit a market order and wait for a terminal state.
///
/// A broker refusal at submission is a rejected order, not an account
/// failure. An order still working at the timeout, or when the run is
/// cancelled, is cancelled at the broker.
fn submit_and_wait(
    session: &dyn BrokerSession,
    order: &Order,
    exec: &ExecutionConfig,
    cancel: &CancelToken,
) -> std::result::Result<OrderResult, AccountError> {
    let id = match session.submit_order(&BrokerOrder::market(order)) {
        Ok(id) => id,
        Err(BrokerError::Order(msg)) => {
            return Ok(OrderResult {
                order: order.clone(),
                broker_id: None,
                state: OrderState::Rejected,
                filled_quantity: 0.0,
                avg_fill_price: None,
                message: Some(msg),
            });
        }
        Err(e) => return Err(AccountError::Submit(e)),
    };

    let timeout = Duration::from_secs(exec.order_timeout_secs);
    let start = Instant::now();
    let mut status = session.order_status(id).map_err(AccountError::Submit)?;
    while !status.status.is_terminal() {
        if cancel.is_cancelled() || start.elapsed() >= timeout {
            debug!("order {} still working, cancelling", id.0);
            session.cancel_order(id).map_err(AccountError::Submit)?;
            status = session.order_status(id).map_err(AccountError::Submit)?;
            break;
        }
        thread::sleep(Duration::from_millis(exec.poll_interval_ms));
        status = session.order_status(id).map_err(AccountError::Submit)?;
    }

    Ok(OrderResult {
        order: order.clone(),
        broker_id: Some(id),
        state: status.status,
        filled_quantity: status.filled_quantity,
        avg_fill_price: status.avg_fill_price,
        message: None,
    })
}
