//! TOML configuration loading and validation.
//!
//! Global `[rebalance]` settings apply to every account; an account's
//! `[accounts.overrides]` table replaces individual fields. The two layers
//! are resolved once per account by [`Config::effective_for`] into the flat
//! [`RebalanceConfig`] the planning engine consumes.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use driftwise::{CashBuffer, ModelMix, RebalanceConfig, TriggerMode};
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::pricing::PriceSource;

/// Tolerance on the model mix total.
pub const MIX_TOLERANCE: f64 = 0.001;

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Model blend weights by model name.
    pub models: BTreeMap<String, f64>,
    #[serde(default)]
    pub rebalance: RebalanceSettings,
    #[serde(default)]
    pub pricing: PricingConfig,
    #[serde(default)]
    pub confirmation: ConfirmationConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    pub accounts: Vec<AccountConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    PerHolding,
    TotalDrift,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CashBufferKind {
    Pct,
    Abs,
}

/// `[rebalance]`: global sizing and eligibility settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RebalanceSettings {
    #[serde(default = "default_trigger_mode")]
    pub trigger_mode: TriggerKind,
    #[serde(default = "default_per_holding_band")]
    pub per_holding_band_bps: u32,
    #[serde(default = "default_total_band")]
    pub portfolio_total_band_bps: u32,
    #[serde(default = "default_min_order")]
    pub min_order_usd: f64,
    #[serde(default = "default_cash_buffer_type")]
    pub cash_buffer_type: CashBufferKind,
    #[serde(default)]
    pub cash_buffer_pct: f64,
    #[serde(default)]
    pub cash_buffer_abs: f64,
    #[serde(default)]
    pub allow_fractional: bool,
    #[serde(default = "default_max_leverage")]
    pub max_leverage: f64,
}

fn default_trigger_mode() -> TriggerKind {
    TriggerKind::PerHolding
}
fn default_per_holding_band() -> u32 {
    50
}
fn default_total_band() -> u32 {
    100
}
fn default_min_order() -> f64 {
    100.0
}
fn default_cash_buffer_type() -> CashBufferKind {
    CashBufferKind::Abs
}
fn default_max_leverage() -> f64 {
    1.5
}

impl Default for RebalanceSettings {
    fn default() -> Self {
        Self {
            trigger_mode: default_trigger_mode(),
            per_holding_band_bps: default_per_holding_band(),
            portfolio_total_band_bps: default_total_band(),
            min_order_usd: default_min_order(),
            cash_buffer_type: default_cash_buffer_type(),
            cash_buffer_pct: 0.0,
            cash_buffer_abs: 0.0,
            allow_fractional: false,
            max_leverage: default_max_leverage(),
        }
    }
}

impl RebalanceSettings {
    /// Flatten into the engine's config.
    pub fn resolve(&self) -> RebalanceConfig {
        let trigger = match self.trigger_mode {
            TriggerKind::PerHolding => TriggerMode::PerHolding {
                band_bps: self.per_holding_band_bps,
            },
            TriggerKind::TotalDrift => TriggerMode::TotalDrift {
                band_bps: self.portfolio_total_band_bps,
            },
        };
        let cash_buffer = match self.cash_buffer_type {
            CashBufferKind::Pct => CashBuffer::Pct(self.cash_buffer_pct),
            CashBufferKind::Abs => CashBuffer::Abs(self.cash_buffer_abs),
        };
        RebalanceConfig {
            trigger,
            min_order_usd: self.min_order_usd,
            cash_buffer,
            allow_fractional: self.allow_fractional,
            max_leverage: self.max_leverage,
        }
    }

    /// These settings with every field `overrides` sets replaced.
    pub fn layered(&self, overrides: &RebalanceOverrides) -> Self {
        Self {
            trigger_mode: overrides.trigger_mode.unwrap_or(self.trigger_mode),
            per_holding_band_bps: overrides
                .per_holding_band_bps
                .unwrap_or(self.per_holding_band_bps),
            portfolio_total_band_bps: overrides
                .portfolio_total_band_bps
                .unwrap_or(self.portfolio_total_band_bps),
            min_order_usd: overrides.min_order_usd.unwrap_or(self.min_order_usd),
            cash_buffer_type: overrides.cash_buffer_type.unwrap_or(self.cash_buffer_type),
            cash_buffer_pct: overrides.cash_buffer_pct.unwrap_or(self.cash_buffer_pct),
            cash_buffer_abs: overrides.cash_buffer_abs.unwrap_or(self.cash_buffer_abs),
            allow_fractional: overrides.allow_fractional.unwrap_or(self.allow_fractional),
            max_leverage: overrides.max_leverage.unwrap_or(self.max_leverage),
        }
    }
}

/// `[accounts.overrides]`: any `[rebalance]` field, per account.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RebalanceOverrides {
    pub trigger_mode: Option<TriggerKind>,
    pub per_holding_band_bps: Option<u32>,
    pub portfolio_total_band_bps: Option<u32>,
    pub min_order_usd: Option<f64>,
    pub cash_buffer_type: Option<CashBufferKind>,
    pub cash_buffer_pct: Option<f64>,
    pub cash_buffer_abs: Option<f64>,
    pub allow_fractional: Option<bool>,
    pub max_leverage: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountConfig {
    pub id: String,
    #[serde(default)]
    pub overrides: RebalanceOverrides,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PricingConfig {
    #[serde(default = "default_price_source")]
    pub price_source: PriceSource,
    #[serde(default = "default_true")]
    pub fallback_to_snapshot: bool,
}

fn default_price_source() -> PriceSource {
    PriceSource::Last
}
fn default_true() -> bool {
    true
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            price_source: default_price_source(),
            fallback_to_snapshot: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationMode {
    /// Plan, confirm and execute one account at a time.
    #[default]
    PerAccount,
    /// Plan every account, confirm once, then execute in order.
    Global,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfirmationConfig {
    #[serde(default)]
    pub mode: ConfirmationMode,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionConfig {
    /// How long to wait for an order to reach a terminal state.
    #[serde(default = "default_order_timeout")]
    pub order_timeout_secs: u64,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Pause between consecutive order submissions.
    #[serde(default = "default_interval")]
    pub order_interval_ms: u64,
}

fn default_order_timeout() -> u64 {
    300
}
fn default_poll_interval() -> u64 {
    500
}
fn default_interval() -> u64 {
    100
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            order_timeout_secs: default_order_timeout(),
            poll_interval_ms: default_poll_interval(),
            order_interval_ms: default_interval(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_dir")]
    pub dir: String,
    #[serde(default = "default_audit_file")]
    pub audit_file: String,
}

fn default_log_dir() -> String {
    "./logs".into()
}
fn default_audit_file() -> String {
    "audit.jsonl".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
            audit_file: default_audit_file(),
        }
    }
}

impl Config {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::ConfigRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml(&contents)
    }

    /// Parse from a TOML string (useful for testing).
    pub fn from_toml(toml: &str) -> Result<Self> {
        let config: Config = toml::from_str(toml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate config invariants, including every account's layered settings.
    fn validate(&self) -> Result<()> {
        if self.models.is_empty() {
            return Err(Error::Config("[models] must name at least one model".into()));
        }
        if let Some((name, w)) = self.models.iter().find(|(_, w)| !w.is_finite() || **w < 0.0) {
            return Err(Error::Config(format!(
                "[models] weight for {name} must be non-negative, got {w}"
            )));
        }
        let total: f64 = self.models.values().sum();
        if (total - 1.0).abs() > MIX_TOLERANCE {
            return Err(Error::Config(format!(
                "[models] weights must sum to 1.0 (±{MIX_TOLERANCE}); got {total:.4}"
            )));
        }

        if self.accounts.is_empty() {
            return Err(Error::Config("at least one [[accounts]] entry is required".into()));
        }
        let mut seen = BTreeSet::new();
        for account in &self.accounts {
            if account.id.trim().is_empty() {
                return Err(Error::Config("account id must not be empty".into()));
            }
            if !seen.insert(account.id.as_str()) {
                return Err(Error::Config(format!("duplicate account id: {}", account.id)));
            }
        }

        self.rebalance
            .resolve()
            .validate()
            .map_err(|e| Error::Config(format!("[rebalance] {e}")))?;
        for account in &self.accounts {
            self.effective_for(&account.id)?;
        }
        Ok(())
    }

    /// Model mix as the engine type.
    pub fn mix(&self) -> ModelMix {
        self.models.iter().map(|(k, v)| (k.clone(), *v)).collect()
    }

    /// Account ids in processing order.
    pub fn account_ids(&self) -> impl Iterator<Item = &str> {
        self.accounts.iter().map(|a| a.id.as_str())
    }

    /// Global settings layered with `account_id`'s overrides, validated.
    pub fn effective_for(&self, account_id: &str) -> Result<RebalanceConfig> {
        let account = self
            .accounts
            .iter()
            .find(|a| a.id == account_id)
            .ok_or_else(|| Error::Config(format!("unknown account: {account_id}")))?;
        let effective = self.rebalance.layered(&account.overrides).resolve();
        effective
            .validate()
            .map_err(|e| Error::Config(format!("account {account_id}: {e}")))?;
        Ok(effective)
    }

    /// Full path to the audit log file.
    pub fn audit_path(&self) -> std::path::PathBuf {
        Path::new(&self.logging.dir).join(&self.logging.audit_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example_toml() -> &'static str {
        r#"
[models]
core = 0.6
growth = 0.3
income = 0.1

[rebalance]
trigger_mode = "per_holding"
per_holding_band_bps = 50
portfolio_total_band_bps = 100
min_order_usd = 100.0
cash_buffer_type = "pct"
cash_buffer_pct = 0.01
allow_fractional = false
max_leverage = 1.5

[pricing]
price_source = "last"
fallback_to_snapshot = true

[confirmation]
mode = "global"

[logging]
dir = "./logs"
audit_file = "audit.jsonl"

[[accounts]]
id = "DU111"

[[accounts]]
id = "DU222"

[accounts.overrides]
allow_fractional = true
max_leverage = 1.0
"#
    }

    #[test]
    fn parse_example_config() {
        let config = Config::from_toml(example_toml()).unwrap();
        assert_eq!(config.models.len(), 3);
        assert_eq!(config.rebalance.cash_buffer_type, CashBufferKind::Pct);
        assert_eq!(config.pricing.price_source, PriceSource::Last);
        assert_eq!(config.confirmation.mode, ConfirmationMode::Global);
        assert_eq!(config.account_ids().collect::<Vec<_>>(), ["DU111", "DU222"]);
    }

    #[test]
    fn defaults_fill_missing_sections() {
        let config = Config::from_toml(
            r#"
[models]
core = 1.0

[[accounts]]
id = "DU111"
"#,
        )
        .unwrap();
        assert_eq!(config.rebalance, RebalanceSettings::default());
        assert_eq!(config.confirmation.mode, ConfirmationMode::PerAccount);
        assert!(config.pricing.fallback_to_snapshot);
        assert_eq!(config.execution.order_timeout_secs, 300);
        assert_eq!(config.audit_path(), std::path::PathBuf::from("./logs/audit.jsonl"));
    }

    #[test]
    fn effective_config_layers_overrides() {
        let config = Config::from_toml(example_toml()).unwrap();

        let base = config.effective_for("DU111").unwrap();
        assert!(!base.allow_fractional);
        assert_eq!(base.max_leverage, 1.5);
        assert_eq!(base.cash_buffer, CashBuffer::Pct(0.01));

        let overridden = config.effective_for("DU222").unwrap();
        assert!(overridden.allow_fractional);
        assert_eq!(overridden.max_leverage, 1.0);
        assert_eq!(overridden.min_order_usd, 100.0);
        assert_eq!(overridden.trigger, TriggerMode::PerHolding { band_bps: 50 });

        assert!(config.effective_for("NOPE").is_err());
    }

    #[test]
    fn trigger_mode_selects_band() {
        let toml = example_toml().replace("\"per_holding\"", "\"total_drift\"");
        let config = Config::from_toml(&toml).unwrap();
        assert_eq!(
            config.effective_for("DU111").unwrap().trigger,
            TriggerMode::TotalDrift { band_bps: 100 }
        );
    }

    #[test]
    fn validate_catches_bad_mix() {
        let toml = example_toml().replace("income = 0.1", "income = 0.2");
        assert!(matches!(Config::from_toml(&toml), Err(Error::Config(_))));

        let toml = example_toml().replace("income = 0.1", "income = -0.1\nextra = 0.2");
        assert!(Config::from_toml(&toml).is_err());
    }

    #[test]
    fn validate_catches_duplicate_accounts() {
        let toml = example_toml().replace("id = \"DU222\"", "id = \"DU111\"");
        assert!(Config::from_toml(&toml).is_err());
    }

    #[test]
    fn validate_catches_bad_override() {
        let toml = example_toml().replace("max_leverage = 1.0", "max_leverage = 0.0");
        let err = Config::from_toml(&toml).unwrap_err();
        assert!(err.to_string().contains("DU222"));
    }

    #[test]
    fn validate_catches_bad_buffer() {
        let toml = example_toml().replace("cash_buffer_pct = 0.01", "cash_buffer_pct = 1.5");
        assert!(Config::from_toml(&toml).is_err());
    }

    #[test]
    fn unknown_override_rejected() {
        let toml = example_toml().replace("allow_fractional = true", "allow_fractionl = true");
        assert!(matches!(Config::from_toml(&toml), Err(Error::ConfigParse(_))));
    }

    #[test]
    fn load_missing_file() {
        let err = Config::load(Path::new("/nonexistent/config.toml")).unwrap_err();
        assert!(matches!(err, Error::ConfigRead { .. }));
    }
}
