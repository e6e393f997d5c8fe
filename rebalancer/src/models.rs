//! Model portfolio file (models.json) loading and validation.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use driftwise::{ModelMix, ModelPortfolio, Symbol};
use serde::Deserialize;

use crate::error::{Error, Result};

/// Tolerance on each model's total (assets plus CASH).
pub const MODEL_SUM_TOLERANCE: f64 = 0.0001;

/// Model portfolios published for a run.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelFile {
    pub timestamp: DateTime<Utc>,
    /// Model name → symbol → weight.
    pub models: BTreeMap<String, BTreeMap<String, f64>>,
}

impl ModelFile {
    /// Load and validate a models.json file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::ModelsRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_json(&contents)
    }

    /// Parse from a JSON string (useful for testing).
    pub fn from_json(json: &str) -> Result<Self> {
        let file: ModelFile = serde_json::from_str(json)?;
        file.validate()?;
        Ok(file)
    }

    fn validate(&self) -> Result<()> {
        if self.models.is_empty() {
            return Err(Error::Models("no models defined".into()));
        }

        for (name, weights) in &self.models {
            if weights.is_empty() {
                return Err(Error::Models(format!("model {name} has no weights")));
            }

            // Symbols are compared after normalization
            let mut seen = std::collections::HashSet::new();
            for (raw, weight) in weights {
                let symbol = Symbol::new(raw);
                if symbol.is_empty() {
                    return Err(Error::Models(format!("model {name}: empty symbol")));
                }
                if !seen.insert(symbol.clone()) {
                    return Err(Error::Models(format!(
                        "model {name}: duplicate symbol {symbol}"
                    )));
                }
                if !weight.is_finite() {
                    return Err(Error::Models(format!(
                        "model {name}: weight for {symbol} is not finite"
                    )));
                }
                if !symbol.is_cash() && *weight < 0.0 {
                    return Err(Error::Models(format!(
                        "model {name}: weight for {symbol} ({weight}) is negative"
                    )));
                }
            }

            let total: f64 = weights.values().sum();
            if (total - 1.0).abs() > MODEL_SUM_TOLERANCE {
                return Err(Error::Models(format!(
                    "model {name}: weights sum to {total:.6} (expected 1.0)"
                )));
            }
        }

        Ok(())
    }

    /// Check that every model named in `mix` is defined here.
    pub fn check_mix(&self, mix: &ModelMix) -> Result<()> {
        for (name, _) in mix.iter() {
            if !self.models.contains_key(name) {
                return Err(Error::Models(format!(
                    "model {name} is in the mix but not in the model file"
                )));
            }
        }
        Ok(())
    }

    /// Convert to engine model portfolios, in name order.
    pub fn portfolios(&self) -> Vec<ModelPortfolio> {
        self.models
            .iter()
            .map(|(name, weights)| {
                weights
                    .iter()
                    .fold(ModelPortfolio::new(name.as_str()), |model, (symbol, weight)| {
                        model.with_weight(symbol, *weight)
                    })
            })
            .collect()
    }
}
