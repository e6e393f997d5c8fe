//! Target weights: blend several model portfolios into one weight vector.
//!
//! Each model maps symbols to fractional weights (assets plus an optional
//! CASH entry summing to 1.0). The mix assigns each model a blend weight.
//! The blended vector is computed once per run and shared read-only by every
//! account.

use std::collections::BTreeMap;

use crate::types::Symbol;

/// Tolerance on the blended total (1.0 ± 0.01).
pub const TARGET_SUM_TOLERANCE: f64 = 0.01;

/// One named model portfolio.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ModelPortfolio {
    pub name: String,
    pub weights: BTreeMap<Symbol, f64>,
}

impl ModelPortfolio {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            weights: BTreeMap::new(),
        }
    }

    /// Builder-style weight insertion. Repeated symbols overwrite.
    pub fn with_weight(mut self, symbol: &str, weight: f64) -> Self {
        self.weights.insert(Symbol::new(symbol), weight);
        self
    }

    /// Weight of `symbol`, 0 if the model does not hold it.
    pub fn weight(&self, symbol: &Symbol) -> f64 {
        self.weights.get(symbol).copied().unwrap_or(0.0)
    }

    /// Sum of all weights including CASH.
    pub fn total(&self) -> f64 {
        self.weights.values().sum()
    }
}

/// Blend weight per model name.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct ModelMix(BTreeMap<String, f64>);

impl ModelMix {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, model: &str, weight: f64) -> Self {
        self.0.insert(model.to_string(), weight);
        self
    }

    /// Blend weight for `model`, 0 if it is not part of the mix.
    pub fn weight(&self, model: &str) -> f64 {
        self.0.get(model).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn total(&self) -> f64 {
        self.0.values().sum()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, f64)> for ModelMix {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        ModelMix(iter.into_iter().collect())
    }
}

/// Blended target weight per symbol, CASH included when any model has it.
///
/// Immutable once built; iteration is alphabetical.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct TargetWeights(BTreeMap<Symbol, f64>);

impl TargetWeights {
    /// Target for `symbol`, 0 for symbols no model holds.
    pub fn get(&self, symbol: &Symbol) -> f64 {
        self.0.get(symbol).copied().unwrap_or(0.0)
    }

    pub fn contains(&self, symbol: &Symbol) -> bool {
        self.0.contains_key(symbol)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Symbol, f64)> {
        self.0.iter().map(|(s, w)| (s, *w))
    }

    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.0.keys()
    }

    /// CASH target (negative = margin target).
    pub fn cash(&self) -> f64 {
        self.0.get(Symbol::CASH).copied().unwrap_or(0.0)
    }

    /// Sum of every weight, CASH included.
    pub fn total(&self) -> f64 {
        self.0.values().sum()
    }

    /// True when the total is within [`TARGET_SUM_TOLERANCE`] of 1.0.
    pub fn is_balanced(&self) -> bool {
        (self.total() - 1.0).abs() <= TARGET_SUM_TOLERANCE
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(Symbol, f64)> for TargetWeights {
    fn from_iter<I: IntoIterator<Item = (Symbol, f64)>>(iter: I) -> Self {
        TargetWeights(iter.into_iter().collect())
    }
}

/// Blend `models` by `mix`.
///
/// `target[s] = Σ_k mix[k] · model_k[s]` over the union of symbols in any
/// model. CASH is blended like any other symbol and is not renormalized.
/// Models missing from the mix contribute nothing; a symbol held only by such
/// a model still appears with weight 0.
pub fn build_targets(models: &[ModelPortfolio], mix: &ModelMix) -> TargetWeights {
    let mut targets: BTreeMap<Symbol, f64> = BTreeMap::new();
    for model in models {
        let blend = mix.weight(&model.name);
        for (symbol, weight) in &model.weights {
            *targets.entry(symbol.clone()).or_insert(0.0) += blend * weight;
        }
    }
    TargetWeights(targets)
}
