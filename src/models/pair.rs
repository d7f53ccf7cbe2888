//! Per-asset performance priors and the pairwise correlation matrix used
//! by the portfolio allocator.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Historical performance of trading one asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairPerformance {
    /// Number of signals generated for this asset
    #[serde(default)]
    pub signals_count: u32,

    /// Mean confidence of those signals (0-1)
    #[serde(default = "half")]
    pub avg_confidence: f64,

    /// Fraction of signals that were executed (0-1)
    #[serde(default = "half")]
    pub execution_rate: f64,

    /// Cumulative return as a fraction
    #[serde(default)]
    pub total_return: f64,

    /// Sharpe-like risk-adjusted return
    #[serde(default)]
    pub sharpe_ratio: f64,

    /// Maximum drawdown (0-1)
    #[serde(default)]
    pub max_drawdown: f64,

    /// Return volatility as a fraction
    #[serde(default)]
    pub volatility: f64,

    /// Relative risk budget multiplier applied to the score when weighting
    #[serde(default = "one")]
    pub risk_weight: f64,

    /// Per-asset cap on the capital weight; falls back to the allocator default
    #[serde(default)]
    pub max_allocation: Option<f64>,
}

fn half() -> f64 {
    0.5
}

fn one() -> f64 {
    1.0
}

impl Default for PairPerformance {
    /// Neutral priors for an asset with no recorded history.
    fn default() -> Self {
        Self {
            signals_count: 0,
            avg_confidence: half(),
            execution_rate: half(),
            total_return: 0.0,
            sharpe_ratio: 0.0,
            max_drawdown: 0.0,
            volatility: 0.0,
            risk_weight: one(),
            max_allocation: None,
        }
    }
}

/// Symmetric asset correlation lookup with values in [-1, 1].
///
/// Missing pairs read as 0 (uncorrelated) and the diagonal reads as 1.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, BTreeMap<String, f64>>")]
#[serde(into = "BTreeMap<String, BTreeMap<String, f64>>")]
pub struct CorrelationMatrix {
    values: BTreeMap<(String, String), f64>,
}

impl CorrelationMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(a: &str, b: &str) -> (String, String) {
        if a <= b {
            (a.to_string(), b.to_string())
        } else {
            (b.to_string(), a.to_string())
        }
    }

    /// Record the correlation between two assets.
    pub fn set(&mut self, a: &str, b: &str, value: f64) -> Result<()> {
        if !value.is_finite() || !(-1.0..=1.0).contains(&value) {
            return Err(EngineError::invalid_input(format!(
                "correlation {}/{} = {} outside [-1, 1]",
                a, b, value
            )));
        }
        if a == b {
            if (value - 1.0).abs() > 1e-9 {
                return Err(EngineError::invalid_input(format!(
                    "diagonal correlation for {} must be 1, got {}",
                    a, value
                )));
            }
            return Ok(());
        }
        let key = Self::key(a, b);
        if let Some(existing) = self.values.get(&key) {
            if (existing - value).abs() > 1e-9 {
                return Err(EngineError::invalid_input(format!(
                    "asymmetric correlation for {}/{}: {} vs {}",
                    a, b, existing, value
                )));
            }
        }
        self.values.insert(key, value);
        Ok(())
    }

    pub fn with(mut self, a: &str, b: &str, value: f64) -> Result<Self> {
        self.set(a, b, value)?;
        Ok(self)
    }

    /// Correlation between two assets; 0 when unknown, 1 on the diagonal.
    pub fn get(&self, a: &str, b: &str) -> f64 {
        if a == b {
            return 1.0;
        }
        self.values.get(&Self::key(a, b)).copied().unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl TryFrom<BTreeMap<String, BTreeMap<String, f64>>> for CorrelationMatrix {
    type Error = EngineError;

    fn try_from(nested: BTreeMap<String, BTreeMap<String, f64>>) -> Result<Self> {
        let mut matrix = CorrelationMatrix::new();
        for (a, row) in &nested {
            for (b, value) in row {
                matrix.set(a, b, *value)?;
            }
        }
        Ok(matrix)
    }
}

impl From<CorrelationMatrix> for BTreeMap<String, BTreeMap<String, f64>> {
    fn from(matrix: CorrelationMatrix) -> Self {
        let mut nested: BTreeMap<String, BTreeMap<String, f64>> = BTreeMap::new();
        for ((a, b), value) in matrix.values {
            nested.entry(a).or_default().insert(b, value);
        }
        nested
    }
}
