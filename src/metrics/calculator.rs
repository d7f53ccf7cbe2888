//! Calculator for per-asset allocation priors: return, Sharpe ratio,
//! drawdown, volatility and pairwise correlation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::error::{EngineError, Result};
use crate::models::{CorrelationMatrix, PairPerformance};

/// Raw history for one asset, as supplied by the performance store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssetHistory {
    /// Per-period returns as fractions, oldest first
    pub returns: Vec<f64>,

    /// Confidence of every signal raised on the asset
    #[serde(default)]
    pub signal_confidences: Vec<f64>,

    /// Signals that turned into executed trades
    #[serde(default)]
    pub executed: u32,

    #[serde(default)]
    pub risk_weight: Option<f64>,

    #[serde(default)]
    pub max_allocation: Option<f64>,
}

/// Calculator for allocation priors.
pub struct MetricsCalculator;

impl MetricsCalculator {
    /// Derive `PairPerformance` priors from an asset's history.
    ///
    /// Fields with no supporting data keep their neutral defaults.
    pub fn pair_performance(asset: &str, history: &AssetHistory) -> Result<PairPerformance> {
        if let Some(r) = history.returns.iter().find(|r| !r.is_finite() || **r <= -1.0) {
            return Err(EngineError::invalid_input(format!(
                "{}: return {} is not a valid fraction",
                asset, r
            )));
        }
        if history
            .signal_confidences
            .iter()
            .any(|c| !c.is_finite() || !(0.0..=1.0).contains(c))
        {
            return Err(EngineError::invalid_input(format!(
                "{}: signal confidence outside [0, 1]",
                asset
            )));
        }
        let signals = history.signal_confidences.len() as u32;
        if history.executed > signals {
            return Err(EngineError::invalid_input(format!(
                "{}: {} executed of {} signals",
                asset, history.executed, signals
            )));
        }

        let mut perf = PairPerformance {
            signals_count: signals,
            ..Default::default()
        };
        if let Some(w) = history.risk_weight {
            perf.risk_weight = w;
        }
        perf.max_allocation = history.max_allocation;

        if signals > 0 {
            perf.avg_confidence = history.signal_confidences.iter().mean();
            perf.execution_rate = history.executed as f64 / signals as f64;
        }

        if !history.returns.is_empty() {
            perf.total_return = Self::total_return(&history.returns);
            perf.max_drawdown = Self::max_drawdown(&history.returns);
            let (sharpe, volatility) = Self::sharpe_and_volatility(&history.returns);
            perf.sharpe_ratio = sharpe;
            perf.volatility = volatility;
        }

        Ok(perf)
    }

    /// Priors for every asset in `histories`.
    pub fn pair_performances(
        histories: &BTreeMap<String, AssetHistory>,
    ) -> Result<BTreeMap<String, PairPerformance>> {
        histories
            .iter()
            .map(|(asset, h)| Ok((asset.clone(), Self::pair_performance(asset, h)?)))
            .collect()
    }

    /// Compounded return of the series.
    pub fn total_return(returns: &[f64]) -> f64 {
        returns.iter().fold(1.0, |equity, r| equity * (1.0 + r)) - 1.0
    }

    /// Largest peak-to-trough fall of the compounded equity curve (0-1).
    pub fn max_drawdown(returns: &[f64]) -> f64 {
        let mut equity = 1.0f64;
        let mut peak = 1.0f64;
        let mut max_dd = 0.0f64;

        for r in returns {
            equity *= 1.0 + r;
            if equity > peak {
                peak = equity;
            }
            let dd = (peak - equity) / peak;
            if dd > max_dd {
                max_dd = dd;
            }
        }
        max_dd
    }

    /// Per-period Sharpe ratio (0% risk-free) and return standard deviation.
    fn sharpe_and_volatility(returns: &[f64]) -> (f64, f64) {
        if returns.len() < 2 {
            return (0.0, 0.0);
        }
        let mean = returns.iter().mean();
        let std_dev = returns.iter().std_dev();
        if !(std_dev > 0.0) {
            return (0.0, 0.0);
        }
        (mean / std_dev, std_dev)
    }

    /// Pearson correlation between two series over their common tail.
    ///
    /// Returns `None` when fewer than two periods overlap or either side is
    /// flat.
    pub fn pearson(a: &[f64], b: &[f64]) -> Option<f64> {
        let n = a.len().min(b.len());
        if n < 2 {
            return None;
        }
        let a = &a[a.len() - n..];
        let b = &b[b.len() - n..];

        let sd_a = a.iter().std_dev();
        let sd_b = b.iter().std_dev();
        if !(sd_a > 0.0 && sd_b > 0.0) {
            return None;
        }
        let rho = a.iter().covariance(b.iter()) / (sd_a * sd_b);
        rho.is_finite().then(|| rho.clamp(-1.0, 1.0))
    }

    /// Correlation matrix over every pair of series.
    ///
    /// Pairs without enough overlap are left out and read as uncorrelated.
    pub fn correlation_matrix(series: &BTreeMap<String, Vec<f64>>) -> Result<CorrelationMatrix> {
        let mut matrix = CorrelationMatrix::new();
        let assets: Vec<(&String, &Vec<f64>)> = series.iter().collect();

        for (i, (a, ra)) in assets.iter().enumerate() {
            if ra.iter().any(|r| !r.is_finite()) {
                return Err(EngineError::invalid_input(format!(
                    "{}: return series contains non-finite values",
                    a
                )));
            }
            for (b, rb) in &assets[i + 1..] {
                if let Some(rho) = Self::pearson(ra, rb) {
                    matrix.set(a, b, rho)?;
                }
            }
        }
        Ok(matrix)
    }

    /// Histories' return series, keyed by asset.
    pub fn return_series(histories: &BTreeMap<String, AssetHistory>) -> BTreeMap<String, Vec<f64>> {
        histories
            .iter()
            .map(|(asset, h)| (asset.clone(), h.returns.clone()))
            .collect()
    }
}
