//! Correlation-aware multi-asset allocation.
//!
//! Scores every candidate from its performance priors, walks the
//! candidates best-first accepting those that are not too correlated with
//! anything already accepted, then spreads the exposure budget across the
//! accepted set in proportion to score times risk weight.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{EngineError, Result};
use crate::models::{CorrelationMatrix, PairPerformance};

use super::config::AllocationConfig;

/// Normalized score components for one asset, each in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AssetScoreComponents {
    pub confidence: f64,
    pub execution_rate: f64,
    pub profit: f64,
    pub risk_adjusted: f64,
    pub drawdown: f64,
    pub volatility: f64,
}

/// Allocation detail for one selected asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetAllocation {
    pub asset: String,
    pub score: f64,
    pub components: AssetScoreComponents,
    /// Fraction of capital
    pub weight: f64,
    /// True if the weight was limited by the asset's own cap
    pub capped: bool,
}

/// Why a candidate was left out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExclusionReason {
    /// Correlated above the threshold with an already accepted asset
    Correlation { with: String, value: f64 },
    /// The selection was already full
    CapacityReached,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExcludedAsset {
    pub asset: String,
    pub score: f64,
    pub reason: ExclusionReason,
}

/// Multi-asset allocation result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AllocationPlan {
    /// Accepted assets, best score first
    pub selected_assets: Vec<String>,
    /// Asset -> capital fraction; sums to at most `max_total_exposure`
    pub weights: BTreeMap<String, f64>,
    pub per_asset_detail: Vec<AssetAllocation>,
    pub excluded: Vec<ExcludedAsset>,
}

impl AllocationPlan {
    pub fn total_weight(&self) -> f64 {
        self.weights.values().sum()
    }
}

/// Correlation-aware allocator.
#[derive(Debug, Clone, Default)]
pub struct PortfolioAllocator {
    config: AllocationConfig,
}

impl PortfolioAllocator {
    pub fn new(config: AllocationConfig) -> Self {
        Self { config }
    }

    /// Normalize an asset's priors into bounded components.
    pub fn components(&self, perf: &PairPerformance) -> AssetScoreComponents {
        let c = &self.config;
        AssetScoreComponents {
            confidence: unit(perf.avg_confidence),
            execution_rate: unit(perf.execution_rate),
            profit: unit(perf.total_return / c.profit_target),
            risk_adjusted: unit(perf.sharpe_ratio / c.sharpe_target),
            drawdown: unit(1.0 - perf.max_drawdown / c.max_tolerated_drawdown),
            volatility: unit(1.0 - perf.volatility / c.max_tolerated_volatility),
        }
    }

    /// Composite score in [0, 1].
    pub fn composite_score(&self, components: &AssetScoreComponents) -> f64 {
        let w = &self.config.score_weights;
        let total = w.confidence * components.confidence
            + w.execution_rate * components.execution_rate
            + w.profit * components.profit
            + w.risk_adjusted * components.risk_adjusted
            + w.drawdown * components.drawdown
            + w.volatility * components.volatility;
        unit(total)
    }

    /// Build an allocation plan for `candidates`.
    ///
    /// Assets without priors use neutral defaults; assets missing from the
    /// matrix are treated as uncorrelated. Duplicate candidates are ignored.
    pub fn allocate(
        &self,
        candidates: &[String],
        priors: &BTreeMap<String, PairPerformance>,
        correlations: &CorrelationMatrix,
    ) -> Result<AllocationPlan> {
        self.config.validate()?;

        let neutral = PairPerformance::default();
        let mut seen = HashSet::new();
        let mut scored = Vec::new();
        for asset in candidates {
            if !seen.insert(asset.as_str()) {
                continue;
            }
            let perf = priors.get(asset).unwrap_or(&neutral);
            validate_priors(asset, perf)?;
            let components = self.components(perf);
            let score = self.composite_score(&components);
            debug!(asset = %asset, score = score, "Scored allocation candidate");
            scored.push((asset.clone(), perf, components, score));
        }

        // Stable: equal scores keep candidate order.
        scored.sort_by(|a, b| b.3.partial_cmp(&a.3).unwrap_or(std::cmp::Ordering::Equal));

        let mut plan = AllocationPlan::default();
        let mut accepted: Vec<(String, &PairPerformance, AssetScoreComponents, f64)> = Vec::new();

        for (asset, perf, components, score) in scored {
            if accepted.len() >= self.config.max_concurrent_pairs {
                plan.excluded.push(ExcludedAsset {
                    asset,
                    score,
                    reason: ExclusionReason::CapacityReached,
                });
                continue;
            }

            let conflict = accepted
                .iter()
                .map(|(other, ..)| (other, correlations.get(&asset, other)))
                .find(|(_, corr)| *corr > self.config.correlation_threshold);

            if let Some((other, corr)) = conflict {
                info!(
                    asset = %asset,
                    with = %other,
                    correlation = corr,
                    threshold = self.config.correlation_threshold,
                    "Excluded by correlation"
                );
                plan.excluded.push(ExcludedAsset {
                    asset,
                    score,
                    reason: ExclusionReason::Correlation {
                        with: other.clone(),
                        value: corr,
                    },
                });
                continue;
            }

            accepted.push((asset, perf, components, score));
        }

        let raw: Vec<f64> = accepted
            .iter()
            .map(|(_, perf, _, score)| score * perf.risk_weight)
            .collect();
        let caps: Vec<f64> = accepted
            .iter()
            .map(|(_, perf, ..)| {
                perf.max_allocation
                    .unwrap_or(self.config.default_max_pair_allocation)
            })
            .collect();
        let (weights, capped) = capped_weights(&raw, &caps, self.config.max_total_exposure);

        for (i, (asset, _, components, score)) in accepted.into_iter().enumerate() {
            plan.selected_assets.push(asset.clone());
            plan.weights.insert(asset.clone(), weights[i]);
            plan.per_asset_detail.push(AssetAllocation {
                asset,
                score,
                components,
                weight: weights[i],
                capped: capped[i],
            });
        }

        info!(
            selected = plan.selected_assets.len(),
            excluded = plan.excluded.len(),
            total_weight = plan.total_weight(),
            "Built allocation plan"
        );
        Ok(plan)
    }
}

fn unit(x: f64) -> f64 {
    if x.is_finite() {
        x.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

fn validate_priors(asset: &str, perf: &PairPerformance) -> Result<()> {
    let fields = [
        ("avg_confidence", perf.avg_confidence),
        ("execution_rate", perf.execution_rate),
        ("total_return", perf.total_return),
        ("sharpe_ratio", perf.sharpe_ratio),
        ("max_drawdown", perf.max_drawdown),
        ("volatility", perf.volatility),
        ("risk_weight", perf.risk_weight),
    ];
    if let Some((name, value)) = fields.iter().find(|(_, v)| !v.is_finite()) {
        return Err(EngineError::invalid_input(format!(
            "{}: {} is not finite ({})",
            asset, name, value
        )));
    }
    if perf.risk_weight < 0.0 {
        return Err(EngineError::invalid_input(format!(
            "{}: risk_weight must be >= 0",
            asset
        )));
    }
    if let Some(cap) = perf.max_allocation {
        if !(cap.is_finite() && (0.0..=1.0).contains(&cap)) {
            return Err(EngineError::invalid_input(format!(
                "{}: max_allocation {} outside [0, 1]",
                asset, cap
            )));
        }
    }
    Ok(())
}

/// Distribute `budget` proportionally to `raw`, capping each share at
/// `caps[i]` and handing the excess to uncapped members until stable.
///
/// Falls back to equal shares when every raw value is zero.
fn capped_weights(raw: &[f64], caps: &[f64], budget: f64) -> (Vec<f64>, Vec<bool>) {
    let n = raw.len();
    let mut weights = vec![0.0; n];
    let mut capped = vec![false; n];
    let mut remaining = budget;

    loop {
        let open: Vec<usize> = (0..n).filter(|&i| !capped[i]).collect();
        if open.is_empty() || remaining <= 0.0 {
            break;
        }

        let total: f64 = open.iter().map(|&i| raw[i]).sum();
        for &i in &open {
            weights[i] = if total > 0.0 {
                remaining * raw[i] / total
            } else {
                remaining / open.len() as f64
            };
        }

        let over: Vec<usize> = open
            .iter()
            .copied()
            .filter(|&i| weights[i] > caps[i])
            .collect();
        if over.is_empty() {
            break;
        }
        for i in over {
            weights[i] = caps[i];
            capped[i] = true;
            remaining -= caps[i];
        }
    }

    if remaining <= 0.0 {
        for i in 0..n {
            if !capped[i] {
                weights[i] = 0.0;
            }
        }
    }

    (weights, capped)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn perf(confidence: f64, sharpe: f64, drawdown: f64) -> PairPerformance {
        PairPerformance {
            signals_count: 40,
            avg_confidence: confidence,
            execution_rate: 0.8,
            total_return: 0.05,
            sharpe_ratio: sharpe,
            max_drawdown: drawdown,
            volatility: 0.03,
            ..Default::default()
        }
    }

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_correlated_pair_never_both_selected() {
        let allocator = PortfolioAllocator::default();
        let priors: BTreeMap<_, _> = [
            ("BTC".to_string(), perf(0.9, 2.0, 0.1)),
            ("ETH".to_string(), perf(0.85, 1.8, 0.1)),
        ]
        .into_iter()
        .collect();
        let corr = CorrelationMatrix::new().with("BTC", "ETH", 0.95).unwrap();

        let plan = allocator
            .allocate(&names(&["BTC", "ETH"]), &priors, &corr)
            .unwrap();
        assert_eq!(plan.selected_assets, vec!["BTC".to_string()]);
        assert_eq!(plan.excluded.len(), 1);
        assert!(matches!(
            plan.excluded[0].reason,
            ExclusionReason::Correlation { ref with, .. } if with == "BTC"
        ));
    }

    #[test]
    fn test_plan_invariants() {
        let config = AllocationConfig {
            max_concurrent_pairs: 3,
            correlation_threshold: 0.6,
            max_total_exposure: 0.9,
            ..Default::default()
        };
        let allocator = PortfolioAllocator::new(config.clone());
        let assets = ["A", "B", "C", "D", "E", "F"];
        let priors: BTreeMap<_, _> = assets
            .iter()
            .enumerate()
            .map(|(i, a)| (a.to_string(), perf(0.5 + i as f64 * 0.08, i as f64 * 0.3, 0.2)))
            .collect();
        let corr = CorrelationMatrix::new()
            .with("F", "E", 0.8)
            .unwrap()
            .with("D", "F", 0.65)
            .unwrap()
            .with("C", "D", -0.4)
            .unwrap();

        let plan = allocator.allocate(&names(&assets), &priors, &corr).unwrap();

        assert!(plan.selected_assets.len() <= config.max_concurrent_pairs);
        assert!(plan.total_weight() <= config.max_total_exposure + 1e-9);
        for (i, a) in plan.selected_assets.iter().enumerate() {
            for b in &plan.selected_assets[i + 1..] {
                assert!(corr.get(a, b) <= config.correlation_threshold);
            }
        }
        // F scores best; E and D are too correlated with it.
        assert_eq!(plan.selected_assets[0], "F");
        assert!(!plan.selected_assets.contains(&"E".to_string()));
        assert!(!plan.selected_assets.contains(&"D".to_string()));
    }

    #[test]
    fn test_weights_sum_to_exposure_and_respect_caps() {
        let config = AllocationConfig {
            max_total_exposure: 0.9,
            default_max_pair_allocation: 0.4,
            ..Default::default()
        };
        let allocator = PortfolioAllocator::new(config);
        let mut strong = perf(0.95, 3.0, 0.0);
        strong.risk_weight = 5.0;
        let priors: BTreeMap<_, _> = [
            ("A".to_string(), strong),
            ("B".to_string(), perf(0.6, 0.5, 0.3)),
            ("C".to_string(), perf(0.55, 0.4, 0.3)),
        ]
        .into_iter()
        .collect();

        let plan = allocator
            .allocate(&names(&["A", "B", "C"]), &priors, &CorrelationMatrix::new())
            .unwrap();

        assert!((plan.total_weight() - 0.9).abs() < 1e-9);
        assert!((plan.weights["A"] - 0.4).abs() < 1e-12);
        assert!(plan.per_asset_detail[0].capped);
        for w in plan.weights.values() {
            assert!(*w <= 0.4 + 1e-12);
        }
    }

    #[test]
    fn test_per_asset_cap_spreads_remainder_over_uncapped() {
        let config = AllocationConfig {
            max_total_exposure: 0.8,
            default_max_pair_allocation: 0.4,
            ..Default::default()
        };
        let allocator = PortfolioAllocator::new(config);
        let mut tight = perf(0.7, 1.0, 0.1);
        tight.max_allocation = Some(0.1);
        let priors: BTreeMap<_, _> = [
            ("A".to_string(), tight),
            ("B".to_string(), perf(0.7, 1.0, 0.1)),
            ("C".to_string(), perf(0.7, 1.0, 0.1)),
        ]
        .into_iter()
        .collect();

        let plan = allocator
            .allocate(&names(&["A", "B", "C"]), &priors, &CorrelationMatrix::new())
            .unwrap();

        assert_eq!(plan.selected_assets.len(), 3);
        assert!((plan.weights["A"] - 0.1).abs() < 1e-12);
        assert!((plan.weights["B"] - 0.35).abs() < 1e-9);
        assert!((plan.weights["C"] - 0.35).abs() < 1e-9);
        assert!((plan.total_weight() - 0.8).abs() < 1e-9);

        let detail = |asset: &str| {
            plan.per_asset_detail
                .iter()
                .find(|d| d.asset == asset)
                .unwrap()
                .capped
        };
        assert!(detail("A"));
        assert!(!detail("B"));
        assert!(!detail("C"));
    }

    #[test]
    fn test_all_capped_leaves_budget_unspent() {
        let config = AllocationConfig {
            max_total_exposure: 1.0,
            default_max_pair_allocation: 0.2,
            ..Default::default()
        };
        let allocator = PortfolioAllocator::new(config);
        let plan = allocator
            .allocate(&names(&["A", "B"]), &BTreeMap::new(), &CorrelationMatrix::new())
            .unwrap();
        assert!((plan.total_weight() - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_capacity_and_duplicates() {
        let config = AllocationConfig {
            max_concurrent_pairs: 2,
            ..Default::default()
        };
        let allocator = PortfolioAllocator::new(config);
        let plan = allocator
            .allocate(
                &names(&["A", "B", "A", "C"]),
                &BTreeMap::new(),
                &CorrelationMatrix::new(),
            )
            .unwrap();
        // Equal neutral scores keep candidate order.
        assert_eq!(plan.selected_assets, names(&["A", "B"]));
        assert_eq!(plan.excluded.len(), 1);
        assert_eq!(plan.excluded[0].asset, "C");
        assert_eq!(plan.excluded[0].reason, ExclusionReason::CapacityReached);
    }

    #[test]
    fn test_deterministic() {
        let allocator = PortfolioAllocator::default();
        let priors: BTreeMap<_, _> = [
            ("X".to_string(), perf(0.7, 1.0, 0.2)),
            ("Y".to_string(), perf(0.8, 0.5, 0.1)),
            ("Z".to_string(), perf(0.6, 1.5, 0.4)),
        ]
        .into_iter()
        .collect();
        let corr = CorrelationMatrix::new().with("X", "Z", 0.9).unwrap();
        let candidates = names(&["X", "Y", "Z"]);
        let a = allocator.allocate(&candidates, &priors, &corr).unwrap();
        let b = allocator.allocate(&candidates, &priors, &corr).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_non_finite_priors_rejected() {
        let allocator = PortfolioAllocator::default();
        let mut bad = perf(0.7, 1.0, 0.2);
        bad.sharpe_ratio = f64::INFINITY;
        let priors: BTreeMap<_, _> = [("X".to_string(), bad)].into_iter().collect();
        assert!(matches!(
            allocator.allocate(&names(&["X"]), &priors, &CorrelationMatrix::new()),
            Err(EngineError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_capped_weights_redistributes() {
        let (w, capped) = capped_weights(&[8.0, 1.0, 1.0], &[0.5, 0.5, 0.5], 1.0);
        assert_eq!(w[0], 0.5);
        assert!(capped[0]);
        assert!((w[1] - 0.25).abs() < 1e-12);
        assert!((w[2] - 0.25).abs() < 1e-12);
    }
}
