//! Engine configuration.

use std::path::Path;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::models::CapitalTier;
use crate::optimizer::ParameterSpace;

/// Top-level configuration for every engine component.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub classifier: ClassifierConfig,
    pub sizing: SizingConfig,
    pub allocation: AllocationConfig,
    pub optimizer: OptimizerConfig,
}

impl EngineConfig {
    /// Load from a JSON file. Missing sections fall back to defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.classifier.validate()?;
        self.sizing.validate()?;
        self.allocation.validate()?;
        self.optimizer.validate()?;
        Ok(())
    }
}

/// Regime decision thresholds (fractions).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Average volatility above which the regime is `volatile`
    pub volatile_threshold: f64,

    /// Average change at or beyond which a trend is strong
    pub strong_trend_threshold: f64,

    /// Average change at or beyond which a trend is moderate
    pub moderate_trend_threshold: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            volatile_threshold: 0.08,
            strong_trend_threshold: 0.05,
            moderate_trend_threshold: 0.02,
        }
    }
}

impl ClassifierConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.volatile_threshold > 0.0) {
            return Err(EngineError::invalid_input("volatile_threshold must be > 0"));
        }
        if !(self.moderate_trend_threshold > 0.0
            && self.moderate_trend_threshold < self.strong_trend_threshold)
        {
            return Err(EngineError::invalid_input(
                "trend thresholds must satisfy 0 < moderate < strong",
            ));
        }
        Ok(())
    }
}

/// Position sizing multipliers and bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SizingConfig {
    /// Confidence multiplier intercept: base + slope * confidence
    pub confidence_base: f64,
    pub confidence_slope: f64,

    pub micro_multiplier: f64,
    pub small_multiplier: f64,
    pub medium_multiplier: f64,
    pub large_multiplier: f64,

    /// Risk multiplier is 1 - risk_dampening * risk_level
    pub risk_dampening: f64,

    /// Smallest position as a fraction of capital
    pub min_position_fraction: Decimal,

    /// Largest position as a fraction of capital
    pub max_position_fraction: Decimal,

    /// Stop loss scales by (stop_loss_base - confidence)
    pub stop_loss_base: f64,

    /// Take profit scales by (take_profit_base + take_profit_slope * confidence)
    pub take_profit_base: f64,
    pub take_profit_slope: f64,
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            confidence_base: 0.5,
            confidence_slope: 1.5,
            micro_multiplier: 0.8,
            small_multiplier: 0.9,
            medium_multiplier: 1.0,
            large_multiplier: 1.1,
            risk_dampening: 0.3,
            min_position_fraction: dec!(0.02), // 2% of capital
            max_position_fraction: dec!(0.50), // 50% of capital
            stop_loss_base: 1.5,
            take_profit_base: 0.8,
            take_profit_slope: 0.4,
        }
    }
}

impl SizingConfig {
    pub fn tier_multiplier(&self, tier: CapitalTier) -> f64 {
        match tier {
            CapitalTier::Micro => self.micro_multiplier,
            CapitalTier::Small => self.small_multiplier,
            CapitalTier::Medium => self.medium_multiplier,
            CapitalTier::Large => self.large_multiplier,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.confidence_slope < 0.0 || self.confidence_base <= 0.0 {
            return Err(EngineError::invalid_input(
                "confidence multiplier must be positive and non-decreasing",
            ));
        }
        let tiers = [
            self.micro_multiplier,
            self.small_multiplier,
            self.medium_multiplier,
            self.large_multiplier,
        ];
        if tiers.iter().any(|m| !(*m > 0.0)) {
            return Err(EngineError::invalid_input("tier multipliers must be > 0"));
        }
        if !(0.0..1.0).contains(&self.risk_dampening) {
            return Err(EngineError::invalid_input("risk_dampening must be in [0, 1)"));
        }
        if self.min_position_fraction <= Decimal::ZERO
            || self.min_position_fraction > self.max_position_fraction
            || self.max_position_fraction > Decimal::ONE
        {
            return Err(EngineError::invalid_input(
                "position bounds must satisfy 0 < min <= max <= 1",
            ));
        }
        // Keeps the adjusted stop loss positive for any confidence in [0, 1].
        if self.stop_loss_base <= 1.0 {
            return Err(EngineError::invalid_input("stop_loss_base must be > 1"));
        }
        if self.take_profit_base <= 0.0 || self.take_profit_slope < 0.0 {
            return Err(EngineError::invalid_input(
                "take profit scaling must be positive",
            ));
        }
        Ok(())
    }
}

/// Weights of the per-asset composite score. They sum to 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub confidence: f64,
    pub execution_rate: f64,
    pub profit: f64,
    pub risk_adjusted: f64,
    pub drawdown: f64,
    pub volatility: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            confidence: 0.25,
            execution_rate: 0.20,
            profit: 0.20,
            risk_adjusted: 0.15,
            drawdown: 0.10,
            volatility: 0.10,
        }
    }
}

impl ScoreWeights {
    pub fn total(&self) -> f64 {
        self.confidence
            + self.execution_rate
            + self.profit
            + self.risk_adjusted
            + self.drawdown
            + self.volatility
    }
}

/// Configuration for the multi-asset allocator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocationConfig {
    /// Maximum number of assets held at once
    pub max_concurrent_pairs: usize,

    /// Candidates correlated above this with an accepted asset are skipped
    pub correlation_threshold: f64,

    /// Total capital fraction spread across the selection (0-1)
    pub max_total_exposure: f64,

    /// Per-asset weight cap when the asset's priors do not set one
    pub default_max_pair_allocation: f64,

    pub score_weights: ScoreWeights,

    /// Return at which the profit component saturates
    pub profit_target: f64,

    /// Sharpe-like ratio at which the risk-adjusted component saturates
    pub sharpe_target: f64,

    /// Drawdown at which the inverse-drawdown component reaches zero
    pub max_tolerated_drawdown: f64,

    /// Volatility at which the inverse-volatility component reaches zero
    pub max_tolerated_volatility: f64,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            max_concurrent_pairs: 3,
            correlation_threshold: 0.7,
            max_total_exposure: 0.8,
            default_max_pair_allocation: 0.4,
            score_weights: ScoreWeights::default(),
            profit_target: 0.10,
            sharpe_target: 2.0,
            max_tolerated_drawdown: 0.5,
            max_tolerated_volatility: 0.10,
        }
    }
}

impl AllocationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_pairs == 0 {
            return Err(EngineError::invalid_input("max_concurrent_pairs must be >= 1"));
        }
        if !(-1.0..=1.0).contains(&self.correlation_threshold) {
            return Err(EngineError::invalid_input(
                "correlation_threshold must be in [-1, 1]",
            ));
        }
        if !(self.max_total_exposure > 0.0 && self.max_total_exposure <= 1.0) {
            return Err(EngineError::invalid_input("max_total_exposure must be in (0, 1]"));
        }
        if !(self.default_max_pair_allocation > 0.0 && self.default_max_pair_allocation <= 1.0) {
            return Err(EngineError::invalid_input(
                "default_max_pair_allocation must be in (0, 1]",
            ));
        }
        if (self.score_weights.total() - 1.0).abs() > 1e-6 {
            return Err(EngineError::invalid_input(format!(
                "score weights sum to {}, expected 1",
                self.score_weights.total()
            )));
        }
        if self.profit_target <= 0.0
            || self.sharpe_target <= 0.0
            || self.max_tolerated_drawdown <= 0.0
            || self.max_tolerated_volatility <= 0.0
        {
            return Err(EngineError::invalid_input("normalization targets must be > 0"));
        }
        Ok(())
    }
}

/// Configuration for the randomized parameter search.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Candidate parameter sets generated per run
    pub candidates: usize,

    /// Minimum observations for a meaningful search
    pub min_observations: usize,

    /// Improvements above this fraction are written back to the catalog
    pub auto_apply_threshold: f64,

    /// Relative parameter change that earns a recommendation line
    pub recommendation_threshold: f64,

    /// Fixed seed for reproducible runs; entropy when unset
    pub seed: Option<u64>,

    pub space: ParameterSpace,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            candidates: 50,
            min_observations: 5,
            auto_apply_threshold: 0.05,
            recommendation_threshold: 0.10,
            seed: None,
            space: ParameterSpace::default(),
        }
    }
}

impl OptimizerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.candidates == 0 {
            return Err(EngineError::invalid_input("optimizer candidates must be >= 1"));
        }
        if self.min_observations == 0 {
            return Err(EngineError::invalid_input("min_observations must be >= 1"));
        }
        if self.auto_apply_threshold < 0.0 || self.recommendation_threshold < 0.0 {
            return Err(EngineError::invalid_input("optimizer thresholds must be >= 0"));
        }
        self.space.validate()
    }
}
