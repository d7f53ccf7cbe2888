//! Strategy profile: static applicability rules plus mutable performance priors.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

use super::{CapitalTier, RegimeLabel};

/// Expected time a position stays open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoldingHorizon {
    Minutes,
    Hours,
    Days,
}

impl fmt::Display for HoldingHorizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HoldingHorizon::Minutes => "minutes",
            HoldingHorizon::Hours => "hours",
            HoldingHorizon::Days => "days",
        };
        f.write_str(s)
    }
}

/// Tunable numeric fields. The optimizer searches over these and
/// `Catalog::apply_optimization` overwrites them as one unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrategyParameters {
    /// Take profit as a fraction of entry (0.05 = 5%)
    pub take_profit_pct: f64,

    /// Stop loss as a fraction of entry
    pub stop_loss_pct: f64,

    /// Minimum upstream confidence for the strategy to fire (0-1)
    pub min_confidence: f64,

    /// Base position size as a fraction of capital, in (0, 1]
    pub position_size_factor: f64,

    /// Lookback period for trend detection, in bars
    #[serde(default = "default_trend_period")]
    pub trend_period: u32,

    /// Minimum trend strength required to enter (0-1)
    #[serde(default = "default_min_trend_strength")]
    pub min_trend_strength: f64,
}

fn default_trend_period() -> u32 {
    20
}

fn default_min_trend_strength() -> f64 {
    0.3
}

impl StrategyParameters {
    /// Reward per unit of risk.
    pub fn risk_reward_ratio(&self) -> f64 {
        if self.stop_loss_pct > 0.0 {
            self.take_profit_pct / self.stop_loss_pct
        } else {
            0.0
        }
    }

    pub fn validate(&self, name: &str) -> Result<()> {
        if !(self.take_profit_pct.is_finite() && self.take_profit_pct > 0.0) {
            return Err(EngineError::invalid_profile(name, "take_profit_pct must be > 0"));
        }
        if !(self.stop_loss_pct.is_finite() && self.stop_loss_pct > 0.0) {
            return Err(EngineError::invalid_profile(name, "stop_loss_pct must be > 0"));
        }
        check_unit(name, "min_confidence", self.min_confidence)?;
        if !(self.position_size_factor > 0.0 && self.position_size_factor <= 1.0) {
            return Err(EngineError::invalid_profile(
                name,
                format!(
                    "position_size_factor {} outside (0, 1]",
                    self.position_size_factor
                ),
            ));
        }
        if self.trend_period == 0 {
            return Err(EngineError::invalid_profile(name, "trend_period must be >= 1"));
        }
        check_unit(name, "min_trend_strength", self.min_trend_strength)?;
        Ok(())
    }
}

/// Historical-performance priors, adapted by realized outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformancePriors {
    /// Fraction of winning trades (0-1)
    #[serde(default = "neutral_success_rate")]
    pub success_rate: f64,

    /// Average return per trade (signed fraction)
    #[serde(default)]
    pub avg_return: f64,
}

fn neutral_success_rate() -> f64 {
    0.5
}

impl Default for PerformancePriors {
    /// Conservative neutral priors for a profile with no history.
    fn default() -> Self {
        Self {
            success_rate: neutral_success_rate(),
            avg_return: 0.0,
        }
    }
}

/// A named strategy's rules and priors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyProfile {
    /// Unique key
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Relative riskiness (0-1)
    pub risk_level: f64,

    /// How well the strategy uses small capital (0-1)
    pub capital_efficiency: f64,

    pub applicable_regimes: BTreeSet<RegimeLabel>,

    pub applicable_capital_tiers: BTreeSet<CapitalTier>,

    /// Maximum positions before the selector penalizes this profile
    pub max_concurrent_positions: u32,

    pub expected_holding_horizon: HoldingHorizon,

    #[serde(flatten)]
    pub parameters: StrategyParameters,

    #[serde(flatten)]
    pub priors: PerformancePriors,
}

impl StrategyProfile {
    /// Check every declared range. Profiles are rejected, never clamped.
    pub fn validate(&self) -> Result<()> {
        let name = self.name.as_str();
        if name.trim().is_empty() {
            return Err(EngineError::invalid_profile(name, "name must not be empty"));
        }
        check_unit(name, "risk_level", self.risk_level)?;
        check_unit(name, "capital_efficiency", self.capital_efficiency)?;
        if self.max_concurrent_positions < 1 {
            return Err(EngineError::invalid_profile(
                name,
                "max_concurrent_positions must be >= 1",
            ));
        }
        if self.applicable_regimes.is_empty() {
            return Err(EngineError::invalid_profile(name, "no applicable regimes"));
        }
        if self.applicable_capital_tiers.is_empty() {
            return Err(EngineError::invalid_profile(name, "no applicable capital tiers"));
        }
        self.parameters.validate(name)?;
        check_unit(name, "success_rate", self.priors.success_rate)?;
        if !(self.priors.avg_return.is_finite() && self.priors.avg_return.abs() <= 1.0) {
            return Err(EngineError::invalid_profile(
                name,
                format!("avg_return {} outside [-1, 1]", self.priors.avg_return),
            ));
        }
        Ok(())
    }

    pub fn applies_to_regime(&self, regime: RegimeLabel) -> bool {
        self.applicable_regimes.contains(&regime)
    }

    pub fn applies_to_tier(&self, tier: CapitalTier) -> bool {
        self.applicable_capital_tiers.contains(&tier)
    }

    /// True when the profile only trades falling markets.
    pub fn is_bear_only(&self) -> bool {
        self.applicable_regimes.iter().all(RegimeLabel::is_bearish)
    }
}

fn check_unit(name: &str, field: &str, value: f64) -> Result<()> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(EngineError::invalid_profile(
            name,
            format!("{} {} outside [0, 1]", field, value),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_profile() -> StrategyProfile {
        StrategyProfile {
            name: "sample".to_string(),
            description: "test profile".to_string(),
            risk_level: 0.5,
            capital_efficiency: 0.7,
            applicable_regimes: [RegimeLabel::BullStrong].into_iter().collect(),
            applicable_capital_tiers: [CapitalTier::Micro].into_iter().collect(),
            max_concurrent_positions: 2,
            expected_holding_horizon: HoldingHorizon::Hours,
            parameters: StrategyParameters {
                take_profit_pct: 0.04,
                stop_loss_pct: 0.02,
                min_confidence: 0.6,
                position_size_factor: 0.2,
                trend_period: 20,
                min_trend_strength: 0.3,
            },
            priors: PerformancePriors::default(),
        }
    }

    #[test]
    fn test_valid_profile_passes() {
        assert!(sample_profile().validate().is_ok());
    }

    #[test]
    fn test_out_of_range_fields_rejected() {
        let mut p = sample_profile();
        p.risk_level = 1.2;
        assert!(matches!(p.validate(), Err(EngineError::InvalidProfile { .. })));

        let mut p = sample_profile();
        p.parameters.position_size_factor = 0.0;
        assert!(p.validate().is_err());

        let mut p = sample_profile();
        p.parameters.stop_loss_pct = -0.01;
        assert!(p.validate().is_err());

        let mut p = sample_profile();
        p.max_concurrent_positions = 0;
        assert!(p.validate().is_err());

        let mut p = sample_profile();
        p.priors.success_rate = f64::NAN;
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_risk_reward_below_one_is_allowed() {
        let mut p = sample_profile();
        p.parameters.take_profit_pct = 0.01;
        p.parameters.stop_loss_pct = 0.03;
        assert!(p.validate().is_ok());
        assert!(p.parameters.risk_reward_ratio() < 1.0);
    }

    #[test]
    fn test_deserialize_flat_json() {
        let json = r#"{
            "name": "flat",
            "risk_level": 0.3,
            "capital_efficiency": 0.8,
            "applicable_regimes": ["sideways", "volatile"],
            "applicable_capital_tiers": ["micro", "small"],
            "max_concurrent_positions": 3,
            "expected_holding_horizon": "minutes",
            "take_profit_pct": 0.008,
            "stop_loss_pct": 0.005,
            "min_confidence": 0.7,
            "position_size_factor": 0.15
        }"#;
        let p: StrategyProfile = serde_json::from_str(json).unwrap();
        assert_eq!(p.parameters.trend_period, 20);
        assert_eq!(p.priors, PerformancePriors::default());
        assert!(p.applies_to_regime(RegimeLabel::Volatile));
        assert!(p.validate().is_ok());
    }

    #[test]
    fn test_bear_only() {
        let mut p = sample_profile();
        assert!(!p.is_bear_only());
        p.applicable_regimes = [RegimeLabel::BearStrong, RegimeLabel::BearModerate]
            .into_iter()
            .collect();
        assert!(p.is_bear_only());
    }
}
