//! Search ranges for the tunable strategy parameters.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::models::StrategyParameters;

/// Inclusive range with a quantization step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterRange {
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

impl ParameterRange {
    pub const fn new(min: f64, max: f64, step: f64) -> Self {
        Self { min, max, step }
    }

    /// Snap a value onto the step grid, inside the range.
    pub fn quantize(&self, value: f64) -> f64 {
        let steps = ((value - self.min) / self.step).round();
        let snapped = (self.min + steps * self.step).clamp(self.min, self.max);
        // Drop float noise such as 0.035000000000000003.
        (snapped * 1e9).round() / 1e9
    }

    /// Uniform draw, quantized.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        self.quantize(rng.gen_range(self.min..=self.max))
    }

    fn validate(&self, field: &str, lower: f64, upper: f64) -> Result<()> {
        let finite = self.min.is_finite() && self.max.is_finite() && self.step.is_finite();
        if !finite || self.min > self.max || self.step <= 0.0 {
            return Err(EngineError::invalid_input(format!(
                "{} range [{}, {}] step {} is malformed",
                field, self.min, self.max, self.step
            )));
        }
        if self.min < lower || self.max > upper {
            return Err(EngineError::invalid_input(format!(
                "{} range [{}, {}] must lie within [{}, {}]",
                field, self.min, self.max, lower, upper
            )));
        }
        Ok(())
    }
}

/// Ranges for every tunable field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterSpace {
    pub profit_target: ParameterRange,
    pub stop_loss: ParameterRange,
    pub trend_period: ParameterRange,
    pub min_trend_strength: ParameterRange,
    pub confidence_threshold: ParameterRange,
    pub position_size_factor: ParameterRange,
}

impl Default for ParameterSpace {
    fn default() -> Self {
        Self {
            profit_target: ParameterRange::new(0.005, 0.10, 0.005),
            stop_loss: ParameterRange::new(0.005, 0.05, 0.005),
            trend_period: ParameterRange::new(5.0, 50.0, 1.0),
            min_trend_strength: ParameterRange::new(0.1, 0.9, 0.05),
            confidence_threshold: ParameterRange::new(0.5, 0.9, 0.05),
            position_size_factor: ParameterRange::new(0.05, 0.5, 0.01),
        }
    }
}

impl ParameterSpace {
    pub fn validate(&self) -> Result<()> {
        let tiny = f64::MIN_POSITIVE;
        self.profit_target.validate("profit_target", tiny, f64::MAX)?;
        self.stop_loss.validate("stop_loss", tiny, f64::MAX)?;
        self.trend_period.validate("trend_period", 1.0, u32::MAX as f64)?;
        self.min_trend_strength.validate("min_trend_strength", 0.0, 1.0)?;
        self.confidence_threshold.validate("confidence_threshold", 0.0, 1.0)?;
        self.position_size_factor.validate("position_size_factor", tiny, 1.0)?;
        Ok(())
    }

    /// Draw one candidate, resampling every field independently.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> StrategyParameters {
        StrategyParameters {
            take_profit_pct: self.profit_target.sample(rng),
            stop_loss_pct: self.stop_loss.sample(rng),
            trend_period: self.trend_period.sample(rng).round() as u32,
            min_trend_strength: self.min_trend_strength.sample(rng),
            min_confidence: self.confidence_threshold.sample(rng),
            position_size_factor: self.position_size_factor.sample(rng),
        }
    }
}
