//! Position sizing: converts a selected profile and live inputs into a
//! concrete position size, stop loss and take profit.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EngineError, Result};
use crate::models::{CapitalTier, StrategyProfile};

use super::config::SizingConfig;

/// Fully resolved trade parameters for one decision.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SizedParameters {
    /// Position size in capital units, after clamping
    pub position_size: Decimal,

    /// Position size before clamping to the capital bounds
    pub raw_size: Decimal,

    /// Confidence-adjusted stop loss (fraction)
    pub stop_loss_pct: f64,

    /// Confidence-adjusted take profit (fraction)
    pub take_profit_pct: f64,

    /// Volatility of the snapshot the decision was made on
    pub avg_volatility: f64,
}

impl SizedParameters {
    pub fn risk_reward_ratio(&self) -> f64 {
        if self.stop_loss_pct > 0.0 {
            self.take_profit_pct / self.stop_loss_pct
        } else {
            0.0
        }
    }
}

/// Calculator for position sizes and exit levels.
#[derive(Debug, Clone, Default)]
pub struct PositionSizer {
    config: SizingConfig,
}

impl PositionSizer {
    pub fn new(config: SizingConfig) -> Self {
        Self { config }
    }

    /// 0.5 + 1.5 * confidence with the default config.
    pub fn confidence_multiplier(&self, confidence: f64) -> f64 {
        self.config.confidence_base + self.config.confidence_slope * confidence
    }

    pub fn risk_multiplier(&self, risk_level: f64) -> f64 {
        1.0 - self.config.risk_dampening * risk_level
    }

    /// Size a position for `profile`.
    ///
    /// Pure: never touches the catalog. Capital must be non-negative and
    /// confidence within [0, 1]. A non-finite volatility reads as 0.
    pub fn calculate(
        &self,
        profile: &StrategyProfile,
        capital: Decimal,
        confidence: f64,
        avg_volatility: f64,
    ) -> Result<SizedParameters> {
        if capital < Decimal::ZERO {
            return Err(EngineError::invalid_input(format!(
                "capital must be >= 0, got {}",
                capital
            )));
        }
        if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
            return Err(EngineError::invalid_input(format!(
                "confidence must be in [0, 1], got {}",
                confidence
            )));
        }
        let avg_volatility = if avg_volatility.is_finite() {
            avg_volatility
        } else {
            0.0
        };

        let tier = CapitalTier::from_capital(capital);
        let multiplier = profile.parameters.position_size_factor
            * self.confidence_multiplier(confidence)
            * self.config.tier_multiplier(tier)
            * self.risk_multiplier(profile.risk_level);

        let too_large = || EngineError::invalid_input(format!("capital too large: {}", capital));
        let raw_size = capital
            .checked_mul(Decimal::try_from(multiplier).unwrap_or(Decimal::ZERO))
            .ok_or_else(too_large)?;
        let min_size = capital
            .checked_mul(self.config.min_position_fraction)
            .ok_or_else(too_large)?;
        let max_size = capital
            .checked_mul(self.config.max_position_fraction)
            .ok_or_else(too_large)?;
        let position_size = raw_size.max(min_size).min(max_size);

        let stop_loss_pct =
            profile.parameters.stop_loss_pct * (self.config.stop_loss_base - confidence);
        let take_profit_pct = profile.parameters.take_profit_pct
            * (self.config.take_profit_base + self.config.take_profit_slope * confidence);

        debug!(
            strategy = %profile.name,
            tier = %tier,
            raw = %raw_size,
            size = %position_size,
            stop_loss = stop_loss_pct,
            take_profit = take_profit_pct,
            "Sized position"
        );

        Ok(SizedParameters {
            position_size,
            raw_size,
            stop_loss_pct,
            take_profit_pct,
            avg_volatility,
        })
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::trading::reference_profiles;

    fn momentum() -> StrategyProfile {
        reference_profiles()
            .into_iter()
            .find(|p| p.name == "momentum_breakout")
            .unwrap()
    }

    #[test]
    fn test_sizing_formula() {
        let sizer = PositionSizer::default();
        let p = momentum();

        // medium tier: 800 * 0.20 * (0.5 + 1.5*0.6) * 1.0 * (1 - 0.3*0.6)
        let sized = sizer.calculate(&p, dec!(800), 0.6, 0.03).unwrap();
        let expected = 800.0 * 0.20 * 1.4 * 1.0 * 0.82;
        let raw: f64 = sized.raw_size.try_into().unwrap();
        assert!((raw - expected).abs() < 1e-6);
        assert_eq!(sized.position_size, sized.raw_size);

        assert!((sized.stop_loss_pct - 0.02 * 0.9).abs() < 1e-12);
        assert!((sized.take_profit_pct - 0.05 * (0.8 + 0.24)).abs() < 1e-12);
        assert_eq!(sized.avg_volatility, 0.03);
    }

    #[test]
    fn test_clamped_to_capital_bounds() {
        let sizer = PositionSizer::default();
        let mut p = momentum();

        p.parameters.position_size_factor = 1.0;
        let big = sizer.calculate(&p, dec!(1000), 1.0, 0.0).unwrap();
        assert_eq!(big.position_size, dec!(500));
        assert!(big.raw_size > big.position_size);

        p.parameters.position_size_factor = 0.01;
        let small = sizer.calculate(&p, dec!(1000), 0.0, 0.0).unwrap();
        assert_eq!(small.position_size, dec!(20));
    }

    #[test]
    fn test_size_monotonic_in_confidence() {
        let sizer = PositionSizer::default();
        for p in reference_profiles() {
            let mut previous = Decimal::ZERO;
            for step in 0..=20 {
                let c = step as f64 / 20.0;
                let sized = sizer.calculate(&p, dec!(350), c, 0.02).unwrap();
                assert!(sized.raw_size >= previous, "{} at {}", p.name, c);
                previous = sized.raw_size;
            }
        }
    }

    #[test]
    fn test_exit_levels_stay_positive() {
        let sizer = PositionSizer::default();
        for p in reference_profiles() {
            for c in [0.0, 0.5, 1.0] {
                let sized = sizer.calculate(&p, dec!(100), c, 0.0).unwrap();
                assert!(sized.stop_loss_pct > 0.0);
                assert!(sized.take_profit_pct > 0.0);
            }
        }
    }

    #[test]
    fn test_invalid_inputs() {
        let sizer = PositionSizer::default();
        let p = momentum();
        assert!(matches!(
            sizer.calculate(&p, dec!(-1), 0.5, 0.0),
            Err(EngineError::InvalidInput(_))
        ));
        assert!(sizer.calculate(&p, dec!(100), 1.2, 0.0).is_err());
        assert!(sizer.calculate(&p, dec!(100), f64::NAN, 0.0).is_err());

        let sized = sizer.calculate(&p, dec!(100), 0.5, f64::NAN).unwrap();
        assert_eq!(sized.avg_volatility, 0.0);
    }

    #[test]
    fn test_oversized_capital_is_rejected() {
        let sizer = PositionSizer::default();
        let mut p = momentum();
        p.parameters.position_size_factor = 1.0;
        p.risk_level = 0.0;

        let result = sizer.calculate(&p, Decimal::MAX / Decimal::from(2), 1.0, 0.0);
        assert!(matches!(result, Err(EngineError::InvalidInput(_))));

        let big = sizer.calculate(&p, dec!(1_000_000_000_000), 1.0, 0.0).unwrap();
        assert_eq!(big.position_size, dec!(500_000_000_000));
    }
}
