//! Built-in reference catalog, used when no catalog file is supplied.

use crate::models::{
    CapitalTier, HoldingHorizon, PerformancePriors, RegimeLabel, StrategyParameters,
    StrategyProfile,
};

use crate::models::CapitalTier::{Large, Medium, Micro, Small};
use crate::models::RegimeLabel::{
    BearModerate, BearStrong, BullModerate, BullStrong, Sideways, Volatile,
};

#[allow(clippy::too_many_arguments)]
fn profile(
    name: &str,
    description: &str,
    risk_level: f64,
    capital_efficiency: f64,
    regimes: &[RegimeLabel],
    tiers: &[CapitalTier],
    max_concurrent_positions: u32,
    horizon: HoldingHorizon,
    parameters: StrategyParameters,
    priors: PerformancePriors,
) -> StrategyProfile {
    StrategyProfile {
        name: name.to_string(),
        description: description.to_string(),
        risk_level,
        capital_efficiency,
        applicable_regimes: regimes.iter().copied().collect(),
        applicable_capital_tiers: tiers.iter().copied().collect(),
        max_concurrent_positions,
        expected_holding_horizon: horizon,
        parameters,
        priors,
    }
}

fn params(
    take_profit_pct: f64,
    stop_loss_pct: f64,
    min_confidence: f64,
    position_size_factor: f64,
    trend_period: u32,
    min_trend_strength: f64,
) -> StrategyParameters {
    StrategyParameters {
        take_profit_pct,
        stop_loss_pct,
        min_confidence,
        position_size_factor,
        trend_period,
        min_trend_strength,
    }
}

fn priors(success_rate: f64, avg_return: f64) -> PerformancePriors {
    PerformancePriors {
        success_rate,
        avg_return,
    }
}

/// The seven reference profiles in catalog order.
pub fn reference_profiles() -> Vec<StrategyProfile> {
    vec![
        profile(
            "micro_scalping",
            "Very short holds on small accounts, many small wins",
            0.3,
            0.9,
            &[Sideways, Volatile, BullModerate],
            &[Micro, Small],
            3,
            HoldingHorizon::Minutes,
            params(0.008, 0.005, 0.70, 0.15, 10, 0.2),
            priors(0.62, 0.004),
        ),
        profile(
            "momentum_breakout",
            "Enter on confirmed breakouts in rising markets",
            0.6,
            0.8,
            &[BullStrong, BullModerate],
            &[Micro, Small, Medium],
            2,
            HoldingHorizon::Hours,
            params(0.05, 0.02, 0.65, 0.20, 20, 0.5),
            priors(0.55, 0.018),
        ),
        profile(
            "trend_following",
            "Ride established trends with wide stops",
            0.4,
            0.7,
            &[BullStrong, BullModerate, BearModerate],
            &[Medium, Large],
            3,
            HoldingHorizon::Days,
            params(0.08, 0.03, 0.60, 0.25, 50, 0.4),
            priors(0.58, 0.025),
        ),
        profile(
            "mean_reversion",
            "Fade stretched moves back to the range midpoint",
            0.35,
            0.75,
            &[Sideways],
            &[Micro, Small, Medium, Large],
            4,
            HoldingHorizon::Hours,
            params(0.025, 0.015, 0.70, 0.15, 14, 0.1),
            priors(0.60, 0.012),
        ),
        profile(
            "bear_short_momentum",
            "Short continuation in falling markets",
            0.7,
            0.6,
            &[BearStrong, BearModerate],
            &[Small, Medium, Large],
            2,
            HoldingHorizon::Hours,
            params(0.04, 0.02, 0.75, 0.12, 20, 0.5),
            priors(0.52, 0.015),
        ),
        profile(
            "volatility_harvest",
            "Quick in-and-out trades on volatility spikes",
            0.8,
            0.5,
            &[Volatile],
            &[Medium, Large],
            2,
            HoldingHorizon::Minutes,
            // Risk/reward below 1: left as configured, the optimizer penalizes it.
            params(0.03, 0.04, 0.80, 0.10, 5, 0.6),
            priors(0.50, 0.010),
        ),
        profile(
            "capital_preservation",
            "Small defensive positions when conditions are poor",
            0.1,
            0.4,
            &[BearStrong, Volatile, Sideways],
            &[Micro, Small, Medium, Large],
            5,
            HoldingHorizon::Days,
            params(0.015, 0.01, 0.50, 0.05, 30, 0.2),
            priors(0.65, 0.005),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_profiles_are_valid() {
        let profiles = reference_profiles();
        assert_eq!(profiles.len(), 7);
        for p in &profiles {
            p.validate().unwrap();
        }
    }

    #[test]
    fn test_every_regime_and_tier_is_covered() {
        let profiles = reference_profiles();
        for regime in RegimeLabel::ALL {
            assert!(profiles.iter().any(|p| p.applies_to_regime(regime)), "{}", regime);
        }
        for tier in CapitalTier::ALL {
            assert!(profiles.iter().any(|p| p.applies_to_tier(tier)), "{}", tier);
        }
    }
}
