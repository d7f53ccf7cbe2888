//! Strategy scoring and best-fit selection.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EngineError, Result};
use crate::models::{CapitalTier, RegimeLabel, StrategyProfile};

const REGIME_MATCH: f64 = 0.30;
const TIER_MATCH: f64 = 0.20;
const CONFIDENCE_WEIGHT: f64 = 0.25;
const EFFICIENCY_WEIGHT: f64 = 0.15;
const PERFORMANCE_WEIGHT: f64 = 0.10;
const MISMATCH: f64 = 0.05;
const CROWDED_PENALTY: f64 = 0.3;

/// Score contributions for one profile, before clamping.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub regime: f64,
    pub tier: f64,
    pub confidence: f64,
    pub efficiency: f64,
    pub performance: f64,
    /// 1.0, or the crowding penalty when the position limit is reached
    pub penalty: f64,
}

impl ScoreBreakdown {
    /// Final score in [0, 1].
    pub fn total(&self) -> f64 {
        let raw = (self.regime + self.tier + self.confidence + self.efficiency + self.performance)
            * self.penalty;
        raw.clamp(0.0, 1.0)
    }
}

/// A profile name with its score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyScore {
    pub strategy_name: String,
    pub score: f64,
}

/// Outcome of ranking the catalog.
#[derive(Debug, Clone)]
pub struct Selection {
    pub profile: StrategyProfile,
    pub score: f64,
    /// Every profile's score, in catalog order
    pub ranked: Vec<StrategyScore>,
}

/// Break a profile's fit into its weighted components.
pub fn score_breakdown(
    profile: &StrategyProfile,
    regime: RegimeLabel,
    tier: CapitalTier,
    confidence: f64,
    open_positions: usize,
) -> ScoreBreakdown {
    let regime_score = if profile.applies_to_regime(regime) {
        REGIME_MATCH
    } else {
        MISMATCH
    };

    let tier_score = if profile.applies_to_tier(tier) {
        TIER_MATCH
    } else {
        MISMATCH
    };

    let min_conf = profile.parameters.min_confidence;
    let confidence_score = if confidence >= min_conf {
        let headroom = if 1.0 - min_conf > f64::EPSILON {
            (confidence - min_conf) / (1.0 - min_conf)
        } else {
            1.0
        };
        CONFIDENCE_WEIGHT * (1.0 + headroom)
    } else {
        MISMATCH
    };

    let efficiency = EFFICIENCY_WEIGHT * profile.capital_efficiency;

    let history = 0.6 * profile.priors.success_rate + 4.0 * profile.priors.avg_return;
    let performance = PERFORMANCE_WEIGHT * history.min(1.0);

    let penalty = if open_positions >= profile.max_concurrent_positions as usize {
        CROWDED_PENALTY
    } else {
        1.0
    };

    ScoreBreakdown {
        regime: regime_score,
        tier: tier_score,
        confidence: confidence_score,
        efficiency,
        performance,
        penalty,
    }
}

/// Fit of one profile to current conditions, in [0, 1].
pub fn score(
    profile: &StrategyProfile,
    regime: RegimeLabel,
    tier: CapitalTier,
    confidence: f64,
    open_positions: usize,
) -> f64 {
    score_breakdown(profile, regime, tier, confidence, open_positions).total()
}

/// Pick the highest-scoring profile. Ties go to the earliest profile.
///
/// Fails only when there is nothing to choose from.
pub fn select(
    profiles: &[StrategyProfile],
    regime: RegimeLabel,
    tier: CapitalTier,
    confidence: f64,
    open_positions: usize,
) -> Result<Selection> {
    let mut ranked = Vec::with_capacity(profiles.len());
    let mut best: Option<(usize, f64)> = None;

    for (i, profile) in profiles.iter().enumerate() {
        let s = score(profile, regime, tier, confidence, open_positions);
        debug!(strategy = %profile.name, score = s, "Scored strategy");
        ranked.push(StrategyScore {
            strategy_name: profile.name.clone(),
            score: s,
        });
        match best {
            Some((_, best_score)) if s <= best_score => {}
            _ => best = Some((i, s)),
        }
    }

    let (index, best_score) = best.ok_or(EngineError::NoEligibleStrategy)?;
    Ok(Selection {
        profile: profiles[index].clone(),
        score: best_score,
        ranked,
    })
}
