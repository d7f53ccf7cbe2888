//! Fixed scoring function applied to baseline and candidate parameters.

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::models::{HistoricalObservation, SignalSide, StrategyParameters};

const CONFIDENCE_WEIGHT: f64 = 0.35;
const BALANCE_WEIGHT: f64 = 0.20;
const RISK_REWARD_WEIGHT: f64 = 0.25;
const THRESHOLD_WEIGHT: f64 = 0.20;

/// Preferred risk/reward band and how fast the score decays outside it.
const RISK_REWARD_BAND: (f64, f64) = (1.5, 2.5);
const RISK_REWARD_FALLOFF: f64 = 1.5;

/// Preferred confidence-threshold band.
const THRESHOLD_BAND: (f64, f64) = (0.65, 0.80);
const THRESHOLD_FALLOFF: f64 = 0.20;

/// Components of an evaluation, each in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Mean confidence of signals that clear the threshold
    pub mean_confidence: f64,
    /// 1 when BUY and SELL counts are equal, 0 when one-sided
    pub side_balance: f64,
    pub risk_reward: f64,
    pub threshold: f64,
    /// Signals that cleared the threshold
    pub signals: usize,
}

impl Evaluation {
    pub fn score(&self) -> f64 {
        CONFIDENCE_WEIGHT * self.mean_confidence
            + BALANCE_WEIGHT * self.side_balance
            + RISK_REWARD_WEIGHT * self.risk_reward
            + THRESHOLD_WEIGHT * self.threshold
    }
}

/// 1 inside [lo, hi], decaying linearly to 0 at `falloff` outside it.
pub fn band_proximity(value: f64, lo: f64, hi: f64, falloff: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    let distance = if value < lo {
        lo - value
    } else if value > hi {
        value - hi
    } else {
        0.0
    };
    (1.0 - distance / falloff).clamp(0.0, 1.0)
}

/// Evaluate `params` over the same observation set used for every candidate.
pub fn evaluate(params: &StrategyParameters, observations: &[&HistoricalObservation]) -> Evaluation {
    let active: Vec<&HistoricalObservation> = observations
        .iter()
        .copied()
        .filter(|o| o.side != SignalSide::Hold && o.confidence >= params.min_confidence)
        .collect();

    let mean_confidence = if active.is_empty() {
        0.0
    } else {
        active.iter().map(|o| o.confidence).mean()
    };

    let buys = active.iter().filter(|o| o.side == SignalSide::Buy).count() as f64;
    let sells = active.iter().filter(|o| o.side == SignalSide::Sell).count() as f64;
    let side_balance = if buys + sells > 0.0 {
        1.0 - (buys - sells).abs() / (buys + sells)
    } else {
        0.0
    };

    Evaluation {
        mean_confidence,
        side_balance,
        risk_reward: band_proximity(
            params.risk_reward_ratio(),
            RISK_REWARD_BAND.0,
            RISK_REWARD_BAND.1,
            RISK_REWARD_FALLOFF,
        ),
        threshold: band_proximity(
            params.min_confidence,
            THRESHOLD_BAND.0,
            THRESHOLD_BAND.1,
            THRESHOLD_FALLOFF,
        ),
        signals: active.len(),
    }
}
