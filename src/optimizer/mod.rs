//! Randomized parameter search over strategy profiles.
//!
//! One run moves through COLLECT -> SEARCH -> EVALUATE -> APPLY | DISCARD:
//! gather the strategy's usable history, draw candidate parameter sets,
//! score baseline and candidates with the same fixed function, then write
//! the winner back to the catalog if it clears the auto-apply threshold.

mod evaluate;
mod space;

pub use evaluate::evaluate;
pub use space::ParameterSpace;

use std::fmt;

use chrono::{DateTime, Utc};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::models::{HistoricalObservation, StrategyParameters};
use crate::trading::{Catalog, OptimizerConfig};

/// Stage of an optimization run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizationPhase {
    Collect,
    Search,
    Evaluate,
    Apply,
    Discard,
}

impl fmt::Display for OptimizationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OptimizationPhase::Collect => "COLLECT",
            OptimizationPhase::Search => "SEARCH",
            OptimizationPhase::Evaluate => "EVALUATE",
            OptimizationPhase::Apply => "APPLY",
            OptimizationPhase::Discard => "DISCARD",
        };
        f.write_str(s)
    }
}

/// Qualitative size of the improvement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Above 15%
    Significant,
    /// Above 5%
    Moderate,
    /// Any positive improvement
    Marginal,
    None,
}

impl Verdict {
    pub fn from_improvement(improvement: f64) -> Self {
        if improvement > 0.15 {
            Verdict::Significant
        } else if improvement > 0.05 {
            Verdict::Moderate
        } else if improvement > 0.0 {
            Verdict::Marginal
        } else {
            Verdict::None
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Verdict::Significant => "significant",
            Verdict::Moderate => "moderate",
            Verdict::Marginal => "marginal",
            Verdict::None => "none",
        };
        f.write_str(s)
    }
}

/// What happened to the best candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationOutcome {
    /// Written back to the catalog
    Applied,
    /// Improvement too small to auto-apply; reported for manual confirmation
    PendingReview,
    /// No candidate beat the baseline
    Discarded,
    /// Not enough usable history to search
    InsufficientData,
}

/// Result of one optimization run, kept for audit whatever the outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub run_id: Uuid,
    pub strategy_name: String,
    pub completed_at: DateTime<Utc>,
    pub baseline_score: f64,
    pub best_score: f64,
    /// (best - baseline) / baseline, 0 when nothing improved
    pub improvement: f64,
    pub verdict: Verdict,
    pub outcome: OptimizationOutcome,
    pub original_parameters: StrategyParameters,
    pub candidate_parameters: StrategyParameters,
    pub recommendations: Vec<String>,
    pub reason: Option<String>,
    pub observations_used: usize,
    pub candidates_evaluated: usize,
}

impl OptimizationResult {
    fn unchanged(
        strategy_name: &str,
        parameters: StrategyParameters,
        baseline_score: f64,
        outcome: OptimizationOutcome,
        reason: String,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            strategy_name: strategy_name.to_string(),
            completed_at: Utc::now(),
            baseline_score,
            best_score: baseline_score,
            improvement: 0.0,
            verdict: Verdict::None,
            outcome,
            original_parameters: parameters,
            candidate_parameters: parameters,
            recommendations: Vec::new(),
            reason: Some(reason),
            observations_used: 0,
            candidates_evaluated: 0,
        }
    }

    pub fn is_applied(&self) -> bool {
        self.outcome == OptimizationOutcome::Applied
    }
}

/// Randomized local search over a profile's tunable parameters.
#[derive(Debug, Clone, Default)]
pub struct Optimizer {
    config: OptimizerConfig,
}

impl Optimizer {
    pub fn new(config: OptimizerConfig) -> Self {
        Self { config }
    }

    /// RNG for a run: seeded from config when set, else from entropy.
    pub fn rng(&self) -> ChaCha20Rng {
        match self.config.seed {
            Some(seed) => ChaCha20Rng::seed_from_u64(seed),
            None => ChaCha20Rng::from_entropy(),
        }
    }

    /// COLLECT: usable observations for `strategy_name`.
    pub fn collect<'a>(
        &self,
        strategy_name: &str,
        observations: &'a [HistoricalObservation],
    ) -> Result<Vec<&'a HistoricalObservation>> {
        let matching: Vec<&HistoricalObservation> = observations
            .iter()
            .filter(|o| o.strategy_name == strategy_name)
            .collect();
        let usable: Vec<&HistoricalObservation> =
            matching.iter().copied().filter(|o| o.is_well_formed()).collect();

        if usable.len() < matching.len() {
            warn!(
                strategy = %strategy_name,
                dropped = matching.len() - usable.len(),
                "Dropped malformed observations"
            );
        }

        if usable.len() < self.config.min_observations {
            return Err(EngineError::InsufficientData {
                required: self.config.min_observations,
                available: usable.len(),
            });
        }
        Ok(usable)
    }

    /// Run one optimization for `strategy_name` against `catalog`.
    ///
    /// Bad or thin history yields a zero-improvement result with a reason;
    /// only an unknown strategy name is an error.
    pub fn optimize<R: Rng + ?Sized>(
        &self,
        catalog: &Catalog,
        strategy_name: &str,
        observations: &[HistoricalObservation],
        rng: &mut R,
    ) -> Result<OptimizationResult> {
        let profile = catalog
            .get(strategy_name)
            .ok_or_else(|| EngineError::UnknownStrategy(strategy_name.to_string()))?;
        let original = profile.parameters;

        debug!(strategy = %strategy_name, phase = %OptimizationPhase::Collect, "Optimization phase");
        let history = match self.collect(strategy_name, observations) {
            Ok(history) => history,
            Err(e) => {
                warn!(strategy = %strategy_name, error = %e, "Skipping optimization");
                return Ok(OptimizationResult::unchanged(
                    strategy_name,
                    original,
                    0.0,
                    OptimizationOutcome::InsufficientData,
                    e.to_string(),
                ));
            }
        };

        debug!(strategy = %strategy_name, phase = %OptimizationPhase::Search, "Optimization phase");
        let candidates: Vec<StrategyParameters> = (0..self.config.candidates)
            .map(|_| self.config.space.sample(rng))
            .collect();

        debug!(strategy = %strategy_name, phase = %OptimizationPhase::Evaluate, "Optimization phase");
        let baseline_score = evaluate(&original, &history).score();
        let mut best = original;
        let mut best_score = baseline_score;
        for candidate in &candidates {
            let s = evaluate(candidate, &history).score();
            if s > best_score {
                best = *candidate;
                best_score = s;
            }
        }

        let improvement = relative_improvement(baseline_score, best_score);
        if improvement <= 0.0 {
            debug!(strategy = %strategy_name, phase = %OptimizationPhase::Discard, "Optimization phase");
            let mut result = OptimizationResult::unchanged(
                strategy_name,
                original,
                baseline_score,
                OptimizationOutcome::Discarded,
                "no candidate beat the current parameters".to_string(),
            );
            result.observations_used = history.len();
            result.candidates_evaluated = candidates.len();
            info!(strategy = %strategy_name, baseline = baseline_score, "No improvement found");
            return Ok(result);
        }

        let verdict = Verdict::from_improvement(improvement);
        let mut recommendations =
            recommend(&original, &best, self.config.recommendation_threshold);
        recommendations.push(verdict_line(verdict, improvement));

        let mut result = OptimizationResult {
            run_id: Uuid::new_v4(),
            strategy_name: strategy_name.to_string(),
            completed_at: Utc::now(),
            baseline_score,
            best_score,
            improvement,
            verdict,
            outcome: OptimizationOutcome::PendingReview,
            original_parameters: original,
            candidate_parameters: best,
            recommendations,
            reason: None,
            observations_used: history.len(),
            candidates_evaluated: candidates.len(),
        };

        if improvement > self.config.auto_apply_threshold {
            debug!(strategy = %strategy_name, phase = %OptimizationPhase::Apply, "Optimization phase");
            catalog.apply_optimization(&result)?;
            result.outcome = OptimizationOutcome::Applied;
        } else {
            result.reason = Some(format!(
                "improvement {:.1}% is below the {:.1}% auto-apply threshold",
                improvement * 100.0,
                self.config.auto_apply_threshold * 100.0
            ));
        }

        info!(
            strategy = %strategy_name,
            baseline = baseline_score,
            best = best_score,
            improvement = improvement,
            verdict = %verdict,
            outcome = ?result.outcome,
            "Optimization complete"
        );
        Ok(result)
    }
}

/// Relative gain of `best` over `baseline`.
///
/// A zero baseline with any positive best counts as a 100% improvement.
fn relative_improvement(baseline: f64, best: f64) -> f64 {
    if !(baseline.is_finite() && best.is_finite()) || best <= baseline {
        return 0.0;
    }
    if baseline > f64::EPSILON {
        (best - baseline) / baseline
    } else {
        1.0
    }
}

fn verdict_line(verdict: Verdict, improvement: f64) -> String {
    let pct = improvement * 100.0;
    match verdict {
        Verdict::Significant => format!(
            "Significant improvement (+{:.1}%): apply the recommended parameters",
            pct
        ),
        Verdict::Moderate => format!(
            "Moderate improvement (+{:.1}%): recommended parameters are worth adopting",
            pct
        ),
        Verdict::Marginal => format!(
            "Marginal improvement (+{:.1}%): confirm manually before adopting",
            pct
        ),
        Verdict::None => "No improvement: keep the current parameters".to_string(),
    }
}

/// One line per parameter whose relative change exceeds `threshold`.
pub fn recommend(
    original: &StrategyParameters,
    candidate: &StrategyParameters,
    threshold: f64,
) -> Vec<String> {
    let pct = |v: f64| format!("{:.2}%", v * 100.0);
    let plain = |v: f64| format!("{:.2}", v);

    let fields = [
        (
            "take profit",
            original.take_profit_pct,
            candidate.take_profit_pct,
            pct(original.take_profit_pct),
            pct(candidate.take_profit_pct),
        ),
        (
            "stop loss",
            original.stop_loss_pct,
            candidate.stop_loss_pct,
            pct(original.stop_loss_pct),
            pct(candidate.stop_loss_pct),
        ),
        (
            "confidence threshold",
            original.min_confidence,
            candidate.min_confidence,
            plain(original.min_confidence),
            plain(candidate.min_confidence),
        ),
        (
            "position size factor",
            original.position_size_factor,
            candidate.position_size_factor,
            pct(original.position_size_factor),
            pct(candidate.position_size_factor),
        ),
        (
            "trend period",
            original.trend_period as f64,
            candidate.trend_period as f64,
            original.trend_period.to_string(),
            candidate.trend_period.to_string(),
        ),
        (
            "min trend strength",
            original.min_trend_strength,
            candidate.min_trend_strength,
            plain(original.min_trend_strength),
            plain(candidate.min_trend_strength),
        ),
    ];

    fields
        .into_iter()
        .filter_map(|(label, old, new, old_text, new_text)| {
            if old == 0.0 {
                return None;
            }
            let change = (new - old) / old.abs();
            if change.abs() <= threshold {
                return None;
            }
            let verb = if change > 0.0 { "Raise" } else { "Lower" };
            Some(format!(
                "{} {} from {} to {} ({:+.1}%)",
                verb,
                label,
                old_text,
                new_text,
                change * 100.0
            ))
        })
        .collect()
}
