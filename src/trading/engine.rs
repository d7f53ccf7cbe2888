//! Strategy engine: the entry points used by the market feed, the
//! execution layer and the optimization scheduler.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use rand_chacha::ChaCha20Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{EngineError, Result};
use crate::models::{
    CapitalTier, CorrelationMatrix, HistoricalObservation, MarketSnapshot, PairPerformance,
    RegimeLabel,
};
use crate::optimizer::{OptimizationResult, Optimizer};

use super::{
    reference_profiles, select, AllocationConfig, AllocationPlan, Catalog, EngineConfig,
    PortfolioAllocator, PositionSizer, RegimeClassifier, RegimeReading, SizedParameters,
    StrategyScore,
};

/// Outcome of a single-asset decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionResult {
    pub strategy_name: String,
    /// Fit score in [0, 1]
    pub score: f64,
    pub parameters: SizedParameters,
    pub regime: RegimeReading,
    pub tier: CapitalTier,
    /// Every profile's score, in catalog order
    pub ranked: Vec<StrategyScore>,
}

/// Strategy selection and sizing engine.
///
/// Selection, sizing and allocation are synchronous and read the catalog
/// through a consistent snapshot. Only `optimize` and `record_outcome`
/// write to it.
pub struct StrategyEngine {
    config: EngineConfig,
    catalog: Arc<Catalog>,
    classifier: RegimeClassifier,
    position_sizer: PositionSizer,
    allocator: PortfolioAllocator,
    optimizer: Optimizer,

    // Shared search RNG so seeded engines are reproducible across runs
    rng: Mutex<ChaCha20Rng>,
}

impl StrategyEngine {
    /// Create an engine over an existing catalog.
    pub fn new(config: EngineConfig, catalog: Arc<Catalog>) -> Result<Self> {
        config.validate()?;
        if catalog.is_empty() {
            return Err(EngineError::NoEligibleStrategy);
        }

        let optimizer = Optimizer::new(config.optimizer.clone());
        let rng = Mutex::new(optimizer.rng());

        info!(
            strategies = catalog.len(),
            seeded = config.optimizer.seed.is_some(),
            "Strategy engine initialized"
        );

        Ok(Self {
            classifier: RegimeClassifier::new(config.classifier.clone()),
            position_sizer: PositionSizer::new(config.sizing.clone()),
            allocator: PortfolioAllocator::new(config.allocation.clone()),
            optimizer,
            rng,
            catalog,
            config,
        })
    }

    /// Create an engine over the built-in reference catalog.
    pub fn with_reference_catalog(config: EngineConfig) -> Result<Self> {
        let catalog = Catalog::new(reference_profiles())?;
        Self::new(config, Arc::new(catalog))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Shared handle to the catalog.
    pub fn catalog(&self) -> Arc<Catalog> {
        Arc::clone(&self.catalog)
    }

    pub fn classify(&self, snapshot: &MarketSnapshot) -> Result<RegimeReading> {
        self.classifier.classify(snapshot)
    }

    /// Pick and size a strategy for one asset decision.
    ///
    /// Never mutates the catalog. The regime reading's volatility feeds
    /// the sizer so both come from the same snapshot.
    pub fn select_strategy(
        &self,
        snapshot: &MarketSnapshot,
        capital: Decimal,
        confidence: f64,
        open_positions: usize,
    ) -> Result<SelectionResult> {
        self.select_strategy_with_regime(snapshot, None, capital, confidence, open_positions)
    }

    /// Like `select_strategy`, but scores against `regime` when given
    /// instead of the classified label. Volatility still comes from the
    /// snapshot.
    pub fn select_strategy_with_regime(
        &self,
        snapshot: &MarketSnapshot,
        regime: Option<RegimeLabel>,
        capital: Decimal,
        confidence: f64,
        open_positions: usize,
    ) -> Result<SelectionResult> {
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

        let mut reading = self.classifier.classify(snapshot)?;
        if let Some(label) = regime {
            debug!(classified = %reading.regime, forced = %label, "Regime overridden");
            reading.regime = label;
        }
        let regime = reading;
        let tier = CapitalTier::from_capital(capital);

        let profiles = self.catalog.all();
        let selection = select(&profiles, regime.regime, tier, confidence, open_positions)?;
        let parameters = self.position_sizer.calculate(
            &selection.profile,
            capital,
            confidence,
            regime.avg_volatility,
        )?;

        info!(
            strategy = %selection.profile.name,
            score = selection.score,
            regime = %regime.regime,
            tier = %tier,
            size = %parameters.position_size,
            "Strategy selected"
        );

        Ok(SelectionResult {
            strategy_name: selection.profile.name,
            score: selection.score,
            parameters,
            regime,
            tier,
            ranked: selection.ranked,
        })
    }

    /// Build a correlation-bounded allocation across `candidates`.
    ///
    /// `config` overrides the engine's allocation settings for this call.
    pub fn allocate_portfolio(
        &self,
        candidates: &[String],
        priors: &BTreeMap<String, PairPerformance>,
        correlations: &CorrelationMatrix,
        config: Option<AllocationConfig>,
    ) -> Result<AllocationPlan> {
        match config {
            Some(config) => PortfolioAllocator::new(config).allocate(candidates, priors, correlations),
            None => self.allocator.allocate(candidates, priors, correlations),
        }
    }

    /// Run one optimization pass for `strategy_name`.
    pub fn optimize(
        &self,
        strategy_name: &str,
        observations: &[HistoricalObservation],
    ) -> Result<OptimizationResult> {
        let mut rng = self.rng.lock();
        self.optimizer
            .optimize(&self.catalog, strategy_name, observations, &mut *rng)
    }

    /// Fold a closed trade's outcome into the strategy's priors.
    pub fn record_outcome(
        &self,
        strategy_name: &str,
        realized_return: f64,
        is_win: bool,
    ) -> Result<()> {
        self.catalog
            .update_priors(strategy_name, realized_return, is_win)?;
        debug!(
            strategy = %strategy_name,
            realized_return = realized_return,
            is_win = is_win,
            "Recorded trade outcome"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::models::{AssetObservation, SignalSide};

    fn engine() -> StrategyEngine {
        let mut config = EngineConfig::default();
        config.optimizer.seed = Some(17);
        StrategyEngine::with_reference_catalog(config).unwrap()
    }

    fn bullish_snapshot() -> MarketSnapshot {
        let mut snapshot = MarketSnapshot::new();
        snapshot.insert("BTC".to_string(), AssetObservation::new(0.06).with_volatility(0.03));
        snapshot.insert("ETH".to_string(), AssetObservation::new(0.07).with_volatility(0.04));
        snapshot
    }

    #[test]
    fn test_select_strategy_bull_strong_micro() {
        let engine = engine();
        let result = engine
            .select_strategy(&bullish_snapshot(), dec!(150), 0.78, 0)
            .unwrap();

        assert_eq!(result.regime.regime, RegimeLabel::BullStrong);
        assert_eq!(result.tier, CapitalTier::Micro);
        assert_eq!(result.strategy_name, "momentum_breakout");
        assert!((0.0..=1.0).contains(&result.score));
        assert!((result.parameters.avg_volatility - 0.035).abs() < 1e-12);
        assert!(result.parameters.position_size >= dec!(3));
        assert!(result.parameters.position_size <= dec!(75));

        let bear_only = result
            .ranked
            .iter()
            .find(|s| s.strategy_name == "bear_short_momentum")
            .unwrap();
        assert!(result.score > bear_only.score);
    }

    #[test]
    fn test_select_strategy_is_deterministic_and_read_only() {
        let engine = engine();
        let before = engine.catalog().all();
        let a = engine
            .select_strategy(&bullish_snapshot(), dec!(640), 0.55, 1)
            .unwrap();
        let b = engine
            .select_strategy(&bullish_snapshot(), dec!(640), 0.55, 1)
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(engine.catalog().all(), before);
    }

    #[test]
    fn test_regime_override_changes_selection() {
        let engine = engine();
        let forced = engine
            .select_strategy_with_regime(
                &bullish_snapshot(),
                Some("bear_strong".parse().unwrap()),
                dec!(640),
                0.8,
                0,
            )
            .unwrap();
        assert_eq!(forced.regime.regime, RegimeLabel::BearStrong);
        assert!((forced.regime.avg_volatility - 0.035).abs() < 1e-12);
        assert_ne!(forced.strategy_name, "momentum_breakout");

        let classified = engine
            .select_strategy_with_regime(&bullish_snapshot(), None, dec!(640), 0.8, 0)
            .unwrap();
        assert_eq!(
            classified,
            engine.select_strategy(&bullish_snapshot(), dec!(640), 0.8, 0).unwrap()
        );
    }

    #[test]
    fn test_config_is_kept() {
        let engine = engine();
        assert_eq!(engine.config().optimizer.seed, Some(17));
        assert_eq!(engine.config().allocation.max_concurrent_pairs, 3);
    }

    #[test]
    fn test_empty_snapshot_reads_sideways() {
        let engine = engine();
        let result = engine
            .select_strategy(&MarketSnapshot::new(), dec!(300), 0.7, 0)
            .unwrap();
        assert_eq!(result.regime.regime, RegimeLabel::Sideways);
        assert_eq!(result.parameters.avg_volatility, 0.0);
    }

    #[test]
    fn test_select_strategy_rejects_bad_inputs() {
        let engine = engine();
        assert!(matches!(
            engine.select_strategy(&bullish_snapshot(), dec!(-5), 0.5, 0),
            Err(EngineError::InvalidInput(_))
        ));
        assert!(engine
            .select_strategy(&bullish_snapshot(), dec!(100), 1.5, 0)
            .is_err());

        let mut bad = bullish_snapshot();
        bad.insert("SOL".to_string(), AssetObservation::new(f64::NAN));
        assert!(engine.select_strategy(&bad, dec!(100), 0.5, 0).is_err());
    }

    #[test]
    fn test_allocate_portfolio_with_override() {
        let engine = engine();
        let candidates = vec!["BTC".to_string(), "ETH".to_string(), "SOL".to_string()];
        let correlations = CorrelationMatrix::new().with("BTC", "ETH", 0.95).unwrap();

        let plan = engine
            .allocate_portfolio(&candidates, &BTreeMap::new(), &correlations, None)
            .unwrap();
        assert_eq!(plan.selected_assets.len(), 2);
        assert!(plan.total_weight() <= 0.8 + 1e-9);

        let narrow = AllocationConfig {
            max_concurrent_pairs: 1,
            ..Default::default()
        };
        let plan = engine
            .allocate_portfolio(&candidates, &BTreeMap::new(), &correlations, Some(narrow))
            .unwrap();
        assert_eq!(plan.selected_assets.len(), 1);
    }

    #[test]
    fn test_record_outcome_moves_priors() {
        let engine = engine();
        let before = engine.catalog().get("mean_reversion").unwrap().priors;
        engine.record_outcome("mean_reversion", 0.03, true).unwrap();
        let after = engine.catalog().get("mean_reversion").unwrap().priors;

        assert!(after.success_rate > before.success_rate);
        assert!(after.avg_return > before.avg_return && after.avg_return < 0.03);
        assert!(matches!(
            engine.record_outcome("ghost", 0.01, false),
            Err(EngineError::UnknownStrategy(_))
        ));
    }

    #[test]
    fn test_optimize_with_thin_history_keeps_catalog() {
        let engine = engine();
        let before = engine.catalog().get("trend_following").unwrap();
        let history: Vec<HistoricalObservation> = (0..3)
            .map(|_| HistoricalObservation::new("trend_following", SignalSide::Buy, 0.8))
            .collect();

        let result = engine.optimize("trend_following", &history).unwrap();
        assert_eq!(result.improvement, 0.0);
        assert_eq!(result.candidate_parameters, result.original_parameters);
        assert_eq!(engine.catalog().get("trend_following").unwrap(), before);
    }

    #[test]
    fn test_empty_catalog_is_rejected() {
        let catalog = Arc::new(Catalog::new(Vec::new()).unwrap());
        assert!(matches!(
            StrategyEngine::new(EngineConfig::default(), catalog),
            Err(EngineError::NoEligibleStrategy)
        ));
    }
}
