//! Strategy catalog: the registry of profiles shared by the selector,
//! allocator and optimizer.
//!
//! All mutation goes through one catalog-wide write lock and replaces a
//! profile's tunable fields or priors as a unit, so readers never see a
//! half-applied update.

use std::path::Path;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::error::{EngineError, Result};
use crate::models::{StrategyParameters, StrategyProfile};
use crate::optimizer::OptimizationResult;

/// EMA smoothing factor for realized-outcome prior updates.
pub const PRIOR_SMOOTHING: f64 = 0.1;

/// Registry of strategy profiles in declaration order.
#[derive(Debug)]
pub struct Catalog {
    profiles: RwLock<Vec<StrategyProfile>>,
}

impl Catalog {
    /// Build a catalog, rejecting invalid profiles and duplicate names.
    pub fn new(profiles: Vec<StrategyProfile>) -> Result<Self> {
        for (i, profile) in profiles.iter().enumerate() {
            profile.validate()?;
            if profiles[..i].iter().any(|p| p.name == profile.name) {
                return Err(EngineError::invalid_profile(
                    &profile.name,
                    "duplicate strategy name",
                ));
            }
        }
        info!(count = profiles.len(), "Strategy catalog loaded");
        Ok(Self {
            profiles: RwLock::new(profiles),
        })
    }

    /// Load profiles from a JSON array.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let profiles: Vec<StrategyProfile> = serde_json::from_str(&raw)?;
        Self::new(profiles)
    }

    pub fn get(&self, name: &str) -> Option<StrategyProfile> {
        self.profiles.read().iter().find(|p| p.name == name).cloned()
    }

    /// Consistent snapshot of every profile, in catalog order.
    pub fn all(&self) -> Vec<StrategyProfile> {
        self.profiles.read().clone()
    }

    pub fn names(&self) -> Vec<String> {
        self.profiles.read().iter().map(|p| p.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.profiles.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.read().is_empty()
    }

    /// Fold one realized outcome into a profile's priors.
    ///
    /// success_rate <- (1 - a) * success_rate + a * is_win
    /// avg_return   <- (1 - a) * avg_return   + a * |realized_return|
    pub fn update_priors(&self, name: &str, realized_return: f64, is_win: bool) -> Result<()> {
        if !realized_return.is_finite() {
            return Err(EngineError::invalid_input(format!(
                "realized_return for {} is not finite",
                name
            )));
        }

        let mut profiles = self.profiles.write();
        let profile = profiles
            .iter_mut()
            .find(|p| p.name == name)
            .ok_or_else(|| EngineError::UnknownStrategy(name.to_string()))?;

        let a = PRIOR_SMOOTHING;
        let win = if is_win { 1.0 } else { 0.0 };
        let mut priors = profile.priors;
        priors.success_rate = ((1.0 - a) * priors.success_rate + a * win).clamp(0.0, 1.0);
        priors.avg_return =
            ((1.0 - a) * priors.avg_return + a * realized_return.abs()).clamp(0.0, 1.0);
        profile.priors = priors;

        debug!(
            strategy = %name,
            success_rate = priors.success_rate,
            avg_return = priors.avg_return,
            "Updated strategy priors"
        );
        Ok(())
    }

    /// Overwrite the tunable fields of the named profile with the result's
    /// candidate parameters. Identity and applicability are never touched,
    /// and applying the same result again leaves the profile unchanged.
    pub fn apply_optimization(&self, result: &OptimizationResult) -> Result<()> {
        self.replace_parameters(&result.strategy_name, result.candidate_parameters)
    }

    pub(crate) fn replace_parameters(&self, name: &str, parameters: StrategyParameters) -> Result<()> {
        parameters.validate(name)?;

        let mut profiles = self.profiles.write();
        let profile = profiles
            .iter_mut()
            .find(|p| p.name == name)
            .ok_or_else(|| EngineError::UnknownStrategy(name.to_string()))?;
        profile.parameters = parameters;

        info!(
            strategy = %name,
            take_profit = parameters.take_profit_pct,
            stop_loss = parameters.stop_loss_pct,
            min_confidence = parameters.min_confidence,
            "Applied optimized parameters"
        );
        Ok(())
    }
}
