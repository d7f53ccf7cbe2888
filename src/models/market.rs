//! Per-cycle market observations supplied by the market feed.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One asset's movement over the evaluation window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AssetObservation {
    /// Last traded price
    #[serde(default)]
    pub price: f64,

    /// Price change over the window as a fraction (0.05 = +5%)
    pub change_over_window: f64,

    /// Volatility estimate as a fraction, when the feed provides one
    #[serde(default)]
    pub volatility_estimate: Option<f64>,
}

impl AssetObservation {
    pub fn new(change_over_window: f64) -> Self {
        Self {
            price: 0.0,
            change_over_window,
            volatility_estimate: None,
        }
    }

    pub fn with_volatility(mut self, volatility: f64) -> Self {
        self.volatility_estimate = Some(volatility);
        self
    }

    /// Volatility proxy: the supplied estimate, else the absolute change.
    pub fn volatility_or_abs_change(&self) -> f64 {
        self.volatility_estimate
            .unwrap_or_else(|| self.change_over_window.abs())
    }
}

/// Mapping asset -> observation for one evaluation cycle.
///
/// Ordered so that iteration, and therefore every derived float, is
/// identical across runs.
pub type MarketSnapshot = BTreeMap<String, AssetObservation>;
