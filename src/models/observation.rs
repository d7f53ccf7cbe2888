//! Historical decision records read by the parameter optimizer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Direction of a past signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalSide {
    Buy,
    Sell,
    Hold,
}

/// A past decision and, once the position closed, its realized return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalObservation {
    pub strategy_name: String,

    pub timestamp: DateTime<Utc>,

    pub side: SignalSide,

    /// Upstream confidence at decision time (0-1)
    pub confidence: f64,

    /// Realized return as a signed fraction, if the trade has closed
    #[serde(default)]
    pub realized_return: Option<f64>,
}

impl HistoricalObservation {
    pub fn new(strategy_name: impl Into<String>, side: SignalSide, confidence: f64) -> Self {
        Self {
            strategy_name: strategy_name.into(),
            timestamp: Utc::now(),
            side,
            confidence,
            realized_return: None,
        }
    }

    /// Usable for scoring: finite confidence within [0, 1] and a finite return if present.
    pub fn is_well_formed(&self) -> bool {
        self.confidence.is_finite()
            && (0.0..=1.0).contains(&self.confidence)
            && self.realized_return.map_or(true, f64::is_finite)
    }
}
