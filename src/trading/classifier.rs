//! Market regime classification from a per-asset snapshot.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EngineError, Result};
use crate::models::{MarketSnapshot, RegimeLabel};

use super::config::ClassifierConfig;

/// The regime label plus the aggregates it was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegimeReading {
    pub regime: RegimeLabel,
    pub avg_change: f64,
    pub avg_volatility: f64,
    pub asset_count: usize,
}

impl RegimeReading {
    /// Reading used when there is nothing to classify.
    pub fn neutral() -> Self {
        Self {
            regime: RegimeLabel::Sideways,
            avg_change: 0.0,
            avg_volatility: 0.0,
            asset_count: 0,
        }
    }
}

/// Turns a market snapshot into one regime label.
#[derive(Debug, Clone, Default)]
pub struct RegimeClassifier {
    config: ClassifierConfig,
}

impl RegimeClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    /// Classify a snapshot. First matching rule wins:
    /// volatile, bull_strong, bull_moderate, bear_strong, bear_moderate, sideways.
    ///
    /// Empty snapshots read as `sideways`.
    pub fn classify(&self, snapshot: &MarketSnapshot) -> Result<RegimeReading> {
        if snapshot.is_empty() {
            return Ok(RegimeReading::neutral());
        }

        for (asset, obs) in snapshot {
            if !obs.change_over_window.is_finite() {
                return Err(EngineError::invalid_input(format!(
                    "{}: change_over_window is not finite",
                    asset
                )));
            }
            if let Some(vol) = obs.volatility_estimate {
                if !vol.is_finite() || vol < 0.0 {
                    return Err(EngineError::invalid_input(format!(
                        "{}: volatility_estimate {} must be finite and >= 0",
                        asset, vol
                    )));
                }
            }
            if !obs.price.is_finite() || obs.price < 0.0 {
                return Err(EngineError::invalid_input(format!(
                    "{}: price {} must be finite and >= 0",
                    asset, obs.price
                )));
            }
        }

        let n = snapshot.len() as f64;
        let avg_change = snapshot
            .values()
            .map(|o| o.change_over_window)
            .sum::<f64>()
            / n;
        let avg_volatility = snapshot
            .values()
            .map(|o| o.volatility_or_abs_change())
            .sum::<f64>()
            / n;

        let regime = self.label(avg_change, avg_volatility);

        debug!(
            assets = snapshot.len(),
            avg_change = avg_change,
            avg_volatility = avg_volatility,
            regime = %regime,
            "Classified market regime"
        );

        Ok(RegimeReading {
            regime,
            avg_change,
            avg_volatility,
            asset_count: snapshot.len(),
        })
    }

    /// Apply the decision rules to precomputed aggregates.
    pub fn label(&self, avg_change: f64, avg_volatility: f64) -> RegimeLabel {
        let c = &self.config;
        if avg_volatility > c.volatile_threshold {
            RegimeLabel::Volatile
        } else if avg_change >= c.strong_trend_threshold {
            RegimeLabel::BullStrong
        } else if avg_change >= c.moderate_trend_threshold {
            RegimeLabel::BullModerate
        } else if avg_change <= -c.strong_trend_threshold {
            RegimeLabel::BearStrong
        } else if avg_change <= -c.moderate_trend_threshold {
            RegimeLabel::BearModerate
        } else {
            RegimeLabel::Sideways
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AssetObservation;

    fn snapshot(items: &[(&str, AssetObservation)]) -> MarketSnapshot {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect()
    }

    #[test]
    fn test_empty_snapshot_is_sideways() {
        let reading = RegimeClassifier::default()
            .classify(&MarketSnapshot::new())
            .unwrap();
        assert_eq!(reading.regime, RegimeLabel::Sideways);
        assert_eq!(reading.asset_count, 0);
    }

    #[test]
    fn test_trend_labels() {
        let c = RegimeClassifier::default();
        let cases = [
            (0.06, RegimeLabel::BullStrong),
            (0.05, RegimeLabel::BullStrong),
            (0.03, RegimeLabel::BullModerate),
            (0.01, RegimeLabel::Sideways),
            (-0.01, RegimeLabel::Sideways),
            (-0.02, RegimeLabel::BearModerate),
            (-0.05, RegimeLabel::BearStrong),
        ];
        for (change, expected) in cases {
            let snap = snapshot(&[("BTC", AssetObservation::new(change).with_volatility(0.02))]);
            assert_eq!(c.classify(&snap).unwrap().regime, expected, "change {}", change);
        }
    }

    #[test]
    fn test_volatility_takes_precedence() {
        let snap = snapshot(&[
            ("BTC", AssetObservation::new(0.07).with_volatility(0.12)),
            ("ETH", AssetObservation::new(0.06).with_volatility(0.09)),
        ]);
        let reading = RegimeClassifier::default().classify(&snap).unwrap();
        assert_eq!(reading.regime, RegimeLabel::Volatile);
        assert!((reading.avg_volatility - 0.105).abs() < 1e-12);
    }

    #[test]
    fn test_abs_change_used_when_volatility_missing() {
        // Mean change is 0, mean |change| is 0.10 -> volatile.
        let snap = snapshot(&[
            ("BTC", AssetObservation::new(0.10)),
            ("ETH", AssetObservation::new(-0.10)),
        ]);
        let reading = RegimeClassifier::default().classify(&snap).unwrap();
        assert!((reading.avg_change).abs() < 1e-12);
        assert_eq!(reading.regime, RegimeLabel::Volatile);
    }

    #[test]
    fn test_malformed_snapshot_rejected() {
        let snap = snapshot(&[("BTC", AssetObservation::new(f64::NAN))]);
        assert!(matches!(
            RegimeClassifier::default().classify(&snap),
            Err(EngineError::InvalidInput(_))
        ));

        let snap = snapshot(&[("BTC", AssetObservation::new(0.01).with_volatility(-0.1))]);
        assert!(RegimeClassifier::default().classify(&snap).is_err());
    }
}
