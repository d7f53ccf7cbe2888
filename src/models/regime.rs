//! Market regime labels and capital tiers.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Discrete label summarizing aggregate market trend/volatility for one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegimeLabel {
    BullStrong,
    BullModerate,
    Sideways,
    BearModerate,
    BearStrong,
    Volatile,
}

impl RegimeLabel {
    pub const ALL: [RegimeLabel; 6] = [
        RegimeLabel::BullStrong,
        RegimeLabel::BullModerate,
        RegimeLabel::Sideways,
        RegimeLabel::BearModerate,
        RegimeLabel::BearStrong,
        RegimeLabel::Volatile,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RegimeLabel::BullStrong => "bull_strong",
            RegimeLabel::BullModerate => "bull_moderate",
            RegimeLabel::Sideways => "sideways",
            RegimeLabel::BearModerate => "bear_moderate",
            RegimeLabel::BearStrong => "bear_strong",
            RegimeLabel::Volatile => "volatile",
        }
    }

    pub fn is_bearish(&self) -> bool {
        matches!(self, RegimeLabel::BearModerate | RegimeLabel::BearStrong)
    }
}

impl fmt::Display for RegimeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RegimeLabel {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RegimeLabel::ALL
            .into_iter()
            .find(|r| r.as_str() == s.to_lowercase())
            .ok_or_else(|| EngineError::invalid_input(format!("unknown regime label '{}'", s)))
    }
}

/// Coarse bucket of tradable capital.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapitalTier {
    /// Below 200
    Micro,
    /// 200 up to 500
    Small,
    /// 500 up to 1000
    Medium,
    /// 1000 and above
    Large,
}

impl CapitalTier {
    pub const ALL: [CapitalTier; 4] = [
        CapitalTier::Micro,
        CapitalTier::Small,
        CapitalTier::Medium,
        CapitalTier::Large,
    ];

    /// Bucket a capital amount. Callers validate that capital is non-negative.
    pub fn from_capital(capital: Decimal) -> Self {
        if capital < dec!(200) {
            CapitalTier::Micro
        } else if capital < dec!(500) {
            CapitalTier::Small
        } else if capital < dec!(1000) {
            CapitalTier::Medium
        } else {
            CapitalTier::Large
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CapitalTier::Micro => "micro",
            CapitalTier::Small => "small",
            CapitalTier::Medium => "medium",
            CapitalTier::Large => "large",
        }
    }
}

impl fmt::Display for CapitalTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(CapitalTier::from_capital(dec!(0)), CapitalTier::Micro);
        assert_eq!(CapitalTier::from_capital(dec!(199.99)), CapitalTier::Micro);
        assert_eq!(CapitalTier::from_capital(dec!(200)), CapitalTier::Small);
        assert_eq!(CapitalTier::from_capital(dec!(499.99)), CapitalTier::Small);
        assert_eq!(CapitalTier::from_capital(dec!(500)), CapitalTier::Medium);
        assert_eq!(CapitalTier::from_capital(dec!(1000)), CapitalTier::Large);
    }

    #[test]
    fn test_regime_label_parsing() {
        assert_eq!("bull_strong".parse::<RegimeLabel>().unwrap(), RegimeLabel::BullStrong);
        assert_eq!("VOLATILE".parse::<RegimeLabel>().unwrap(), RegimeLabel::Volatile);
        assert!("sideways_ish".parse::<RegimeLabel>().is_err());
    }

    #[test]
    fn test_regime_serde_uses_snake_case() {
        let json = serde_json::to_string(&RegimeLabel::BearModerate).unwrap();
        assert_eq!(json, "\"bear_moderate\"");
    }
}
