//! Data models for strategy profiles, market observations, regimes and priors.

mod market;
mod observation;
mod pair;
mod profile;
mod regime;

pub use market::{AssetObservation, MarketSnapshot};
pub use observation::{HistoricalObservation, SignalSide};
pub use pair::{CorrelationMatrix, PairPerformance};
pub use profile::{HoldingHorizon, PerformancePriors, StrategyParameters, StrategyProfile};
pub use regime::{CapitalTier, RegimeLabel};
