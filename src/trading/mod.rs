//! Trading logic: regime classification, strategy catalog, selection,
//! position sizing and portfolio allocation.

mod allocator;
mod catalog;
mod classifier;
mod config;
mod engine;
mod position_sizer;
mod reference;
mod selector;

pub use allocator::{AllocationPlan, PortfolioAllocator};
pub use catalog::Catalog;
pub use classifier::{RegimeClassifier, RegimeReading};
pub use config::{AllocationConfig, EngineConfig, OptimizerConfig};
pub use engine::StrategyEngine;
pub use position_sizer::{PositionSizer, SizedParameters};
pub use reference::reference_profiles;
pub use selector::{select, StrategyScore};
