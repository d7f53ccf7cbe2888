//! Performance metrics feeding the portfolio allocator.

mod calculator;

pub use calculator::{AssetHistory, MetricsCalculator};
