//! Optimization scheduler: re-tunes catalog strategies on a slow cadence
//! while live selection keeps reading the same catalog.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use crate::models::HistoricalObservation;
use crate::optimizer::{OptimizationOutcome, OptimizationResult};
use crate::trading::StrategyEngine;

/// Read-only store of past decisions and outcomes.
pub trait HistorySource: Send + Sync {
    /// Observations recorded for `strategy_name`, oldest first.
    fn load(&self, strategy_name: &str) -> Result<Vec<HistoricalObservation>>;
}

/// History kept in a JSON array file, re-read on every load so an
/// external writer can keep appending.
#[derive(Debug, Clone)]
pub struct JsonHistoryFile {
    path: PathBuf,
}

impl JsonHistoryFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn load_all(&self) -> Result<Vec<HistoricalObservation>> {
        let raw = std::fs::read_to_string(&self.path)
            .with_context(|| format!("reading history file {}", self.path.display()))?;
        let observations: Vec<HistoricalObservation> = serde_json::from_str(&raw)
            .with_context(|| format!("parsing history file {}", self.path.display()))?;
        Ok(observations)
    }
}

impl HistorySource for JsonHistoryFile {
    fn load(&self, strategy_name: &str) -> Result<Vec<HistoricalObservation>> {
        Ok(self
            .load_all()?
            .into_iter()
            .filter(|o| o.strategy_name == strategy_name)
            .collect())
    }
}

impl HistorySource for Vec<HistoricalObservation> {
    fn load(&self, strategy_name: &str) -> Result<Vec<HistoricalObservation>> {
        Ok(self
            .iter()
            .filter(|o| o.strategy_name == strategy_name)
            .cloned()
            .collect())
    }
}

/// Scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Seconds between optimization passes
    pub interval_secs: u64,

    /// Strategies to tune; every catalog strategy when empty
    pub strategies: Vec<String>,

    /// Stop after this many passes; run until shutdown when unset
    pub max_runs: Option<usize>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_secs: 3600,
            strategies: Vec::new(),
            max_runs: None,
        }
    }
}

/// Summary of one optimization pass.
#[derive(Debug, Clone, Default)]
pub struct PassSummary {
    pub results: Vec<OptimizationResult>,
    pub applied: usize,
    pub pending: usize,
    pub failed: usize,
}

/// Periodic driver for the optimizer.
pub struct OptimizationScheduler {
    config: SchedulerConfig,
    engine: Arc<StrategyEngine>,
    source: Box<dyn HistorySource>,

    // Shutdown signal
    shutdown: Arc<AtomicBool>,
}

impl OptimizationScheduler {
    pub fn new(
        config: SchedulerConfig,
        engine: Arc<StrategyEngine>,
        source: Box<dyn HistorySource>,
    ) -> Self {
        Self {
            config,
            engine,
            source,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Get shutdown signal for external control.
    pub fn shutdown_signal(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    fn strategies(&self) -> Vec<String> {
        if self.config.strategies.is_empty() {
            self.engine.catalog().names()
        } else {
            self.config.strategies.clone()
        }
    }

    /// Optimize every scheduled strategy once.
    ///
    /// A strategy whose history cannot be read or whose run fails is
    /// logged and skipped; the pass carries on with the rest.
    pub fn run_once(&self) -> PassSummary {
        let mut summary = PassSummary::default();

        for name in self.strategies() {
            let history = match self.source.load(&name) {
                Ok(history) => history,
                Err(e) => {
                    warn!(strategy = %name, error = %e, "Failed to load history");
                    summary.failed += 1;
                    continue;
                }
            };
            debug!(strategy = %name, observations = history.len(), "Loaded history");

            match self.engine.optimize(&name, &history) {
                Ok(result) => {
                    if result.is_applied() {
                        summary.applied += 1;
                    } else if result.outcome == OptimizationOutcome::PendingReview {
                        summary.pending += 1;
                    }
                    summary.results.push(result);
                }
                Err(e) => {
                    error!(strategy = %name, error = %e, "Optimization failed");
                    summary.failed += 1;
                }
            }
        }

        info!(
            strategies = summary.results.len(),
            applied = summary.applied,
            pending = summary.pending,
            failed = summary.failed,
            "Optimization pass complete"
        );
        summary
    }

    /// Main run loop. Returns the number of completed passes.
    pub async fn run(&self) -> Result<usize> {
        info!(
            interval_secs = self.config.interval_secs,
            max_runs = ?self.config.max_runs,
            "Starting optimization scheduler"
        );

        let mut ticker = interval(Duration::from_secs(self.config.interval_secs.max(1)));
        let mut passes = 0usize;

        while !self.shutdown.load(Ordering::SeqCst) {
            if self.config.max_runs.is_some_and(|max| passes >= max) {
                break;
            }

            tokio::select! {
                _ = ticker.tick() => {}
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received");
                    self.shutdown.store(true, Ordering::SeqCst);
                    break;
                }
            }
            if self.shutdown.load(Ordering::SeqCst) {
                break;
            }

            self.run_once();
            passes += 1;
        }

        info!(passes = passes, "Optimization scheduler stopped");
        Ok(passes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SignalSide;
    use crate::trading::EngineConfig;

    fn engine() -> Arc<StrategyEngine> {
        let mut config = EngineConfig::default();
        config.optimizer.seed = Some(5);
        Arc::new(StrategyEngine::with_reference_catalog(config).unwrap())
    }

    fn history(strategy: &str, n: usize) -> Vec<HistoricalObservation> {
        (0..n)
            .map(|i| {
                let side = if i % 2 == 0 { SignalSide::Buy } else { SignalSide::Sell };
                HistoricalObservation::new(strategy, side, 0.62 + (i % 5) as f64 * 0.05)
            })
            .collect()
    }

    struct FailingSource;

    impl HistorySource for FailingSource {
        fn load(&self, _strategy_name: &str) -> Result<Vec<HistoricalObservation>> {
            anyhow::bail!("store unavailable")
        }
    }

    #[test]
    fn test_run_once_covers_scheduled_strategies() {
        let mut data = history("volatility_harvest", 30);
        data.extend(history("mean_reversion", 2));

        let config = SchedulerConfig {
            strategies: vec!["volatility_harvest".to_string(), "mean_reversion".to_string()],
            ..Default::default()
        };
        let scheduler = OptimizationScheduler::new(config, engine(), Box::new(data));
        let summary = scheduler.run_once();

        assert_eq!(summary.results.len(), 2);
        assert_eq!(summary.failed, 0);
        assert_eq!(
            summary.results[1].outcome,
            OptimizationOutcome::InsufficientData
        );
    }

    #[test]
    fn test_unknown_strategy_and_failing_source_are_counted() {
        let config = SchedulerConfig {
            strategies: vec!["ghost".to_string()],
            ..Default::default()
        };
        let scheduler =
            OptimizationScheduler::new(config, engine(), Box::new(Vec::<HistoricalObservation>::new()));
        assert_eq!(scheduler.run_once().failed, 1);

        let scheduler =
            OptimizationScheduler::new(SchedulerConfig::default(), engine(), Box::new(FailingSource));
        let summary = scheduler.run_once();
        assert_eq!(summary.failed, 7);
        assert!(summary.results.is_empty());
    }

    #[tokio::test]
    async fn test_run_stops_after_max_runs() {
        let config = SchedulerConfig {
            max_runs: Some(1),
            ..Default::default()
        };
        let scheduler = OptimizationScheduler::new(config, engine(), Box::new(history("x", 1)));
        assert_eq!(scheduler.run().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_run_honours_shutdown_flag() {
        let scheduler = OptimizationScheduler::new(
            SchedulerConfig::default(),
            engine(),
            Box::new(Vec::<HistoricalObservation>::new()),
        );
        scheduler.shutdown_signal().store(true, Ordering::SeqCst);
        assert_eq!(scheduler.run().await.unwrap(), 0);
    }

    #[test]
    fn test_json_history_file() {
        let path = std::env::temp_dir().join(format!("stratsel-history-{}.json", uuid::Uuid::new_v4()));
        let data = history("trend_following", 4);
        std::fs::write(&path, serde_json::to_string(&data).unwrap()).unwrap();

        let source = JsonHistoryFile::new(&path);
        assert_eq!(source.load("trend_following").unwrap().len(), 4);
        assert!(source.load("other").unwrap().is_empty());
        std::fs::remove_file(&path).unwrap();

        assert!(source.load("trend_following").is_err());
    }
}
