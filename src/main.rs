//! Adaptive Strategy Selector
//!
//! Picks the best-fit trading strategy for the current market regime,
//! sizes the position, spreads capital across low-correlation assets and
//! re-tunes strategy parameters from historical outcomes.

mod error;
mod metrics;
mod models;
mod optimizer;
mod scheduler;
mod trading;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::metrics::{AssetHistory, MetricsCalculator};
use crate::models::{
    CorrelationMatrix, HistoricalObservation, MarketSnapshot, PairPerformance, RegimeLabel,
};
use crate::scheduler::{JsonHistoryFile, OptimizationScheduler, SchedulerConfig};
use crate::trading::{reference_profiles, Catalog, EngineConfig, StrategyEngine};

/// Adaptive strategy selection and position sizing CLI.
#[derive(Parser)]
#[command(name = "stratsel")]
#[command(about = "Select, size and tune trading strategies", long_about = None)]
struct Cli {
    /// Strategy catalog JSON file (built-in reference catalog when unset)
    #[arg(long, env = "STRATSEL_CATALOG")]
    catalog: Option<PathBuf>,

    /// Engine configuration JSON file (defaults when unset)
    #[arg(short, long, env = "STRATSEL_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify a market snapshot into a regime
    Regime {
        /// Snapshot JSON file: {"BTC": {"change_over_window": 0.03, ...}}
        snapshot: PathBuf,
    },

    /// Select and size a strategy for one decision
    Select {
        /// Snapshot JSON file
        snapshot: PathBuf,

        /// Available capital
        #[arg(long)]
        capital: f64,

        /// Upstream signal confidence (0-1)
        #[arg(long)]
        confidence: f64,

        /// Positions currently open
        #[arg(long, default_value = "0")]
        open_positions: usize,

        /// Score against this regime instead of the classified one
        #[arg(long)]
        regime: Option<RegimeLabel>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Build a correlation-aware multi-asset allocation
    Allocate {
        /// Assets to consider, comma separated (defaults to every asset with data)
        #[arg(long, value_delimiter = ',')]
        assets: Vec<String>,

        /// Per-asset PairPerformance priors JSON file
        #[arg(long)]
        priors: Option<PathBuf>,

        /// Per-asset raw history JSON file; derives priors and correlations
        #[arg(long)]
        history: Option<PathBuf>,

        /// Correlation matrix JSON file: {"BTC": {"ETH": 0.9}}
        #[arg(long)]
        correlations: Option<PathBuf>,

        /// Override the maximum number of selected assets
        #[arg(long)]
        max_pairs: Option<usize>,

        /// Override the correlation threshold
        #[arg(long)]
        threshold: Option<f64>,

        /// Override the total exposure (0-1)
        #[arg(long)]
        exposure: Option<f64>,

        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run one parameter optimization for a strategy
    Optimize {
        /// Strategy name
        strategy: String,

        /// Historical observations JSON file
        #[arg(long)]
        history: PathBuf,

        /// Seed for reproducible runs
        #[arg(long)]
        seed: Option<u64>,

        /// Candidate parameter sets to evaluate
        #[arg(long)]
        candidates: Option<usize>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the strategy catalog
    Catalog {
        /// Print profiles as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the effective configuration
    Config,

    /// Re-tune strategies periodically until Ctrl+C
    Schedule {
        /// Historical observations JSON file, re-read every pass
        #[arg(long)]
        history: PathBuf,

        /// Seconds between passes
        #[arg(short, long, default_value = "3600")]
        interval: u64,

        /// Strategies to tune, comma separated (defaults to all)
        #[arg(long, value_delimiter = ',')]
        strategies: Vec<String>,

        /// Stop after this many passes
        #[arg(long)]
        runs: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Setup logging; RUST_LOG wins over --log-level when set
    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.as_str().to_lowercase()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = match &cli.config {
        Some(path) => EngineConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::default(),
    };

    let catalog = match &cli.catalog {
        Some(path) => Catalog::from_json_file(path)
            .with_context(|| format!("loading catalog {}", path.display()))?,
        None => Catalog::new(reference_profiles())?,
    };

    match cli.command {
        Commands::Regime { snapshot } => {
            let snapshot: MarketSnapshot = load_json(&snapshot)?;
            let engine = StrategyEngine::new(config, Arc::new(catalog))?;
            let reading = engine.classify(&snapshot)?;

            println!("\n=== Market Regime ===\n");
            println!("Regime:               {}", reading.regime);
            println!("Assets:               {}", reading.asset_count);
            println!("Avg Change:           {:.2}%", reading.avg_change * 100.0);
            println!("Avg Volatility:       {:.2}%", reading.avg_volatility * 100.0);
        }

        Commands::Select {
            snapshot,
            capital,
            confidence,
            open_positions,
            regime,
            json,
        } => {
            let snapshot: MarketSnapshot = load_json(&snapshot)?;
            let capital = Decimal::try_from(capital).context("capital is not a valid amount")?;
            let engine = StrategyEngine::new(config, Arc::new(catalog))?;

            let result = engine.select_strategy_with_regime(
                &snapshot,
                regime,
                capital,
                confidence,
                open_positions,
            )?;

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
                return Ok(());
            }

            println!("\n=== Strategy Selection ===\n");
            println!("Regime:               {}", result.regime.regime);
            println!("Capital Tier:         {}", result.tier);
            println!("Strategy:             {}", result.strategy_name);
            println!("Score:                {:.3}", result.score);
            println!("Position Size:        {:.2}", result.parameters.position_size);
            println!("Stop Loss:            {:.2}%", result.parameters.stop_loss_pct * 100.0);
            println!("Take Profit:          {:.2}%", result.parameters.take_profit_pct * 100.0);
            println!("Risk/Reward:          {:.2}", result.parameters.risk_reward_ratio());

            println!("\n{:<24} {:>8}", "STRATEGY", "SCORE");
            println!("{}", "-".repeat(33));
            for s in &result.ranked {
                println!("{:<24} {:>8.3}", truncate(&s.strategy_name, 24), s.score);
            }
        }

        Commands::Allocate {
            assets,
            priors,
            history,
            correlations,
            max_pairs,
            threshold,
            exposure,
            json,
        } => {
            let mut perf: BTreeMap<String, PairPerformance> = BTreeMap::new();
            let mut matrix = CorrelationMatrix::new();

            if let Some(path) = &history {
                let histories: BTreeMap<String, AssetHistory> = load_json(path)?;
                perf = MetricsCalculator::pair_performances(&histories)?;
                matrix = MetricsCalculator::correlation_matrix(&MetricsCalculator::return_series(
                    &histories,
                ))?;
            }
            // Explicit files override derived values
            if let Some(path) = &priors {
                let explicit: BTreeMap<String, PairPerformance> = load_json(path)?;
                perf.extend(explicit);
            }
            if let Some(path) = &correlations {
                matrix = load_json(path)?;
            }

            let candidates = if assets.is_empty() {
                perf.keys().cloned().collect()
            } else {
                assets
            };
            if candidates.is_empty() {
                println!("No assets to allocate. Pass --assets, --priors or --history.");
                return Ok(());
            }

            let mut allocation = config.allocation.clone();
            if let Some(n) = max_pairs {
                allocation.max_concurrent_pairs = n;
            }
            if let Some(t) = threshold {
                allocation.correlation_threshold = t;
            }
            if let Some(e) = exposure {
                allocation.max_total_exposure = e;
            }

            let engine = StrategyEngine::new(config, Arc::new(catalog))?;
            let plan = engine.allocate_portfolio(&candidates, &perf, &matrix, Some(allocation))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&plan)?);
                return Ok(());
            }

            println!("\n{:<16} {:>8} {:>10} {:>8}", "ASSET", "SCORE", "WEIGHT", "CAPPED");
            println!("{}", "-".repeat(45));
            for detail in &plan.per_asset_detail {
                println!(
                    "{:<16} {:>8.3} {:>9.1}% {:>8}",
                    truncate(&detail.asset, 16),
                    detail.score,
                    detail.weight * 100.0,
                    if detail.capped { "yes" } else { "" }
                );
            }
            println!("\nTotal Exposure:       {:.1}%", plan.total_weight() * 100.0);

            if !plan.excluded.is_empty() {
                println!("\n--- Excluded ({}) ---", plan.excluded.len());
                for ex in &plan.excluded {
                    println!("  {} ({:.3}): {:?}", ex.asset, ex.score, ex.reason);
                }
            }
        }

        Commands::Optimize {
            strategy,
            history,
            seed,
            candidates,
            json,
        } => {
            let observations: Vec<HistoricalObservation> = load_json(&history)?;

            let mut config = config;
            if seed.is_some() {
                config.optimizer.seed = seed;
            }
            if let Some(k) = candidates {
                config.optimizer.candidates = k;
            }
            let engine = StrategyEngine::new(config, Arc::new(catalog))?;

            info!(strategy = %strategy, observations = observations.len(), "Optimizing strategy");
            let result = engine.optimize(&strategy, &observations)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
                return Ok(());
            }

            println!("\n=== Optimization: {} ===\n", result.strategy_name);
            println!("Run ID:               {}", result.run_id);
            println!("Observations:         {}", result.observations_used);
            println!("Candidates:           {}", result.candidates_evaluated);
            println!("Baseline Score:       {:.4}", result.baseline_score);
            println!("Best Score:           {:.4}", result.best_score);
            println!("Improvement:          {:.1}%", result.improvement * 100.0);
            println!("Verdict:              {}", result.verdict);
            println!("Outcome:              {:?}", result.outcome);
            if let Some(reason) = &result.reason {
                println!("Reason:               {}", reason);
            }

            if !result.recommendations.is_empty() {
                println!("\n--- Recommendations ---");
                for line in &result.recommendations {
                    println!("  {}", line);
                }
            }
        }

        Commands::Catalog { json } => {
            let profiles = catalog.all();
            if json {
                println!("{}", serde_json::to_string_pretty(&profiles)?);
                return Ok(());
            }

            println!(
                "\n{:<24} {:>5} {:>5} {:>7} {:>7} {:>6} {:>6} {:>8}",
                "STRATEGY", "RISK", "EFF", "TP%", "SL%", "CONF", "MAXP", "SUCCESS"
            );
            println!("{}", "-".repeat(76));
            for p in &profiles {
                println!(
                    "{:<24} {:>5.2} {:>5.2} {:>7.2} {:>7.2} {:>6.2} {:>6} {:>7.0}%",
                    truncate(&p.name, 24),
                    p.risk_level,
                    p.capital_efficiency,
                    p.parameters.take_profit_pct * 100.0,
                    p.parameters.stop_loss_pct * 100.0,
                    p.parameters.min_confidence,
                    p.max_concurrent_positions,
                    p.priors.success_rate * 100.0
                );
            }
        }

        Commands::Config => {
            let engine = StrategyEngine::new(config, Arc::new(catalog))?;
            let c = engine.config();

            println!("\n=== Engine Configuration ===\n");
            println!("Regime Classifier:");
            println!("  Volatile Above:       {:.1}%", c.classifier.volatile_threshold * 100.0);
            println!("  Strong Trend:         {:.1}%", c.classifier.strong_trend_threshold * 100.0);
            println!("  Moderate Trend:       {:.1}%", c.classifier.moderate_trend_threshold * 100.0);

            println!("\nPosition Sizing:");
            println!(
                "  Confidence Mult:      {} + {} x confidence",
                c.sizing.confidence_base, c.sizing.confidence_slope
            );
            println!(
                "  Tier Mults:           micro {} / small {} / medium {} / large {}",
                c.sizing.micro_multiplier,
                c.sizing.small_multiplier,
                c.sizing.medium_multiplier,
                c.sizing.large_multiplier
            );
            println!("  Risk Dampening:       {}", c.sizing.risk_dampening);
            println!("  Min Position:         {}%", c.sizing.min_position_fraction * Decimal::from(100));
            println!("  Max Position:         {}%", c.sizing.max_position_fraction * Decimal::from(100));

            println!("\nAllocation:");
            println!("  Max Pairs:            {}", c.allocation.max_concurrent_pairs);
            println!("  Corr Threshold:       {}", c.allocation.correlation_threshold);
            println!("  Total Exposure:       {:.0}%", c.allocation.max_total_exposure * 100.0);
            println!("  Per-Asset Cap:        {:.0}%", c.allocation.default_max_pair_allocation * 100.0);

            println!("\nOptimizer:");
            println!("  Candidates:           {}", c.optimizer.candidates);
            println!("  Min Observations:     {}", c.optimizer.min_observations);
            println!("  Auto-Apply Above:     {:.0}%", c.optimizer.auto_apply_threshold * 100.0);
            println!(
                "  Seed:                 {}",
                c.optimizer
                    .seed
                    .map_or_else(|| "entropy".to_string(), |s| s.to_string())
            );
        }

        Commands::Schedule {
            history,
            interval,
            strategies,
            runs,
        } => {
            let engine = Arc::new(StrategyEngine::new(config, Arc::new(catalog))?);
            let scheduler = OptimizationScheduler::new(
                SchedulerConfig {
                    interval_secs: interval,
                    strategies,
                    max_runs: runs,
                },
                engine,
                Box::new(JsonHistoryFile::new(history)),
            );

            println!("\n=== Optimization Scheduler ===");
            println!("Interval: {}s", interval);
            println!("\nPress Ctrl+C to stop.\n");

            let passes = scheduler.run().await?;
            println!("\nCompleted {} optimization passes.", passes);
        }
    }

    Ok(())
}

/// Read and parse a JSON input file.
fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

/// Truncate a string with ellipsis if too long.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
