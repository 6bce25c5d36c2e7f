use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Duration;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use fxbot::backtest::{BacktestReport, BacktestRunner, MarketScenario, SyntheticDataGenerator};
use fxbot::config::{load_config, EngineConfig};
use fxbot::data::{self, CandleAggregator, MarketHistory};

const DEFAULT_LOG_FILTER: &str = "fxbot=info";

#[derive(Parser)]
#[command(
    name = "fxbot",
    version,
    about = "Dual-timeframe FX backtester: 30-minute trend signal, 1-minute execution",
    propagate_version = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Backtest a 1-minute CSV history
    Run(RunArgs),
    /// Resample a 1-minute CSV into wider candles
    Aggregate(AggregateArgs),
    /// Backtest generated market data
    Synthetic(SyntheticArgs),
}

/// Parameters shared by every command that runs the engine
#[derive(Args)]
struct EngineArgs {
    /// Config file (TOML, JSON or YAML); FXBOT_* env vars override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Starting balance
    #[arg(long)]
    balance: Option<f64>,

    /// Fraction of balance risked per trade
    #[arg(long)]
    risk: Option<f64>,

    /// Stop distance in pips
    #[arg(long)]
    stop_pips: Option<f64>,

    /// Write closed trades as CSV
    #[arg(long)]
    trades_out: Option<PathBuf>,

    /// Print the report as JSON instead of text
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Args)]
struct RunArgs {
    /// 1-minute candles (time,open,high,low,close)
    #[arg(long)]
    m1: PathBuf,

    /// 30-minute candles; aggregated from --m1 when omitted
    #[arg(long)]
    m30: Option<PathBuf>,

    #[command(flatten)]
    engine: EngineArgs,
}

#[derive(Args)]
struct AggregateArgs {
    #[arg(long)]
    m1: PathBuf,

    #[arg(long)]
    out: PathBuf,

    /// Bucket width in minutes
    #[arg(long, default_value_t = 30)]
    minutes: i64,
}

#[derive(Args)]
struct SyntheticArgs {
    /// uptrend, downtrend, sideways, volatile, crash or gaps
    #[arg(long)]
    scenario: MarketScenario,

    /// Number of 1-minute candles to generate
    #[arg(long, default_value_t = 10_000)]
    minutes: usize,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    #[command(flatten)]
    engine: EngineArgs,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    match Cli::parse().command {
        Commands::Run(args) => run_history(args),
        Commands::Aggregate(args) => aggregate(args),
        Commands::Synthetic(args) => run_synthetic(args),
    }
}

fn setup_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn run_history(args: RunArgs) -> Result<()> {
    let config = resolve_config(&args.engine)?;
    let (history, stats) = data::load_history(
        &args.m1,
        args.m30.as_deref(),
        &CandleAggregator::default(),
    )
    .with_context(|| format!("Failed to load history from {}", args.m1.display()))?;

    tracing::info!(
        "📂 {} minute candles, {} signal candles",
        stats.minute_rows,
        stats.signal_rows
    );

    backtest(&history, config, &args.engine)
}

fn run_synthetic(args: SyntheticArgs) -> Result<()> {
    let config = resolve_config(&args.engine)?;
    let minute = SyntheticDataGenerator::new(args.seed).generate(args.scenario, args.minutes);
    let history = MarketHistory::from_minutes(minute, &CandleAggregator::default())
        .context("Generated data failed validation")?;

    tracing::info!(
        "🎲 Scenario {} (seed {}): {} minute candles",
        args.scenario.name(),
        args.seed,
        history.minute.len()
    );

    backtest(&history, config, &args.engine)
}

fn aggregate(args: AggregateArgs) -> Result<()> {
    anyhow::ensure!(args.minutes > 0, "--minutes must be positive");

    let minute = data::load_candles_csv(&args.m1)
        .with_context(|| format!("Failed to load {}", args.m1.display()))?;
    let aggregator = CandleAggregator::new(Duration::minutes(args.minutes));
    let history = MarketHistory::from_minutes(minute, &aggregator)
        .with_context(|| format!("Invalid candles in {}", args.m1.display()))?;

    data::write_candles(&args.out, &history.signal)
        .with_context(|| format!("Failed to write {}", args.out.display()))?;

    println!(
        "Aggregated {} candles into {} x {}m -> {}",
        history.minute.len(),
        history.signal.len(),
        args.minutes,
        args.out.display()
    );
    Ok(())
}

fn resolve_config(args: &EngineArgs) -> Result<EngineConfig> {
    let mut config = load_config(args.config.as_deref()).context("Failed to load config")?;

    if let Some(balance) = args.balance {
        config.initial_balance = balance;
    }
    if let Some(risk) = args.risk {
        config.risk_fraction = risk;
    }
    if let Some(stop) = args.stop_pips {
        config.stop_distance_pips = stop;
    }
    config.validate().context("Invalid engine parameters")?;

    tracing::info!(
        "⚙️  balance {:.2}, risk {:.2}%, stop {} pips, trail {}/{}/{} pips, block after {} losses",
        config.initial_balance,
        config.risk_fraction * 100.0,
        config.stop_distance_pips,
        config.trail_activation_pips,
        config.trail_lock_pips,
        config.trail_step_pips,
        config.loss_streak_block_threshold
    );

    Ok(config)
}

fn backtest(history: &MarketHistory, config: EngineConfig, args: &EngineArgs) -> Result<()> {
    let runner = BacktestRunner::new(config);
    let report = runner
        .run(&history.minute, &history.signal)
        .context("Backtest aborted")?;

    if let Some(path) = &args.trades_out {
        write_trades(path, &report)?;
    }

    if args.json {
        println!("{}", data::report_json(&report)?);
    } else {
        report.print_trade_log(20);
        report.print_report();
    }

    Ok(())
}

fn write_trades(path: &Path, report: &BacktestReport) -> Result<()> {
    data::write_trade_log(path, &report.trades)
        .with_context(|| format!("Failed to write trade log to {}", path.display()))
}
