use anyhow::Result;
use fxbot::backtest::{BacktestReport, BacktestRunner, MarketScenario, SyntheticDataGenerator};
use fxbot::config::load_config;
use fxbot::data::{CandleAggregator, MarketHistory};

const MINUTES_PER_SCENARIO: usize = 20_000;
const SEED: u64 = 42;

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().with_env_filter("fxbot=info").init();

    println!("\n╔═══════════════════════════════════════════════════════╗");
    println!("║              FXBOT BACKTESTING SUITE                  ║");
    println!("╚═══════════════════════════════════════════════════════╝");

    let config = load_config(None)?;
    let runner = BacktestRunner::new(config);

    let scenarios = [
        (MarketScenario::Uptrend, "📈 Uptrend"),
        (MarketScenario::Downtrend, "📉 Downtrend"),
        (MarketScenario::Sideways, "↔️  Sideways (mean-reverting)"),
        (MarketScenario::Volatile, "⚡ Volatile (±8 pip bars)"),
        (MarketScenario::Crash, "💥 Crash (second-half collapse)"),
        (MarketScenario::WithGaps, "🕳️  With Time Gaps"),
    ];

    let mut all_reports = Vec::new();

    for (scenario, name) in scenarios {
        let mut generator = SyntheticDataGenerator::new(SEED);
        let minute = generator.generate(scenario, MINUTES_PER_SCENARIO);
        let history = MarketHistory::from_minutes(minute, &CandleAggregator::default())?;

        match runner.run_and_report(&history.minute, &history.signal, name) {
            Ok(report) => all_reports.push((name.to_string(), report)),
            Err(e) => eprintln!("❌ Backtest failed for {}: {}", name, e),
        }
    }

    print_summary_comparison(&all_reports);

    Ok(())
}

fn print_summary_comparison(results: &[(String, BacktestReport)]) {
    println!("\n╔═══════════════════════════════════════════════════════╗");
    println!("║              SCENARIO COMPARISON                      ║");
    println!("╚═══════════════════════════════════════════════════════╝\n");

    println!(
        "{:<34} {:>9} {:>8} {:>7} {:>7} {:>8} {:>9}",
        "Scenario", "Balance", "Return%", "Trades", "Win%", "MaxDD%", "Status"
    );
    println!("{}", "─".repeat(88));

    for (name, report) in results {
        let s = &report.stats;
        println!(
            "{:<34} {:>9.2} {:>+8.2} {:>7} {:>7.1} {:>8.2} {:>9}",
            name,
            s.final_balance,
            s.total_return_pct,
            s.total_trades,
            s.win_rate,
            s.max_drawdown_pct,
            report.status
        );
    }

    println!();

    if let Some((best_name, best)) = results
        .iter()
        .max_by(|a, b| a.1.stats.total_return_pct.total_cmp(&b.1.stats.total_return_pct))
    {
        println!(
            "🏆 Best Scenario: {} ({:+.2}%)",
            best_name, best.stats.total_return_pct
        );
    }

    if let Some((worst_name, worst)) = results
        .iter()
        .min_by(|a, b| a.1.stats.total_return_pct.total_cmp(&b.1.stats.total_return_pct))
    {
        println!(
            "⚠️  Worst Scenario: {} ({:+.2}%)",
            worst_name, worst.stats.total_return_pct
        );
    }

    let total_trades: usize = results.iter().map(|(_, r)| r.stats.total_trades).sum();
    let blocked: usize = results.iter().map(|(_, r)| r.stats.blocked_periods).sum();
    let avg_win_rate = if results.is_empty() {
        0.0
    } else {
        results.iter().map(|(_, r)| r.stats.win_rate).sum::<f64>() / results.len() as f64
    };

    println!("\n📊 Overall Statistics:");
    println!("   Total Trades Across All Scenarios: {}", total_trades);
    println!("   Periods Blocked by Loss Streaks: {}", blocked);
    println!("   Average Win Rate: {:.1}%", avg_win_rate);

    println!("\n═══════════════════════════════════════════════════════\n");
}
