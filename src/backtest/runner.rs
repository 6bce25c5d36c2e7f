use crate::backtest::engine::{ensure_increasing, Engine, TickEvent};
use crate::backtest::metrics::{BacktestReport, RunStatistics};
use crate::config::EngineConfig;
use crate::error::BacktestError;
use crate::models::Candle;
use crate::Result;

/// Replays a 1-minute series against a signal series
pub struct BacktestRunner {
    config: EngineConfig,
}

impl BacktestRunner {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run a backtest over the full minute series
    ///
    /// # Arguments
    /// * `minute` - 1-minute candles, strictly increasing in time
    /// * `signal` - 30-minute candles covering the same range
    ///
    /// # Returns
    /// A report with the trade log and final statistics. Ruin is reported
    /// through `status`, not as an error.
    pub fn run(&self, minute: &[Candle], signal: &[Candle]) -> Result<BacktestReport> {
        if minute.is_empty() {
            return Err(BacktestError::EmptySeries("1-minute"));
        }
        if signal.is_empty() {
            tracing::warn!("Signal series is empty, no entries will be taken");
        }
        ensure_increasing("1-minute", minute)?;

        let engine = Engine::new(self.config.clone(), signal)?;
        let mut state = engine.initial_state();
        let mut trades = Vec::new();

        tracing::info!(
            "Starting backtest: {} minute candles, {} signal candles, balance {:.2}",
            minute.len(),
            signal.len(),
            self.config.initial_balance
        );

        for tick in minute {
            let step = engine.step(&mut state, tick)?;
            if let TickEvent::Closed(record) = step.event {
                trades.push(record);
            }
            if state.is_ruined() {
                break;
            }
        }

        if let Some(position) = state.positions.position() {
            tracing::info!(
                "{} position still open at end of data (entry {:.5}, stop {:.5})",
                position.direction,
                position.entry_price,
                position.stop_price
            );
        }

        let stats = RunStatistics::from_run(&state.stats, &trades);

        tracing::info!(
            "Backtest complete: {} trades, balance {:.2} ({:+.2}%), {}",
            stats.total_trades,
            stats.final_balance,
            stats.total_return_pct,
            state.status
        );

        Ok(BacktestReport {
            status: state.status,
            stats,
            trades,
            open_position: state.positions.position().cloned(),
            ticks_processed: state.ticks_processed,
        })
    }

    /// Run backtest and print report
    pub fn run_and_report(
        &self,
        minute: &[Candle],
        signal: &[Candle],
        scenario_name: &str,
    ) -> Result<BacktestReport> {
        println!("\n🔬 Running backtest: {}", scenario_name);
        println!("   Minute candles: {}", minute.len());
        println!("   Signal candles: {}", signal.len());
        println!("   Initial Balance: {:.2}", self.config.initial_balance);

        let report = self.run(minute, signal)?;
        report.print_report();

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backtest::metrics::RunStatus;
    use crate::backtest::synthetic::{MarketScenario, SyntheticDataGenerator};
    use crate::data::converter::CandleAggregator;
    use chrono::Duration;

    fn history(scenario: MarketScenario, minutes: usize) -> (Vec<Candle>, Vec<Candle>) {
        let mut gen = SyntheticDataGenerator::new(42);
        let minute = gen.generate(scenario, minutes);
        let signal = CandleAggregator::new(Duration::minutes(30)).aggregate(&minute);
        (minute, signal)
    }

    #[test]
    fn test_backtest_uptrend() {
        tracing_subscriber::fmt()
            .with_env_filter("fxbot=debug")
            .try_init()
            .ok();

        let (minute, signal) = history(MarketScenario::Uptrend, 3_000);
        let runner = BacktestRunner::new(EngineConfig::default());

        let report = runner.run(&minute, &signal).unwrap();

        assert_eq!(report.status, RunStatus::Survived);
        assert_eq!(report.ticks_processed, minute.len());
        assert!(report.stats.total_trades > 0);
        assert_eq!(report.stats.total_trades, report.trades.len());
        assert!(report.stats.final_balance > 0.0);
    }

    #[test]
    fn test_backtest_volatile_keeps_invariants() {
        let (minute, signal) = history(MarketScenario::Volatile, 3_000);
        let runner = BacktestRunner::new(EngineConfig::default());

        let report = runner.run(&minute, &signal).unwrap();
        let s = &report.stats;

        assert!(s.max_drawdown <= 0.0);
        assert!(s.peak_balance >= s.final_balance);
        assert_eq!(s.winning_trades + s.losing_trades, s.total_trades);
        // At most one entry per signal period
        assert!(s.total_trades <= signal.len());
    }

    #[test]
    fn test_backtest_empty_minute_series() {
        let runner = BacktestRunner::new(EngineConfig::default());
        let result = runner.run(&[], &[]);
        assert!(matches!(result, Err(BacktestError::EmptySeries("1-minute"))));
    }

    #[test]
    fn test_backtest_rejects_unordered_minutes() {
        let (mut minute, signal) = history(MarketScenario::Sideways, 120);
        minute.swap(10, 11);

        let runner = BacktestRunner::new(EngineConfig::default());
        let err = runner.run(&minute, &signal).unwrap_err();
        assert!(matches!(
            err,
            BacktestError::OutOfOrder {
                series: "1-minute",
                index: 11,
                ..
            }
        ));
    }

    #[test]
    fn test_backtest_is_deterministic() {
        let (minute, signal) = history(MarketScenario::Volatile, 2_000);
        let runner = BacktestRunner::new(EngineConfig::default());

        let first = runner.run(&minute, &signal).unwrap();
        let second = runner.run(&minute, &signal).unwrap();

        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }
}
