use chrono::{DateTime, Utc};

use crate::backtest::metrics::{AccountStats, RunStatus, TradeRecord};
use crate::backtest::sync::PeriodClock;
use crate::config::EngineConfig;
use crate::error::BacktestError;
use crate::execution::{OpenError, PositionManager, TrailingRule};
use crate::models::{Candle, Direction};
use crate::risk::{PositionSizer, SizingRejection, StreakGuard};

/// Why an entry was not taken on a flat tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EntrySkip {
    /// Tick precedes the first signal period
    NoPeriod,
    /// Loss-streak guard is active for this period
    Blocked,
    /// An entry was already made in this period
    AlreadyTraded,
    /// Signal candle body below `min_signal_body_pips`
    SmallBody,
    Sizing(SizingRejection),
}

/// Outcome of a single tick
#[derive(Debug, Clone, PartialEq)]
pub enum TickEvent {
    NoAction,
    Skipped(EntrySkip),
    Opened {
        direction: Direction,
        entry_price: f64,
        stop_price: f64,
        size: f64,
    },
    /// Position held, stop unchanged
    Held,
    Trailed { from: f64, to: f64 },
    Closed(TradeRecord),
    /// Run already ruined; tick ignored
    Halted,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    pub rolled_over: bool,
    pub event: TickEvent,
}

/// All mutable simulation state, owned by the caller
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationState {
    pub clock: PeriodClock,
    pub positions: PositionManager,
    pub guard: StreakGuard,
    pub stats: AccountStats,
    pub status: RunStatus,
    pub last_time: Option<DateTime<Utc>>,
    pub ticks_processed: usize,
}

impl SimulationState {
    pub fn is_ruined(&self) -> bool {
        self.status == RunStatus::Ruined
    }
}

/// Pure tick processor over a fixed signal series
///
/// The engine holds only immutable inputs. Everything that changes during a
/// run lives in [`SimulationState`], so any tick can be replayed from a
/// cloned state.
#[derive(Debug, Clone)]
pub struct Engine<'a> {
    config: EngineConfig,
    sizer: PositionSizer,
    trailing: TrailingRule,
    stop_distance: f64,
    min_body: f64,
    signal: &'a [Candle],
}

impl<'a> Engine<'a> {
    pub fn new(config: EngineConfig, signal: &'a [Candle]) -> Result<Self, BacktestError> {
        config.validate()?;
        ensure_increasing("signal", signal)?;

        Ok(Self {
            sizer: PositionSizer::from_config(&config),
            trailing: TrailingRule::from_config(&config),
            stop_distance: config.stop_distance(),
            min_body: config.pips_to_price(config.min_signal_body_pips),
            config,
            signal,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn initial_state(&self) -> SimulationState {
        SimulationState {
            clock: PeriodClock::new(),
            positions: PositionManager::new(),
            guard: StreakGuard::new(self.config.loss_streak_block_threshold),
            stats: AccountStats::new(self.config.initial_balance),
            status: RunStatus::Survived,
            last_time: None,
            ticks_processed: 0,
        }
    }

    /// Process one 1-minute candle
    ///
    /// Ticks must arrive with strictly increasing timestamps; anything else
    /// is an `OutOfOrder` error and leaves `state` untouched.
    pub fn step(
        &self,
        state: &mut SimulationState,
        tick: &Candle,
    ) -> Result<StepResult, BacktestError> {
        if state.is_ruined() {
            return Ok(StepResult {
                rolled_over: false,
                event: TickEvent::Halted,
            });
        }

        if let Some(previous) = state.last_time {
            if tick.timestamp <= previous {
                return Err(BacktestError::OutOfOrder {
                    series: "1-minute",
                    index: state.ticks_processed,
                    previous,
                    current: tick.timestamp,
                });
            }
        }
        state.last_time = Some(tick.timestamp);
        state.ticks_processed += 1;

        let advance = state.clock.advance(tick.timestamp, self.signal);
        if advance.rolled_over {
            state.guard.on_rollover();
        }

        let event = if state.positions.is_flat() {
            self.evaluate_entry(state, advance.period, tick)
        } else {
            self.manage_position(state, tick)
        };

        Ok(StepResult {
            rolled_over: advance.rolled_over,
            event,
        })
    }

    fn evaluate_entry(
        &self,
        state: &mut SimulationState,
        period: Option<usize>,
        tick: &Candle,
    ) -> TickEvent {
        let Some((index, signal)) = period.and_then(|i| self.signal.get(i).map(|c| (i, c))) else {
            return TickEvent::Skipped(EntrySkip::NoPeriod);
        };

        if state.guard.check().is_err() {
            return TickEvent::Skipped(EntrySkip::Blocked);
        }
        if state.positions.has_traded_period(index) {
            return TickEvent::Skipped(EntrySkip::AlreadyTraded);
        }
        if signal.body() < self.min_body {
            return TickEvent::Skipped(EntrySkip::SmallBody);
        }

        let direction = Direction::from_signal(signal);
        match state.positions.open_position(
            direction,
            tick,
            self.stop_distance,
            state.stats.balance,
            &self.sizer,
            index,
            signal.timestamp,
        ) {
            Ok(position) => {
                tracing::debug!(
                    "{} opened @ {:.5} stop {:.5} size {:.4} ({})",
                    direction,
                    position.entry_price,
                    position.stop_price,
                    position.size,
                    tick.timestamp
                );
                TickEvent::Opened {
                    direction,
                    entry_price: position.entry_price,
                    stop_price: position.stop_price,
                    size: position.size,
                }
            }
            Err(OpenError::Sizing(reason)) => {
                tracing::debug!("Entry skipped at {}: {}", tick.timestamp, reason);
                TickEvent::Skipped(EntrySkip::Sizing(reason))
            }
            // Unreachable while flat
            Err(OpenError::AlreadyOpen) => TickEvent::NoAction,
        }
    }

    fn manage_position(&self, state: &mut SimulationState, tick: &Candle) -> TickEvent {
        let trailed = state
            .positions
            .update_trailing_stop(tick, &self.trailing);
        if let Some((from, to)) = trailed {
            tracing::debug!("Stop trailed {:.5} -> {:.5} ({})", from, to, tick.timestamp);
        }

        let Some(closed) = state.positions.check_exit(tick, &self.sizer) else {
            return match trailed {
                Some((from, to)) => TickEvent::Trailed { from, to },
                None => TickEvent::Held,
            };
        };

        if state.guard.record_closure(closed.profit) {
            state.stats.blocked_periods += 1;
            tracing::debug!(
                "Entries blocked after {} consecutive losses ({})",
                state.guard.consecutive_losses(),
                tick.timestamp
            );
        }
        state
            .stats
            .record_closure(closed.profit, state.guard.consecutive_losses());

        let record = TradeRecord::from_closed(&closed, self.config.pip_size, state.stats.balance);
        tracing::debug!(
            "{} closed @ {:.5} ({:?}) profit {:.2} balance {:.2}",
            record.direction,
            record.exit_price,
            record.exit_reason,
            record.profit,
            record.balance_after
        );

        if state.stats.is_ruined() {
            state.status = RunStatus::Ruined;
            tracing::warn!(
                "Account ruined at {}: balance {:.2}",
                tick.timestamp,
                state.stats.balance
            );
        }

        TickEvent::Closed(record)
    }
}

/// Fail with `OutOfOrder` unless timestamps strictly increase
pub fn ensure_increasing(series: &'static str, candles: &[Candle]) -> Result<(), BacktestError> {
    for (index, pair) in candles.windows(2).enumerate() {
        if pair[1].timestamp <= pair[0].timestamp {
            return Err(BacktestError::OutOfOrder {
                series,
                index: index + 1,
                previous: pair[0].timestamp,
                current: pair[1].timestamp,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    const PIP: f64 = 0.0001;

    fn t(minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2008, 1, 2, 9, 0, 0).unwrap() + Duration::minutes(minute)
    }

    fn bar(minute: i64, open: f64, high: f64, low: f64, close: f64) -> Candle {
        Candle::new(t(minute), open, high, low, close)
    }

    fn flat(minute: i64, price: f64) -> Candle {
        bar(minute, price, price, price, price)
    }

    fn bullish_periods(count: i64) -> Vec<Candle> {
        (0..count)
            .map(|i| bar(i * 30, 1.1000, 1.1010, 1.0990, 1.1005))
            .collect()
    }

    #[test]
    fn test_rejects_invalid_config() {
        let signal = bullish_periods(1);
        let config = EngineConfig {
            risk_fraction: 1.5,
            ..Default::default()
        };
        assert!(matches!(
            Engine::new(config, &signal),
            Err(BacktestError::InvalidConfig { key: "risk_fraction", .. })
        ));
    }

    #[test]
    fn test_rejects_unordered_signal() {
        let signal = vec![flat(30, 1.1), flat(0, 1.1)];
        assert!(matches!(
            Engine::new(EngineConfig::default(), &signal),
            Err(BacktestError::OutOfOrder { series: "signal", index: 1, .. })
        ));
    }

    #[test]
    fn test_entry_at_close_in_signal_direction() {
        let signal = bullish_periods(1);
        let engine = Engine::new(EngineConfig::default(), &signal).unwrap();
        let mut state = engine.initial_state();

        let result = engine
            .step(&mut state, &bar(0, 1.1000, 1.1003, 1.0999, 1.1002))
            .unwrap();

        assert!(result.rolled_over);
        match result.event {
            TickEvent::Opened {
                direction,
                entry_price,
                stop_price,
                size,
            } => {
                assert_eq!(direction, Direction::Long);
                assert_eq!(entry_price, 1.1002);
                assert!((stop_price - 1.0982).abs() < 1e-9);
                // 100 * 0.015 / 0.0020
                assert!((size - 750.0).abs() < 1e-6);
            }
            other => panic!("expected Opened, got {other:?}"),
        }
    }

    #[test]
    fn test_doji_signal_goes_short() {
        let signal = vec![bar(0, 1.1000, 1.1010, 1.0990, 1.1000)];
        let engine = Engine::new(EngineConfig::default(), &signal).unwrap();
        let mut state = engine.initial_state();

        let result = engine.step(&mut state, &flat(0, 1.1000)).unwrap();
        assert!(matches!(
            result.event,
            TickEvent::Opened {
                direction: Direction::Short,
                ..
            }
        ));
    }

    #[test]
    fn test_entry_bar_does_not_exit() {
        let signal = bullish_periods(1);
        let engine = Engine::new(EngineConfig::default(), &signal).unwrap();
        let mut state = engine.initial_state();

        // Low is far below the would-be stop, but exits start next tick
        let result = engine
            .step(&mut state, &bar(0, 1.1000, 1.1000, 1.0900, 1.1000))
            .unwrap();
        assert!(matches!(result.event, TickEvent::Opened { .. }));
        assert!(!state.positions.is_flat());
    }

    #[test]
    fn test_no_entry_before_first_period() {
        let signal = vec![bar(30, 1.1000, 1.1010, 1.0990, 1.1005)];
        let engine = Engine::new(EngineConfig::default(), &signal).unwrap();
        let mut state = engine.initial_state();

        let result = engine.step(&mut state, &flat(5, 1.1)).unwrap();
        assert_eq!(result.event, TickEvent::Skipped(EntrySkip::NoPeriod));
        assert!(!result.rolled_over);

        let result = engine.step(&mut state, &flat(30, 1.1)).unwrap();
        assert!(result.rolled_over);
        assert!(matches!(result.event, TickEvent::Opened { .. }));
    }

    #[test]
    fn test_stop_out_realizes_loss_and_blocks_period() {
        let signal = bullish_periods(1);
        let engine = Engine::new(EngineConfig::default(), &signal).unwrap();
        let mut state = engine.initial_state();

        engine.step(&mut state, &flat(0, 1.1000)).unwrap();
        let result = engine
            .step(&mut state, &bar(1, 1.0990, 1.0990, 1.0975, 1.0980))
            .unwrap();

        let TickEvent::Closed(record) = result.event else {
            panic!("expected Closed");
        };
        assert!((record.exit_price - 1.0980).abs() < 1e-9);
        assert!((record.profit + 1.5).abs() < 1e-6);
        assert!((record.pips + 20.0).abs() < 1e-6);
        assert!((state.stats.balance - 98.5).abs() < 1e-6);
        assert_eq!(state.stats.losses, 1);

        // Same period, flat again: no re-entry
        let result = engine.step(&mut state, &flat(2, 1.0980)).unwrap();
        assert_eq!(result.event, TickEvent::Skipped(EntrySkip::AlreadyTraded));
    }

    #[test]
    fn test_trail_then_hold() {
        let signal = bullish_periods(1);
        let engine = Engine::new(EngineConfig::default(), &signal).unwrap();
        let mut state = engine.initial_state();

        engine.step(&mut state, &flat(0, 1.1000)).unwrap();
        let result = engine
            .step(&mut state, &bar(1, 1.1016, 1.1020, 1.1016, 1.1018))
            .unwrap();
        match result.event {
            TickEvent::Trailed { from, to } => {
                assert!((from - 1.0980).abs() < 1e-9);
                assert!((to - 1.1015).abs() < 1e-9);
            }
            other => panic!("expected Trailed, got {other:?}"),
        }

        let result = engine.step(&mut state, &flat(2, 1.1018)).unwrap();
        assert_eq!(result.event, TickEvent::Held);
    }

    #[test]
    fn test_small_body_filter() {
        // 3 pip body
        let signal = vec![bar(0, 1.1000, 1.1010, 1.0990, 1.1003)];
        let config = EngineConfig {
            min_signal_body_pips: 5.0,
            ..Default::default()
        };
        let engine = Engine::new(config, &signal).unwrap();
        let mut state = engine.initial_state();

        let result = engine.step(&mut state, &flat(0, 1.1)).unwrap();
        assert_eq!(result.event, TickEvent::Skipped(EntrySkip::SmallBody));
        assert!(state.positions.is_flat());
    }

    #[test]
    fn test_out_of_order_tick_is_fatal_and_leaves_state() {
        let signal = bullish_periods(1);
        let engine = Engine::new(EngineConfig::default(), &signal).unwrap();
        let mut state = engine.initial_state();

        engine.step(&mut state, &flat(5, 1.1)).unwrap();
        let before = state.clone();

        let err = engine.step(&mut state, &flat(5, 1.1)).unwrap_err();
        assert!(matches!(err, BacktestError::OutOfOrder { series: "1-minute", .. }));
        assert_eq!(state, before);

        assert!(engine.step(&mut state, &flat(4, 1.1)).is_err());
    }

    #[test]
    fn test_ruin_halts_further_ticks() {
        let signal = bullish_periods(2);
        // 1.35 risked over 200/lot = 0.00675 lots, rounded up to 0.01
        let config = EngineConfig {
            initial_balance: 1.5,
            risk_fraction: 0.9,
            pip_value_per_unit_size: Some(10.0),
            lot_decimals: Some(2),
            ..Default::default()
        };
        let engine = Engine::new(config, &signal).unwrap();
        let mut state = engine.initial_state();

        engine.step(&mut state, &flat(0, 1.1000)).unwrap();
        let result = engine
            .step(&mut state, &bar(1, 1.0990, 1.0990, 1.0970, 1.0975))
            .unwrap();

        let TickEvent::Closed(record) = result.event else {
            panic!("expected Closed");
        };
        assert!((record.profit + 2.0).abs() < 1e-6);
        assert!(state.is_ruined());
        assert!(state.stats.balance <= 0.0);

        let result = engine.step(&mut state, &flat(30, 1.1000)).unwrap();
        assert_eq!(result.event, TickEvent::Halted);
        assert_eq!(state.ticks_processed, 2);
        assert_eq!(state.stats.trades, 1);
    }

    #[test]
    fn test_halted_state_ignores_ticks() {
        let signal = bullish_periods(1);
        let engine = Engine::new(EngineConfig::default(), &signal).unwrap();
        let mut state = engine.initial_state();
        state.status = RunStatus::Ruined;

        let result = engine.step(&mut state, &flat(0, 1.1)).unwrap();
        assert_eq!(result.event, TickEvent::Halted);
        assert_eq!(state.ticks_processed, 0);
    }

    #[test]
    fn test_rollover_clears_block() {
        let signal = bullish_periods(2);
        let config = EngineConfig {
            loss_streak_block_threshold: 1,
            ..Default::default()
        };
        let engine = Engine::new(config, &signal).unwrap();
        let mut state = engine.initial_state();

        engine.step(&mut state, &flat(0, 1.1000)).unwrap();
        engine
            .step(&mut state, &bar(1, 1.0985, 1.0985, 1.0975, 1.0978))
            .unwrap();
        assert!(state.guard.is_blocked());
        assert_eq!(state.stats.blocked_periods, 1);

        let result = engine.step(&mut state, &flat(2, 1.0978)).unwrap();
        assert_eq!(result.event, TickEvent::Skipped(EntrySkip::Blocked));

        let result = engine.step(&mut state, &flat(30, 1.0978)).unwrap();
        assert!(result.rolled_over);
        assert!(!state.guard.is_blocked());
        assert_eq!(state.guard.consecutive_losses(), 0);
        assert!(matches!(result.event, TickEvent::Opened { .. }));
    }

    #[test]
    fn test_ensure_increasing() {
        assert!(ensure_increasing("x", &[]).is_ok());
        assert!(ensure_increasing("x", &[flat(0, 1.0), flat(1, 1.0)]).is_ok());
        assert!(ensure_increasing("x", &[flat(0, 1.0), flat(0, 1.0)]).is_err());
    }
}
