use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::models::{Candle, Direction};
use crate::risk::{PositionSizer, SizingRejection};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    /// Stop hit at its initial level
    StopLoss,
    /// Stop hit after it had been trailed
    TrailingStop,
}

/// The single open trade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub direction: Direction,
    pub entry_price: f64,
    pub initial_stop: f64,
    pub stop_price: f64,
    pub size: f64,
    pub entry_time: DateTime<Utc>,
    /// Index of the signal period the trade was opened in
    pub period_index: usize,
    pub period_time: DateTime<Utc>,
}

impl Position {
    /// Favorable move from entry to the bar's best price, in price units
    pub fn favorable_excursion(&self, candle: &Candle) -> f64 {
        match self.direction {
            Direction::Long => candle.high - self.entry_price,
            Direction::Short => self.entry_price - candle.low,
        }
    }

    /// Whether the bar touched or crossed the stop
    pub fn stop_hit(&self, candle: &Candle) -> bool {
        match self.direction {
            Direction::Long => candle.low <= self.stop_price,
            Direction::Short => candle.high >= self.stop_price,
        }
    }

    pub fn is_trailed(&self) -> bool {
        self.stop_price != self.initial_stop
    }
}

/// Trailing stop parameters, in pips
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrailingRule {
    pub activation_pips: f64,
    pub lock_pips: f64,
    pub step_pips: f64,
    pub pip_size: f64,
}

impl TrailingRule {
    pub fn from_config(cfg: &EngineConfig) -> Self {
        Self {
            activation_pips: cfg.trail_activation_pips,
            lock_pips: cfg.trail_lock_pips,
            step_pips: cfg.trail_step_pips,
            pip_size: cfg.pip_size,
        }
    }

    /// Stop level this bar allows. Never looser than the current stop.
    pub fn tightened_stop(&self, position: &Position, candle: &Candle) -> f64 {
        let excursion_pips = position.favorable_excursion(candle) / self.pip_size;
        if excursion_pips < self.activation_pips {
            return position.stop_price;
        }

        let lock = self.lock_pips * self.pip_size;
        let step = self.step_pips * self.pip_size;

        match position.direction {
            Direction::Long => position
                .stop_price
                .max(position.entry_price + lock)
                .max(candle.high - step),
            Direction::Short => position
                .stop_price
                .min(position.entry_price - lock)
                .min(candle.low + step),
        }
    }
}

/// A position realized at its stop
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedPosition {
    pub position: Position,
    pub exit_price: f64,
    pub exit_time: DateTime<Utc>,
    pub profit: f64,
    pub reason: ExitReason,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OpenError {
    AlreadyOpen,
    Sizing(SizingRejection),
}

impl std::fmt::Display for OpenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyOpen => write!(f, "a position is already open"),
            Self::Sizing(reason) => write!(f, "sizing rejected: {reason}"),
        }
    }
}

/// Owns at most one open position and remembers the last traded period
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PositionManager {
    position: Option<Position>,
    traded_period: Option<usize>,
}

impl PositionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    pub fn is_flat(&self) -> bool {
        self.position.is_none()
    }

    /// Whether an entry has already been made in this signal period
    pub fn has_traded_period(&self, period_index: usize) -> bool {
        self.traded_period == Some(period_index)
    }

    /// Open a position at the close of `candle`
    ///
    /// The stop is placed `stop_distance` price units on the loss side and
    /// the size comes from `sizer`. A rejected size leaves the manager flat
    /// and the period untraded.
    pub fn open_position(
        &mut self,
        direction: Direction,
        candle: &Candle,
        stop_distance: f64,
        balance: f64,
        sizer: &PositionSizer,
        period_index: usize,
        period_time: DateTime<Utc>,
    ) -> Result<&Position, OpenError> {
        if self.position.is_some() {
            return Err(OpenError::AlreadyOpen);
        }

        let entry_price = candle.close;
        let stop_price = entry_price - direction.sign() * stop_distance;
        let risk = (entry_price - stop_price) * direction.sign();
        let size = sizer.size(balance, risk).map_err(OpenError::Sizing)?;

        self.traded_period = Some(period_index);
        Ok(&*self.position.insert(Position {
            direction,
            entry_price,
            initial_stop: stop_price,
            stop_price,
            size,
            entry_time: candle.timestamp,
            period_index,
            period_time,
        }))
    }

    /// Ratchet the stop for this bar. Returns `(old, new)` when it moved.
    pub fn update_trailing_stop(
        &mut self,
        candle: &Candle,
        rule: &TrailingRule,
    ) -> Option<(f64, f64)> {
        let position = self.position.as_mut()?;
        let old = position.stop_price;
        let new = rule.tightened_stop(position, candle);

        if new == old {
            return None;
        }
        position.stop_price = new;
        Some((old, new))
    }

    /// Close the position if this bar reached its stop. Fills at the stop.
    pub fn check_exit(&mut self, candle: &Candle, sizer: &PositionSizer) -> Option<ClosedPosition> {
        if !self.position.as_ref()?.stop_hit(candle) {
            return None;
        }

        let position = self.position.take()?;
        let exit_price = position.stop_price;
        let profit = sizer.profit(
            position.direction,
            position.entry_price,
            exit_price,
            position.size,
        );
        let reason = if position.is_trailed() {
            ExitReason::TrailingStop
        } else {
            ExitReason::StopLoss
        };

        Some(ClosedPosition {
            position,
            exit_price,
            exit_time: candle.timestamp,
            profit,
            reason,
        })
    }
}
