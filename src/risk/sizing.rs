use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::models::Direction;

/// Why an entry could not be sized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SizingRejection {
    NonPositiveStop,
    NonFiniteSize,
    NonPositiveSize,
}

impl std::fmt::Display for SizingRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NonPositiveStop => write!(f, "stop distance is not positive"),
            Self::NonFiniteSize => write!(f, "size is not finite"),
            Self::NonPositiveSize => write!(f, "size is not positive"),
        }
    }
}

/// Fixed-fractional position size: `balance * risk_fraction / stop_distance`
pub fn risk_size(
    balance: f64,
    risk_fraction: f64,
    stop_distance: f64,
) -> Result<f64, SizingRejection> {
    if !(stop_distance > 0.0) {
        return Err(SizingRejection::NonPositiveStop);
    }

    let risk_money = balance * risk_fraction;
    check_size(risk_money / stop_distance)
}

fn check_size(size: f64) -> Result<f64, SizingRejection> {
    if !size.is_finite() {
        return Err(SizingRejection::NonFiniteSize);
    }
    if size <= 0.0 {
        return Err(SizingRejection::NonPositiveSize);
    }
    Ok(size)
}

/// Unit in which position size is expressed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SizingMode {
    /// Size multiplies the raw price move
    PriceUnits,
    /// Size is a lot count; each pip is worth `pip_value` per lot
    Lots {
        pip_value: f64,
        lot_decimals: Option<u32>,
    },
}

/// Converts balance and stop distance into a position size, and price moves
/// back into money
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionSizer {
    risk_fraction: f64,
    pip_size: f64,
    mode: SizingMode,
}

impl PositionSizer {
    pub fn new(risk_fraction: f64, pip_size: f64, mode: SizingMode) -> Self {
        Self {
            risk_fraction,
            pip_size,
            mode,
        }
    }

    pub fn from_config(cfg: &EngineConfig) -> Self {
        let mode = match cfg.pip_value_per_unit_size {
            Some(pip_value) => SizingMode::Lots {
                pip_value,
                lot_decimals: cfg.lot_decimals,
            },
            None => SizingMode::PriceUnits,
        };
        Self::new(cfg.risk_fraction, cfg.pip_size, mode)
    }

    pub fn mode(&self) -> SizingMode {
        self.mode
    }

    /// Size a new position for a stop `stop_distance` price units away
    pub fn size(&self, balance: f64, stop_distance: f64) -> Result<f64, SizingRejection> {
        match self.mode {
            SizingMode::PriceUnits => risk_size(balance, self.risk_fraction, stop_distance),
            SizingMode::Lots {
                pip_value,
                lot_decimals,
            } => {
                // Money lost per lot if the stop is hit
                let stop_money_per_lot = stop_distance / self.pip_size * pip_value;
                let lots = risk_size(balance, self.risk_fraction, stop_money_per_lot)?;
                match lot_decimals {
                    Some(dp) => check_size(round_lots(lots, dp)?),
                    None => Ok(lots),
                }
            }
        }
    }

    /// Realized profit of a position closed at `exit_price`
    pub fn profit(&self, direction: Direction, entry_price: f64, exit_price: f64, size: f64) -> f64 {
        let price_move = (exit_price - entry_price) * direction.sign();
        match self.mode {
            SizingMode::PriceUnits => price_move * size,
            SizingMode::Lots { pip_value, .. } => price_move / self.pip_size * pip_value * size,
        }
    }
}

/// Round half to even at `dp` decimals, computed in exact decimal
fn round_lots(lots: f64, dp: u32) -> Result<f64, SizingRejection> {
    let exact = Decimal::from_f64(lots).ok_or(SizingRejection::NonFiniteSize)?;
    exact
        .round_dp_with_strategy(dp, RoundingStrategy::MidpointNearestEven)
        .to_f64()
        .ok_or(SizingRejection::NonFiniteSize)
}
