use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// OHLC candlestick for a single bar
///
/// Used for both the 1-minute execution stream and the 30-minute signal
/// stream. Invariant: `low <= min(open, close)` and `high >= max(open, close)`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Candle {
    pub fn new(timestamp: DateTime<Utc>, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
        }
    }

    /// Absolute body size in price units
    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }
}

/// Trade direction
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// Direction implied by a signal candle.
    ///
    /// Only a strictly rising candle is long; a doji (`close == open`) is
    /// classified as short.
    pub fn from_signal(candle: &Candle) -> Self {
        if candle.close > candle.open {
            Direction::Long
        } else {
            Direction::Short
        }
    }

    /// +1.0 for long, -1.0 for short
    pub fn sign(self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Long => write!(f, "LONG"),
            Direction::Short => write!(f, "SHORT"),
        }
    }
}
