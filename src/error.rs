use chrono::{DateTime, Utc};
use thiserror::Error;

/// Structural failures surfaced to the caller.
///
/// Recoverable per-tick conditions (sizing rejections, blocked entries, no
/// signal period yet) are not errors; they are reported through
/// [`crate::backtest::TickEvent`]. Ruin is a run status, not an error.
#[derive(Error, Debug)]
pub enum BacktestError {
    #[error("Invalid configuration: {key}: {reason}")]
    InvalidConfig { key: &'static str, reason: String },

    #[error("Empty {0} series")]
    EmptySeries(&'static str),

    #[error(
        "{series} series out of order at index {index}: {current} does not follow {previous}"
    )]
    OutOfOrder {
        series: &'static str,
        index: usize,
        previous: DateTime<Utc>,
        current: DateTime<Utc>,
    },

    #[error("Invalid candle at {time}: {reason}")]
    InvalidCandle { time: DateTime<Utc>, reason: String },

    #[error("Failed to parse row {row}: {reason}")]
    Parse { row: usize, reason: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config source error: {0}")]
    ConfigSource(#[from] config::ConfigError),
}

impl BacktestError {
    pub(crate) fn invalid_config(key: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            key,
            reason: reason.into(),
        }
    }
}
