pub mod converter;
pub mod export;
pub mod loader;
pub mod validator;

use std::path::Path;

use crate::error::BacktestError;
use crate::models::Candle;
use crate::Result;

pub use converter::CandleAggregator;
pub use export::{report_json, write_candles, write_trade_log};
pub use loader::{load_candles_csv, read_candles};
pub use validator::CandleValidator;

/// Execution and signal series ready for the engine
#[derive(Debug, Clone, PartialEq)]
pub struct MarketHistory {
    pub minute: Vec<Candle>,
    pub signal: Vec<Candle>,
}

/// Statistics from loading a history
#[derive(Debug, Clone, PartialEq)]
pub struct LoadStats {
    pub minute_rows: usize,
    pub signal_rows: usize,
    /// True if the signal series was built from the minute series
    pub signal_aggregated: bool,
}

impl MarketHistory {
    /// Validate `minute` and derive the signal series from it
    pub fn from_minutes(minute: Vec<Candle>, aggregator: &CandleAggregator) -> Result<Self> {
        if minute.is_empty() {
            return Err(BacktestError::EmptySeries("1-minute"));
        }
        CandleValidator::new().validate_series("1-minute", &minute)?;

        let signal = aggregator.aggregate(&minute);
        Ok(Self { minute, signal })
    }
}

/// Load the 1-minute file and either load or aggregate the signal series
pub fn load_history(
    minute_path: &Path,
    signal_path: Option<&Path>,
    aggregator: &CandleAggregator,
) -> Result<(MarketHistory, LoadStats)> {
    tracing::info!("Loading 1-minute candles from {}", minute_path.display());
    let minute = load_candles_csv(minute_path)?;

    let (history, signal_aggregated) = match signal_path {
        Some(path) => {
            if minute.is_empty() {
                return Err(BacktestError::EmptySeries("1-minute"));
            }
            let validator = CandleValidator::new();
            validator.validate_series("1-minute", &minute)?;

            tracing::info!("Loading signal candles from {}", path.display());
            let signal = load_candles_csv(path)?;
            validator.validate_series("signal", &signal)?;
            (MarketHistory { minute, signal }, false)
        }
        None => (MarketHistory::from_minutes(minute, aggregator)?, true),
    };

    let stats = LoadStats {
        minute_rows: history.minute.len(),
        signal_rows: history.signal.len(),
        signal_aggregated,
    };

    tracing::info!(
        "Loaded {} minute candles, {} signal candles{}",
        stats.minute_rows,
        stats.signal_rows,
        if signal_aggregated { " (aggregated)" } else { "" }
    );

    Ok((history, stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(dir: &tempfile::TempDir, name: &str, body: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "time,open,high,low,close").unwrap();
        write!(file, "{body}").unwrap();
        path
    }

    #[test]
    fn test_load_history_aggregates_signal() {
        let dir = tempfile::tempdir().unwrap();
        let m1 = write_csv(
            &dir,
            "m1.csv",
            "2008-01-02 09:00,1.1000,1.1002,1.0999,1.1001\n\
             2008-01-02 09:29,1.1001,1.1010,1.1000,1.1008\n\
             2008-01-02 09:30,1.1008,1.1009,1.1001,1.1002\n",
        );

        let (history, stats) = load_history(&m1, None, &CandleAggregator::default()).unwrap();

        assert_eq!(stats.minute_rows, 3);
        assert_eq!(stats.signal_rows, 2);
        assert!(stats.signal_aggregated);
        assert_eq!(history.signal[0].high, 1.1010);
        assert_eq!(history.signal[0].close, 1.1008);
    }

    #[test]
    fn test_load_history_with_signal_file() {
        let dir = tempfile::tempdir().unwrap();
        let m1 = write_csv(&dir, "m1.csv", "2008-01-02 09:00,1.1,1.1,1.1,1.1\n");
        let m30 = write_csv(&dir, "m30.csv", "2008-01-02 09:00,1.1,1.2,1.0,1.15\n");

        let (history, stats) =
            load_history(&m1, Some(m30.as_path()), &CandleAggregator::default()).unwrap();

        assert!(!stats.signal_aggregated);
        assert_eq!(history.signal[0].close, 1.15);
    }

    #[test]
    fn test_load_history_rejects_duplicate_minutes() {
        let dir = tempfile::tempdir().unwrap();
        let m1 = write_csv(
            &dir,
            "m1.csv",
            "2008-01-02 09:00,1.1,1.1,1.1,1.1\n2008-01-02 09:00,1.1,1.1,1.1,1.1\n",
        );

        let err = load_history(&m1, None, &CandleAggregator::default()).unwrap_err();
        assert!(matches!(err, BacktestError::OutOfOrder { series: "1-minute", .. }));
    }

    #[test]
    fn test_load_history_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let m1 = write_csv(&dir, "m1.csv", "");

        let err = load_history(&m1, None, &CandleAggregator::default()).unwrap_err();
        assert!(matches!(err, BacktestError::EmptySeries("1-minute")));
    }

    #[test]
    fn test_load_history_invalid_candle() {
        let dir = tempfile::tempdir().unwrap();
        let m1 = write_csv(&dir, "m1.csv", "2008-01-02 09:00,1.1,1.0,1.2,1.1\n");

        let err = load_history(&m1, None, &CandleAggregator::default()).unwrap_err();
        assert!(matches!(err, BacktestError::InvalidCandle { .. }));
    }
}
