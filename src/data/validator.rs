use crate::error::BacktestError;
use crate::models::Candle;
use crate::Result;

/// Validates OHLC candle data for sanity and correctness
pub struct CandleValidator;

impl CandleValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validate a candle for correctness
    pub fn validate(&self, candle: &Candle) -> Result<()> {
        self.validate_prices(candle)?;
        self.validate_ohlc_relationship(candle)?;
        Ok(())
    }

    /// Validate every candle, then require strictly increasing timestamps
    pub fn validate_series(&self, series: &'static str, candles: &[Candle]) -> Result<()> {
        for candle in candles {
            self.validate(candle)?;
        }
        crate::backtest::engine::ensure_increasing(series, candles)
    }

    /// Validate that all prices are finite and positive
    fn validate_prices(&self, candle: &Candle) -> Result<()> {
        for (name, price) in [
            ("open", candle.open),
            ("high", candle.high),
            ("low", candle.low),
            ("close", candle.close),
        ] {
            if !price.is_finite() || price <= 0.0 {
                return Err(invalid(candle, format!("Invalid {name} price: {price}")));
            }
        }
        Ok(())
    }

    /// Validate OHLC relationships (high >= low, etc.)
    fn validate_ohlc_relationship(&self, candle: &Candle) -> Result<()> {
        if candle.high < candle.low {
            return Err(invalid(
                candle,
                format!("High ({}) is less than low ({})", candle.high, candle.low),
            ));
        }

        if candle.high < candle.open.max(candle.close) {
            return Err(invalid(
                candle,
                format!(
                    "High ({}) is less than open/close ({}/{})",
                    candle.high, candle.open, candle.close
                ),
            ));
        }

        if candle.low > candle.open.min(candle.close) {
            return Err(invalid(
                candle,
                format!(
                    "Low ({}) is greater than open/close ({}/{})",
                    candle.low, candle.open, candle.close
                ),
            ));
        }

        Ok(())
    }
}

impl Default for CandleValidator {
    fn default() -> Self {
        Self::new()
    }
}

fn invalid(candle: &Candle, reason: String) -> BacktestError {
    BacktestError::InvalidCandle {
        time: candle.timestamp,
        reason,
    }
}
