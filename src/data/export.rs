use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::backtest::{BacktestReport, TradeRecord};
use crate::models::Candle;
use crate::Result;

/// Write one CSV row per closed trade
pub fn write_trade_log(path: &Path, trades: &[TradeRecord]) -> Result<()> {
    write_rows(File::create(path)?, trades)?;
    tracing::info!("Wrote {} trades to {}", trades.len(), path.display());
    Ok(())
}

/// Write candles in the same layout the loader reads
pub fn write_candles(path: &Path, candles: &[Candle]) -> Result<()> {
    write_rows(File::create(path)?, candles)?;
    tracing::info!("Wrote {} candles to {}", candles.len(), path.display());
    Ok(())
}

pub fn write_rows<W: Write, T: Serialize>(sink: W, rows: &[T]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(sink);
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Pretty-printed JSON of the whole report
pub fn report_json(report: &BacktestReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}
