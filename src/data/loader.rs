use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::error::BacktestError;
use crate::models::Candle;
use crate::Result;

/// Naive layouts tried after RFC 3339, all read as UTC
const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y.%m.%d %H:%M",
    "%Y%m%d %H%M%S",
];

/// Column positions resolved from the header row
struct Columns {
    time: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
}

impl Columns {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self> {
        let find = |names: &[&str]| {
            headers
                .iter()
                .position(|h| names.iter().any(|n| h.trim().eq_ignore_ascii_case(n)))
                .ok_or_else(|| BacktestError::Parse {
                    row: 0,
                    reason: format!("missing '{}' column", names[0]),
                })
        };

        Ok(Self {
            time: find(&["time", "timestamp"])?,
            open: find(&["open"])?,
            high: find(&["high"])?,
            low: find(&["low"])?,
            close: find(&["close"])?,
        })
    }
}

/// Load candles from a CSV file
pub fn load_candles_csv(path: &Path) -> Result<Vec<Candle>> {
    let file = File::open(path)?;
    let candles = read_candles(file)?;
    tracing::debug!("Loaded {} candles from {}", candles.len(), path.display());
    Ok(candles)
}

/// Read candles from any CSV source with a header row
///
/// Rows are stably sorted by time. Duplicate timestamps are kept.
pub fn read_candles<R: Read>(source: R) -> Result<Vec<Candle>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(source);
    let columns = Columns::from_headers(reader.headers()?)?;

    let mut candles = Vec::new();
    for (i, result) in reader.records().enumerate() {
        // 1-based, counting the header as row 1
        let row = i + 2;
        let record = result?;
        candles.push(parse_record(&record, &columns, row)?);
    }

    candles.sort_by_key(|c| c.timestamp);
    Ok(candles)
}

fn parse_record(record: &csv::StringRecord, columns: &Columns, row: usize) -> Result<Candle> {
    let field = |index: usize, name: &str| {
        record.get(index).ok_or_else(|| BacktestError::Parse {
            row,
            reason: format!("missing {name} field"),
        })
    };
    let price = |index: usize, name: &str| -> Result<f64> {
        let raw = field(index, name)?;
        raw.parse::<f64>().map_err(|e| BacktestError::Parse {
            row,
            reason: format!("bad {name} '{raw}': {e}"),
        })
    };

    let raw_time = field(columns.time, "time")?;
    let timestamp = parse_time(raw_time).ok_or_else(|| BacktestError::Parse {
        row,
        reason: format!("unrecognised time '{raw_time}'"),
    })?;

    Ok(Candle::new(
        timestamp,
        price(columns.open, "open")?,
        price(columns.high, "high")?,
        price(columns.low, "low")?,
        price(columns.close, "close")?,
    ))
}

pub fn parse_time(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Some(t.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}
