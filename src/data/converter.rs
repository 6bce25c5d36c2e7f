use chrono::{DateTime, Duration};
use std::collections::BTreeMap;

use crate::models::Candle;

const SIGNAL_INTERVAL_MINUTES: i64 = 30;

/// Resamples ordered candles into fixed-width, epoch-aligned buckets
///
/// open = first open, high = max high, low = min low, close = last close.
/// Buckets with no input candles are dropped, not filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandleAggregator {
    interval_secs: i64,
}

impl CandleAggregator {
    /// Bucket width is clamped to at least one second
    pub fn new(interval: Duration) -> Self {
        Self {
            interval_secs: interval.num_seconds().max(1),
        }
    }

    pub fn interval_secs(&self) -> i64 {
        self.interval_secs
    }

    /// Aggregate `candles`, which must already be in time order
    pub fn aggregate(&self, candles: &[Candle]) -> Vec<Candle> {
        let mut buckets: BTreeMap<i64, Candle> = BTreeMap::new();

        for candle in candles {
            let bucket = self.bucket_start(candle);
            buckets
                .entry(bucket)
                .and_modify(|agg| {
                    agg.high = agg.high.max(candle.high);
                    agg.low = agg.low.min(candle.low);
                    agg.close = candle.close;
                })
                .or_insert_with(|| Candle {
                    timestamp: DateTime::from_timestamp(bucket, 0).unwrap_or(candle.timestamp),
                    ..*candle
                });
        }

        buckets.into_values().collect()
    }

    fn bucket_start(&self, candle: &Candle) -> i64 {
        candle.timestamp.timestamp().div_euclid(self.interval_secs) * self.interval_secs
    }
}

impl Default for CandleAggregator {
    fn default() -> Self {
        Self::new(Duration::minutes(SIGNAL_INTERVAL_MINUTES))
    }
}
