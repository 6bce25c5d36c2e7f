use chrono::{DateTime, Utc};

use crate::models::Candle;

/// Result of moving the clock to a new 1-minute timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Advance {
    /// Active signal period, `None` until the first period has started
    pub period: Option<usize>,
    /// True if the active period changed on this call
    pub rolled_over: bool,
}

/// Pointer into the signal (30-minute) series
///
/// Tracks the latest period whose start is not after the current 1-minute
/// timestamp. The pointer only moves forward; once past the last period it
/// stays pinned there.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeriodClock {
    index: Option<usize>,
}

impl PeriodClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn period(&self) -> Option<usize> {
        self.index
    }

    /// Move to `now`. Timestamps must be supplied in non-decreasing order.
    ///
    /// Several periods may be skipped in one call (gaps in the minute data);
    /// that still counts as a single rollover.
    pub fn advance(&mut self, now: DateTime<Utc>, periods: &[Candle]) -> Advance {
        let mut next = self.index.map_or(0, |i| i + 1);
        let mut rolled_over = false;

        while next < periods.len() && periods[next].timestamp <= now {
            self.index = Some(next);
            next += 1;
            rolled_over = true;
        }

        Advance {
            period: self.index,
            rolled_over,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t(minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2008, 1, 2, 9, 0, 0).unwrap() + Duration::minutes(minute)
    }

    fn periods(count: i64) -> Vec<Candle> {
        (0..count)
            .map(|i| Candle::new(t(i * 30), 1.1, 1.1, 1.1, 1.1))
            .collect()
    }

    #[test]
    fn test_no_period_before_first_start() {
        let series = periods(3);
        let mut clock = PeriodClock::new();

        let adv = clock.advance(t(-5), &series);
        assert_eq!(adv.period, None);
        assert!(!adv.rolled_over);
    }

    #[test]
    fn test_first_period_counts_as_rollover() {
        let series = periods(3);
        let mut clock = PeriodClock::new();

        let adv = clock.advance(t(0), &series);
        assert_eq!(adv.period, Some(0));
        assert!(adv.rolled_over);

        let adv = clock.advance(t(1), &series);
        assert_eq!(adv.period, Some(0));
        assert!(!adv.rolled_over);
    }

    #[test]
    fn test_rolls_over_on_boundary() {
        let series = periods(3);
        let mut clock = PeriodClock::new();
        clock.advance(t(0), &series);

        assert!(!clock.advance(t(29), &series).rolled_over);

        let adv = clock.advance(t(30), &series);
        assert_eq!(adv.period, Some(1));
        assert!(adv.rolled_over);
    }

    #[test]
    fn test_gap_skips_periods_with_single_rollover() {
        let series = periods(4);
        let mut clock = PeriodClock::new();
        clock.advance(t(0), &series);

        let adv = clock.advance(t(95), &series);
        assert_eq!(adv.period, Some(3));
        assert!(adv.rolled_over);
    }

    #[test]
    fn test_pins_at_last_period() {
        let series = periods(2);
        let mut clock = PeriodClock::new();
        clock.advance(t(31), &series);

        let adv = clock.advance(t(500), &series);
        assert_eq!(adv.period, Some(1));
        assert!(!adv.rolled_over);
    }

    #[test]
    fn test_empty_series_never_has_period() {
        let mut clock = PeriodClock::new();
        let adv = clock.advance(t(0), &[]);
        assert_eq!(adv.period, None);
        assert!(!adv.rolled_over);
    }
}
