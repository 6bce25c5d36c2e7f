use crate::models::Candle;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Market scenario types for synthetic data generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketScenario {
    /// Steady uptrend with noise (~+60 pips per day)
    Uptrend,
    /// Steady downtrend with noise (~-60 pips per day)
    Downtrend,
    /// Mean-reverting chop around the base price
    Sideways,
    /// Large random swings
    Volatile,
    /// Calm first half, then a one-way collapse
    Crash,
    /// Random walk with missing minutes (weekend-style holes)
    WithGaps,
}

impl MarketScenario {
    pub const ALL: [MarketScenario; 6] = [
        MarketScenario::Uptrend,
        MarketScenario::Downtrend,
        MarketScenario::Sideways,
        MarketScenario::Volatile,
        MarketScenario::Crash,
        MarketScenario::WithGaps,
    ];

    pub fn name(self) -> &'static str {
        match self {
            MarketScenario::Uptrend => "uptrend",
            MarketScenario::Downtrend => "downtrend",
            MarketScenario::Sideways => "sideways",
            MarketScenario::Volatile => "volatile",
            MarketScenario::Crash => "crash",
            MarketScenario::WithGaps => "gaps",
        }
    }
}

impl std::str::FromStr for MarketScenario {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MarketScenario::ALL
            .into_iter()
            .find(|scenario| scenario.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown scenario '{s}'"))
    }
}

/// Generates synthetic 1-minute FX candles for backtesting
pub struct SyntheticDataGenerator {
    rng: StdRng,
    base_price: f64,
    pip: f64,
    start_time: DateTime<Utc>,
}

impl SyntheticDataGenerator {
    /// Create a new generator with a seed for reproducibility
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            base_price: 1.1000,
            pip: 0.0001,
            // Fixed epoch keeps output independent of the wall clock
            start_time: Utc.timestamp_opt(1_199_232_000, 0).single().unwrap_or_default(),
        }
    }

    pub fn base_price(&self) -> f64 {
        self.base_price
    }

    /// Generate `num_candles` consecutive 1-minute candles
    pub fn generate(&mut self, scenario: MarketScenario, num_candles: usize) -> Vec<Candle> {
        match scenario {
            MarketScenario::Uptrend => self.generate_trend(num_candles, 0.04),
            MarketScenario::Downtrend => self.generate_trend(num_candles, -0.04),
            MarketScenario::Sideways => self.generate_sideways(num_candles),
            MarketScenario::Volatile => self.generate_volatile(num_candles),
            MarketScenario::Crash => self.generate_crash(num_candles),
            MarketScenario::WithGaps => self.generate_with_gaps(num_candles),
        }
    }

    /// Drift in pips per minute plus noise
    fn generate_trend(&mut self, num_candles: usize, drift_pips: f64) -> Vec<Candle> {
        let mut candles = Vec::with_capacity(num_candles);
        let mut price = self.base_price;

        for i in 0..num_candles {
            let noise = self.rng.gen_range(-0.6..0.6);
            let next = price + (drift_pips + noise) * self.pip;
            candles.push(self.create_candle(self.minute(i), price, next));
            price = next;
        }

        candles
    }

    fn generate_sideways(&mut self, num_candles: usize) -> Vec<Candle> {
        let mut candles = Vec::with_capacity(num_candles);
        let mut price = self.base_price;

        for i in 0..num_candles {
            // 5% pull to mean + noise
            let reversion = (self.base_price - price) * 0.05;
            let noise = self.rng.gen_range(-1.5..1.5) * self.pip;
            let next = price + reversion + noise;
            candles.push(self.create_candle(self.minute(i), price, next));
            price = next;
        }

        candles
    }

    fn generate_volatile(&mut self, num_candles: usize) -> Vec<Candle> {
        let mut candles = Vec::with_capacity(num_candles);
        let mut price = self.base_price;
        let floor = self.base_price * 0.5;

        for i in 0..num_candles {
            let change = self.rng.gen_range(-8.0..8.0) * self.pip;
            let next = (price + change).max(floor);
            candles.push(self.create_candle(self.minute(i), price, next));
            price = next;
        }

        candles
    }

    fn generate_crash(&mut self, num_candles: usize) -> Vec<Candle> {
        let mut candles = Vec::with_capacity(num_candles);
        let mut price = self.base_price;
        let half = num_candles / 2;

        for i in 0..num_candles {
            let step = if i < half {
                self.rng.gen_range(-1.0..1.0)
            } else {
                // -3 pips a minute with noise
                -3.0 + self.rng.gen_range(-1.0..1.0)
            };
            let next = (price + step * self.pip).max(self.pip);
            candles.push(self.create_candle(self.minute(i), price, next));
            price = next;
        }

        candles
    }

    /// Skips 10 minutes after every 200th candle
    fn generate_with_gaps(&mut self, num_candles: usize) -> Vec<Candle> {
        let mut candles = Vec::with_capacity(num_candles);
        let mut price = self.base_price;
        let mut offset = 0;

        for i in 0..num_candles {
            if i > 0 && i % 200 == 0 {
                offset += 10;
            }
            let next = price + self.rng.gen_range(-1.5..1.5) * self.pip;
            candles.push(self.create_candle(self.minute(i + offset), price, next));
            price = next;
        }

        candles
    }

    fn minute(&self, index: usize) -> DateTime<Utc> {
        self.start_time + Duration::minutes(index as i64)
    }

    /// Build a bar from open to close with up to 2 pips of wick either side
    fn create_candle(&mut self, timestamp: DateTime<Utc>, open: f64, close: f64) -> Candle {
        let high = open.max(close) + self.rng.gen_range(0.0..2.0) * self.pip;
        let low = open.min(close) - self.rng.gen_range(0.0..2.0) * self.pip;

        Candle::new(timestamp, open, high, low.max(self.pip / 2.0), close)
    }
}
