pub mod engine;
pub mod metrics;
pub mod runner;
pub mod sync;
pub mod synthetic;

pub use engine::{Engine, EntrySkip, SimulationState, StepResult, TickEvent};
pub use metrics::{AccountStats, BacktestReport, RunStatistics, RunStatus, TradeRecord};
pub use runner::BacktestRunner;
pub use sync::{Advance, PeriodClock};
pub use synthetic::{MarketScenario, SyntheticDataGenerator};
