// Core modules
pub mod backtest;
pub mod config;
pub mod data;
pub mod error;
pub mod execution;
pub mod models;
pub mod risk;

// Re-export commonly used types
pub use backtest::{BacktestReport, BacktestRunner, Engine, RunStatus, TickEvent, TradeRecord};
pub use config::{load_config, EngineConfig};
pub use error::BacktestError;
pub use models::*;

// Error handling
pub type Result<T> = std::result::Result<T, BacktestError>;
