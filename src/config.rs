use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::BacktestError;

/// Environment variable prefix, e.g. `FXBOT_RISK_FRACTION=0.02`
pub const ENV_PREFIX: &str = "FXBOT";

/// Strategy and account parameters for a simulation run
///
/// Stop and trailing distances are expressed in pips and converted to price
/// units with `pip_size`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub initial_balance: f64,
    /// Fraction of balance risked per trade (0 < x < 1)
    pub risk_fraction: f64,
    pub stop_distance_pips: f64,
    /// Favorable excursion needed before the stop starts trailing
    pub trail_activation_pips: f64,
    /// Profit locked in once trailing is active
    pub trail_lock_pips: f64,
    /// Distance kept between the bar extreme and the trailed stop
    pub trail_step_pips: f64,
    /// Consecutive losses within one period that halt entries until rollover
    pub loss_streak_block_threshold: u32,
    pub pip_size: f64,
    /// Money per pip per lot. When set, sizes are lot counts.
    pub pip_value_per_unit_size: Option<f64>,
    /// Round lot counts to this many decimals (lot mode only)
    pub lot_decimals: Option<u32>,
    /// Skip entries when the signal candle body is smaller than this
    pub min_signal_body_pips: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            initial_balance: 100.0,
            risk_fraction: 0.015,
            stop_distance_pips: 20.0,
            trail_activation_pips: 15.0,
            trail_lock_pips: 5.0,
            trail_step_pips: 5.0,
            loss_streak_block_threshold: 2,
            pip_size: 0.0001,
            pip_value_per_unit_size: None,
            lot_decimals: None,
            min_signal_body_pips: 0.0,
        }
    }
}

impl EngineConfig {
    /// Check every parameter against its allowed range
    pub fn validate(&self) -> Result<(), BacktestError> {
        positive("initial_balance", self.initial_balance)?;
        positive("stop_distance_pips", self.stop_distance_pips)?;
        positive("pip_size", self.pip_size)?;
        non_negative("trail_activation_pips", self.trail_activation_pips)?;
        non_negative("trail_lock_pips", self.trail_lock_pips)?;
        non_negative("trail_step_pips", self.trail_step_pips)?;
        non_negative("min_signal_body_pips", self.min_signal_body_pips)?;

        if !(self.risk_fraction > 0.0 && self.risk_fraction < 1.0) {
            return Err(BacktestError::invalid_config(
                "risk_fraction",
                format!("must be in (0, 1), got {}", self.risk_fraction),
            ));
        }

        if self.loss_streak_block_threshold < 1 {
            return Err(BacktestError::invalid_config(
                "loss_streak_block_threshold",
                "must be at least 1",
            ));
        }

        if let Some(pip_value) = self.pip_value_per_unit_size {
            positive("pip_value_per_unit_size", pip_value)?;
        }

        if self.lot_decimals.is_some() && self.pip_value_per_unit_size.is_none() {
            return Err(BacktestError::invalid_config(
                "lot_decimals",
                "only applies when pip_value_per_unit_size is set",
            ));
        }

        Ok(())
    }

    /// Initial stop distance in price units
    pub fn stop_distance(&self) -> f64 {
        self.stop_distance_pips * self.pip_size
    }

    pub fn pips_to_price(&self, pips: f64) -> f64 {
        pips * self.pip_size
    }
}

fn positive(key: &'static str, value: f64) -> Result<(), BacktestError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(BacktestError::invalid_config(
            key,
            format!("must be positive, got {value}"),
        ))
    }
}

fn non_negative(key: &'static str, value: f64) -> Result<(), BacktestError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(BacktestError::invalid_config(
            key,
            format!("must be non-negative, got {value}"),
        ))
    }
}

/// Load engine configuration
///
/// Layers, lowest priority first: built-in defaults, the optional config
/// file (format picked from its extension), then `FXBOT_*` environment
/// variables. The result is validated before it is returned.
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig, BacktestError> {
    let mut builder =
        config::Config::builder().add_source(config::Config::try_from(&EngineConfig::default())?);

    if let Some(path) = path {
        tracing::debug!("Loading config file {}", path.display());
        builder = builder.add_source(config::File::from(path));
    }

    let settings = builder
        .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
        .build()?;

    let cfg: EngineConfig = settings.try_deserialize()?;
    cfg.validate()?;
    Ok(cfg)
}
