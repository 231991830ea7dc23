//! Backtest configuration.

use serde::{Deserialize, Serialize};

use crate::asset::AssetType;
use crate::errors::Error;

/// How the simulated exchange sizes executions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillMode {
    /// A fillable order executes its full remaining quantity; taker
    /// executions fill entirely at the best opposite price. Optimistic but
    /// cheap and often adequate for small order sizes.
    #[default]
    NoPartialFill,
    /// Taker executions walk the ladder level by level; maker fills are
    /// capped by the residual trade quantity.
    PartialFill,
}

/// Static parameters of a backtest run.
///
/// Queue and latency models are chosen at compile time and passed to the
/// kernel directly; everything value-like lives here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestConfig {
    /// Price quantum. All prices are normalized to integer multiples.
    #[serde(default = "default_tick_size")]
    pub tick_size: f64,
    /// Quantity quantum.
    #[serde(default = "default_lot_size")]
    pub lot_size: f64,
    #[serde(default = "default_asset_type")]
    pub asset_type: AssetType,
    /// Fee rate on passive fills. Negative means rebate.
    #[serde(default)]
    pub maker_fee: f64,
    /// Fee rate on aggressive fills.
    #[serde(default)]
    pub taker_fee: f64,
    #[serde(default)]
    pub fill_mode: FillMode,
    /// Simulation clock at the start of the run. Defaults to the earliest
    /// timestamp in the event stream.
    #[serde(default)]
    pub start_ts: Option<i64>,
}

fn default_tick_size() -> f64 {
    0.01
}

fn default_lot_size() -> f64 {
    1.0
}

fn default_asset_type() -> AssetType {
    AssetType::Linear
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            tick_size: default_tick_size(),
            lot_size: default_lot_size(),
            asset_type: default_asset_type(),
            maker_fee: 0.0,
            taker_fee: 0.0,
            fill_mode: FillMode::default(),
            start_ts: None,
        }
    }
}

impl BacktestConfig {
    pub fn validate(&self) -> Result<(), Error> {
        if !(self.tick_size > 0.0) || !self.tick_size.is_finite() {
            return Err(Error::InvalidInput(format!(
                "tick_size must be positive, got {}",
                self.tick_size
            )));
        }
        if !(self.lot_size > 0.0) || !self.lot_size.is_finite() {
            return Err(Error::InvalidInput(format!(
                "lot_size must be positive, got {}",
                self.lot_size
            )));
        }
        Ok(())
    }
}
