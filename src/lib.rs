#![deny(unreachable_pub)]

//! Deterministic tick-level backtesting engine.
//!
//! Replays recorded L2 depth and trade events through two coupled
//! processors: the exchange side sees each event at its venue timestamp and
//! owns matching; the local side sees it at its receipt timestamp and owns
//! the strategy-visible mirror. Orders travel between them over a
//! latency-delayed bus, and resting orders fill according to a queue
//! position model. Given the same input stream and configuration, two runs
//! produce identical order histories and P&L.
//!
//! ```no_run
//! use hindcast::{Backtest, BacktestConfig, ConstantLatency, RiskAverseQueueModel};
//!
//! # fn main() -> Result<(), hindcast::Error> {
//! let events = Vec::new(); // loaded by the data layer
//! let config = BacktestConfig {
//!     tick_size: 0.1,
//!     lot_size: 1.0,
//!     ..Default::default()
//! };
//! let mut hbt = Backtest::new(events, config, RiskAverseQueueModel, ConstantLatency::new(0, 0))?;
//!
//! while hbt.elapse(100_000_000)? {
//!     if let (Some(bid), Some(ask)) = (hbt.depth().best_bid_tick(), hbt.depth().best_ask_tick()) {
//!         let _ = (bid, ask); // quote decisions go here
//!     }
//! }
//! println!("final position: {}", hbt.position());
//! # Ok(())
//! # }
//! ```

// Core modules
mod asset;
mod bus;
mod config;
mod consts;
mod depth;
mod errors;
mod kernel;
mod latency;
mod proc;
mod queue;
mod state;

// Shared utilities
pub mod infra;
pub mod types;

#[cfg(test)]
mod tests;

// Re-exports
pub use asset::AssetType;
pub use bus::OrderBus;
pub use config::{BacktestConfig, FillMode};
pub use consts::EPSILON;
pub use depth::MarketDepth;
pub use errors::Error;
pub use infra::logging::{init_logging, targets as log_targets, LogConfig, LogFormat};
pub use kernel::Backtest;
pub use latency::{
    ConstantLatency, FeedLatency, InterpolatedOrderLatency, LatencyModel, OrderLatencySample,
};
pub use proc::{ExchangeProcessor, LocalProcessor};
pub use queue::{
    LogProb, PowerProb, ProbQueueModel, QueueModel, QueueProb, RiskAverseQueueModel, SquareProb,
};
pub use state::State;
pub use types::{Event, EventKind, Order, OrderId, OrderStatus, Request, Side, TimeInForce};
