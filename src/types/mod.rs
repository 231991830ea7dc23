//! Shared data types: sides, time-in-force, order status, events, orders.

mod events;
mod orders;

pub use events::*;
pub use orders::*;

use serde::{Deserialize, Serialize};

/// Side of an order or the aggressor side of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Signed direction: +1 for buy, -1 for sell.
    pub fn sign(&self) -> f64 {
        match self {
            Side::Buy => 1.0,
            Side::Sell => -1.0,
        }
    }

    /// The opposite side.
    pub fn flip(&self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

/// Time-in-force of a limit order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeInForce {
    /// Good till canceled. Rests in the book; crossing quantity executes
    /// immediately as taker.
    Gtc,
    /// Post-only. Expires instead of crossing.
    Gtx,
    /// Fill or kill. Fills entirely as taker or expires entirely.
    Fok,
    /// Immediate or cancel. Fills what it can as taker, remainder expires.
    Ioc,
}

/// Order lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Created locally, not yet acknowledged by the exchange.
    None,
    /// Resting at the exchange.
    New,
    /// Rejected (post-only cross) or unfilled remainder of FOK/IOC.
    Expired,
    /// Fully executed.
    Filled,
    /// Canceled by request.
    Canceled,
}

impl OrderStatus {
    /// Terminal statuses never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Expired | OrderStatus::Filled | OrderStatus::Canceled
        )
    }
}

/// Convert a price to its integer tick index.
pub fn price_to_tick(price: f64, tick_size: f64) -> i64 {
    (price / tick_size).round() as i64
}
