//! Order representation and bus request messages.

use serde::{Deserialize, Serialize};

use crate::types::{OrderStatus, Side, TimeInForce};

/// Caller-assigned order identifier.
pub type OrderId = u64;

/// A simulated order.
///
/// The same struct travels the whole lifecycle: created by the strategy,
/// shipped to the exchange over the bus, rested and matched there, and
/// shipped back as an acknowledgement/fill snapshot. Prices are integer
/// ticks; quantities are f64 multiples of the lot size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub side: Side,
    /// Limit price in ticks.
    pub price_tick: i64,
    /// Original quantity.
    pub qty: f64,
    /// Remaining (unfilled) quantity. Frozen at cancellation/expiry.
    pub leaves_qty: f64,
    /// Quantity of the most recent execution carried by this snapshot.
    pub exec_qty: f64,
    /// Price tick of the most recent execution.
    pub exec_price_tick: i64,
    pub tif: TimeInForce,
    pub status: OrderStatus,
    /// Exchange timestamp at which the order was accepted.
    pub exch_ts: i64,
    /// Local timestamp at which the order was created.
    pub local_ts: i64,
    /// Estimated volume ahead of the order at its price level. Negative
    /// means trade volume has overshot the queue; the excess is supply
    /// available to fill the order.
    pub front_qty: f64,
    /// Whether the most recent execution was passive.
    pub maker: bool,
    /// Local-side flag: has the strategy observed the latest status?
    pub seen: bool,
}

impl Order {
    pub fn new(id: OrderId, side: Side, price_tick: i64, qty: f64, tif: TimeInForce) -> Self {
        Self {
            id,
            side,
            price_tick,
            qty,
            leaves_qty: qty,
            exec_qty: 0.0,
            exec_price_tick: 0,
            tif,
            status: OrderStatus::None,
            exch_ts: 0,
            local_ts: 0,
            front_qty: 0.0,
            maker: false,
            seen: false,
        }
    }

    /// Cumulative executed quantity.
    pub fn filled_qty(&self) -> f64 {
        self.qty - self.leaves_qty
    }

    /// True while the order can still execute or be canceled.
    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }
}

/// Request carried on the local→exchange bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Request {
    New(Order),
    Cancel(OrderId),
}
