//! Local-side processor: the strategy's view of the world.
//!
//! Consumes market events at their receipt timestamps, validates and ships
//! strategy orders over the bus, and applies acknowledgements and fills as
//! they arrive back. Fills hit the account state here: the strategy's
//! balance moves when the strategy would have learned of the fill, not when
//! the exchange matched it.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::bus::OrderBus;
use crate::config::BacktestConfig;
use crate::depth::MarketDepth;
use crate::errors::Error;
use crate::infra::logging::targets;
use crate::latency::LatencyModel;
use crate::state::State;
use crate::types::{
    price_to_tick, Event, EventKind, Order, OrderId, Request, Side, TimeInForce,
};

/// Relative tolerance when checking tick/lot alignment.
const ALIGN_EPS: f64 = 1e-6;

/// The strategy-side processor.
pub struct LocalProcessor<L> {
    depth: MarketDepth,
    orders: HashMap<OrderId, Order>,
    state: State,
    latency: L,
    tick_size: f64,
    lot_size: f64,
    last_trades: Vec<Event>,
}

impl<L: LatencyModel> LocalProcessor<L> {
    pub fn new(config: &BacktestConfig, latency: L) -> Self {
        Self {
            depth: MarketDepth::new(),
            orders: HashMap::new(),
            state: State::new(
                config.asset_type,
                config.maker_fee,
                config.taker_fee,
                config.tick_size,
            ),
            latency,
            tick_size: config.tick_size,
            lot_size: config.lot_size,
            last_trades: Vec::new(),
        }
    }

    pub fn depth(&self) -> &MarketDepth {
        &self.depth
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn position(&self) -> f64 {
        self.state.position
    }

    pub fn balance(&self) -> f64 {
        self.state.balance
    }

    /// Trades observed since the last [`clear_last_trades`](Self::clear_last_trades).
    pub fn last_trades(&self) -> &[Event] {
        &self.last_trades
    }

    pub fn clear_last_trades(&mut self) {
        self.last_trades.clear();
    }

    /// Look up one mirrored order.
    pub fn order(&self, id: OrderId) -> Option<&Order> {
        self.orders.get(&id)
    }

    /// Snapshot of all mirrored orders, sorted by id. Marks every order as
    /// observed; the returned copies keep the pre-observation flag so the
    /// caller can tell which ones changed since the last look.
    pub fn orders(&mut self) -> Vec<Order> {
        let mut snapshot: Vec<Order> = self.orders.values().cloned().collect();
        snapshot.sort_by_key(|o| o.id);
        for o in self.orders.values_mut() {
            o.seen = true;
        }
        snapshot
    }

    /// Consume one market event at its local timestamp.
    pub fn process_event(&mut self, ev: &Event) -> Result<(), Error> {
        self.latency.on_feed(ev.exch_ts, ev.local_ts);
        match ev.kind {
            EventKind::Depth => {
                let Some(side) = ev.side else {
                    warn!(target: targets::LOCAL, ?ev, "depth event without side, skipping");
                    return Ok(());
                };
                let tick = price_to_tick(ev.px, self.tick_size);
                match side {
                    Side::Buy => {
                        self.depth.update_bid(tick, ev.qty);
                    }
                    Side::Sell => {
                        self.depth.update_ask(tick, ev.qty);
                    }
                }
                Ok(())
            }
            EventKind::Trade => {
                self.last_trades.push(*ev);
                Ok(())
            }
            EventKind::DepthClear => {
                let bound = if ev.px == 0.0 {
                    None
                } else {
                    Some(price_to_tick(ev.px, self.tick_size))
                };
                self.depth.clear(ev.side, bound);
                Ok(())
            }
            EventKind::DepthSnapshot => {
                let Some(side) = ev.side else {
                    warn!(target: targets::LOCAL, ?ev, "snapshot level without side, skipping");
                    return Ok(());
                };
                let tick = price_to_tick(ev.px, self.tick_size);
                self.depth.apply_snapshot_level(side, tick, ev.qty)?;
                Ok(())
            }
        }
    }

    /// Validate and ship a new order. Errors are synchronous; a valid order
    /// reaches the exchange after the entry latency.
    pub fn submit_order(
        &mut self,
        id: OrderId,
        side: Side,
        price: f64,
        qty: f64,
        tif: TimeInForce,
        ts: i64,
        to_exch: &mut OrderBus<Request>,
    ) -> Result<(), Error> {
        if !(qty > 0.0) || !qty.is_finite() {
            return Err(Error::InvalidInput(format!(
                "order qty must be positive, got {qty}"
            )));
        }
        if !(price > 0.0) || !price.is_finite() {
            return Err(Error::InvalidInput(format!(
                "order price must be positive, got {price}"
            )));
        }
        let lots = qty / self.lot_size;
        if (lots - lots.round()).abs() > ALIGN_EPS {
            return Err(Error::InvalidInput(format!(
                "qty {qty} is not a multiple of lot size {}",
                self.lot_size
            )));
        }
        let ticks = price / self.tick_size;
        if (ticks - ticks.round()).abs() > ALIGN_EPS {
            return Err(Error::InvalidInput(format!(
                "price {price} is not a multiple of tick size {}",
                self.tick_size
            )));
        }
        if let Some(existing) = self.orders.get(&id) {
            if existing.is_active() {
                return Err(Error::DuplicateOrderId(id));
            }
        }

        let mut order = Order::new(id, side, ticks.round() as i64, qty, tif);
        order.local_ts = ts;
        let lat = self.latency.entry(ts, &order).max(0);
        debug!(
            target: targets::LOCAL,
            id,
            ?side,
            price_tick = order.price_tick,
            qty,
            release = ts + lat,
            "order submitted"
        );
        self.orders.insert(id, order.clone());
        to_exch.append(Request::New(order), ts + lat);
        Ok(())
    }

    /// Ship a cancel for a live order.
    pub fn cancel_order(
        &mut self,
        id: OrderId,
        ts: i64,
        to_exch: &mut OrderBus<Request>,
    ) -> Result<(), Error> {
        let order = self.orders.get(&id).ok_or(Error::OrderNotFound(id))?;
        if !order.is_active() {
            return Err(Error::OrderNotFound(id));
        }
        let lat = self.latency.entry(ts, order).max(0);
        to_exch.append(Request::Cancel(id), ts + lat);
        Ok(())
    }

    /// Apply one response arriving over the exchange→local bus.
    pub fn process_response(&mut self, mut order: Order) -> Result<(), Error> {
        if order.exec_qty > 0.0 {
            self.state.apply_fill(&order)?;
            debug!(
                target: targets::FILLS,
                id = order.id,
                qty = order.exec_qty,
                price_tick = order.exec_price_tick,
                maker = order.maker,
                position = self.state.position,
                "fill applied"
            );
        }
        order.seen = false;
        self.orders.insert(order.id, order);
        Ok(())
    }
}
