//! Exchange-side processor: the authoritative book and the fill engine.
//!
//! Consumes market events at their exchange timestamps, rests strategy
//! orders in per-price queues, advances queue positions, and emits
//! acknowledgements and fills back over the bus delayed by the response
//! latency.
//!
//! Executions never mutate the depth: the ladders replay recorded reality,
//! and a simulated fill must not make the stream diverge from its own
//! future updates.

use std::collections::{BTreeMap, HashMap};

use smallvec::SmallVec;
use tracing::{debug, warn};

use crate::bus::OrderBus;
use crate::config::{BacktestConfig, FillMode};
use crate::consts::EPSILON;
use crate::depth::MarketDepth;
use crate::errors::Error;
use crate::infra::logging::targets;
use crate::latency::LatencyModel;
use crate::queue::QueueModel;
use crate::types::{
    price_to_tick, Event, EventKind, Order, OrderId, OrderStatus, Request, Side, TimeInForce,
};

/// Resting order ids at one price, in arrival (time-priority) order.
type LevelOrders = SmallVec<[OrderId; 4]>;

/// The simulated exchange.
pub struct ExchangeProcessor<Q, L> {
    depth: MarketDepth,
    orders: HashMap<OrderId, Order>,
    bid_levels: BTreeMap<i64, LevelOrders>,
    ask_levels: BTreeMap<i64, LevelOrders>,
    queue: Q,
    latency: L,
    tick_size: f64,
    fill_mode: FillMode,
}

impl<Q: QueueModel, L: LatencyModel> ExchangeProcessor<Q, L> {
    pub fn new(config: &BacktestConfig, queue: Q, latency: L) -> Self {
        Self {
            depth: MarketDepth::new(),
            orders: HashMap::new(),
            bid_levels: BTreeMap::new(),
            ask_levels: BTreeMap::new(),
            queue,
            latency,
            tick_size: config.tick_size,
            fill_mode: config.fill_mode,
        }
    }

    pub fn depth(&self) -> &MarketDepth {
        &self.depth
    }

    pub fn order(&self, id: OrderId) -> Option<&Order> {
        self.orders.get(&id)
    }

    /// Consume one market event at its exchange timestamp.
    pub fn process_event(
        &mut self,
        ev: &Event,
        to_local: &mut OrderBus<Order>,
    ) -> Result<(), Error> {
        self.latency.on_feed(ev.exch_ts, ev.local_ts);
        match ev.kind {
            EventKind::Depth => self.on_depth(ev, to_local),
            EventKind::Trade => self.on_trade(ev, to_local),
            EventKind::DepthClear => {
                let bound = if ev.px == 0.0 {
                    None
                } else {
                    Some(price_to_tick(ev.px, self.tick_size))
                };
                self.depth.clear(ev.side, bound);
                self.reseed_side(ev.side);
                Ok(())
            }
            EventKind::DepthSnapshot => self.on_snapshot_level(ev),
        }
    }

    /// Consume one request arriving over the local→exchange bus.
    pub fn process_request(
        &mut self,
        req: Request,
        ts: i64,
        to_local: &mut OrderBus<Order>,
    ) -> Result<(), Error> {
        match req {
            Request::New(order) => self.on_new_order(order, ts, to_local),
            Request::Cancel(id) => {
                self.on_cancel(id, ts, to_local);
                Ok(())
            }
        }
    }

    fn on_depth(&mut self, ev: &Event, to_local: &mut OrderBus<Order>) -> Result<(), Error> {
        let Some(side) = ev.side else {
            warn!(target: targets::EXCHANGE, ?ev, "depth event without side, skipping");
            return Ok(());
        };
        let tick = price_to_tick(ev.px, self.tick_size);
        match side {
            Side::Buy => {
                let prev = self.depth.update_bid(tick, ev.qty);
                self.run_depth_hooks(Side::Buy, tick, prev, ev.qty);
                if ev.qty >= EPSILON {
                    // The market is bidding here: resting asks at or below
                    // this price have been traded through.
                    self.fill_crossed(Side::Sell, tick, ev.exch_ts, to_local);
                }
            }
            Side::Sell => {
                let prev = self.depth.update_ask(tick, ev.qty);
                self.run_depth_hooks(Side::Sell, tick, prev, ev.qty);
                if ev.qty >= EPSILON {
                    self.fill_crossed(Side::Buy, tick, ev.exch_ts, to_local);
                }
            }
        }
        Ok(())
    }

    fn on_trade(&mut self, ev: &Event, to_local: &mut OrderBus<Order>) -> Result<(), Error> {
        let Some(aggressor) = ev.side else {
            warn!(target: targets::EXCHANGE, ?ev, "trade event without side, skipping");
            return Ok(());
        };
        let tick = price_to_tick(ev.px, self.tick_size);
        match aggressor {
            // An aggressive sell hits resting buys. Buys above the print
            // were traded through; buys at the print advance in queue.
            Side::Sell => {
                self.fill_crossed(Side::Buy, tick + 1, ev.exch_ts, to_local);
                self.match_at_price(Side::Buy, tick, ev.qty, ev.exch_ts, to_local);
            }
            Side::Buy => {
                self.fill_crossed(Side::Sell, tick - 1, ev.exch_ts, to_local);
                self.match_at_price(Side::Sell, tick, ev.qty, ev.exch_ts, to_local);
            }
        }
        Ok(())
    }

    fn on_snapshot_level(&mut self, ev: &Event) -> Result<(), Error> {
        let Some(side) = ev.side else {
            warn!(target: targets::EXCHANGE, ?ev, "snapshot level without side, skipping");
            return Ok(());
        };
        let tick = price_to_tick(ev.px, self.tick_size);
        self.depth.apply_snapshot_level(side, tick, ev.qty)?;
        // The snapshot invalidates queue estimates at this level. Simulated
        // orders are invisible to the feed, so the whole snapshot quantity
        // counts as volume ahead.
        let ids = self.level_ids(side, tick);
        for id in ids {
            if let Some(o) = self.orders.get_mut(&id) {
                o.front_qty = ev.qty;
            }
        }
        Ok(())
    }

    fn on_new_order(
        &mut self,
        mut order: Order,
        ts: i64,
        to_local: &mut OrderBus<Order>,
    ) -> Result<(), Error> {
        order.exch_ts = ts;
        if let Some(existing) = self.orders.get(&order.id) {
            if existing.is_active() {
                warn!(target: targets::EXCHANGE, id = order.id, "order id already live, rejecting");
                order.status = OrderStatus::Expired;
                self.respond(&order, ts, to_local);
                return Ok(());
            }
        }

        let crossed = match order.side {
            Side::Buy => self
                .depth
                .best_ask_tick()
                .map_or(false, |a| order.price_tick >= a),
            Side::Sell => self
                .depth
                .best_bid_tick()
                .map_or(false, |b| order.price_tick <= b),
        };

        match order.tif {
            TimeInForce::Gtx if crossed => {
                // Post-only would take liquidity: reject via status.
                debug!(target: targets::EXCHANGE, id = order.id, "post-only order crossed, expiring");
                order.status = OrderStatus::Expired;
                self.respond(&order, ts, to_local);
            }
            TimeInForce::Fok => {
                if crossed && self.fok_fillable(&order) {
                    order.status = OrderStatus::New;
                    self.execute_taker(&mut order, ts, to_local)?;
                } else {
                    order.status = OrderStatus::Expired;
                    self.respond(&order, ts, to_local);
                }
            }
            TimeInForce::Ioc => {
                if crossed {
                    order.status = OrderStatus::New;
                    self.execute_taker(&mut order, ts, to_local)?;
                }
                if order.leaves_qty >= EPSILON {
                    order.status = OrderStatus::Expired;
                    order.exec_qty = 0.0;
                    self.respond(&order, ts, to_local);
                }
            }
            TimeInForce::Gtc | TimeInForce::Gtx => {
                order.status = OrderStatus::New;
                if crossed {
                    // Only GTC reaches here crossed.
                    self.execute_taker(&mut order, ts, to_local)?;
                }
                if order.leaves_qty >= EPSILON {
                    self.rest(&mut order);
                    if order.exec_qty == 0.0 {
                        self.respond(&order, ts, to_local);
                    }
                }
            }
        }
        self.orders.insert(order.id, order);
        Ok(())
    }

    fn on_cancel(&mut self, id: OrderId, ts: i64, to_local: &mut OrderBus<Order>) {
        let Some(mut order) = self.orders.remove(&id) else {
            warn!(target: targets::EXCHANGE, id, "cancel for unknown order, dropping");
            return;
        };
        if order.status == OrderStatus::New {
            self.remove_from_level(order.side, order.price_tick, id);
            order.status = OrderStatus::Canceled;
            order.exec_qty = 0.0;
            self.respond(&order, ts, to_local);
        } else {
            // Terminal in flight (e.g. filled before the cancel arrived):
            // answer with the current state, as a live venue would.
            let mut snap = order.clone();
            snap.exec_qty = 0.0;
            self.respond(&snap, ts, to_local);
        }
        self.orders.insert(id, order);
    }

    /// Total opposite-side quantity at prices crossing the limit. FOK
    /// fillability is judged against the whole crossing ladder, not just
    /// the touch.
    fn fok_fillable(&self, order: &Order) -> bool {
        let avail: f64 = match order.side {
            Side::Buy => self
                .depth
                .asks_at_or_below(order.price_tick)
                .map(|(_, q)| q)
                .sum(),
            Side::Sell => self
                .depth
                .bids_at_or_above(order.price_tick)
                .map(|(_, q)| q)
                .sum(),
        };
        avail + EPSILON >= order.qty
    }

    /// Execute a crossing order as taker against the standing ladder.
    fn execute_taker(
        &mut self,
        order: &mut Order,
        ts: i64,
        to_local: &mut OrderBus<Order>,
    ) -> Result<(), Error> {
        match self.fill_mode {
            FillMode::NoPartialFill => {
                let best = match order.side {
                    Side::Buy => self.depth.best_ask_tick(),
                    Side::Sell => self.depth.best_bid_tick(),
                };
                // The caller only gets here when the order crosses.
                let Some(best) = best else { return Ok(()) };
                order.exec_price_tick = best;
                order.exec_qty = order.leaves_qty;
                order.leaves_qty = 0.0;
                order.maker = false;
                order.status = OrderStatus::Filled;
                debug!(
                    target: targets::FILLS,
                    id = order.id,
                    price_tick = best,
                    qty = order.exec_qty,
                    "taker fill"
                );
                self.respond(order, ts, to_local);
            }
            FillMode::PartialFill => {
                let levels: Vec<(i64, f64)> = match order.side {
                    Side::Buy => self.depth.asks_at_or_below(order.price_tick).collect(),
                    Side::Sell => self.depth.bids_at_or_above(order.price_tick).collect(),
                };
                for (tick, level_qty) in levels {
                    if order.leaves_qty < EPSILON {
                        break;
                    }
                    let exec = order.leaves_qty.min(level_qty);
                    order.exec_price_tick = tick;
                    order.exec_qty = exec;
                    order.leaves_qty -= exec;
                    order.maker = false;
                    if order.leaves_qty < EPSILON {
                        order.leaves_qty = 0.0;
                        order.status = OrderStatus::Filled;
                    }
                    debug!(
                        target: targets::FILLS,
                        id = order.id,
                        price_tick = tick,
                        qty = exec,
                        "taker fill"
                    );
                    self.respond(order, ts, to_local);
                }
            }
        }
        Ok(())
    }

    /// Rest an order in its price-level queue and seed its queue position.
    fn rest(&mut self, order: &mut Order) {
        match order.side {
            Side::Buy => self
                .bid_levels
                .entry(order.price_tick)
                .or_default()
                .push(order.id),
            Side::Sell => self
                .ask_levels
                .entry(order.price_tick)
                .or_default()
                .push(order.id),
        }
        self.queue.new_order(order, &self.depth);
        debug!(
            target: targets::EXCHANGE,
            id = order.id,
            price_tick = order.price_tick,
            front = order.front_qty,
            "order resting"
        );
    }

    /// Run queue-model depth hooks for resting orders at one price.
    fn run_depth_hooks(&mut self, side: Side, tick: i64, prev_qty: f64, new_qty: f64) {
        let ids = self.level_ids(side, tick);
        for id in ids {
            if let Some(o) = self.orders.get_mut(&id) {
                self.queue.depth(o, prev_qty, new_qty, &self.depth);
            }
        }
    }

    /// Fully fill resting orders whose level was traded or quoted through.
    ///
    /// `bound` is inclusive: sells priced at or below it (passive side
    /// `Sell`), buys priced at or above it (passive side `Buy`).
    fn fill_crossed(
        &mut self,
        passive: Side,
        bound: i64,
        ts: i64,
        to_local: &mut OrderBus<Order>,
    ) {
        let ticks: Vec<i64> = match passive {
            Side::Sell => self.ask_levels.range(..=bound).map(|(t, _)| *t).collect(),
            Side::Buy => self
                .bid_levels
                .range(bound..)
                .rev()
                .map(|(t, _)| *t)
                .collect(),
        };
        for tick in ticks {
            let ids = self.level_ids(passive, tick);
            for id in ids {
                let leaves = match self.orders.get(&id) {
                    Some(o) if o.status == OrderStatus::New => o.leaves_qty,
                    _ => continue,
                };
                self.fill_resting(id, tick, leaves, ts, to_local);
            }
        }
    }

    /// Advance queues and fill resting orders at the trade price.
    ///
    /// A print carries a finite supply, shared across all of the strategy's
    /// orders at the level in time priority: before an order can execute,
    /// the print pays for the visible queue ahead of it, and both that
    /// queue and the executed quantity draw the supply down. One print is
    /// never spent twice across own orders, in either fill mode.
    fn match_at_price(
        &mut self,
        passive: Side,
        tick: i64,
        trade_qty: f64,
        ts: i64,
        to_local: &mut OrderBus<Order>,
    ) {
        let ids = self.level_ids(passive, tick);
        let mut trade_left = trade_qty;
        for id in ids {
            let (fillable, front_before) = {
                let Some(o) = self.orders.get_mut(&id) else {
                    continue;
                };
                let front_before = o.front_qty.max(0.0);
                self.queue.trade(o, trade_qty, &self.depth);
                (self.queue.is_filled(o, &self.depth), front_before)
            };
            if !fillable {
                continue;
            }
            let leaves = match self.orders.get(&id) {
                Some(o) => o.leaves_qty,
                None => continue,
            };
            // Supply this print still has for this order once the queue
            // ahead of it is paid for.
            let avail = (trade_left - front_before).max(0.0);
            let exec = match self.fill_mode {
                FillMode::NoPartialFill => {
                    if avail >= EPSILON {
                        leaves
                    } else {
                        0.0
                    }
                }
                FillMode::PartialFill => leaves.min(avail),
            };
            if exec >= EPSILON {
                self.fill_resting(id, tick, exec, ts, to_local);
                trade_left = (trade_left - front_before - exec).max(0.0);
            } else if let Some(o) = self.orders.get_mut(&id) {
                // Queue worked off but no supply left in this print; the
                // order now stands at the front.
                o.front_qty = 0.0;
            }
        }
    }

    /// Execute a passive fill on a resting order and emit the response.
    fn fill_resting(
        &mut self,
        id: OrderId,
        exec_tick: i64,
        qty: f64,
        ts: i64,
        to_local: &mut OrderBus<Order>,
    ) {
        let Some(mut order) = self.orders.remove(&id) else {
            return;
        };
        order.exec_price_tick = exec_tick;
        order.exec_qty = qty;
        order.leaves_qty = (order.leaves_qty - qty).max(0.0);
        order.maker = true;
        order.front_qty = 0.0;
        if order.leaves_qty < EPSILON {
            order.leaves_qty = 0.0;
            order.status = OrderStatus::Filled;
            self.remove_from_level(order.side, order.price_tick, id);
        }
        debug!(
            target: targets::FILLS,
            id,
            price_tick = exec_tick,
            qty,
            leaves = order.leaves_qty,
            "maker fill"
        );
        self.respond(&order, ts, to_local);
        self.orders.insert(id, order);
    }

    /// Re-seed queue positions after a clear wiped one or both sides.
    fn reseed_side(&mut self, side: Option<Side>) {
        if side.is_none() || side == Some(Side::Buy) {
            for (tick, ids) in &self.bid_levels {
                let q = self.depth.bid_qty_at(*tick);
                for id in ids {
                    if let Some(o) = self.orders.get_mut(id) {
                        o.front_qty = q;
                    }
                }
            }
        }
        if side.is_none() || side == Some(Side::Sell) {
            for (tick, ids) in &self.ask_levels {
                let q = self.depth.ask_qty_at(*tick);
                for id in ids {
                    if let Some(o) = self.orders.get_mut(id) {
                        o.front_qty = q;
                    }
                }
            }
        }
    }

    fn level_ids(&self, side: Side, tick: i64) -> LevelOrders {
        let levels = match side {
            Side::Buy => &self.bid_levels,
            Side::Sell => &self.ask_levels,
        };
        levels.get(&tick).cloned().unwrap_or_default()
    }

    fn remove_from_level(&mut self, side: Side, tick: i64, id: OrderId) {
        let levels = match side {
            Side::Buy => &mut self.bid_levels,
            Side::Sell => &mut self.ask_levels,
        };
        if let Some(ids) = levels.get_mut(&tick) {
            ids.retain(|x| *x != id);
            if ids.is_empty() {
                levels.remove(&tick);
            }
        }
    }

    fn respond(&mut self, order: &Order, ts: i64, to_local: &mut OrderBus<Order>) {
        let snap = order.clone();
        let lat = self.latency.response(ts, order).max(0);
        to_local.append(snap, ts + lat);
    }
}
