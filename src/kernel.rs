//! The simulation kernel: time advancement and stream merging.
//!
//! One logical clock drives everything. The strategy blocks in
//! [`Backtest::elapse`]; inside, the kernel repeatedly dispatches the
//! earliest pending action among the exchange's next event, the local
//! side's next event, and the heads of the two bus directions. Each market
//! event is dispatched twice, once per processor, at that processor's own
//! timestamp for it.
//!
//! Equal timestamps resolve in a fixed order: exchange event, then
//! local→exchange traffic, then local event, then exchange→local traffic.
//! The exchange acts on market reality before servicing client orders that
//! may depend on it, and the local side refreshes its view before observing
//! acknowledgements of actions taken on a stale view. The same input stream
//! therefore always produces the same order history.

use tracing::{debug, info};

use crate::bus::OrderBus;
use crate::config::BacktestConfig;
use crate::depth::MarketDepth;
use crate::errors::Error;
use crate::infra::logging::targets;
use crate::latency::LatencyModel;
use crate::proc::{ExchangeProcessor, LocalProcessor};
use crate::queue::QueueModel;
use crate::state::State;
use crate::types::{Event, Order, OrderId, Request, Side, TimeInForce};

/// What the merge loop dispatches next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    ExchEvent,
    ExchRequest,
    LocalEvent,
    LocalResponse,
}

/// A single-instrument backtest run.
pub struct Backtest<Q, L> {
    events: Vec<Event>,
    exch_row: usize,
    local_row: usize,
    cur_ts: i64,
    tick_size: f64,
    exch: ExchangeProcessor<Q, L>,
    local: LocalProcessor<L>,
    to_exch: OrderBus<Request>,
    to_local: OrderBus<Order>,
}

impl<Q: QueueModel, L: LatencyModel + Clone> Backtest<Q, L> {
    /// Build a run over `events`, which must be ordered so that each
    /// processor's view of its own timestamp column is non-decreasing.
    ///
    /// The latency model is cloned per processor so that feed-driven
    /// variants track the feed each side actually sees.
    pub fn new(
        events: Vec<Event>,
        config: BacktestConfig,
        queue: Q,
        latency: L,
    ) -> Result<Self, Error> {
        config.validate()?;
        let cur_ts = config.start_ts.unwrap_or_else(|| {
            events
                .first()
                .map(|e| e.exch_ts.min(e.local_ts))
                .unwrap_or(0)
        });
        info!(
            target: targets::KERNEL,
            events = events.len(),
            start_ts = cur_ts,
            tick_size = config.tick_size,
            fill_mode = ?config.fill_mode,
            "backtest initialized"
        );
        Ok(Self {
            exch: ExchangeProcessor::new(&config, queue, latency.clone()),
            local: LocalProcessor::new(&config, latency),
            events,
            exch_row: 0,
            local_row: 0,
            cur_ts,
            tick_size: config.tick_size,
            to_exch: OrderBus::new(),
            to_local: OrderBus::new(),
        })
    }

    /// Advance the clock by `duration` nanoseconds, draining all work due
    /// in the window. Returns `Ok(false)` once the event stream is
    /// exhausted; bus traffic still drains on the way out.
    pub fn elapse(&mut self, duration: i64) -> Result<bool, Error> {
        let target = self.cur_ts.saturating_add(duration.max(0));
        loop {
            let candidates = [
                (
                    self.events.get(self.exch_row).map(|e| e.exch_ts),
                    Action::ExchEvent,
                ),
                (self.to_exch.frontier(), Action::ExchRequest),
                (
                    self.events.get(self.local_row).map(|e| e.local_ts),
                    Action::LocalEvent,
                ),
                (self.to_local.frontier(), Action::LocalResponse),
            ];
            // First entry wins ties: candidate order encodes the priority.
            let mut next: Option<(i64, Action)> = None;
            for (ts, action) in candidates {
                if let Some(ts) = ts {
                    match next {
                        Some((best, _)) if ts >= best => {}
                        _ => next = Some((ts, action)),
                    }
                }
            }
            let Some((ts, action)) = next else { break };
            if ts > target {
                break;
            }
            match action {
                Action::ExchEvent => {
                    let ev = self.events[self.exch_row];
                    self.exch_row += 1;
                    self.exch.process_event(&ev, &mut self.to_local)?;
                }
                Action::ExchRequest => {
                    if let Some((release_ts, req)) = self.to_exch.pop(ts) {
                        self.exch
                            .process_request(req, release_ts, &mut self.to_local)?;
                    }
                }
                Action::LocalEvent => {
                    let ev = self.events[self.local_row];
                    self.local_row += 1;
                    self.local.process_event(&ev)?;
                }
                Action::LocalResponse => {
                    if let Some((_, order)) = self.to_local.pop(ts) {
                        self.local.process_response(order)?;
                    }
                }
            }
        }
        self.cur_ts = target;
        let more = self.exch_row < self.events.len() || self.local_row < self.events.len();
        if !more {
            debug!(target: targets::KERNEL, ts = self.cur_ts, "event stream exhausted");
        }
        Ok(more)
    }

    pub fn current_timestamp(&self) -> i64 {
        self.cur_ts
    }

    pub fn submit_buy_order(
        &mut self,
        id: OrderId,
        price: f64,
        qty: f64,
        tif: TimeInForce,
    ) -> Result<(), Error> {
        self.local
            .submit_order(id, Side::Buy, price, qty, tif, self.cur_ts, &mut self.to_exch)
    }

    pub fn submit_sell_order(
        &mut self,
        id: OrderId,
        price: f64,
        qty: f64,
        tif: TimeInForce,
    ) -> Result<(), Error> {
        self.local
            .submit_order(id, Side::Sell, price, qty, tif, self.cur_ts, &mut self.to_exch)
    }

    pub fn cancel(&mut self, id: OrderId) -> Result<(), Error> {
        self.local.cancel_order(id, self.cur_ts, &mut self.to_exch)
    }

    pub fn position(&self) -> f64 {
        self.local.position()
    }

    pub fn balance(&self) -> f64 {
        self.local.balance()
    }

    pub fn state(&self) -> &State {
        self.local.state()
    }

    /// Equity marked at the local book's mid, when one exists.
    pub fn equity(&self) -> Option<f64> {
        self.local
            .depth()
            .mid_price(self.tick_size)
            .map(|mid| self.local.state().equity(mid))
    }

    /// The strategy-visible book.
    pub fn depth(&self) -> &MarketDepth {
        self.local.depth()
    }

    /// Snapshot of all orders, sorted by id; marks them observed.
    pub fn orders(&mut self) -> Vec<Order> {
        self.local.orders()
    }

    /// One mirrored order.
    pub fn order(&self, id: OrderId) -> Option<&Order> {
        self.local.order(id)
    }

    /// Trades observed locally since the last clear.
    pub fn last_trades(&self) -> &[Event] {
        self.local.last_trades()
    }

    pub fn clear_last_trades(&mut self) {
        self.local.clear_last_trades();
    }

    /// Exchange-side internals, for tests and diagnostics.
    pub(crate) fn exchange(&self) -> &ExchangeProcessor<Q, L> {
        &self.exch
    }
}
