//! Queue-position models for resting orders.
//!
//! A simulated order never appears in the recorded feed, so its place in
//! the price-level queue must be estimated. Every model tracks the volume
//! ahead of the order (`Order::front_qty`, seeded at arrival). Trades at
//! the order's price consume the queue; what happens on pure depth changes
//! distinguishes the models.
//!
//! An order becomes fillable only once the volume ahead has gone strictly
//! below zero: the overshoot is trade volume that arrived after the order
//! reached the front, i.e. supply available to execute against it. A trade
//! that exactly zeroes the queue leaves the order first in line but
//! unfilled.

use crate::depth::MarketDepth;
use crate::types::Order;

/// Estimates where a resting order sits within its price level.
pub trait QueueModel {
    /// Seed the position of a newly resting order.
    fn new_order(&self, order: &mut Order, depth: &MarketDepth);

    /// A trade printed at the order's price for `qty`.
    fn trade(&self, order: &mut Order, qty: f64, depth: &MarketDepth);

    /// The quantity at the order's level changed from `prev_qty` to
    /// `new_qty` without a trade.
    fn depth(&self, order: &mut Order, prev_qty: f64, new_qty: f64, depth: &MarketDepth);

    /// Whether the order has worked through the queue.
    fn is_filled(&self, order: &Order, depth: &MarketDepth) -> bool;
}

/// Conservative model: only trade volume advances the queue.
///
/// Depth decreases are assumed to be cancellations behind the order, except
/// that the volume ahead can never exceed the level quantity.
#[derive(Debug, Clone, Copy, Default)]
pub struct RiskAverseQueueModel;

impl QueueModel for RiskAverseQueueModel {
    fn new_order(&self, order: &mut Order, depth: &MarketDepth) {
        order.front_qty = depth.qty_at(order.side, order.price_tick);
    }

    fn trade(&self, order: &mut Order, qty: f64, _depth: &MarketDepth) {
        order.front_qty -= qty;
    }

    fn depth(&self, order: &mut Order, _prev_qty: f64, new_qty: f64, _depth: &MarketDepth) {
        order.front_qty = order.front_qty.min(new_qty);
    }

    fn is_filled(&self, order: &Order, _depth: &MarketDepth) -> bool {
        order.front_qty < 0.0
    }
}

/// Splits an unexplained level decrease between cancellations ahead of and
/// behind the order.
///
/// Returns the fraction attributed ahead, in [0, 1].
pub trait QueueProb {
    fn prob(&self, front: f64, back: f64) -> f64;
}

/// `ln(1+front) / (ln(1+front) + ln(1+back))`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProb;

impl QueueProb for LogProb {
    fn prob(&self, front: f64, back: f64) -> f64 {
        let f = (1.0 + front).ln();
        let b = (1.0 + back).ln();
        if f + b <= 0.0 {
            return 0.0;
        }
        f / (f + b)
    }
}

/// `front^2 / (front^2 + back^2)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SquareProb;

impl QueueProb for SquareProb {
    fn prob(&self, front: f64, back: f64) -> f64 {
        let f = front * front;
        let b = back * back;
        if f + b <= 0.0 {
            return 0.0;
        }
        f / (f + b)
    }
}

/// `front^n / (front^n + back^n)`.
#[derive(Debug, Clone, Copy)]
pub struct PowerProb {
    n: f64,
}

impl PowerProb {
    pub fn new(n: f64) -> Self {
        Self { n }
    }
}

impl QueueProb for PowerProb {
    fn prob(&self, front: f64, back: f64) -> f64 {
        let f = front.powf(self.n);
        let b = back.powf(self.n);
        if f + b <= 0.0 {
            return 0.0;
        }
        f / (f + b)
    }
}

/// Probabilistic model: trades consume the full queue ahead; unexplained
/// depth decreases advance the order by the weighted share attributed to
/// cancellations ahead of it.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProbQueueModel<P> {
    prob: P,
}

impl<P: QueueProb> ProbQueueModel<P> {
    pub fn new(prob: P) -> Self {
        Self { prob }
    }
}

impl<P: QueueProb> QueueModel for ProbQueueModel<P> {
    fn new_order(&self, order: &mut Order, depth: &MarketDepth) {
        order.front_qty = depth.qty_at(order.side, order.price_tick);
    }

    fn trade(&self, order: &mut Order, qty: f64, _depth: &MarketDepth) {
        order.front_qty -= qty;
    }

    fn depth(&self, order: &mut Order, prev_qty: f64, new_qty: f64, _depth: &MarketDepth) {
        if new_qty >= prev_qty {
            // Depth grew behind us.
            return;
        }
        let chg = prev_qty - new_qty;
        let front = order.front_qty.max(0.0);
        let back = (prev_qty - front).max(0.0);
        let f = self.prob.prob(front, back).clamp(0.0, 1.0);
        order.front_qty = (front - f * chg).clamp(0.0, new_qty);
    }

    fn is_filled(&self, order: &Order, _depth: &MarketDepth) -> bool {
        order.front_qty < 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Side, TimeInForce};

    fn resting_buy(depth: &MarketDepth, qty: f64) -> Order {
        let mut o = Order::new(1, Side::Buy, 1000, qty, TimeInForce::Gtc);
        o.front_qty = depth.qty_at(Side::Buy, 1000);
        o
    }

    fn book(bid_qty: f64) -> MarketDepth {
        let mut d = MarketDepth::new();
        d.update_bid(1000, bid_qty);
        d.update_ask(1001, 5.0);
        d
    }

    #[test]
    fn test_risk_averse_seeds_from_level() {
        let d = book(10.0);
        let model = RiskAverseQueueModel;
        let mut o = Order::new(1, Side::Buy, 1000, 1.0, TimeInForce::Gtc);
        model.new_order(&mut o, &d);
        assert_eq!(o.front_qty, 10.0);
    }

    #[test]
    fn test_risk_averse_only_trades_advance() {
        let d = book(10.0);
        let model = RiskAverseQueueModel;
        let mut o = resting_buy(&d, 1.0);

        // Cancellation-driven shrink from 10 to 8: clamp only.
        model.depth(&mut o, 10.0, 8.0, &d);
        assert_eq!(o.front_qty, 8.0);

        // Growth does not move us back.
        model.depth(&mut o, 8.0, 12.0, &d);
        assert_eq!(o.front_qty, 8.0);

        model.trade(&mut o, 8.0, &d);
        assert_eq!(o.front_qty, 0.0);
        assert!(!model.is_filled(&o, &d));

        model.trade(&mut o, 0.5, &d);
        assert!(model.is_filled(&o, &d));
    }

    #[test]
    fn test_prob_depth_decrease_advances_partially() {
        let d = book(10.0);
        let model = ProbQueueModel::new(SquareProb);
        let mut o = resting_buy(&d, 1.0);
        o.front_qty = 5.0;

        // Level shrinks 10 -> 8 with front 5, back 5: square weights give
        // f = 0.5, so position improves by 1.
        model.depth(&mut o, 10.0, 8.0, &d);
        assert!((o.front_qty - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_prob_depth_increase_no_change() {
        let d = book(10.0);
        let model = ProbQueueModel::new(SquareProb);
        let mut o = resting_buy(&d, 1.0);
        o.front_qty = 5.0;
        model.depth(&mut o, 10.0, 14.0, &d);
        assert_eq!(o.front_qty, 5.0);
    }

    #[test]
    fn test_prob_front_of_queue_unaffected_by_cancels() {
        let d = book(10.0);
        let model = ProbQueueModel::new(LogProb);
        let mut o = resting_buy(&d, 1.0);
        o.front_qty = 0.0;
        // Nothing ahead: f = 0, cancels are all behind us.
        model.depth(&mut o, 10.0, 4.0, &d);
        assert_eq!(o.front_qty, 0.0);
    }

    #[test]
    fn test_prob_trade_consumes_full_qty() {
        let d = book(10.0);
        let model = ProbQueueModel::new(SquareProb);
        let mut o = resting_buy(&d, 1.0);
        assert_eq!(o.front_qty, 10.0);
        model.trade(&mut o, 10.0, &d);
        assert_eq!(o.front_qty, 0.0);
        assert!(!model.is_filled(&o, &d));
        // Any further trade tips it over.
        model.trade(&mut o, 0.1, &d);
        assert!(model.is_filled(&o, &d));
    }

    #[test]
    fn test_prob_weight_functions_bounded() {
        for &(front, back) in &[(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (3.0, 7.0), (1e9, 1.0)] {
            for p in [
                LogProb.prob(front, back),
                SquareProb.prob(front, back),
                PowerProb::new(3.0).prob(front, back),
            ] {
                assert!((0.0..=1.0).contains(&p), "p={p} for ({front}, {back})");
            }
        }
    }

    #[test]
    fn test_power_matches_square_at_two() {
        let p2 = PowerProb::new(2.0);
        let s = SquareProb;
        assert!((p2.prob(3.0, 7.0) - s.prob(3.0, 7.0)).abs() < 1e-12);
    }
}
