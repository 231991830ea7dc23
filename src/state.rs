//! Account state: position, balance, fees, trade counters.

use serde::{Deserialize, Serialize};

use crate::asset::AssetType;
use crate::errors::Error;
use crate::types::Order;

/// Strategy account state, updated as fill acknowledgements arrive at the
/// local processor.
///
/// Balance accounting is `balance -= side_sign * amount - (-fee)`: the asset
/// type's signed amount makes the same formula correct for linear and
/// inverse contracts, and negative fee rates (rebates) credit the balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct State {
    pub position: f64,
    pub balance: f64,
    /// Cumulative fees paid (negative when rebates dominate).
    pub fee: f64,
    /// Number of executions.
    pub trade_num: u64,
    /// Cumulative executed quantity.
    pub trade_qty: f64,
    /// Cumulative absolute cash turnover.
    pub trade_amount: f64,
    asset_type: AssetType,
    maker_fee: f64,
    taker_fee: f64,
    tick_size: f64,
}

impl State {
    pub fn new(asset_type: AssetType, maker_fee: f64, taker_fee: f64, tick_size: f64) -> Self {
        Self {
            position: 0.0,
            balance: 0.0,
            fee: 0.0,
            trade_num: 0,
            trade_qty: 0.0,
            trade_amount: 0.0,
            asset_type,
            maker_fee,
            taker_fee,
            tick_size,
        }
    }

    /// Apply the execution carried by an order snapshot.
    ///
    /// Position moves first, then balance by the signed amount, then the
    /// fee from the fee basis. The fee never feeds back into the P&L
    /// conversion itself.
    pub fn apply_fill(&mut self, order: &Order) -> Result<(), Error> {
        let price = order.exec_price_tick as f64 * self.tick_size;
        let qty = order.exec_qty;
        let sign = order.side.sign();

        self.position += sign * qty;

        let amount = self.asset_type.amount(price, qty)?;
        self.balance -= sign * amount;

        let rate = if order.maker {
            self.maker_fee
        } else {
            self.taker_fee
        };
        let fee = rate * self.asset_type.fee_basis(price, qty)?;
        self.balance -= fee;
        self.fee += fee;

        self.trade_num += 1;
        self.trade_qty += qty;
        self.trade_amount += amount.abs();
        Ok(())
    }

    /// Account equity at the given mid price.
    pub fn equity(&self, mid: f64) -> f64 {
        self.asset_type
            .equity(mid, self.balance, self.position, self.fee)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{OrderStatus, Side, TimeInForce};

    fn filled(side: Side, price_tick: i64, qty: f64, maker: bool) -> Order {
        let mut o = Order::new(1, side, price_tick, qty, TimeInForce::Gtc);
        o.exec_price_tick = price_tick;
        o.exec_qty = qty;
        o.maker = maker;
        o.leaves_qty = 0.0;
        o.status = OrderStatus::Filled;
        o
    }

    #[test]
    fn test_linear_buy_moves_position_and_balance() {
        let mut s = State::new(AssetType::Linear, 0.0, 0.0, 0.1);
        s.apply_fill(&filled(Side::Buy, 1000, 1.0, true)).unwrap();
        assert!((s.position - 1.0).abs() < 1e-12);
        assert!((s.balance + 100.0).abs() < 1e-12);
        assert_eq!(s.trade_num, 1);
    }

    #[test]
    fn test_maker_rebate_credits_balance() {
        // -1 bps maker fee on a 100.0 notional fill.
        let mut s = State::new(AssetType::Linear, -0.0001, 0.0005, 0.1);
        s.apply_fill(&filled(Side::Buy, 1000, 1.0, true)).unwrap();
        assert!((s.fee + 0.01).abs() < 1e-12);
        assert!((s.balance + (100.0 - 0.01)).abs() < 1e-12);
    }

    #[test]
    fn test_taker_fee_charged() {
        let mut s = State::new(AssetType::Linear, -0.0001, 0.0005, 0.1);
        s.apply_fill(&filled(Side::Sell, 1000, 2.0, false)).unwrap();
        // Sell 2 @ 100.0: +200 less 5 bps of 200.
        assert!((s.balance - (200.0 - 0.1)).abs() < 1e-12);
        assert!((s.fee - 0.1).abs() < 1e-12);
        assert!((s.position + 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_inverse_round_trip() {
        let mut s = State::new(AssetType::Inverse, 0.0, 0.0, 1.0);
        s.apply_fill(&filled(Side::Buy, 50_000, 100.0, true)).unwrap();
        s.apply_fill(&filled(Side::Sell, 55_000, 100.0, true)).unwrap();
        let expected = 100.0 * (1.0 / 50_000.0 - 1.0 / 55_000.0);
        assert!((s.balance - expected).abs() < 1e-12);
        assert!(s.position.abs() < 1e-12);
    }

    #[test]
    fn test_equity_marks_open_position() {
        let mut s = State::new(AssetType::Linear, 0.0, 0.0, 0.1);
        s.apply_fill(&filled(Side::Buy, 1000, 1.0, true)).unwrap();
        // Bought at 100.0, mid now 101.0: equity is the unrealized gain.
        assert!((s.equity(101.0) - 1.0).abs() < 1e-12);
    }
}
