//! End-to-end scenarios across the whole pipeline:
//! - Passive fill through the queue
//! - Post-only rejection
//! - Latency-delayed acknowledgement
//! - Probability queue advancement on trades
//! - Inverse contract P&L
//! - Snapshot re-seeding of queue estimates

use crate::{
    AssetType, Backtest, BacktestConfig, ConstantLatency, Event, OrderStatus, ProbQueueModel,
    RiskAverseQueueModel, Side, SquareProb, TimeInForce,
};

fn config(tick_size: f64) -> BacktestConfig {
    BacktestConfig {
        tick_size,
        lot_size: 1.0,
        ..Default::default()
    }
}

#[test]
fn test_single_maker_fill() {
    let events = vec![
        Event::depth(Side::Buy, 100.0, 5.0, 0, 0),
        Event::depth(Side::Sell, 100.1, 5.0, 0, 0),
        Event::trade(Side::Sell, 100.0, 6.0, 3_000, 3_000),
    ];
    let mut hbt = Backtest::new(
        events,
        config(0.1),
        RiskAverseQueueModel,
        ConstantLatency::new(0, 0),
    )
    .unwrap();

    assert!(hbt.elapse(1_000).unwrap());
    hbt.submit_buy_order(1, 100.0, 1.0, TimeInForce::Gtc).unwrap();
    assert!(hbt.elapse(1_000).unwrap());
    assert_eq!(hbt.order(1).unwrap().status, OrderStatus::New);

    // 6 lots trade through the 5 ahead of us: the residual fills us.
    assert!(!hbt.elapse(2_000).unwrap());
    let order = hbt.order(1).unwrap();
    assert_eq!(order.status, OrderStatus::Filled);
    assert_eq!(order.exec_qty, 1.0);
    assert!(order.maker);
    assert!((hbt.position() - 1.0).abs() < 1e-12);
    assert!((hbt.balance() + 100.0).abs() < 1e-9);
    assert_eq!(hbt.state().fee, 0.0);
}

#[test]
fn test_post_only_rejection() {
    let events = vec![Event::depth(Side::Sell, 100.1, 5.0, 0, 0)];
    let mut hbt = Backtest::new(
        events,
        config(0.1),
        RiskAverseQueueModel,
        ConstantLatency::new(0, 0),
    )
    .unwrap();

    hbt.elapse(1_000).unwrap();
    hbt.submit_buy_order(1, 100.2, 1.0, TimeInForce::Gtx).unwrap();
    hbt.elapse(1_000).unwrap();

    assert_eq!(hbt.order(1).unwrap().status, OrderStatus::Expired);
    assert_eq!(hbt.position(), 0.0);
    assert_eq!(hbt.balance(), 0.0);
}

#[test]
fn test_latency_delayed_ack() {
    let mut hbt = Backtest::new(
        Vec::new(),
        config(0.1),
        RiskAverseQueueModel,
        ConstantLatency::new(1_000_000, 1_000_000),
    )
    .unwrap();

    hbt.submit_buy_order(1, 100.0, 1.0, TimeInForce::Gtc).unwrap();

    // Half the entry latency: the order is still in flight.
    hbt.elapse(500_000).unwrap();
    assert_eq!(hbt.order(1).unwrap().status, OrderStatus::None);
    assert!(hbt.exchange().order(1).is_none());

    // Past entry plus response latency: acknowledged locally.
    hbt.elapse(2_000_000).unwrap();
    assert_eq!(hbt.order(1).unwrap().status, OrderStatus::New);
    assert_eq!(hbt.current_timestamp(), 2_500_000);
}

#[test]
fn test_probability_queue_advances_on_trade() {
    let events = vec![
        Event::depth(Side::Buy, 100.0, 10.0, 0, 0),
        Event::depth(Side::Sell, 100.1, 10.0, 0, 0),
        Event::trade(Side::Sell, 100.0, 10.0, 2_000, 2_000),
        Event::trade(Side::Sell, 100.0, 0.1, 3_000, 3_000),
    ];
    let mut hbt = Backtest::new(
        events,
        config(0.1),
        ProbQueueModel::new(SquareProb),
        ConstantLatency::new(0, 0),
    )
    .unwrap();

    hbt.elapse(1_000).unwrap();
    hbt.submit_buy_order(1, 100.0, 1.0, TimeInForce::Gtc).unwrap();
    hbt.elapse(500).unwrap();
    assert_eq!(hbt.exchange().order(1).unwrap().front_qty, 10.0);

    // The 10-lot print consumes exactly the queue ahead: first in line,
    // not yet filled.
    hbt.elapse(1_000).unwrap();
    assert_eq!(hbt.exchange().order(1).unwrap().front_qty, 0.0);
    assert_eq!(hbt.order(1).unwrap().status, OrderStatus::New);

    // Any subsequent print fills.
    hbt.elapse(1_000).unwrap();
    assert_eq!(hbt.order(1).unwrap().status, OrderStatus::Filled);
    assert!((hbt.position() - 1.0).abs() < 1e-12);
}

#[test]
fn test_inverse_asset_pnl() {
    let mut cfg = config(1.0);
    cfg.asset_type = AssetType::Inverse;
    let events = vec![
        Event::depth(Side::Sell, 50_000.0, 100.0, 0, 0),
        Event::depth(Side::Buy, 49_999.0, 100.0, 0, 0),
        // The market rallies; bids arrive at 55000.
        Event::depth(Side::Buy, 55_000.0, 100.0, 10_000, 10_000),
    ];
    let mut hbt = Backtest::new(
        events,
        cfg,
        RiskAverseQueueModel,
        ConstantLatency::new(0, 0),
    )
    .unwrap();

    hbt.elapse(1_000).unwrap();
    // Cross the ask: taker buy of 100 @ 50000.
    hbt.submit_buy_order(1, 50_000.0, 100.0, TimeInForce::Gtc)
        .unwrap();
    hbt.elapse(1_000).unwrap();
    assert!((hbt.position() - 100.0).abs() < 1e-12);

    hbt.elapse(10_000).unwrap();
    // Cross the bid: taker sell of 100 @ 55000.
    hbt.submit_sell_order(2, 55_000.0, 100.0, TimeInForce::Gtc)
        .unwrap();
    hbt.elapse(1_000).unwrap();

    assert!(hbt.position().abs() < 1e-12);
    let expected = 100.0 * (1.0 / 50_000.0 - 1.0 / 55_000.0);
    assert!((hbt.balance() - expected).abs() < 1e-9);
}

#[test]
fn test_snapshot_reseeds_queue_position() {
    let events = vec![
        Event::depth(Side::Buy, 100.0, 10.0, 0, 0),
        Event::depth(Side::Sell, 100.1, 10.0, 0, 0),
        Event::trade(Side::Sell, 100.0, 7.0, 2_000, 2_000),
        Event::snapshot_level(Side::Buy, 100.0, 7.0, 3_000, 3_000),
    ];
    let mut hbt = Backtest::new(
        events,
        config(0.1),
        RiskAverseQueueModel,
        ConstantLatency::new(0, 0),
    )
    .unwrap();

    hbt.elapse(1_000).unwrap();
    hbt.submit_buy_order(1, 100.0, 1.0, TimeInForce::Gtc).unwrap();

    // The 7-lot print leaves an estimated 3 ahead.
    hbt.elapse(1_500).unwrap();
    assert_eq!(hbt.exchange().order(1).unwrap().front_qty, 3.0);

    // The snapshot resets the estimate: all visible volume counts as
    // ahead, because simulated orders are invisible to the feed.
    hbt.elapse(1_000).unwrap();
    assert_eq!(hbt.exchange().order(1).unwrap().front_qty, 7.0);
}
