//! L2 market depth: one ordered price ladder per side.
//!
//! Ladders are keyed by integer price tick with strictly positive f64
//! quantities; a zero-quantity update removes the level. Best bid/ask are
//! cached and refreshed on every mutation. Incremental updates that cross
//! the opposite side silently trim the crossed levels (depth feeds commonly
//! reorder); only an internally crossed snapshot is an error.

use std::collections::BTreeMap;

use tracing::debug;

use crate::consts::EPSILON;
use crate::errors::Error;
use crate::infra::logging::targets;
use crate::types::Side;

/// L2 order book state for one instrument.
#[derive(Debug, Clone, Default)]
pub struct MarketDepth {
    bids: BTreeMap<i64, f64>,
    asks: BTreeMap<i64, f64>,
    best_bid: Option<i64>,
    best_ask: Option<i64>,
}

impl MarketDepth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn best_bid_tick(&self) -> Option<i64> {
        self.best_bid
    }

    pub fn best_ask_tick(&self) -> Option<i64> {
        self.best_ask
    }

    pub fn bid_qty_at(&self, tick: i64) -> f64 {
        self.bids.get(&tick).copied().unwrap_or(0.0)
    }

    pub fn ask_qty_at(&self, tick: i64) -> f64 {
        self.asks.get(&tick).copied().unwrap_or(0.0)
    }

    /// Resting quantity at `tick` on the given side.
    pub fn qty_at(&self, side: Side, tick: i64) -> f64 {
        match side {
            Side::Buy => self.bid_qty_at(tick),
            Side::Sell => self.ask_qty_at(tick),
        }
    }

    /// Mid price, when both sides are present.
    pub fn mid_price(&self, tick_size: f64) -> Option<f64> {
        match (self.best_bid, self.best_ask) {
            (Some(b), Some(a)) => Some((b + a) as f64 * tick_size / 2.0),
            _ => None,
        }
    }

    /// Set the bid quantity at `tick`, returning the previous quantity.
    /// Removes the level when `qty` is (near) zero. A bid at or above the
    /// best ask trims the crossed ask levels.
    pub fn update_bid(&mut self, tick: i64, qty: f64) -> f64 {
        let prev = if qty < EPSILON {
            self.bids.remove(&tick).unwrap_or(0.0)
        } else {
            let crossed: Vec<i64> = self.asks.range(..=tick).map(|(t, _)| *t).collect();
            if !crossed.is_empty() {
                debug!(target: targets::DEPTH, tick, levels = crossed.len(), "bid update crossed asks, trimming");
            }
            for t in crossed {
                self.asks.remove(&t);
            }
            self.bids.insert(tick, qty).unwrap_or(0.0)
        };
        self.refresh_best();
        prev
    }

    /// Ask-side counterpart of [`update_bid`](Self::update_bid).
    pub fn update_ask(&mut self, tick: i64, qty: f64) -> f64 {
        let prev = if qty < EPSILON {
            self.asks.remove(&tick).unwrap_or(0.0)
        } else {
            let crossed: Vec<i64> = self.bids.range(tick..).map(|(t, _)| *t).collect();
            if !crossed.is_empty() {
                debug!(target: targets::DEPTH, tick, levels = crossed.len(), "ask update crossed bids, trimming");
            }
            for t in crossed {
                self.bids.remove(&t);
            }
            self.asks.insert(tick, qty).unwrap_or(0.0)
        };
        self.refresh_best();
        prev
    }

    /// Apply one level of a depth snapshot. Unlike incremental updates, a
    /// snapshot level that crosses the standing opposite side is treated as
    /// corrupt data and fails the run.
    pub fn apply_snapshot_level(&mut self, side: Side, tick: i64, qty: f64) -> Result<f64, Error> {
        match side {
            Side::Buy => {
                if qty >= EPSILON {
                    if let Some(ask) = self.best_ask {
                        if tick >= ask {
                            return Err(Error::CorruptSnapshot {
                                bid_tick: tick,
                                ask_tick: ask,
                            });
                        }
                    }
                }
                let prev = if qty < EPSILON {
                    self.bids.remove(&tick).unwrap_or(0.0)
                } else {
                    self.bids.insert(tick, qty).unwrap_or(0.0)
                };
                self.refresh_best();
                Ok(prev)
            }
            Side::Sell => {
                if qty >= EPSILON {
                    if let Some(bid) = self.best_bid {
                        if tick <= bid {
                            return Err(Error::CorruptSnapshot {
                                bid_tick: bid,
                                ask_tick: tick,
                            });
                        }
                    }
                }
                let prev = if qty < EPSILON {
                    self.asks.remove(&tick).unwrap_or(0.0)
                } else {
                    self.asks.insert(tick, qty).unwrap_or(0.0)
                };
                self.refresh_best();
                Ok(prev)
            }
        }
    }

    /// Remove levels on `side` up to and including `upto_tick` from the
    /// touch ("up to" follows queue priority: best-down for bids, best-up
    /// for asks). `None` side clears both sides; `None` bound clears the
    /// whole side.
    pub fn clear(&mut self, side: Option<Side>, upto_tick: Option<i64>) {
        if side.is_none() || side == Some(Side::Buy) {
            match upto_tick {
                Some(bound) => {
                    let ticks: Vec<i64> = self.bids.range(bound..).map(|(t, _)| *t).collect();
                    for t in ticks {
                        self.bids.remove(&t);
                    }
                }
                None => self.bids.clear(),
            }
        }
        if side.is_none() || side == Some(Side::Sell) {
            match upto_tick {
                Some(bound) => {
                    let ticks: Vec<i64> = self.asks.range(..=bound).map(|(t, _)| *t).collect();
                    for t in ticks {
                        self.asks.remove(&t);
                    }
                }
                None => self.asks.clear(),
            }
        }
        self.refresh_best();
    }

    /// Atomically replace both ladders. Zero-quantity levels are dropped.
    /// Fails with `CorruptSnapshot` if the snapshot is internally crossed.
    pub fn snapshot(&mut self, bids: &[(i64, f64)], asks: &[(i64, f64)]) -> Result<(), Error> {
        let mut new_bids = BTreeMap::new();
        let mut new_asks = BTreeMap::new();
        for &(tick, qty) in bids {
            if qty >= EPSILON {
                new_bids.insert(tick, qty);
            }
        }
        for &(tick, qty) in asks {
            if qty >= EPSILON {
                new_asks.insert(tick, qty);
            }
        }
        if let (Some((&bid, _)), Some((&ask, _))) =
            (new_bids.last_key_value(), new_asks.first_key_value())
        {
            if bid >= ask {
                return Err(Error::CorruptSnapshot {
                    bid_tick: bid,
                    ask_tick: ask,
                });
            }
        }
        self.bids = new_bids;
        self.asks = new_asks;
        self.refresh_best();
        Ok(())
    }

    /// Ask levels priced at or below `tick`, best first. Used to walk the
    /// ladder when a buy order executes as taker.
    pub fn asks_at_or_below(&self, tick: i64) -> impl Iterator<Item = (i64, f64)> + '_ {
        self.asks.range(..=tick).map(|(t, q)| (*t, *q))
    }

    /// Bid levels priced at or above `tick`, best first.
    pub fn bids_at_or_above(&self, tick: i64) -> impl Iterator<Item = (i64, f64)> + '_ {
        self.bids.range(tick..).rev().map(|(t, q)| (*t, *q))
    }

    /// Bid ladder contents, best first.
    pub fn bids(&self) -> impl Iterator<Item = (i64, f64)> + '_ {
        self.bids.iter().rev().map(|(t, q)| (*t, *q))
    }

    /// Ask ladder contents, best first.
    pub fn asks(&self) -> impl Iterator<Item = (i64, f64)> + '_ {
        self.asks.iter().map(|(t, q)| (*t, *q))
    }

    fn refresh_best(&mut self) {
        self.best_bid = self.bids.last_key_value().map(|(t, _)| *t);
        self.best_ask = self.asks.first_key_value().map(|(t, _)| *t);
        debug_assert!(
            match (self.best_bid, self.best_ask) {
                (Some(b), Some(a)) => b < a,
                _ => true,
            },
            "book crossed: {:?} >= {:?}",
            self.best_bid,
            self.best_ask
        );
    }
}
