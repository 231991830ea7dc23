//! Order latency models.
//!
//! Entry latency delays a submission on its way to the exchange; response
//! latency delays the acknowledgement or fill on the way back. The kernel
//! hands one model instance to each processor, so feed-driven variants each
//! track their own view of the feed latency. All latencies clamp to zero
//! from below.

use serde::{Deserialize, Serialize};

use crate::errors::Error;
use crate::types::Order;

/// Latency applied to order traffic.
///
/// `on_feed` is invoked by the processors for every market event they
/// consume; models that derive latency from the feed use it, the rest keep
/// the default no-op.
pub trait LatencyModel {
    /// Nanoseconds an order submitted at `ts` takes to reach the exchange.
    fn entry(&mut self, ts: i64, order: &Order) -> i64;

    /// Nanoseconds a response generated at `ts` takes to reach the strategy.
    fn response(&mut self, ts: i64, order: &Order) -> i64;

    /// Observe the feed latency of a consumed market event.
    fn on_feed(&mut self, _exch_ts: i64, _local_ts: i64) {}
}

/// Fixed entry/response latency.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ConstantLatency {
    entry_ns: i64,
    response_ns: i64,
}

impl ConstantLatency {
    pub fn new(entry_ns: i64, response_ns: i64) -> Self {
        Self {
            entry_ns: entry_ns.max(0),
            response_ns: response_ns.max(0),
        }
    }
}

impl LatencyModel for ConstantLatency {
    fn entry(&mut self, _ts: i64, _order: &Order) -> i64 {
        self.entry_ns
    }

    fn response(&mut self, _ts: i64, _order: &Order) -> i64 {
        self.response_ns
    }
}

/// Derives order latency from the most recently observed feed latency,
/// scaled per direction plus a constant offset.
///
/// Order traffic rides the same infrastructure as market data, so the feed
/// delay is a usable proxy when no recorded order latency exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedLatency {
    pub entry_multiplier: f64,
    pub response_multiplier: f64,
    pub entry_offset_ns: i64,
    pub response_offset_ns: i64,
    #[serde(skip)]
    last_feed_ns: i64,
}

impl FeedLatency {
    pub fn new(
        entry_multiplier: f64,
        response_multiplier: f64,
        entry_offset_ns: i64,
        response_offset_ns: i64,
    ) -> Self {
        Self {
            entry_multiplier,
            response_multiplier,
            entry_offset_ns,
            response_offset_ns,
            last_feed_ns: 0,
        }
    }
}

impl Default for FeedLatency {
    fn default() -> Self {
        Self::new(1.0, 1.0, 0, 0)
    }
}

impl LatencyModel for FeedLatency {
    fn entry(&mut self, _ts: i64, _order: &Order) -> i64 {
        ((self.last_feed_ns as f64 * self.entry_multiplier) as i64 + self.entry_offset_ns).max(0)
    }

    fn response(&mut self, _ts: i64, _order: &Order) -> i64 {
        ((self.last_feed_ns as f64 * self.response_multiplier) as i64 + self.response_offset_ns)
            .max(0)
    }

    fn on_feed(&mut self, exch_ts: i64, local_ts: i64) {
        self.last_feed_ns = (local_ts - exch_ts).max(0);
    }
}

/// One recorded order round trip: request sent, seen by the exchange,
/// response received.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OrderLatencySample {
    pub req_ts: i64,
    pub exch_ts: i64,
    pub resp_ts: i64,
}

impl OrderLatencySample {
    fn entry_ns(&self) -> i64 {
        (self.exch_ts - self.req_ts).max(0)
    }

    fn response_ns(&self) -> i64 {
        (self.resp_ts - self.exch_ts).max(0)
    }
}

/// Interpolates latency between pre-recorded order round trips.
///
/// Entry latency at `ts` interpolates between the two samples whose request
/// timestamps bracket `ts`; response latency interpolates on the exchange
/// timestamps. Out-of-range timestamps clamp to the nearest sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterpolatedOrderLatency {
    samples: Vec<OrderLatencySample>,
}

impl InterpolatedOrderLatency {
    /// Samples must be sorted by `req_ts`; an empty set is rejected.
    pub fn new(samples: Vec<OrderLatencySample>) -> Result<Self, Error> {
        if samples.is_empty() {
            return Err(Error::InvalidInput(
                "interpolated latency needs at least one sample".to_string(),
            ));
        }
        Ok(Self { samples })
    }

    /// Interpolate `value(sample)` over the sample whose `key(sample)`
    /// brackets `ts`.
    fn interpolate(
        &self,
        ts: i64,
        key: impl Fn(&OrderLatencySample) -> i64,
        value: impl Fn(&OrderLatencySample) -> i64,
    ) -> i64 {
        let idx = self.samples.partition_point(|s| key(s) <= ts);
        if idx == 0 {
            return value(&self.samples[0]);
        }
        if idx == self.samples.len() {
            return value(&self.samples[idx - 1]);
        }
        let (lo, hi) = (&self.samples[idx - 1], &self.samples[idx]);
        let (t0, t1) = (key(lo), key(hi));
        if t1 == t0 {
            return value(lo);
        }
        let frac = (ts - t0) as f64 / (t1 - t0) as f64;
        let (v0, v1) = (value(lo) as f64, value(hi) as f64);
        ((v0 + (v1 - v0) * frac) as i64).max(0)
    }
}

impl LatencyModel for InterpolatedOrderLatency {
    fn entry(&mut self, ts: i64, _order: &Order) -> i64 {
        self.interpolate(ts, |s| s.req_ts, |s| s.entry_ns())
    }

    fn response(&mut self, ts: i64, _order: &Order) -> i64 {
        self.interpolate(ts, |s| s.exch_ts, |s| s.response_ns())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Side, TimeInForce};

    fn order() -> Order {
        Order::new(1, Side::Buy, 1000, 1.0, TimeInForce::Gtc)
    }

    #[test]
    fn test_constant_clamps_negative() {
        let mut m = ConstantLatency::new(-5, 10);
        assert_eq!(m.entry(0, &order()), 0);
        assert_eq!(m.response(0, &order()), 10);
    }

    #[test]
    fn test_feed_latency_tracks_observations() {
        let mut m = FeedLatency::new(2.0, 0.5, 100, 0);
        assert_eq!(m.entry(0, &order()), 100);
        m.on_feed(1_000, 1_500);
        assert_eq!(m.entry(0, &order()), 1_100);
        assert_eq!(m.response(0, &order()), 250);
    }

    #[test]
    fn test_feed_latency_negative_feed_clamped() {
        let mut m = FeedLatency::default();
        // Local clock behind the venue clock: treat as zero latency.
        m.on_feed(2_000, 1_000);
        assert_eq!(m.entry(0, &order()), 0);
    }

    #[test]
    fn test_interpolated_midpoint() {
        let mut m = InterpolatedOrderLatency::new(vec![
            OrderLatencySample {
                req_ts: 0,
                exch_ts: 100,
                resp_ts: 200,
            },
            OrderLatencySample {
                req_ts: 1_000,
                exch_ts: 1_300,
                resp_ts: 1_400,
            },
        ])
        .unwrap();
        // Entry latencies are 100 and 300; halfway in request time -> 200.
        assert_eq!(m.entry(500, &order()), 200);
        // Response latencies are 100 at exch_ts 100 and 100 at 1_300.
        assert_eq!(m.response(700, &order()), 100);
    }

    #[test]
    fn test_interpolated_clamps_out_of_range() {
        let mut m = InterpolatedOrderLatency::new(vec![
            OrderLatencySample {
                req_ts: 100,
                exch_ts: 150,
                resp_ts: 250,
            },
            OrderLatencySample {
                req_ts: 200,
                exch_ts: 290,
                resp_ts: 390,
            },
        ])
        .unwrap();
        assert_eq!(m.entry(0, &order()), 50);
        assert_eq!(m.entry(10_000, &order()), 90);
    }

    #[test]
    fn test_interpolated_rejects_empty() {
        assert!(InterpolatedOrderLatency::new(vec![]).is_err());
    }
}
