//! Market data event records.
//!
//! Each record carries both the exchange timestamp (when the venue produced
//! it) and the local timestamp (when our process would have received it).
//! The exchange processor consumes events at `exch_ts`, the local processor
//! at `local_ts`; the difference is the feed latency.

use serde::{Deserialize, Serialize};

use crate::errors::Error;
use crate::types::Side;

/// Depth update event kind bit.
pub const DEPTH_EVENT: u64 = 1;
/// Trade event kind bit.
pub const TRADE_EVENT: u64 = 2;
/// Depth clear event kind bit.
pub const DEPTH_CLEAR_EVENT: u64 = 3;
/// Depth snapshot event kind bit.
pub const DEPTH_SNAPSHOT_EVENT: u64 = 4;
/// Buy-side flag, kept high in the word for feed compatibility.
pub const BUY_EVENT: u64 = 1 << 29;
/// Sell-side flag.
pub const SELL_EVENT: u64 = 1 << 28;

/// Mask covering the kind bits of an event flag word.
const KIND_MASK: u64 = 0xff;

/// What a market data record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Quantity at one price level changed (0 removes the level).
    Depth,
    /// A trade printed; side is the aggressor.
    Trade,
    /// One or both book sides were cleared, optionally up to a price bound.
    DepthClear,
    /// One level of a book snapshot. Feeds emit a clear followed by one
    /// snapshot record per level.
    DepthSnapshot,
}

/// A single market data record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    /// Venue timestamp, nanoseconds.
    pub exch_ts: i64,
    /// Receipt timestamp, nanoseconds. Usually >= `exch_ts`, not required.
    pub local_ts: i64,
    /// Order side for depth records, aggressor side for trades. `None` on a
    /// clear means both sides.
    pub side: Option<Side>,
    pub px: f64,
    pub qty: f64,
}

impl Event {
    pub fn depth(side: Side, px: f64, qty: f64, exch_ts: i64, local_ts: i64) -> Self {
        Self {
            kind: EventKind::Depth,
            exch_ts,
            local_ts,
            side: Some(side),
            px,
            qty,
        }
    }

    pub fn trade(side: Side, px: f64, qty: f64, exch_ts: i64, local_ts: i64) -> Self {
        Self {
            kind: EventKind::Trade,
            exch_ts,
            local_ts,
            side: Some(side),
            px,
            qty,
        }
    }

    pub fn snapshot_level(side: Side, px: f64, qty: f64, exch_ts: i64, local_ts: i64) -> Self {
        Self {
            kind: EventKind::DepthSnapshot,
            exch_ts,
            local_ts,
            side: Some(side),
            px,
            qty,
        }
    }

    /// A clear record. `px = 0.0` clears the whole side (or both sides when
    /// `side` is `None`).
    pub fn clear(side: Option<Side>, px: f64, exch_ts: i64, local_ts: i64) -> Self {
        Self {
            kind: EventKind::DepthClear,
            exch_ts,
            local_ts,
            side,
            px,
            qty: 0.0,
        }
    }

    /// Decode a raw record from its flag word, as stored in recorded feeds.
    pub fn from_flags(
        flags: u64,
        exch_ts: i64,
        local_ts: i64,
        px: f64,
        qty: f64,
    ) -> Result<Self, Error> {
        let kind = match flags & KIND_MASK {
            DEPTH_EVENT => EventKind::Depth,
            TRADE_EVENT => EventKind::Trade,
            DEPTH_CLEAR_EVENT => EventKind::DepthClear,
            DEPTH_SNAPSHOT_EVENT => EventKind::DepthSnapshot,
            other => {
                return Err(Error::InvalidInput(format!(
                    "unknown event kind in flags: {other:#x}"
                )))
            }
        };
        let side = if flags & BUY_EVENT != 0 {
            Some(Side::Buy)
        } else if flags & SELL_EVENT != 0 {
            Some(Side::Sell)
        } else {
            None
        };
        Ok(Self {
            kind,
            exch_ts,
            local_ts,
            side,
            px,
            qty,
        })
    }

    /// Encode the flag word for this record.
    pub fn flags(&self) -> u64 {
        let kind = match self.kind {
            EventKind::Depth => DEPTH_EVENT,
            EventKind::Trade => TRADE_EVENT,
            EventKind::DepthClear => DEPTH_CLEAR_EVENT,
            EventKind::DepthSnapshot => DEPTH_SNAPSHOT_EVENT,
        };
        let side = match self.side {
            Some(Side::Buy) => BUY_EVENT,
            Some(Side::Sell) => SELL_EVENT,
            None => 0,
        };
        kind | side
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_round_trip() {
        let ev = Event::trade(Side::Sell, 100.0, 2.0, 10, 15);
        let decoded = Event::from_flags(ev.flags(), 10, 15, 100.0, 2.0).unwrap();
        assert_eq!(decoded, ev);
        assert_eq!(ev.flags(), TRADE_EVENT | SELL_EVENT);
    }

    #[test]
    fn test_clear_without_side() {
        let ev = Event::clear(None, 0.0, 1, 2);
        assert_eq!(ev.flags(), DEPTH_CLEAR_EVENT);
        let decoded = Event::from_flags(DEPTH_CLEAR_EVENT, 1, 2, 0.0, 0.0).unwrap();
        assert_eq!(decoded.side, None);
    }

    #[test]
    fn test_unknown_kind_rejected() {
        assert!(Event::from_flags(0x7f, 0, 0, 0.0, 0.0).is_err());
    }
}
