//! Latency-delayed FIFO channel between the local and exchange processors.
//!
//! Each direction is an independent queue. Entries carry a release
//! timestamp; the receiving side may not observe an entry before its
//! release. Equal release timestamps preserve insertion order, so a run is
//! reproducible regardless of heap internals.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// One direction of the order bus.
#[derive(Debug)]
pub struct OrderBus<T> {
    heap: BinaryHeap<Entry<T>>,
    seq: u64,
}

#[derive(Debug)]
struct Entry<T> {
    release_ts: i64,
    seq: u64,
    msg: T,
}

// Min-heap on (release_ts, seq); the payload never participates.
impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.release_ts == other.release_ts && self.seq == other.seq
    }
}

impl<T> Eq for Entry<T> {}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Entry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        (other.release_ts, other.seq).cmp(&(self.release_ts, self.seq))
    }
}

impl<T> OrderBus<T> {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            seq: 0,
        }
    }

    /// Enqueue a message for delivery at `release_ts`.
    pub fn append(&mut self, msg: T, release_ts: i64) {
        let seq = self.seq;
        self.seq += 1;
        self.heap.push(Entry {
            release_ts,
            seq,
            msg,
        });
    }

    /// Release timestamp of the head entry, `None` when empty.
    pub fn frontier(&self) -> Option<i64> {
        self.heap.peek().map(|e| e.release_ts)
    }

    /// Pop the head entry if it is released at or before `ts`.
    pub fn pop(&mut self, ts: i64) -> Option<(i64, T)> {
        if self.frontier()? > ts {
            return None;
        }
        self.heap.pop().map(|e| (e.release_ts, e.msg))
    }

    /// Drain every entry released at or before `ts`, in delivery order.
    pub fn reserve_until(&mut self, ts: i64) -> Vec<T> {
        let mut out = Vec::new();
        while let Some((_, msg)) = self.pop(ts) {
            out.push(msg);
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }
}

impl<T> Default for OrderBus<T> {
    fn default() -> Self {
        Self::new()
    }
}
