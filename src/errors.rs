use thiserror::Error;

/// Simulation error type.
///
/// User-caused errors (`InvalidInput`, `OrderNotFound`, `DuplicateOrderId`)
/// are returned synchronously from the call that caused them. A
/// `CorruptSnapshot` is fatal for the run: it aborts the current time
/// advance. Post-only rejections are never errors; they surface as order
/// status `Expired`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Malformed configuration or order parameters.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Non-positive price fed into inverse-contract arithmetic.
    #[error("invalid price for inverse contract: {0}")]
    InvalidPrice(f64),

    /// Cancel referenced an id the local processor has never seen,
    /// or one that is already terminal.
    #[error("order not found: {0}")]
    OrderNotFound(u64),

    /// Submission reused an id that is still live.
    #[error("duplicate order id: {0}")]
    DuplicateOrderId(u64),

    /// A depth snapshot was internally crossed. Incremental updates that
    /// cross are auto-trimmed instead; only snapshots are trusted enough
    /// to treat a cross as data corruption.
    #[error("corrupt depth snapshot: bid tick {bid_tick} crosses ask tick {ask_tick}")]
    CorruptSnapshot { bid_tick: i64, ask_tick: i64 },
}
