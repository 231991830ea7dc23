//! Contract arithmetic for linear and inverse instruments.
//!
//! Linear contracts settle in the quote currency: buying q at p1 and selling
//! at p2 yields `q * (p2 - p1)`. Inverse contracts settle in the base
//! currency: the same round trip yields `q * (1/p1 - 1/p2)`.

use serde::{Deserialize, Serialize};

use crate::errors::Error;

/// Instrument settlement convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetType {
    Linear,
    Inverse,
}

impl AssetType {
    /// Signed cash equivalent of an execution, chosen so that
    /// `balance -= side_sign * amount` produces the correct P&L under both
    /// conventions. For inverse contracts the amount is negated: cash flows
    /// in the base currency run opposite to the contract direction.
    pub fn amount(&self, price: f64, qty: f64) -> Result<f64, Error> {
        match self {
            AssetType::Linear => Ok(qty * price),
            AssetType::Inverse => {
                if price <= 0.0 {
                    return Err(Error::InvalidPrice(price));
                }
                Ok(-qty / price)
            }
        }
    }

    /// Basis on which fees are charged: `q * price` for linear,
    /// `q / price` for inverse. Always non-negative for positive inputs.
    pub fn fee_basis(&self, price: f64, qty: f64) -> Result<f64, Error> {
        match self {
            AssetType::Linear => Ok(qty * price),
            AssetType::Inverse => {
                if price <= 0.0 {
                    return Err(Error::InvalidPrice(price));
                }
                Ok(qty / price)
            }
        }
    }

    /// Account equity at the given mid price.
    pub fn equity(&self, mid: f64, balance: f64, position: f64, fee: f64) -> f64 {
        match self {
            AssetType::Linear => balance + position * mid - fee,
            AssetType::Inverse => {
                if mid <= 0.0 {
                    return balance - fee;
                }
                balance - position / mid - fee
            }
        }
    }
}
