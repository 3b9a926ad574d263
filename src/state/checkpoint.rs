//! Reserve rate-update checkpoints, the anchors for index extrapolation.

use serde::{Deserialize, Serialize};

use crate::math::common::RAY;
use crate::math::Ray;

/// Upper sanity bound for a stored liquidity index (10x growth)
pub const MAX_SANE_INDEX: u128 = 10 * RAY;

/// One rate-update event observed on-chain.
///
/// Created once per `ReserveDataUpdated` log, never mutated or deleted.
/// Checkpoints are ordered by `(reserve, timestamp)` so the store can answer
/// "latest at-or-before T" with a single descending range scan.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReserveCheckpoint {
    /// Unique log identifier (transaction hash + log index)
    pub id: String,
    /// Transaction that emitted the update
    pub tx_hash: String,
    /// Pool contract the log came from
    pub pool: String,
    /// Reserve (underlying asset) address
    pub reserve: String,
    /// Supply-side rate, per annum, ray scale
    pub liquidity_rate: Ray,
    /// Stable borrow rate, per annum, ray scale
    pub stable_borrow_rate: Ray,
    /// Variable borrow rate, per annum, ray scale
    pub variable_borrow_rate: Ray,
    /// Cumulative supply index, ray scale
    pub liquidity_index: Ray,
    /// Cumulative variable borrow index, ray scale
    pub variable_borrow_index: Ray,
    /// Block timestamp, unix seconds
    pub timestamp: u64,
    /// Block number
    pub block_number: u64,
    /// Oracle price at the time of the event, when the oracle answered
    pub price: Option<u128>,
}

impl ReserveCheckpoint {
    /// True when the stored liquidity index passes the sanity bound
    pub fn has_sane_index(&self) -> bool {
        is_sane_liquidity_index(self.liquidity_index)
    }
}

/// Validate a liquidity index against the accrual sanity bound.
///
/// An index below 1.0 ray or above 10.0 ray is treated as corrupt and
/// replaced by the default during resolution.
pub fn is_sane_liquidity_index(index: Ray) -> bool {
    index >= Ray::one() && index <= Ray::from_scaled_val(MAX_SANE_INDEX)
}
