//! Per user/asset interest-bearing positions.

use serde::{Deserialize, Serialize};

use crate::math::{Ray, SignedRay};

/// The running position for one `(user, asset)` pair.
///
/// `scaled_balance` is authoritative; `actual_balance` is the value computed
/// at the last write and is recomputed against a fresh index on every read.
/// The row is created on the first deposit or transfer-in and deleted as soon
/// as the scaled balance returns to exactly zero.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Depositor address
    pub user: String,
    /// Reserve (underlying asset) address
    pub asset: String,
    /// Index-independent balance, ray scale
    pub scaled_balance: Ray,
    /// Index-applied balance as of `last_updated` (cache, not authoritative)
    pub actual_balance: Ray,
    /// Cumulative deposits in underlying units, never decreases
    pub total_deposits: Ray,
    /// Cumulative withdrawals in underlying units, never decreases
    pub total_withdrawals: Ray,
    /// Timestamp of the last balance-affecting event, unix seconds
    pub last_updated: u64,
    /// Liquidity index in effect at the last write
    pub last_liquidity_index: Ray,
}

impl Position {
    /// Store key for a `(user, asset)` pair
    pub fn key_for(user: &str, asset: &str) -> String {
        format!("{user}_{asset}")
    }

    /// Store key of this position
    pub fn key(&self) -> String {
        Self::key_for(&self.user, &self.asset)
    }
}

/// A position as served to readers: actual balance recomputed against the
/// freshest index, plus the yield earned over the net deposits.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PositionView {
    /// Depositor address
    pub user: String,
    /// Reserve (underlying asset) address
    pub asset: String,
    /// Index-independent balance, ray scale
    pub scaled_balance: Ray,
    /// Balance with the current index applied
    pub actual_balance: Ray,
    /// Cumulative deposits in underlying units
    pub total_deposits: Ray,
    /// Cumulative withdrawals in underlying units
    pub total_withdrawals: Ray,
    /// Timestamp of the last balance-affecting event
    pub last_updated: u64,
    /// `actual_balance - (total_deposits - total_withdrawals)`, signed
    pub current_yield: SignedRay,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn key_joins_user_and_asset() {
        assert_eq!(Position::key_for("0xabc", "0xdef"), "0xabc_0xdef");
    }
}
