//! Companion net-deposit rows, independent of interest accrual.

use serde::{Deserialize, Serialize};

/// Per-user summary row for the deposit aggregate.
///
/// `total_deposit_count` tracks how many live `UserDeposit` rows the user
/// has, i.e. how many distinct tokens they currently hold a balance in.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    /// User address
    pub id: String,
    /// Number of live per-token deposit rows
    pub total_deposit_count: u64,
    /// Timestamp of the last change, unix seconds
    pub last_updated: u64,
}

/// Net raw-amount balance for one `(user, token)` pair.
///
/// Deposits minus withdrawals in underlying units, no accrual applied.
/// Deleted as soon as the balance returns to exactly zero.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserDeposit {
    /// User address
    pub user: String,
    /// Token (reserve) address
    pub token: String,
    /// Net balance in underlying units
    pub current_balance: u128,
    /// Timestamp of the last change, unix seconds
    pub last_updated: u64,
}

impl UserDeposit {
    /// Store key for a `(user, token)` pair
    pub fn key_for(user: &str, token: &str) -> String {
        format!("{user}_{token}")
    }

    /// Store key of this row
    pub fn key(&self) -> String {
        Self::key_for(&self.user, &self.token)
    }
}
