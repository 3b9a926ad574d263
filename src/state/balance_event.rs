//! Immutable audit rows for every balance-affecting operation.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::math::{Ray, SignedRay};

/// The kind of balance-affecting operation an event records.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceEventKind {
    /// Underlying supplied to the pool
    Deposit,
    /// Underlying withdrawn from the pool
    Withdraw,
    /// Interest-bearing tokens received from another account
    TransferIn,
    /// Interest-bearing tokens sent to another account
    TransferOut,
}

impl BalanceEventKind {
    /// Stable lowercase name, used in row identifiers and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            BalanceEventKind::Deposit => "deposit",
            BalanceEventKind::Withdraw => "withdraw",
            BalanceEventKind::TransferIn => "transfer_in",
            BalanceEventKind::TransferOut => "transfer_out",
        }
    }

    /// True for kinds that add to the position (deposit, transfer-in)
    pub fn is_inflow(&self) -> bool {
        matches!(self, BalanceEventKind::Deposit | BalanceEventKind::TransferIn)
    }
}

impl fmt::Display for BalanceEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One state-affecting operation, appended per event and never mutated.
///
/// `scaled_balance` is the running total after applying the event;
/// `scaled_delta` is the signed change the event carried, which is what the
/// duplicate-detection key compares.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BalanceEvent {
    /// Deterministic identifier (tx hash, user, asset, kind, timestamp, log index)
    pub id: String,
    /// Transaction that carried the event
    pub tx_hash: String,
    /// Depositor address
    pub user: String,
    /// Reserve (underlying asset) address
    pub asset: String,
    /// Scaled balance after this event, ray scale
    pub scaled_balance: Ray,
    /// Signed scaled delta this event applied
    pub scaled_delta: SignedRay,
    /// Operation kind
    pub kind: BalanceEventKind,
    /// Block timestamp, unix seconds
    pub timestamp: u64,
    /// Block number
    pub block_number: u64,
    /// Liquidity index used to value the event
    pub liquidity_index: Ray,
}
