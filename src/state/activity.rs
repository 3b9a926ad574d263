//! Raw archival rows, one per observed pool event.
//!
//! These are display-oriented records of what the chain emitted, stored with
//! the best-effort oracle price. Balance accounting never reads them back.

#![allow(missing_docs)]

use serde::{Deserialize, Serialize};

use crate::math::Ray;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SupplyActivity {
    pub id: String,
    pub tx_hash: String,
    pub pool: String,
    pub reserve: String,
    pub user: String,
    pub on_behalf_of: String,
    pub amount: u128,
    pub referral_code: u16,
    pub timestamp: u64,
    pub price: Option<u128>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WithdrawActivity {
    pub id: String,
    pub tx_hash: String,
    pub pool: String,
    pub reserve: String,
    pub user: String,
    pub to: String,
    pub amount: u128,
    pub timestamp: u64,
    pub price: Option<u128>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BorrowActivity {
    pub id: String,
    pub tx_hash: String,
    pub pool: String,
    pub reserve: String,
    pub user: String,
    pub on_behalf_of: String,
    pub amount: u128,
    pub interest_rate_mode: u8,
    pub borrow_rate: Ray,
    pub referral_code: u16,
    pub timestamp: u64,
    pub price: Option<u128>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RepayActivity {
    pub id: String,
    pub tx_hash: String,
    pub pool: String,
    pub reserve: String,
    pub user: String,
    pub repayer: String,
    pub amount: u128,
    pub use_atokens: bool,
    pub timestamp: u64,
    pub price: Option<u128>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LiquidationActivity {
    pub id: String,
    pub tx_hash: String,
    pub pool: String,
    pub collateral_asset: String,
    pub debt_asset: String,
    pub user: String,
    pub debt_to_cover: u128,
    pub liquidated_collateral_amount: u128,
    pub liquidator: String,
    pub receive_atoken: bool,
    pub timestamp: u64,
    pub price_collateral: Option<u128>,
    pub price_debt: Option<u128>,
}

/// An archival row of any kind, as handed to the store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ActivityRecord {
    Supply(SupplyActivity),
    Withdraw(WithdrawActivity),
    Borrow(BorrowActivity),
    Repay(RepayActivity),
    Liquidation(LiquidationActivity),
}

impl ActivityRecord {
    /// Unique log identifier of the underlying row
    pub fn id(&self) -> &str {
        match self {
            ActivityRecord::Supply(a) => &a.id,
            ActivityRecord::Withdraw(a) => &a.id,
            ActivityRecord::Borrow(a) => &a.id,
            ActivityRecord::Repay(a) => &a.id,
            ActivityRecord::Liquidation(a) => &a.id,
        }
    }
}
