//! Rows the core computes and hands to the store.

pub mod activity;
pub mod balance_event;
pub mod checkpoint;
pub mod deposit;
pub mod position;

pub use activity::ActivityRecord;
pub use balance_event::{BalanceEvent, BalanceEventKind};
pub use checkpoint::{is_sane_liquidity_index, ReserveCheckpoint};
pub use deposit::{UserDeposit, UserRecord};
pub use position::{Position, PositionView};
