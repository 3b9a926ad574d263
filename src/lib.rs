#![deny(missing_docs)]

//! Indexes lending-protocol events and reconstructs each depositor's
//! interest-bearing balance over time.
//!
//! The core is a liquidity-index time-series engine: reserve rate updates
//! are stored as immutable checkpoints, balances are kept in
//! index-independent scaled units, and any read re-derives the actual
//! balance by resolving the index at the queried instant — combining stored
//! checkpoints with linear extrapolation at the last known rate. No event
//! replay, no floating point, no ambient state: every operation receives
//! its store and oracle handles explicitly.

pub mod aggregate;
pub mod api;
pub mod error;
pub mod ledger;
pub mod math;
pub mod oracle;
pub mod processor;
pub mod resolver;
pub mod state;
pub mod store;

pub use error::LedgerError;
pub use math::{Ray, SignedRay};
pub use processor::{process_event, EventMeta, PoolEvent};
pub use resolver::resolve_index;
