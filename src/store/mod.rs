//! The persistence boundary the accounting core depends on.
//!
//! The core never talks to a database directly; it requires exactly the
//! operations below — append-only inserts with unique primary keys, point
//! lookups, a "latest at-or-before, descending, limit 1" range query,
//! equality-filtered scans, update-by-key and delete-by-key. A relational
//! backend satisfies every method with a single statement.

pub mod memory;

use core::fmt;

use crate::error::LedgerError;
use crate::state::{
    ActivityRecord, BalanceEvent, BalanceEventKind, Position, ReserveCheckpoint, UserDeposit,
    UserRecord,
};

pub use memory::MemoryStore;

/// A failed store operation, carrying the backend's reason.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreError {
    message: String,
}

impl StoreError {
    /// Wrap a backend failure reason
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for StoreError {}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        LedgerError::Store(err.message)
    }
}

/// Storage operations required by the core.
///
/// Checkpoint, balance-event and activity rows are append-only; position and
/// deposit rows are updated or deleted by key. All calls are suspending I/O;
/// failures are transient and retried by the event driver, not here.
#[allow(async_fn_in_trait)]
pub trait Store {
    /// Append a checkpoint row; the id must be unique
    async fn insert_checkpoint(&self, checkpoint: ReserveCheckpoint) -> Result<(), StoreError>;

    /// Checkpoint emitted by the given transaction for the reserve, if any
    async fn checkpoint_in_transaction(
        &self,
        reserve: &str,
        tx_hash: &str,
    ) -> Result<Option<ReserveCheckpoint>, StoreError>;

    /// Latest checkpoint for the reserve with `timestamp <= at`
    async fn latest_checkpoint_at_or_before(
        &self,
        reserve: &str,
        at: u64,
    ) -> Result<Option<ReserveCheckpoint>, StoreError>;

    /// Latest checkpoint for the reserve regardless of timestamp
    async fn latest_checkpoint(&self, reserve: &str) -> Result<Option<ReserveCheckpoint>, StoreError>;

    /// Checkpoint history for a reserve, newest first
    async fn checkpoints_for_reserve(
        &self,
        reserve: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ReserveCheckpoint>, StoreError>;

    /// Point lookup of one position
    async fn find_position(&self, user: &str, asset: &str) -> Result<Option<Position>, StoreError>;

    /// All positions held by a user
    async fn positions_for_user(&self, user: &str) -> Result<Vec<Position>, StoreError>;

    /// Insert or replace a position row
    async fn upsert_position(&self, position: Position) -> Result<(), StoreError>;

    /// Delete a position row; deleting a missing row is not an error
    async fn delete_position(&self, user: &str, asset: &str) -> Result<(), StoreError>;

    /// Append a balance-event row; the id must be unique
    async fn insert_balance_event(&self, event: BalanceEvent) -> Result<(), StoreError>;

    /// Balance events recorded by one transaction for a user/asset/kind
    async fn balance_events_in_transaction(
        &self,
        tx_hash: &str,
        user: &str,
        asset: &str,
        kind: BalanceEventKind,
    ) -> Result<Vec<BalanceEvent>, StoreError>;

    /// Balance events for a user/asset within `[start, end]`, inclusive
    async fn balance_events_in_range(
        &self,
        user: &str,
        asset: &str,
        start: u64,
        end: u64,
    ) -> Result<Vec<BalanceEvent>, StoreError>;

    /// Point lookup of a user summary row
    async fn find_user(&self, user: &str) -> Result<Option<UserRecord>, StoreError>;

    /// Insert or replace a user summary row
    async fn upsert_user(&self, record: UserRecord) -> Result<(), StoreError>;

    /// Point lookup of a per-token deposit row
    async fn find_user_deposit(
        &self,
        user: &str,
        token: &str,
    ) -> Result<Option<UserDeposit>, StoreError>;

    /// All per-token deposit rows for a user
    async fn user_deposits(&self, user: &str) -> Result<Vec<UserDeposit>, StoreError>;

    /// Insert or replace a per-token deposit row
    async fn upsert_user_deposit(&self, deposit: UserDeposit) -> Result<(), StoreError>;

    /// Delete a per-token deposit row; deleting a missing row is not an error
    async fn delete_user_deposit(&self, user: &str, token: &str) -> Result<(), StoreError>;

    /// Append a raw archival row; the id must be unique
    async fn insert_activity(&self, record: ActivityRecord) -> Result<(), StoreError>;
}
