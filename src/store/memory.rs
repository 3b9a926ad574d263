//! BTreeMap-backed store, used by tests and local runs.

#![allow(missing_docs)]

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use crate::state::{
    ActivityRecord, BalanceEvent, BalanceEventKind, Position, ReserveCheckpoint, UserDeposit,
    UserRecord,
};
use crate::store::{Store, StoreError};

/// In-memory row store with the same uniqueness rules a relational backend
/// would enforce.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    checkpoints: Vec<ReserveCheckpoint>,
    positions: BTreeMap<String, Position>,
    balance_events: Vec<BalanceEvent>,
    users: BTreeMap<String, UserRecord>,
    user_deposits: BTreeMap<String, UserDeposit>,
    activity: Vec<ActivityRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of balance-event rows recorded so far (test observability)
    pub fn balance_event_count(&self) -> usize {
        self.lock().balance_events.len()
    }

    /// Number of archival rows recorded so far (test observability)
    pub fn activity_count(&self) -> usize {
        self.lock().activity.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Store for MemoryStore {
    async fn insert_checkpoint(&self, checkpoint: ReserveCheckpoint) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if inner.checkpoints.iter().any(|c| c.id == checkpoint.id) {
            return Err(StoreError::new(format!("duplicate checkpoint id {}", checkpoint.id)));
        }
        inner.checkpoints.push(checkpoint);
        Ok(())
    }

    async fn checkpoint_in_transaction(
        &self,
        reserve: &str,
        tx_hash: &str,
    ) -> Result<Option<ReserveCheckpoint>, StoreError> {
        let inner = self.lock();
        Ok(inner
            .checkpoints
            .iter()
            .find(|c| c.reserve == reserve && c.tx_hash == tx_hash)
            .cloned())
    }

    async fn latest_checkpoint_at_or_before(
        &self,
        reserve: &str,
        at: u64,
    ) -> Result<Option<ReserveCheckpoint>, StoreError> {
        let inner = self.lock();
        Ok(inner
            .checkpoints
            .iter()
            .filter(|c| c.reserve == reserve && c.timestamp <= at)
            .max_by_key(|c| (c.timestamp, c.block_number))
            .cloned())
    }

    async fn latest_checkpoint(&self, reserve: &str) -> Result<Option<ReserveCheckpoint>, StoreError> {
        let inner = self.lock();
        Ok(inner
            .checkpoints
            .iter()
            .filter(|c| c.reserve == reserve)
            .max_by_key(|c| (c.timestamp, c.block_number))
            .cloned())
    }

    async fn checkpoints_for_reserve(
        &self,
        reserve: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ReserveCheckpoint>, StoreError> {
        let inner = self.lock();
        let mut rows: Vec<ReserveCheckpoint> = inner
            .checkpoints
            .iter()
            .filter(|c| c.reserve == reserve)
            .cloned()
            .collect();
        rows.sort_by(|a, b| (b.timestamp, b.block_number).cmp(&(a.timestamp, a.block_number)));
        Ok(rows.into_iter().skip(offset).take(limit).collect())
    }

    async fn find_position(&self, user: &str, asset: &str) -> Result<Option<Position>, StoreError> {
        let inner = self.lock();
        Ok(inner.positions.get(&Position::key_for(user, asset)).cloned())
    }

    async fn positions_for_user(&self, user: &str) -> Result<Vec<Position>, StoreError> {
        let inner = self.lock();
        Ok(inner.positions.values().filter(|p| p.user == user).cloned().collect())
    }

    async fn upsert_position(&self, position: Position) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.positions.insert(position.key(), position);
        Ok(())
    }

    async fn delete_position(&self, user: &str, asset: &str) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.positions.remove(&Position::key_for(user, asset));
        Ok(())
    }

    async fn insert_balance_event(&self, event: BalanceEvent) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if inner.balance_events.iter().any(|e| e.id == event.id) {
            return Err(StoreError::new(format!("duplicate balance event id {}", event.id)));
        }
        inner.balance_events.push(event);
        Ok(())
    }

    async fn balance_events_in_transaction(
        &self,
        tx_hash: &str,
        user: &str,
        asset: &str,
        kind: BalanceEventKind,
    ) -> Result<Vec<BalanceEvent>, StoreError> {
        let inner = self.lock();
        Ok(inner
            .balance_events
            .iter()
            .filter(|e| e.tx_hash == tx_hash && e.user == user && e.asset == asset && e.kind == kind)
            .cloned()
            .collect())
    }

    async fn balance_events_in_range(
        &self,
        user: &str,
        asset: &str,
        start: u64,
        end: u64,
    ) -> Result<Vec<BalanceEvent>, StoreError> {
        let inner = self.lock();
        Ok(inner
            .balance_events
            .iter()
            .filter(|e| {
                e.user == user && e.asset == asset && e.timestamp >= start && e.timestamp <= end
            })
            .cloned()
            .collect())
    }

    async fn find_user(&self, user: &str) -> Result<Option<UserRecord>, StoreError> {
        let inner = self.lock();
        Ok(inner.users.get(user).cloned())
    }

    async fn upsert_user(&self, record: UserRecord) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.users.insert(record.id.clone(), record);
        Ok(())
    }

    async fn find_user_deposit(
        &self,
        user: &str,
        token: &str,
    ) -> Result<Option<UserDeposit>, StoreError> {
        let inner = self.lock();
        Ok(inner.user_deposits.get(&UserDeposit::key_for(user, token)).cloned())
    }

    async fn user_deposits(&self, user: &str) -> Result<Vec<UserDeposit>, StoreError> {
        let inner = self.lock();
        Ok(inner.user_deposits.values().filter(|d| d.user == user).cloned().collect())
    }

    async fn upsert_user_deposit(&self, deposit: UserDeposit) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.user_deposits.insert(deposit.key(), deposit);
        Ok(())
    }

    async fn delete_user_deposit(&self, user: &str, token: &str) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.user_deposits.remove(&UserDeposit::key_for(user, token));
        Ok(())
    }

    async fn insert_activity(&self, record: ActivityRecord) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if inner.activity.iter().any(|a| a.id() == record.id()) {
            return Err(StoreError::new(format!("duplicate activity id {}", record.id())));
        }
        inner.activity.push(record);
        Ok(())
    }
}
