//! The position ledger: applies scaled-balance deltas and serves reads.
//!
//! Writes are driven by the event processor, one event at a time; reads
//! never trust the stored actual balance and re-derive it from the freshest
//! resolvable index.

use crate::error::LedgerError;
use crate::math::convert::scaled_to_actual;
use crate::math::{Ray, SignedRay, TryAdd};
use crate::resolver::resolve_index;
use crate::state::{BalanceEvent, BalanceEventKind, Position, PositionView};
use crate::store::Store;

/// One balance-affecting operation, as handed to the ledger.
#[derive(Clone, Debug, PartialEq)]
pub struct BalanceChange {
    /// Account whose position changes
    pub user: String,
    /// Reserve (underlying asset) address
    pub asset: String,
    /// Signed scaled-balance delta
    pub scaled_delta: SignedRay,
    /// Operation kind
    pub kind: BalanceEventKind,
    /// Block timestamp, unix seconds
    pub timestamp: u64,
    /// Transaction that carried the event
    pub tx_hash: String,
    /// Block number
    pub block_number: u64,
    /// Log index within the transaction, disambiguates repeated events
    pub log_index: u64,
}

impl BalanceChange {
    fn event_id(&self) -> String {
        format!(
            "{}_{}_{}_{}_{}_{}",
            self.tx_hash,
            self.user,
            self.asset,
            self.kind.as_str(),
            self.timestamp,
            self.log_index
        )
    }
}

/// What applying a balance change did.
#[derive(Clone, Debug, PartialEq)]
pub enum ChangeOutcome {
    /// An identical event was already recorded; nothing changed
    Duplicate,
    /// The change was applied
    Applied(AppliedChange),
}

/// Details of an applied change.
#[derive(Clone, Debug, PartialEq)]
pub struct AppliedChange {
    /// Scaled balance after the change
    pub scaled_balance: Ray,
    /// Actual balance after the change, at the resolved index
    pub actual_balance: Ray,
    /// Index the change was valued at
    pub liquidity_index: Ray,
    /// True when the delta would have driven the balance negative
    pub clamped: bool,
    /// True when the position row was deleted (balance reached zero)
    pub position_closed: bool,
}

/// Apply a signed scaled-balance delta to a user/asset position.
///
/// Re-submitting an event with the same `(tx_hash, user, asset, kind,
/// scaled_delta)` is a detected no-op. A delta that would drive the scaled
/// balance negative clamps to zero and is flagged; halting ingestion on one
/// bad upstream event would lose everything behind it. Store failures
/// propagate — retrying is the event driver's call.
pub async fn apply_balance_change<S: Store>(
    store: &S,
    change: &BalanceChange,
) -> Result<ChangeOutcome, LedgerError> {
    if is_duplicate(store, change).await {
        log::info!(
            "skipping duplicate balance event: tx {} user {} asset {} kind {} delta {}",
            change.tx_hash,
            change.user,
            change.asset,
            change.kind,
            change.scaled_delta
        );
        return Ok(ChangeOutcome::Duplicate);
    }

    let index = resolve_index(store, &change.asset, change.timestamp, Some(&change.tx_hash)).await;

    let existing = store.find_position(&change.user, &change.asset).await?;
    let (previous_scaled, mut total_deposits, mut total_withdrawals) = match &existing {
        Some(position) => (position.scaled_balance, position.total_deposits, position.total_withdrawals),
        None => (Ray::zero(), Ray::zero(), Ray::zero()),
    };

    // Both accumulators grow by the actual value moved, whatever sign
    // convention the caller used for the delta.
    let moved_actual = scaled_to_actual(change.scaled_delta.abs(), index)?;
    if change.kind.is_inflow() {
        total_deposits = total_deposits.try_add(moved_actual)?;
    } else {
        total_withdrawals = total_withdrawals.try_add(moved_actual)?;
    }

    let (new_scaled, clamped) = match change.scaled_delta.checked_apply(previous_scaled)? {
        Some(balance) => (balance, false),
        None => {
            log::error!(
                "negative scaled balance for user {} asset {}: delta {} against {} (tx {}); clamping to zero",
                change.user,
                change.asset,
                change.scaled_delta,
                previous_scaled,
                change.tx_hash
            );
            (Ray::zero(), true)
        }
    };

    let new_actual = scaled_to_actual(new_scaled, index)?;

    store
        .insert_balance_event(BalanceEvent {
            id: change.event_id(),
            tx_hash: change.tx_hash.clone(),
            user: change.user.clone(),
            asset: change.asset.clone(),
            scaled_balance: new_scaled,
            scaled_delta: change.scaled_delta,
            kind: change.kind,
            timestamp: change.timestamp,
            block_number: change.block_number,
            liquidity_index: index,
        })
        .await?;

    let position_closed = new_scaled.is_zero();
    if position_closed {
        if existing.is_some() {
            store.delete_position(&change.user, &change.asset).await?;
        }
    } else {
        store
            .upsert_position(Position {
                user: change.user.clone(),
                asset: change.asset.clone(),
                scaled_balance: new_scaled,
                actual_balance: new_actual,
                total_deposits,
                total_withdrawals,
                last_updated: change.timestamp,
                last_liquidity_index: index,
            })
            .await?;
    }

    Ok(ChangeOutcome::Applied(AppliedChange {
        scaled_balance: new_scaled,
        actual_balance: new_actual,
        liquidity_index: index,
        clamped,
        position_closed,
    }))
}

async fn is_duplicate<S: Store>(store: &S, change: &BalanceChange) -> bool {
    match store
        .balance_events_in_transaction(&change.tx_hash, &change.user, &change.asset, change.kind)
        .await
    {
        Ok(events) => events.iter().any(|event| event.scaled_delta == change.scaled_delta),
        Err(err) => {
            // Better to risk one double-count than to drop the event.
            log::warn!("duplicate check failed for tx {}: {err}; allowing event through", change.tx_hash);
            false
        }
    }
}

/// Current position for one user/asset pair, or `None` when no row exists.
///
/// The actual balance is recomputed against the index resolved at
/// `query_timestamp`, not read from the stored cache.
pub async fn position<S: Store>(
    store: &S,
    user: &str,
    asset: &str,
    query_timestamp: u64,
) -> Result<Option<PositionView>, LedgerError> {
    let Some(stored) = store.find_position(user, asset).await? else {
        return Ok(None);
    };
    let index = resolve_index(store, asset, query_timestamp, None).await;
    view_of(&stored, index).map(Some)
}

/// All current positions for a user, each valued at `query_timestamp`.
pub async fn positions<S: Store>(
    store: &S,
    user: &str,
    query_timestamp: u64,
) -> Result<Vec<PositionView>, LedgerError> {
    let stored = store.positions_for_user(user).await?;
    let mut views = Vec::with_capacity(stored.len());
    for position in &stored {
        let index = resolve_index(store, &position.asset, query_timestamp, None).await;
        views.push(view_of(position, index)?);
    }
    Ok(views)
}

fn view_of(position: &Position, index: Ray) -> Result<PositionView, LedgerError> {
    let actual_balance = scaled_to_actual(position.scaled_balance, index)?;
    // yield = actual - (deposits - withdrawals), kept in unsigned space
    let gross = actual_balance.try_add(position.total_withdrawals)?;
    let current_yield = SignedRay::diff(gross, position.total_deposits);
    Ok(PositionView {
        user: position.user.clone(),
        asset: position.asset.clone(),
        scaled_balance: position.scaled_balance,
        actual_balance,
        total_deposits: position.total_deposits,
        total_withdrawals: position.total_withdrawals,
        last_updated: position.last_updated,
        current_yield,
    })
}

/// Interest a constant scaled balance earned between two instants.
#[derive(Clone, Debug, PartialEq)]
pub struct InterestEarnings {
    /// Earnings over the window (end balance minus start balance)
    pub interest: SignedRay,
    /// Index resolved at the window start
    pub start_index: Ray,
    /// Index resolved at the window end
    pub end_index: Ray,
}

/// Value a scaled balance at both ends of a time window and report the
/// difference.
pub async fn interest_earned_between<S: Store>(
    store: &S,
    asset: &str,
    scaled_balance: Ray,
    start_timestamp: u64,
    end_timestamp: u64,
) -> Result<InterestEarnings, LedgerError> {
    let start_index = resolve_index(store, asset, start_timestamp, None).await;
    let end_index = resolve_index(store, asset, end_timestamp, None).await;
    let start_balance = scaled_to_actual(scaled_balance, start_index)?;
    let end_balance = scaled_to_actual(scaled_balance, end_index)?;
    Ok(InterestEarnings {
        interest: SignedRay::diff(end_balance, start_balance),
        start_index,
        end_index,
    })
}

/// Net deposits for a user/asset inside `[start, end]`: the signed sum of
/// each recorded event's actual value at the index it was valued with.
pub async fn net_deposits_between<S: Store>(
    store: &S,
    user: &str,
    asset: &str,
    start_timestamp: u64,
    end_timestamp: u64,
) -> Result<SignedRay, LedgerError> {
    let events = store
        .balance_events_in_range(user, asset, start_timestamp, end_timestamp)
        .await?;
    let mut inflow = Ray::zero();
    let mut outflow = Ray::zero();
    for event in &events {
        let actual = scaled_to_actual(event.scaled_delta.abs(), event.liquidity_index)?;
        if event.kind.is_inflow() {
            inflow = inflow.try_add(actual)?;
        } else {
            outflow = outflow.try_add(actual)?;
        }
    }
    Ok(SignedRay::diff(inflow, outflow))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::math::common::{RAY, SECONDS_PER_YEAR};
    use crate::state::ReserveCheckpoint;
    use crate::store::MemoryStore;

    const DAI: &str = "0xdai";
    const ALICE: &str = "0xalice";

    fn rate_update(id: &str, tx_hash: &str, index: Ray, rate: Ray, timestamp: u64) -> ReserveCheckpoint {
        ReserveCheckpoint {
            id: id.to_string(),
            tx_hash: tx_hash.to_string(),
            pool: "0xpool".to_string(),
            reserve: DAI.to_string(),
            liquidity_rate: rate,
            stable_borrow_rate: Ray::zero(),
            variable_borrow_rate: Ray::zero(),
            liquidity_index: index,
            variable_borrow_index: Ray::one(),
            timestamp,
            block_number: timestamp,
            price: None,
        }
    }

    fn deposit(scaled: u128, tx_hash: &str, timestamp: u64, log_index: u64) -> BalanceChange {
        BalanceChange {
            user: ALICE.to_string(),
            asset: DAI.to_string(),
            scaled_delta: SignedRay::positive(Ray::from_scaled_val(scaled)),
            kind: BalanceEventKind::Deposit,
            timestamp,
            tx_hash: tx_hash.to_string(),
            block_number: timestamp,
            log_index,
        }
    }

    fn withdraw(scaled: u128, tx_hash: &str, timestamp: u64, log_index: u64) -> BalanceChange {
        BalanceChange {
            scaled_delta: SignedRay::negative(Ray::from_scaled_val(scaled)),
            kind: BalanceEventKind::Withdraw,
            ..deposit(0, tx_hash, timestamp, log_index)
        }
    }

    fn applied(outcome: ChangeOutcome) -> AppliedChange {
        match outcome {
            ChangeOutcome::Applied(applied) => applied,
            ChangeOutcome::Duplicate => panic!("expected an applied change"),
        }
    }

    #[tokio::test]
    async fn deposit_to_empty_position() {
        let store = MemoryStore::new();
        let outcome = applied(
            apply_balance_change(&store, &deposit(1_000, "0xtx1", 0, 0)).await.unwrap(),
        );
        assert_eq!(outcome.scaled_balance, Ray::from_scaled_val(1_000));
        assert!(!outcome.clamped);

        let stored = store.find_position(ALICE, DAI).await.unwrap().unwrap();
        assert_eq!(stored.scaled_balance, Ray::from_scaled_val(1_000));
        // No checkpoints: valued at the default index, so deposits equal the
        // scaled amount and withdrawals are untouched.
        assert_eq!(stored.total_deposits, Ray::from_scaled_val(1_000));
        assert_eq!(stored.total_withdrawals, Ray::zero());
        assert_eq!(stored.last_liquidity_index, Ray::one());
    }

    #[tokio::test]
    async fn full_withdrawal_deletes_the_row() {
        let store = MemoryStore::new();
        apply_balance_change(&store, &deposit(1_000, "0xtx1", 0, 0)).await.unwrap();
        let outcome = applied(
            apply_balance_change(&store, &withdraw(1_000, "0xtx2", 10, 0)).await.unwrap(),
        );
        assert!(outcome.position_closed);
        assert_eq!(outcome.scaled_balance, Ray::zero());
        assert!(store.find_position(ALICE, DAI).await.unwrap().is_none());
        // Both events remain in the audit log.
        assert_eq!(store.balance_event_count(), 2);
    }

    #[tokio::test]
    async fn duplicate_submission_is_a_no_op() {
        let store = MemoryStore::new();
        let change = deposit(1_000, "0xtx1", 0, 0);
        apply_balance_change(&store, &change).await.unwrap();
        let second = apply_balance_change(&store, &change).await.unwrap();
        assert_eq!(second, ChangeOutcome::Duplicate);

        let stored = store.find_position(ALICE, DAI).await.unwrap().unwrap();
        assert_eq!(stored.scaled_balance, Ray::from_scaled_val(1_000));
        assert_eq!(store.balance_event_count(), 1);
    }

    #[tokio::test]
    async fn same_transaction_can_carry_distinct_events() {
        let store = MemoryStore::new();
        apply_balance_change(&store, &deposit(1_000, "0xtx1", 0, 0)).await.unwrap();
        // Same transaction, same kind, different delta: not a duplicate.
        apply_balance_change(&store, &deposit(500, "0xtx1", 0, 1)).await.unwrap();
        let stored = store.find_position(ALICE, DAI).await.unwrap().unwrap();
        assert_eq!(stored.scaled_balance, Ray::from_scaled_val(1_500));
        assert_eq!(store.balance_event_count(), 2);
    }

    #[tokio::test]
    async fn overdraw_clamps_to_zero_and_flags() {
        let store = MemoryStore::new();
        apply_balance_change(&store, &deposit(1_000, "0xtx1", 0, 0)).await.unwrap();
        let outcome = applied(
            apply_balance_change(&store, &withdraw(1_500, "0xtx2", 10, 0)).await.unwrap(),
        );
        assert!(outcome.clamped);
        assert_eq!(outcome.scaled_balance, Ray::zero());
        assert!(outcome.position_closed);
        assert!(store.find_position(ALICE, DAI).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn withdrawals_accumulate_with_absolute_value() {
        let store = MemoryStore::new();
        apply_balance_change(&store, &deposit(1_000, "0xtx1", 0, 0)).await.unwrap();
        apply_balance_change(&store, &withdraw(400, "0xtx2", 10, 0)).await.unwrap();
        let stored = store.find_position(ALICE, DAI).await.unwrap().unwrap();
        assert_eq!(stored.total_deposits, Ray::from_scaled_val(1_000));
        assert_eq!(stored.total_withdrawals, Ray::from_scaled_val(400));
        assert_eq!(stored.scaled_balance, Ray::from_scaled_val(600));
    }

    #[tokio::test]
    async fn read_revalues_against_fresh_index() {
        let store = MemoryStore::new();
        store
            .insert_checkpoint(rate_update("a", "0xtx0", Ray::one(), Ray::from_percent(1_000), 0))
            .await
            .unwrap();
        apply_balance_change(&store, &deposit(1_000, "0xtx1", 0, 0)).await.unwrap();

        let half_year = SECONDS_PER_YEAR / 2;
        let view = position(&store, ALICE, DAI, half_year).await.unwrap().unwrap();
        // 10% for half a year on 1000 units.
        assert_eq!(view.actual_balance, Ray::from_scaled_val(1_050));
        assert_eq!(view.current_yield, SignedRay::positive(Ray::from_scaled_val(50)));
        assert_eq!(view.scaled_balance, Ray::from_scaled_val(1_000));

        let all = positions(&store, ALICE, half_year).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0], view);
    }

    #[tokio::test]
    async fn missing_position_reads_as_none() {
        let store = MemoryStore::new();
        assert!(position(&store, ALICE, DAI, 0).await.unwrap().is_none());
        assert!(positions(&store, ALICE, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn earnings_window_values_both_endpoints() {
        let store = MemoryStore::new();
        store
            .insert_checkpoint(rate_update("a", "0xtx0", Ray::one(), Ray::from_percent(500), 0))
            .await
            .unwrap();
        let earnings = interest_earned_between(
            &store,
            DAI,
            Ray::from_scaled_val(RAY), // one whole token at ray scale
            0,
            SECONDS_PER_YEAR,
        )
        .await
        .unwrap();
        assert_eq!(earnings.start_index, Ray::one());
        assert_eq!(earnings.end_index, Ray::from_scaled_val(RAY + RAY / 20));
        assert_eq!(earnings.interest, SignedRay::positive(Ray::from_scaled_val(RAY / 20)));
    }

    #[tokio::test]
    async fn net_deposits_window_sums_signed_deltas() {
        let store = MemoryStore::new();
        apply_balance_change(&store, &deposit(1_000, "0xtx1", 100, 0)).await.unwrap();
        apply_balance_change(&store, &withdraw(300, "0xtx2", 200, 0)).await.unwrap();
        apply_balance_change(&store, &deposit(50, "0xtx3", 900, 0)).await.unwrap();

        let net = net_deposits_between(&store, ALICE, DAI, 0, 500).await.unwrap();
        assert_eq!(net, SignedRay::positive(Ray::from_scaled_val(700)));

        let all = net_deposits_between(&store, ALICE, DAI, 0, 1_000).await.unwrap();
        assert_eq!(all, SignedRay::positive(Ray::from_scaled_val(750)));
    }
}
