//! Raw net-deposit aggregation, independent of interest accrual.
//!
//! A parallel ledger answering "how much of each token does this user hold,
//! deposits minus withdrawals" without any index applied, plus the count of
//! distinct tokens the user currently holds.

use crate::error::LedgerError;
use crate::state::{UserDeposit, UserRecord};
use crate::store::Store;

/// Apply a signed raw-amount delta to the `(user, token)` deposit row.
///
/// Positive deltas create or grow the row; a delta that empties the row
/// deletes it and decrements the user's token count. A delta that would go
/// below zero is an upstream inconsistency: logged, the row removed, and
/// processing continues.
pub async fn apply_deposit_delta<S: Store>(
    store: &S,
    user: &str,
    token: &str,
    amount_delta: i128,
    timestamp: u64,
) -> Result<(), LedgerError> {
    ensure_user_exists(store, user, timestamp).await?;

    let existing = store.find_user_deposit(user, token).await?;
    match existing {
        Some(deposit) => {
            if amount_delta >= 0 {
                let new_balance = deposit
                    .current_balance
                    .checked_add(amount_delta.unsigned_abs())
                    .ok_or(LedgerError::MathOverflow)?;
                store
                    .upsert_user_deposit(UserDeposit {
                        current_balance: new_balance,
                        last_updated: timestamp,
                        ..deposit
                    })
                    .await?;
            } else {
                let withdrawn = amount_delta.unsigned_abs();
                if withdrawn < deposit.current_balance {
                    store
                        .upsert_user_deposit(UserDeposit {
                            current_balance: deposit.current_balance - withdrawn,
                            last_updated: timestamp,
                            ..deposit
                        })
                        .await?;
                } else {
                    if withdrawn > deposit.current_balance {
                        log::warn!(
                            "deposit balance for user {user} token {token} would go negative \
                             ({} - {withdrawn}); removing record",
                            deposit.current_balance
                        );
                    } else {
                        log::info!("removing zero balance deposit record for user {user} token {token}");
                    }
                    store.delete_user_deposit(user, token).await?;
                    decrement_deposit_count(store, user, timestamp).await?;
                }
            }
        }
        None if amount_delta > 0 => {
            store
                .upsert_user_deposit(UserDeposit {
                    user: user.to_string(),
                    token: token.to_string(),
                    current_balance: amount_delta.unsigned_abs(),
                    last_updated: timestamp,
                })
                .await?;
            increment_deposit_count(store, user, timestamp).await?;
        }
        None => {
            log::warn!(
                "withdrawal of {amount_delta} for user {user} token {token} with no tracked deposit"
            );
        }
    }
    Ok(())
}

async fn ensure_user_exists<S: Store>(store: &S, user: &str, timestamp: u64) -> Result<(), LedgerError> {
    if store.find_user(user).await?.is_none() {
        store
            .upsert_user(UserRecord {
                id: user.to_string(),
                total_deposit_count: 0,
                last_updated: timestamp,
            })
            .await?;
    }
    Ok(())
}

async fn increment_deposit_count<S: Store>(store: &S, user: &str, timestamp: u64) -> Result<(), LedgerError> {
    if let Some(record) = store.find_user(user).await? {
        store
            .upsert_user(UserRecord {
                total_deposit_count: record.total_deposit_count + 1,
                last_updated: timestamp,
                ..record
            })
            .await?;
    }
    Ok(())
}

async fn decrement_deposit_count<S: Store>(store: &S, user: &str, timestamp: u64) -> Result<(), LedgerError> {
    if let Some(record) = store.find_user(user).await? {
        if record.total_deposit_count > 0 {
            store
                .upsert_user(UserRecord {
                    total_deposit_count: record.total_deposit_count - 1,
                    last_updated: timestamp,
                    ..record
                })
                .await?;
        }
    }
    Ok(())
}
