//! Per-event ingestion entry point.
//!
//! The external driver decodes chain logs and calls [`process_event`] once
//! per event, in block order. Rate updates append checkpoints; deposits and
//! withdrawals archive the raw event, move the interest-bearing position and
//! the raw deposit aggregate; borrow-side events are archived only — the
//! engine reconstructs depositor balances, not borrow accrual.

use crate::aggregate::apply_deposit_delta;
use crate::error::LedgerError;
use crate::ledger::{apply_balance_change, BalanceChange, ChangeOutcome};
use crate::math::convert::actual_to_scaled;
use crate::math::{Ray, SignedRay};
use crate::oracle::{best_effort_price, PriceOracle};
use crate::resolver::resolve_index;
use crate::state::activity::{
    BorrowActivity, LiquidationActivity, RepayActivity, SupplyActivity, WithdrawActivity,
};
use crate::state::{ActivityRecord, BalanceEventKind, ReserveCheckpoint};
use crate::store::Store;

/// Block and transaction context shared by every event in a log.
#[derive(Clone, Debug, PartialEq)]
pub struct EventMeta {
    /// Transaction hash
    pub tx_hash: String,
    /// Log index within the block, disambiguates events in one transaction
    pub log_index: u64,
    /// Block number
    pub block_number: u64,
    /// Block timestamp, unix seconds
    pub timestamp: u64,
    /// Pool contract the log came from
    pub pool: String,
}

impl EventMeta {
    /// Deterministic row id for records created from this log
    pub fn record_id(&self) -> String {
        format!("{}-{}", self.tx_hash, self.log_index)
    }
}

/// A decoded pool event, as delivered by the subscription runtime.
#[derive(Clone, Debug, PartialEq)]
pub enum PoolEvent {
    /// Underlying supplied to a reserve, credited to `on_behalf_of`
    Supply {
        /// Reserve (underlying asset) address
        reserve: String,
        /// Account that sent the transaction
        user: String,
        /// Account credited with the position
        on_behalf_of: String,
        /// Raw amount in underlying units
        amount: u128,
        /// Referral code carried by the log
        referral_code: u16,
    },
    /// Underlying withdrawn from a reserve, debited from `user`
    Withdraw {
        /// Reserve (underlying asset) address
        reserve: String,
        /// Account debited
        user: String,
        /// Account the tokens were sent to
        to: String,
        /// Raw amount in underlying units
        amount: u128,
    },
    /// Borrow against a reserve (archived only)
    Borrow {
        /// Reserve (underlying asset) address
        reserve: String,
        /// Account that sent the transaction
        user: String,
        /// Account the debt is booked against
        on_behalf_of: String,
        /// Raw amount in underlying units
        amount: u128,
        /// 1 = stable, 2 = variable
        interest_rate_mode: u8,
        /// Borrow rate at the time of the event, ray scale
        borrow_rate: Ray,
        /// Referral code carried by the log
        referral_code: u16,
    },
    /// Debt repayment (archived only)
    Repay {
        /// Reserve (underlying asset) address
        reserve: String,
        /// Account whose debt shrank
        user: String,
        /// Account that paid
        repayer: String,
        /// Raw amount in underlying units
        amount: u128,
        /// True when repaid with interest-bearing tokens
        use_atokens: bool,
    },
    /// Collateral liquidation (archived only)
    LiquidationCall {
        /// Collateral reserve seized from
        collateral_asset: String,
        /// Debt reserve covered
        debt_asset: String,
        /// Liquidated account
        user: String,
        /// Debt covered, underlying units
        debt_to_cover: u128,
        /// Collateral seized, underlying units
        liquidated_collateral_amount: u128,
        /// Liquidator address
        liquidator: String,
        /// True when the liquidator took interest-bearing tokens
        receive_atoken: bool,
    },
    /// Reserve rate/index update — the source of index checkpoints
    ReserveDataUpdated {
        /// Reserve (underlying asset) address
        reserve: String,
        /// Supply-side rate, per annum, ray scale
        liquidity_rate: Ray,
        /// Stable borrow rate, ray scale
        stable_borrow_rate: Ray,
        /// Variable borrow rate, ray scale
        variable_borrow_rate: Ray,
        /// Cumulative supply index, ray scale
        liquidity_index: Ray,
        /// Cumulative variable borrow index, ray scale
        variable_borrow_index: Ray,
    },
}

/// Ingest one decoded pool event.
///
/// Store failures propagate to the driver; oracle failures only cost the
/// stored price.
pub async fn process_event<S: Store, O: PriceOracle>(
    store: &S,
    oracle: &O,
    meta: &EventMeta,
    event: PoolEvent,
) -> Result<(), LedgerError> {
    match event {
        PoolEvent::ReserveDataUpdated {
            reserve,
            liquidity_rate,
            stable_borrow_rate,
            variable_borrow_rate,
            liquidity_index,
            variable_borrow_index,
        } => {
            let price = best_effort_price(oracle, &reserve).await;
            store
                .insert_checkpoint(ReserveCheckpoint {
                    id: meta.record_id(),
                    tx_hash: meta.tx_hash.clone(),
                    pool: meta.pool.clone(),
                    reserve,
                    liquidity_rate,
                    stable_borrow_rate,
                    variable_borrow_rate,
                    liquidity_index,
                    variable_borrow_index,
                    timestamp: meta.timestamp,
                    block_number: meta.block_number,
                    price,
                })
                .await?;
        }

        PoolEvent::Supply { reserve, user, on_behalf_of, amount, referral_code } => {
            let price = best_effort_price(oracle, &reserve).await;
            store
                .insert_activity(ActivityRecord::Supply(SupplyActivity {
                    id: meta.record_id(),
                    tx_hash: meta.tx_hash.clone(),
                    pool: meta.pool.clone(),
                    reserve: reserve.clone(),
                    user,
                    on_behalf_of: on_behalf_of.clone(),
                    amount,
                    referral_code,
                    timestamp: meta.timestamp,
                    price,
                }))
                .await?;

            let scaled = scale_amount(store, &reserve, amount, meta).await?;
            move_position(
                store,
                meta,
                &on_behalf_of,
                &reserve,
                SignedRay::positive(scaled),
                BalanceEventKind::Deposit,
            )
            .await?;
            apply_deposit_delta(store, &on_behalf_of, &reserve, to_signed(amount)?, meta.timestamp)
                .await?;
        }

        PoolEvent::Withdraw { reserve, user, to, amount } => {
            let price = best_effort_price(oracle, &reserve).await;
            store
                .insert_activity(ActivityRecord::Withdraw(WithdrawActivity {
                    id: meta.record_id(),
                    tx_hash: meta.tx_hash.clone(),
                    pool: meta.pool.clone(),
                    reserve: reserve.clone(),
                    user: user.clone(),
                    to,
                    amount,
                    timestamp: meta.timestamp,
                    price,
                }))
                .await?;

            let scaled = scale_amount(store, &reserve, amount, meta).await?;
            move_position(
                store,
                meta,
                &user,
                &reserve,
                SignedRay::negative(scaled),
                BalanceEventKind::Withdraw,
            )
            .await?;
            apply_deposit_delta(store, &user, &reserve, -to_signed(amount)?, meta.timestamp).await?;
        }

        PoolEvent::Borrow {
            reserve,
            user,
            on_behalf_of,
            amount,
            interest_rate_mode,
            borrow_rate,
            referral_code,
        } => {
            let price = best_effort_price(oracle, &reserve).await;
            store
                .insert_activity(ActivityRecord::Borrow(BorrowActivity {
                    id: meta.record_id(),
                    tx_hash: meta.tx_hash.clone(),
                    pool: meta.pool.clone(),
                    reserve,
                    user,
                    on_behalf_of,
                    amount,
                    interest_rate_mode,
                    borrow_rate,
                    referral_code,
                    timestamp: meta.timestamp,
                    price,
                }))
                .await?;
        }

        PoolEvent::Repay { reserve, user, repayer, amount, use_atokens } => {
            let price = best_effort_price(oracle, &reserve).await;
            store
                .insert_activity(ActivityRecord::Repay(RepayActivity {
                    id: meta.record_id(),
                    tx_hash: meta.tx_hash.clone(),
                    pool: meta.pool.clone(),
                    reserve,
                    user,
                    repayer,
                    amount,
                    use_atokens,
                    timestamp: meta.timestamp,
                    price,
                }))
                .await?;
        }

        PoolEvent::LiquidationCall {
            collateral_asset,
            debt_asset,
            user,
            debt_to_cover,
            liquidated_collateral_amount,
            liquidator,
            receive_atoken,
        } => {
            let price_collateral = best_effort_price(oracle, &collateral_asset).await;
            let price_debt = best_effort_price(oracle, &debt_asset).await;
            store
                .insert_activity(ActivityRecord::Liquidation(LiquidationActivity {
                    id: meta.record_id(),
                    tx_hash: meta.tx_hash.clone(),
                    pool: meta.pool.clone(),
                    collateral_asset,
                    debt_asset,
                    user,
                    debt_to_cover,
                    liquidated_collateral_amount,
                    liquidator,
                    receive_atoken,
                    timestamp: meta.timestamp,
                    price_collateral,
                    price_debt,
                }))
                .await?;
        }
    }
    Ok(())
}

/// Convert a raw underlying amount into scaled units at the index in effect
/// for this event's transaction.
async fn scale_amount<S: Store>(
    store: &S,
    reserve: &str,
    amount: u128,
    meta: &EventMeta,
) -> Result<Ray, LedgerError> {
    let index = resolve_index(store, reserve, meta.timestamp, Some(&meta.tx_hash)).await;
    actual_to_scaled(Ray::from_scaled_val(amount), index)
}

async fn move_position<S: Store>(
    store: &S,
    meta: &EventMeta,
    user: &str,
    asset: &str,
    scaled_delta: SignedRay,
    kind: BalanceEventKind,
) -> Result<(), LedgerError> {
    let change = BalanceChange {
        user: user.to_string(),
        asset: asset.to_string(),
        scaled_delta,
        kind,
        timestamp: meta.timestamp,
        tx_hash: meta.tx_hash.clone(),
        block_number: meta.block_number,
        log_index: meta.log_index,
    };
    if let ChangeOutcome::Duplicate = apply_balance_change(store, &change).await? {
        log::info!("position unchanged for duplicate event {}", meta.record_id());
    }
    Ok(())
}

fn to_signed(amount: u128) -> Result<i128, LedgerError> {
    i128::try_from(amount).map_err(|_| LedgerError::MathOverflow)
}
