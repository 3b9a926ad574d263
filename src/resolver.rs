//! Liquidity-index resolution.
//!
//! Answers "what is the liquidity index for reserve R at time T" from the
//! sparse checkpoint history: the checkpoint written by the same transaction
//! wins outright, otherwise the latest checkpoint at or before T anchors a
//! linear extrapolation at the checkpoint's rate. A failed index lookup
//! would stall the whole ingestion pipeline behind one event, so this module
//! converts every failure into the 1.0 ray default instead of raising.

use crate::error::LedgerError;
use crate::math::common::SECONDS_PER_YEAR;
use crate::math::{Ray, TryAdd, TryDiv, TryMul};
use crate::state::is_sane_liquidity_index;
use crate::store::Store;

/// Resolve the liquidity index for `reserve` at `target_timestamp`.
///
/// `current_tx_hash` is passed when valuing a balance-changing event so a
/// rate update emitted in the same transaction is honored even though the
/// two rows may be persisted in either order. Never fails; degraded lookups
/// resolve to 1.0 ray.
pub async fn resolve_index<S: Store>(
    store: &S,
    reserve: &str,
    target_timestamp: u64,
    current_tx_hash: Option<&str>,
) -> Ray {
    match resolve_index_inner(store, reserve, target_timestamp, current_tx_hash).await {
        Ok(index) => index,
        Err(err) => {
            log::error!(
                "index resolution failed for reserve {reserve} at {target_timestamp}: {err}; using default index"
            );
            Ray::one()
        }
    }
}

async fn resolve_index_inner<S: Store>(
    store: &S,
    reserve: &str,
    target_timestamp: u64,
    current_tx_hash: Option<&str>,
) -> Result<Ray, LedgerError> {
    if let Some(tx_hash) = current_tx_hash {
        if let Some(checkpoint) = store.checkpoint_in_transaction(reserve, tx_hash).await? {
            log::debug!(
                "same-transaction rate update found for reserve {reserve}, using its index {}",
                checkpoint.liquidity_index
            );
            return Ok(checkpoint.liquidity_index);
        }
    }

    let checkpoint = match store.latest_checkpoint_at_or_before(reserve, target_timestamp).await? {
        Some(checkpoint) => checkpoint,
        None => {
            // Retroactive queries (tx hash supplied) must not peek past the
            // target instant; current queries take whatever is freshest known.
            if current_tx_hash.is_none() {
                if let Some(checkpoint) = store.latest_checkpoint(reserve).await? {
                    log::debug!(
                        "no checkpoint at or before {target_timestamp} for reserve {reserve}, using freshest known"
                    );
                    return Ok(checkpoint.liquidity_index);
                }
            }
            log::warn!("no checkpoint recorded for reserve {reserve}, using default index");
            return Ok(Ray::one());
        }
    };

    let base_index = checkpoint.liquidity_index;
    if !checkpoint.has_sane_index() {
        log::warn!(
            "checkpoint {} carries liquidity index {base_index} outside sanity bounds, using default index",
            checkpoint.id
        );
        return Ok(Ray::one());
    }

    if checkpoint.timestamp == target_timestamp {
        return Ok(base_index);
    }

    // Simple (linear) interest since the checkpoint:
    // factor = rate * elapsed / SECONDS_PER_YEAR, index' = index * (1 + factor)
    let elapsed = target_timestamp - checkpoint.timestamp;
    let interest_factor = checkpoint
        .liquidity_rate
        .try_mul(Ray::from_scaled_val(u128::from(elapsed)))?
        .try_div(Ray::from_scaled_val(u128::from(SECONDS_PER_YEAR)))?;
    let growth_factor = Ray::one().try_add(interest_factor)?;
    let extrapolated = base_index.try_mul(growth_factor)?;

    if !is_sane_liquidity_index(extrapolated) {
        log::warn!(
            "extrapolated liquidity index {extrapolated} for reserve {reserve} is out of bounds, keeping checkpoint index"
        );
        return Ok(base_index);
    }

    Ok(extrapolated)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::math::common::RAY;
    use crate::state::checkpoint::MAX_SANE_INDEX;
    use crate::state::ReserveCheckpoint;
    use crate::store::MemoryStore;

    fn checkpoint(id: &str, tx_hash: &str, index: Ray, rate: Ray, timestamp: u64) -> ReserveCheckpoint {
        ReserveCheckpoint {
            id: id.to_string(),
            tx_hash: tx_hash.to_string(),
            pool: "0xpool".to_string(),
            reserve: "0xdai".to_string(),
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

    #[tokio::test]
    async fn empty_history_resolves_to_default() {
        let store = MemoryStore::new();
        assert_eq!(resolve_index(&store, "0xdai", 1_000, None).await, Ray::one());
    }

    #[tokio::test]
    async fn same_transaction_checkpoint_wins() {
        let store = MemoryStore::new();
        let older = checkpoint("a", "0xtx1", Ray::from_scaled_val(RAY + RAY / 100), Ray::zero(), 900);
        let in_tx = checkpoint("b", "0xtx2", Ray::from_scaled_val(RAY + RAY / 50), Ray::zero(), 2_000);
        store.insert_checkpoint(older).await.unwrap();
        store.insert_checkpoint(in_tx.clone()).await.unwrap();

        // The older checkpoint is closer to the target, but the one emitted
        // by the same transaction is authoritative.
        let resolved = resolve_index(&store, "0xdai", 1_000, Some("0xtx2")).await;
        assert_eq!(resolved, in_tx.liquidity_index);
    }

    #[tokio::test]
    async fn one_year_at_five_percent_is_exact() {
        let store = MemoryStore::new();
        store
            .insert_checkpoint(checkpoint("a", "0xtx1", Ray::one(), Ray::from_percent(500), 0))
            .await
            .unwrap();

        let resolved = resolve_index(&store, "0xdai", SECONDS_PER_YEAR, None).await;
        assert_eq!(resolved, Ray::from_scaled_val(RAY + RAY / 20)); // 1.05 exactly
    }

    #[tokio::test]
    async fn matching_timestamp_skips_extrapolation() {
        let store = MemoryStore::new();
        let index = Ray::from_scaled_val(RAY + RAY / 10);
        store
            .insert_checkpoint(checkpoint("a", "0xtx1", index, Ray::from_percent(500), 5_000))
            .await
            .unwrap();
        assert_eq!(resolve_index(&store, "0xdai", 5_000, None).await, index);
    }

    #[tokio::test]
    async fn current_query_falls_back_to_freshest_checkpoint() {
        let store = MemoryStore::new();
        let index = Ray::from_scaled_val(RAY + RAY / 25);
        store
            .insert_checkpoint(checkpoint("a", "0xtx1", index, Ray::from_percent(500), 9_000))
            .await
            .unwrap();

        // Target predates every checkpoint: a current query uses the freshest
        // known index, a retroactive one degrades to the default.
        assert_eq!(resolve_index(&store, "0xdai", 1_000, None).await, index);
        assert_eq!(resolve_index(&store, "0xdai", 1_000, Some("0xother")).await, Ray::one());
    }

    #[tokio::test]
    async fn corrupt_index_resolves_to_default() {
        let store = MemoryStore::new();
        store
            .insert_checkpoint(checkpoint(
                "a",
                "0xtx1",
                Ray::from_scaled_val(MAX_SANE_INDEX + 1),
                Ray::from_percent(500),
                0,
            ))
            .await
            .unwrap();
        assert_eq!(resolve_index(&store, "0xdai", 1_000, None).await, Ray::one());
    }

    #[tokio::test]
    async fn implausible_extrapolation_keeps_checkpoint_index() {
        let store = MemoryStore::new();
        // 1000000% per annum over a decade extrapolates far past the bound.
        let index = Ray::from_scaled_val(RAY + RAY / 10);
        store
            .insert_checkpoint(checkpoint("a", "0xtx1", index, Ray::from_percent(100_000_000), 0))
            .await
            .unwrap();
        let ten_years = SECONDS_PER_YEAR * 10;
        assert_eq!(resolve_index(&store, "0xdai", ten_years, None).await, index);
    }
}
