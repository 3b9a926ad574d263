//! Transport-free read surface.
//!
//! Typed counterparts of the query endpoints: each function validates its
//! parameters before touching the store, and every monetary value crosses
//! the boundary twice — as a base-10 integer string (no precision loss) and
//! as a human-readable decimal string. The HTTP/GraphQL layer on top is a
//! thin formatter over these results.

#![allow(missing_docs)]

use core::fmt;
use std::collections::BTreeMap;

use primitive_types::U256;
use serde::Serialize;

use crate::error::LedgerError;
use crate::ledger;
use crate::math::common::{RAY, SCALE};
use crate::math::{Ray, SignedRay};
use crate::resolver::resolve_index;
use crate::state::PositionView;
use crate::store::Store;

/// Maximum page size accepted by history endpoints
pub const MAX_PAGE_LIMIT: usize = 1_000;

/// A rejected request, carrying the HTTP-equivalent status code.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ApiError {
    InvalidAddress(String),
    InvalidTimestamp(String),
    InvalidPagination(String),
    Internal(String),
}

impl ApiError {
    /// HTTP-equivalent status code
    pub fn status(&self) -> u16 {
        match self {
            ApiError::InvalidAddress(_)
            | ApiError::InvalidTimestamp(_)
            | ApiError::InvalidPagination(_) => 400,
            ApiError::Internal(_) => 500,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::InvalidAddress(value) => write!(f, "invalid address format: {value}"),
            ApiError::InvalidTimestamp(value) => write!(f, "invalid timestamp parameter: {value}"),
            ApiError::InvalidPagination(reason) => write!(f, "invalid pagination: {reason}"),
            ApiError::Internal(reason) => write!(f, "internal error: {reason}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

/// Reject anything that is not a 0x-prefixed 40-hex-digit address.
pub fn validate_address(address: &str) -> Result<(), ApiError> {
    let rest = address
        .strip_prefix("0x")
        .ok_or_else(|| ApiError::InvalidAddress(address.to_string()))?;
    if rest.len() != 40 || !rest.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ApiError::InvalidAddress(address.to_string()));
    }
    Ok(())
}

/// Parse a timestamp query parameter.
pub fn parse_timestamp(value: &str) -> Result<u64, ApiError> {
    value.parse::<u64>().map_err(|_| ApiError::InvalidTimestamp(value.to_string()))
}

/// Validated pagination window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub limit: usize,
    pub offset: usize,
}

impl Pagination {
    /// Accept a window with `limit` in `1..=MAX_PAGE_LIMIT`
    pub fn new(limit: usize, offset: usize) -> Result<Self, ApiError> {
        if limit == 0 || limit > MAX_PAGE_LIMIT {
            return Err(ApiError::InvalidPagination(format!(
                "limit must be between 1 and {MAX_PAGE_LIMIT}, got {limit}"
            )));
        }
        Ok(Self { limit, offset })
    }

    /// Parse and validate raw query parameters
    pub fn parse(limit: &str, offset: &str) -> Result<Self, ApiError> {
        let limit = limit
            .parse::<usize>()
            .map_err(|_| ApiError::InvalidPagination(format!("non-numeric limit {limit}")))?;
        let offset = offset
            .parse::<usize>()
            .map_err(|_| ApiError::InvalidPagination(format!("non-numeric offset {offset}")))?;
        Self::new(limit, offset)
    }
}

/// Render a ray value as a decimal string with 18 fractional digits.
pub fn format_ray(value: Ray) -> String {
    format_ray_with(value, 18)
}

/// Render a ray value with a chosen number of fractional digits (at most 27).
pub fn format_ray_with(value: Ray, decimals: usize) -> String {
    let decimals = decimals.min(SCALE);
    let divisor = U256::from(10u64).pow(U256::from(decimals as u64));
    let scaled = value.0 / (U256::from(RAY) / divisor);
    let integer = scaled / divisor;
    let fraction = scaled % divisor;
    format!("{integer}.{:0>width$}", fraction.to_string(), width = decimals)
}

/// Render a signed ray value the same way, with a leading minus when negative.
pub fn format_signed_ray(value: SignedRay) -> String {
    if value.is_negative() {
        format!("-{}", format_ray(value.abs()))
    } else {
        format_ray(value.abs())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PositionEntry {
    pub asset: String,
    pub scaled_balance: String,
    pub actual_balance: String,
    pub total_deposits: String,
    pub total_withdrawals: String,
    pub current_yield: String,
    pub last_updated: u64,
    pub actual_balance_formatted: String,
    pub current_yield_formatted: String,
}

impl PositionEntry {
    fn from_view(view: &PositionView) -> Self {
        Self {
            asset: view.asset.clone(),
            scaled_balance: view.scaled_balance.0.to_string(),
            actual_balance: view.actual_balance.0.to_string(),
            total_deposits: view.total_deposits.0.to_string(),
            total_withdrawals: view.total_withdrawals.0.to_string(),
            current_yield: if view.current_yield.is_negative() {
                format!("-{}", view.current_yield.abs().0)
            } else {
                view.current_yield.abs().0.to_string()
            },
            last_updated: view.last_updated,
            actual_balance_formatted: format_ray(view.actual_balance),
            current_yield_formatted: format_signed_ray(view.current_yield),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct UserPositionsResponse {
    pub user: String,
    pub positions: Vec<PositionEntry>,
    pub total_positions: usize,
    pub timestamp: u64,
}

/// Positions for every asset the user holds, valued at `query_timestamp`.
pub async fn user_positions<S: Store>(
    store: &S,
    user: &str,
    query_timestamp: u64,
) -> Result<UserPositionsResponse, ApiError> {
    validate_address(user)?;
    let views = ledger::positions(store, user, query_timestamp).await?;
    let positions: Vec<PositionEntry> = views.iter().map(PositionEntry::from_view).collect();
    Ok(UserPositionsResponse {
        user: user.to_string(),
        total_positions: positions.len(),
        positions,
        timestamp: query_timestamp,
    })
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct UserPositionResponse {
    pub user: String,
    pub asset: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<PositionEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// One user/asset position; a missing row is an informational payload, never
/// a failure.
pub async fn user_position<S: Store>(
    store: &S,
    user: &str,
    asset: &str,
    query_timestamp: u64,
) -> Result<UserPositionResponse, ApiError> {
    validate_address(user)?;
    validate_address(asset)?;
    let view = ledger::position(store, user, asset, query_timestamp).await?;
    Ok(UserPositionResponse {
        user: user.to_string(),
        asset: asset.to_string(),
        message: view.is_none().then(|| "No position found".to_string()),
        position: view.as_ref().map(PositionEntry::from_view),
    })
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DepositEntry {
    pub user: String,
    pub token: String,
    pub current_balance: String,
    pub last_updated: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct UserDepositsResponse {
    pub user: String,
    pub deposits: BTreeMap<String, Vec<DepositEntry>>,
    pub total_tokens: usize,
}

/// Current raw deposits for a user, grouped by token address.
pub async fn user_deposits<S: Store>(store: &S, user: &str) -> Result<UserDepositsResponse, ApiError> {
    validate_address(user)?;
    let rows = store.user_deposits(user).await.map_err(LedgerError::from)?;
    let mut deposits: BTreeMap<String, Vec<DepositEntry>> = BTreeMap::new();
    for row in rows {
        deposits.entry(row.token.clone()).or_default().push(DepositEntry {
            user: row.user.clone(),
            token: row.token.clone(),
            current_balance: row.current_balance.to_string(),
            last_updated: row.last_updated,
        });
    }
    Ok(UserDepositsResponse {
        user: user.to_string(),
        total_tokens: deposits.len(),
        deposits,
    })
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LiquidityIndexResponse {
    pub reserve: String,
    pub timestamp: u64,
    pub liquidity_index: String,
    pub liquidity_index_formatted: String,
    pub calculated_at: u64,
}

/// Liquidity index for a reserve at a given instant (or "now" when absent).
pub async fn reserve_liquidity_index<S: Store>(
    store: &S,
    reserve: &str,
    timestamp: Option<u64>,
    query_timestamp: u64,
) -> Result<LiquidityIndexResponse, ApiError> {
    validate_address(reserve)?;
    let target = timestamp.unwrap_or(query_timestamp);
    let index = resolve_index(store, reserve, target, None).await;
    Ok(LiquidityIndexResponse {
        reserve: reserve.to_string(),
        timestamp: target,
        liquidity_index: index.0.to_string(),
        liquidity_index_formatted: format_ray(index),
        calculated_at: query_timestamp,
    })
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CheckpointEntry {
    pub id: String,
    pub tx_hash: String,
    pub reserve: String,
    pub liquidity_index: String,
    pub liquidity_index_formatted: String,
    pub liquidity_rate: String,
    pub liquidity_rate_formatted: String,
    pub timestamp: u64,
    pub block_number: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PageInfo {
    pub limit: usize,
    pub offset: usize,
    pub count: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReserveCheckpointsResponse {
    pub asset: String,
    pub events: Vec<CheckpointEntry>,
    pub pagination: PageInfo,
}

/// Rate-update history for a reserve, newest first.
pub async fn reserve_checkpoints<S: Store>(
    store: &S,
    reserve: &str,
    pagination: Pagination,
) -> Result<ReserveCheckpointsResponse, ApiError> {
    validate_address(reserve)?;
    let rows = store
        .checkpoints_for_reserve(reserve, pagination.limit, pagination.offset)
        .await
        .map_err(LedgerError::from)?;
    let events: Vec<CheckpointEntry> = rows
        .iter()
        .map(|row| CheckpointEntry {
            id: row.id.clone(),
            tx_hash: row.tx_hash.clone(),
            reserve: row.reserve.clone(),
            liquidity_index: row.liquidity_index.0.to_string(),
            liquidity_index_formatted: format_ray(row.liquidity_index),
            liquidity_rate: row.liquidity_rate.0.to_string(),
            liquidity_rate_formatted: format_ray(row.liquidity_rate),
            timestamp: row.timestamp,
            block_number: row.block_number.to_string(),
        })
        .collect();
    Ok(ReserveCheckpointsResponse {
        asset: reserve.to_string(),
        pagination: PageInfo {
            limit: pagination.limit,
            offset: pagination.offset,
            count: events.len(),
        },
        events,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ledger::{apply_balance_change, BalanceChange};
    use crate::state::BalanceEventKind;
    use crate::store::MemoryStore;

    const ALICE: &str = "0xa11ce00000000000000000000000000000000001";
    const DAI: &str = "0x6b175474e89094c44da98b954eedeac495271d0f";

    #[test]
    fn address_validation_rejects_malformed_input() {
        assert!(validate_address(DAI).is_ok());
        assert!(validate_address("6b175474e89094c44da98b954eedeac495271d0f").is_err());
        assert!(validate_address("0x6b17").is_err());
        assert!(validate_address("0x6b175474e89094c44da98b954eedeac495271d0g").is_err());
        let err = validate_address("dai").unwrap_err();
        assert_eq!(err.status(), 400);
    }

    #[test]
    fn pagination_bounds_are_enforced() {
        assert!(Pagination::new(50, 0).is_ok());
        assert!(Pagination::new(0, 0).is_err());
        assert!(Pagination::new(1_001, 0).is_err());
        assert!(Pagination::parse("50", "10").is_ok());
        assert!(Pagination::parse("abc", "0").is_err());
        assert!(parse_timestamp("1700000000").is_ok());
        assert!(parse_timestamp("-5").is_err());
        assert!(parse_timestamp("later").is_err());
    }

    #[test]
    fn ray_formatting_keeps_eighteen_decimals() {
        assert_eq!(format_ray(Ray::one()), "1.000000000000000000");
        let one_and_a_half = Ray::from_scaled_val(RAY + RAY / 2);
        assert_eq!(format_ray(one_and_a_half), "1.500000000000000000");
        assert_eq!(
            format_signed_ray(SignedRay::negative(one_and_a_half)),
            "-1.500000000000000000"
        );
        assert_eq!(format_ray_with(Ray::one(), 4), "1.0000");
    }

    #[tokio::test]
    async fn missing_position_is_informational() {
        let store = MemoryStore::new();
        let response = user_position(&store, ALICE, DAI, 0).await.unwrap();
        assert!(response.position.is_none());
        assert_eq!(response.message.as_deref(), Some("No position found"));

        let all = user_positions(&store, ALICE, 0).await.unwrap();
        assert_eq!(all.total_positions, 0);
    }

    #[tokio::test]
    async fn position_response_carries_strings_and_formatted_values() {
        let store = MemoryStore::new();
        apply_balance_change(
            &store,
            &BalanceChange {
                user: ALICE.to_string(),
                asset: DAI.to_string(),
                scaled_delta: SignedRay::positive(Ray::from_scaled_val(RAY)),
                kind: BalanceEventKind::Deposit,
                timestamp: 0,
                tx_hash: "0xtx1".to_string(),
                block_number: 1,
                log_index: 0,
            },
        )
        .await
        .unwrap();

        let response = user_positions(&store, ALICE, 100).await.unwrap();
        assert_eq!(response.total_positions, 1);
        let entry = &response.positions[0];
        assert_eq!(entry.scaled_balance, RAY.to_string());
        assert_eq!(entry.actual_balance_formatted, "1.000000000000000000");
        assert_eq!(entry.current_yield, "0");

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["positions"][0]["actual_balance"], RAY.to_string());
    }

    #[tokio::test]
    async fn deposits_group_by_token() {
        let store = MemoryStore::new();
        crate::aggregate::apply_deposit_delta(&store, ALICE, DAI, 1_000, 5).await.unwrap();
        let response = user_deposits(&store, ALICE).await.unwrap();
        assert_eq!(response.total_tokens, 1);
        assert_eq!(response.deposits[DAI][0].current_balance, "1000");
    }

    #[tokio::test]
    async fn index_endpoint_defaults_to_query_time() {
        let store = MemoryStore::new();
        let response = reserve_liquidity_index(&store, DAI, None, 1_234).await.unwrap();
        assert_eq!(response.timestamp, 1_234);
        assert_eq!(response.calculated_at, 1_234);
        assert_eq!(response.liquidity_index, RAY.to_string());
        assert_eq!(response.liquidity_index_formatted, "1.000000000000000000");
    }
}
