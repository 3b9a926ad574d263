//! Price oracle boundary.
//!
//! One read call per event; prices are stored alongside historical rows for
//! display only, so a failed lookup must never abort balance accounting.

use core::fmt;
use std::collections::BTreeMap;

/// A failed oracle read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OracleError {
    message: String,
}

impl OracleError {
    /// Wrap a backend failure reason
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

impl fmt::Display for OracleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for OracleError {}

/// The single read call the core makes against the price oracle.
#[allow(async_fn_in_trait)]
pub trait PriceOracle {
    /// Current price of the asset in the oracle's quote units
    async fn asset_price(&self, asset: &str) -> Result<u128, OracleError>;
}

/// Fetch a price, logging and absorbing any failure.
pub async fn best_effort_price<O: PriceOracle>(oracle: &O, asset: &str) -> Option<u128> {
    match oracle.asset_price(asset).await {
        Ok(price) => Some(price),
        Err(err) => {
            log::warn!("oracle price lookup failed for asset {asset}: {err}");
            None
        }
    }
}

/// Fixture oracle serving prices from a fixed map.
#[derive(Debug, Default)]
pub struct StaticOracle {
    prices: BTreeMap<String, u128>,
}

impl StaticOracle {
    /// Empty oracle; every lookup fails
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a price for an asset
    pub fn with_price(mut self, asset: &str, price: u128) -> Self {
        self.prices.insert(asset.to_string(), price);
        self
    }
}

impl PriceOracle for StaticOracle {
    async fn asset_price(&self, asset: &str) -> Result<u128, OracleError> {
        self.prices
            .get(asset)
            .copied()
            .ok_or_else(|| OracleError::new(format!("no price feed for asset {asset}")))
    }
}

/// Oracle that answers nothing; prices come back absent.
#[derive(Debug, Default)]
pub struct NoopOracle;

impl PriceOracle for NoopOracle {
    async fn asset_price(&self, asset: &str) -> Result<u128, OracleError> {
        Err(OracleError::new(format!("oracle disabled, no price for {asset}")))
    }
}
