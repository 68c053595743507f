//! Upstream currency service abstraction

use crate::core::catalog::CurrencyCatalog;
use crate::core::error::SyncError;
use crate::core::rates::LatestRates;
use async_trait::async_trait;
use chrono::NaiveDate;

#[async_trait]
pub trait CurrencyApi: Send + Sync {
    async fn fetch_currencies(&self) -> Result<CurrencyCatalog, SyncError>;

    async fn fetch_latest(&self, base: &str) -> Result<LatestRates, SyncError>;

    async fn fetch_historical(&self, base: &str, date: NaiveDate)
    -> Result<LatestRates, SyncError>;

    /// Converts `amount` and returns the unrounded value.
    async fn convert(&self, from: &str, to: &str, amount: f64) -> Result<f64, SyncError>;
}
