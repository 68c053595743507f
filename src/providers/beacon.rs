use crate::core::catalog::{CurrencyCatalog, parse_catalog};
use crate::core::conversion::extract_conversion_value;
use crate::core::currency::CurrencyApi;
use crate::core::error::SyncError;
use crate::core::rates::{LatestRates, parse_rates};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, Url};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument, warn};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for a CurrencyBeacon-compatible REST API.
pub struct BeaconProvider {
    base_url: String,
    api_key: String,
    client: Client,
}

impl BeaconProvider {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, SyncError> {
        Self::with_timeout(base_url, api_key, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        base_url: &str,
        api_key: &str,
        timeout: Duration,
    ) -> Result<Self, SyncError> {
        let client = Client::builder()
            .user_agent("fxdesk/1.0")
            .timeout(timeout)
            .build()?;
        Ok(BeaconProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client,
        })
    }

    fn url(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<Url, SyncError> {
        let mut query = vec![("api_key", self.api_key.as_str())];
        query.extend_from_slice(params);
        Url::parse_with_params(&format!("{}{}", self.base_url, endpoint), &query)
            .map_err(|e| SyncError::NetworkFailure(format!("invalid URL for {endpoint}: {e}")))
    }

    async fn get_json(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<Value, SyncError> {
        let url = self.url(endpoint, params)?;
        debug!(%endpoint, "Requesting currency data");

        let response = self.client.get(url).send().await.map_err(|e| {
            warn!(%endpoint, error = %e, "Currency API request failed");
            SyncError::from(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!(%endpoint, %status, "Currency API returned an error status");
            return Err(SyncError::NetworkFailure(format!(
                "HTTP error: {status} for {endpoint}"
            )));
        }

        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| {
            let message = format!("failed to parse JSON response for {endpoint}: {e}");
            SyncError::MalformedResponse(message)
        })
    }
}

#[async_trait]
impl CurrencyApi for BeaconProvider {
    #[instrument(name = "BeaconCurrencies", skip(self))]
    async fn fetch_currencies(&self) -> Result<CurrencyCatalog, SyncError> {
        let payload = self.get_json("/currencies", &[]).await?;
        parse_catalog(&payload)
    }

    #[instrument(name = "BeaconLatest", skip(self), fields(base = %base))]
    async fn fetch_latest(&self, base: &str) -> Result<LatestRates, SyncError> {
        let payload = self.get_json("/latest", &[("base", base)]).await?;
        let latest = parse_rates(base, payload)?;
        debug!(rates = latest.table.len(), "Exchange rates loaded");
        Ok(latest)
    }

    #[instrument(name = "BeaconHistorical", skip(self), fields(base = %base, date = %date))]
    async fn fetch_historical(
        &self,
        base: &str,
        date: NaiveDate,
    ) -> Result<LatestRates, SyncError> {
        let date = date.format("%Y-%m-%d").to_string();
        let payload = self
            .get_json("/historical", &[("base", base), ("date", &date)])
            .await?;
        parse_rates(base, payload)
    }

    #[instrument(name = "BeaconConvert", skip(self), fields(from = %from, to = %to))]
    async fn convert(&self, from: &str, to: &str, amount: f64) -> Result<f64, SyncError> {
        let amount = amount.to_string();
        let payload = self
            .get_json("/convert", &[("from", from), ("to", to), ("amount", &amount)])
            .await?;
        extract_conversion_value(&payload)
    }
}
