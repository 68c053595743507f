//! Rate tables and the parser for the upstream `/latest` and `/historical` payloads

use crate::core::error::SyncError;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;

/// Exchange rates expressed relative to a single base currency.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateTable {
    base: String,
    rates: BTreeMap<String, f64>,
}

impl RateTable {
    pub fn new(base: &str, rates: BTreeMap<String, f64>) -> Self {
        Self {
            base: base.to_string(),
            rates,
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn rate(&self, code: &str) -> Option<f64> {
        self.rates.get(code).copied()
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.rates.iter().map(|(code, rate)| (code.as_str(), *rate))
    }
}

impl FromIterator<(String, f64)> for RateTable {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self {
            base: String::new(),
            rates: iter.into_iter().collect(),
        }
    }
}

/// A parsed rates response, before it is installed by the sync controller.
#[derive(Debug, Clone, PartialEq)]
pub struct LatestRates {
    pub table: RateTable,
    /// Server-reported time of the rates, when the payload carries one.
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct RatesResponse {
    rates: Option<BTreeMap<String, f64>>,
    timestamp: Option<serde_json::Value>,
    date: Option<String>,
}

/// Epoch seconds, sent as an integer or a float. Anything else is ignored.
fn parse_timestamp(timestamp: &serde_json::Value) -> Option<DateTime<Utc>> {
    let secs = match timestamp.as_i64() {
        Some(secs) => secs,
        None => timestamp.as_f64().filter(|s| s.is_finite())?.trunc() as i64,
    };
    Utc.timestamp_opt(secs, 0).single()
}

fn parse_date(date: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(date) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| Utc.from_utc_datetime(&dt))
}

/// Parses a rates payload fetched for `base`.
pub fn parse_rates(base: &str, payload: serde_json::Value) -> Result<LatestRates, SyncError> {
    let response: RatesResponse = serde_json::from_value(payload)?;
    let rates = response.rates.ok_or_else(|| {
        SyncError::MalformedResponse("invalid exchange rates response format".to_string())
    })?;

    let updated_at = response
        .timestamp
        .as_ref()
        .and_then(parse_timestamp)
        .or_else(|| response.date.as_deref().and_then(parse_date));

    Ok(LatestRates {
        table: RateTable::new(base, rates),
        updated_at,
    })
}
