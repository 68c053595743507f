//! Conversion inputs, results and the `/convert` response normalizer

use crate::core::error::SyncError;
use serde_json::Value;

/// Field names probed for the converted value, in priority order.
const RESULT_FIELDS: [&str; 3] = ["value", "result", "amount"];

#[derive(Debug, Clone, PartialEq)]
pub struct ConversionResult {
    pub amount: f64,
    pub from: String,
    pub to: String,
    /// Unrounded converted value as reported upstream.
    pub value: f64,
}

impl ConversionResult {
    pub fn rounded(&self) -> f64 {
        (self.value * 100.0).round() / 100.0
    }

    pub fn display_value(&self) -> String {
        format!("{:.2}", self.value)
    }
}

/// Raw user inputs of the converter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversionInput {
    pub amount: String,
    pub from: String,
    pub to: String,
}

impl ConversionInput {
    pub fn new(amount: &str, from: &str, to: &str) -> Self {
        Self {
            amount: amount.to_string(),
            from: from.trim().to_uppercase(),
            to: to.trim().to_uppercase(),
        }
    }

    /// Validated request parameters, or why no request should be made.
    pub fn request(&self) -> Result<ConversionRequest, SyncError> {
        let amount = parse_amount(&self.amount)?;
        if self.from.is_empty() || self.to.is_empty() {
            return Err(SyncError::ValidationFailure(
                "both currencies must be selected".to_string(),
            ));
        }
        Ok(ConversionRequest {
            amount,
            from: self.from.clone(),
            to: self.to.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConversionRequest {
    pub amount: f64,
    pub from: String,
    pub to: String,
}

impl ConversionRequest {
    pub fn into_result(self, value: f64) -> ConversionResult {
        ConversionResult {
            amount: self.amount,
            from: self.from,
            to: self.to,
            value,
        }
    }
}

/// Whether `text` is acceptable as amount input: digits with at most one decimal point.
pub fn is_amount_text(text: &str) -> bool {
    text.chars().all(|c| c.is_ascii_digit() || c == '.') && text.matches('.').count() <= 1
}

/// Parses an amount that must be a finite number strictly greater than zero.
pub fn parse_amount(text: &str) -> Result<f64, SyncError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(SyncError::ValidationFailure("amount is empty".to_string()));
    }
    let amount: f64 = text
        .parse()
        .map_err(|_| SyncError::ValidationFailure(format!("'{text}' is not a number")))?;
    if !amount.is_finite() || amount <= 0.0 {
        return Err(SyncError::ValidationFailure(
            "amount must be greater than zero".to_string(),
        ));
    }
    Ok(amount)
}

/// Extracts the converted value from a `/convert` payload.
///
/// The first of `value`, `result` and `amount` that is present and non-null
/// wins, even if a later field disagrees.
pub fn extract_conversion_value(payload: &Value) -> Result<f64, SyncError> {
    let (field, found) = RESULT_FIELDS
        .iter()
        .find_map(|field| {
            payload
                .get(field)
                .filter(|v| !v.is_null())
                .map(|v| (*field, v))
        })
        .ok_or_else(|| SyncError::EmptyResult("no conversion result".to_string()))?;

    found.as_f64().ok_or_else(|| {
        SyncError::MalformedResponse(format!("conversion field '{field}' is not a number"))
    })
}
