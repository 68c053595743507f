//! Currency catalog and the parser for the upstream `/currencies` payload

use crate::core::error::SyncError;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

const FALLBACK_CURRENCIES: [(&str, &str); 20] = [
    ("USD", "United States Dollar"),
    ("EUR", "Euro"),
    ("GBP", "British Pound Sterling"),
    ("JPY", "Japanese Yen"),
    ("AUD", "Australian Dollar"),
    ("CAD", "Canadian Dollar"),
    ("CHF", "Swiss Franc"),
    ("CNY", "Chinese Yuan"),
    ("INR", "Indian Rupee"),
    ("SGD", "Singapore Dollar"),
    ("HKD", "Hong Kong Dollar"),
    ("KRW", "South Korean Won"),
    ("BRL", "Brazilian Real"),
    ("MXN", "Mexican Peso"),
    ("SEK", "Swedish Krona"),
    ("NOK", "Norwegian Krone"),
    ("DKK", "Danish Krone"),
    ("PLN", "Polish Zloty"),
    ("NZD", "New Zealand Dollar"),
    ("ZAR", "South African Rand"),
];

/// Known currency codes and their display names, keyed by upper-case code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CurrencyCatalog {
    entries: BTreeMap<String, String>,
}

impl CurrencyCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in catalog used when the upstream list cannot be loaded.
    pub fn fallback() -> Self {
        FALLBACK_CURRENCIES
            .iter()
            .map(|(code, name)| (code.to_string(), name.to_string()))
            .collect()
    }

    pub fn insert(&mut self, code: &str, name: &str) {
        self.entries
            .insert(code.trim().to_uppercase(), name.trim().to_string());
    }

    pub fn name(&self, code: &str) -> Option<&str> {
        self.entries.get(code).map(String::as_str)
    }

    /// Display name for `code`, or the code itself when it is not in the catalog.
    pub fn display_name<'a>(&'a self, code: &'a str) -> &'a str {
        self.name(code).unwrap_or(code)
    }

    pub fn contains(&self, code: &str) -> bool {
        self.entries.contains_key(code)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(code, name)| (code.as_str(), name.as_str()))
    }
}

impl FromIterator<(String, String)> for CurrencyCatalog {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut catalog = CurrencyCatalog::new();
        for (code, name) in iter {
            catalog.insert(&code, &name);
        }
        catalog
    }
}

/// Accepted layouts of the `/currencies` payload.
enum CatalogShape<'a> {
    List(&'a [Value]),
    Indexed(&'a serde_json::Map<String, Value>),
}

impl<'a> CatalogShape<'a> {
    fn detect(payload: &'a Value) -> Result<Self, SyncError> {
        match payload {
            Value::Array(items) => Ok(CatalogShape::List(items)),
            Value::Object(map) => Ok(CatalogShape::Indexed(map)),
            other => Err(SyncError::MalformedResponse(format!(
                "expected a list or an object of currencies, got {}",
                json_kind(other)
            ))),
        }
    }

    fn records(&self) -> Box<dyn Iterator<Item = &'a Value> + 'a> {
        match *self {
            CatalogShape::List(items) => Box::new(items.iter()),
            CatalogShape::Indexed(map) => Box::new(map.values()),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

fn non_empty_str<'a>(record: &'a Value, field: &str) -> Option<&'a str> {
    record
        .get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn extract_pair(record: &Value) -> Option<(&str, &str)> {
    let code = non_empty_str(record, "short_code").or_else(|| non_empty_str(record, "code"))?;
    let name = non_empty_str(record, "name")?;
    Some((code, name))
}

/// Parses a `/currencies` payload into a catalog.
///
/// Records missing a code or a name are skipped. A payload that yields no
/// usable record is reported as [`SyncError::EmptyResult`].
pub fn parse_catalog(payload: &Value) -> Result<CurrencyCatalog, SyncError> {
    let shape = CatalogShape::detect(payload)?;

    let mut catalog = CurrencyCatalog::new();
    let mut skipped = 0usize;
    for record in shape.records() {
        match extract_pair(record) {
            Some((code, name)) => catalog.insert(code, name),
            None => skipped += 1,
        }
    }
    debug!(
        currencies = catalog.len(),
        skipped, "Processed currency catalog payload"
    );

    if catalog.is_empty() {
        return Err(SyncError::EmptyResult(
            "no currencies could be processed".to_string(),
        ));
    }
    Ok(catalog)
}
