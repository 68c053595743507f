//! Search and sort over the cached rate table.

use crate::core::catalog::CurrencyCatalog;
use crate::core::rates::RateTable;
use std::cmp::Ordering;
use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    Currency,
    Rate,
}

impl Display for SortKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                SortKey::Currency => "currency",
                SortKey::Rate => "rate",
            }
        )
    }
}

impl FromStr for SortKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "currency" | "code" => Ok(SortKey::Currency),
            "rate" => Ok(SortKey::Rate),
            _ => Err(anyhow::anyhow!("Invalid sort key: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn toggled(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RateRow {
    pub code: String,
    pub name: String,
    pub rate: f64,
}

/// Rows of `rates` matching `query`, ordered by `key` in `direction`.
///
/// The query matches case-insensitively against the code or the display name.
/// Rows with equal keys keep their table order.
pub fn filter_and_sort(
    rates: &RateTable,
    catalog: &CurrencyCatalog,
    query: &str,
    key: SortKey,
    direction: SortDirection,
) -> Vec<RateRow> {
    let query = query.trim().to_lowercase();

    let mut rows: Vec<RateRow> = rates
        .iter()
        .filter_map(|(code, rate)| {
            let name = catalog.display_name(code);
            let matches = code.to_lowercase().contains(&query)
                || name.to_lowercase().contains(&query);
            matches.then(|| RateRow {
                code: code.to_string(),
                name: name.to_string(),
                rate,
            })
        })
        .collect();

    let compare = |a: &RateRow, b: &RateRow| -> Ordering {
        match key {
            SortKey::Currency => a.code.cmp(&b.code),
            SortKey::Rate => a.rate.total_cmp(&b.rate),
        }
    };
    match direction {
        SortDirection::Ascending => rows.sort_by(compare),
        SortDirection::Descending => rows.sort_by(|a, b| compare(b, a)),
    }
    rows
}

/// Memoized table view; rows are recomputed only when an input changes.
#[derive(Debug, Default)]
pub struct RateTableView {
    query: String,
    key: SortKey,
    direction: SortDirection,
    cached: Option<CachedRows>,
}

#[derive(Debug)]
struct CachedRows {
    rates: Arc<RateTable>,
    catalog: Arc<CurrencyCatalog>,
    rows: Vec<RateRow>,
}

impl RateTableView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn sort_key(&self) -> SortKey {
        self.key
    }

    pub fn direction(&self) -> SortDirection {
        self.direction
    }

    pub fn set_query(&mut self, query: &str) {
        if self.query != query {
            self.query = query.to_string();
            self.cached = None;
        }
    }

    /// Same key flips the direction; a different key sorts ascending by it.
    pub fn toggle_sort(&mut self, key: SortKey) {
        if self.key == key {
            self.direction = self.direction.toggled();
        } else {
            self.key = key;
            self.direction = SortDirection::Ascending;
        }
        self.cached = None;
    }

    pub fn set_sort(&mut self, key: SortKey, direction: SortDirection) {
        if self.key != key || self.direction != direction {
            self.key = key;
            self.direction = direction;
            self.cached = None;
        }
    }

    pub fn rows(&mut self, rates: &Arc<RateTable>, catalog: &Arc<CurrencyCatalog>) -> &[RateRow] {
        let stale = match &self.cached {
            Some(cached) => {
                !Arc::ptr_eq(&cached.rates, rates) || !Arc::ptr_eq(&cached.catalog, catalog)
            }
            None => true,
        };
        if stale {
            let rows = filter_and_sort(rates, catalog, &self.query, self.key, self.direction);
            self.cached = Some(CachedRows {
                rates: Arc::clone(rates),
                catalog: Arc::clone(catalog),
                rows,
            });
        }
        match &self.cached {
            Some(cached) => &cached.rows,
            None => &[],
        }
    }
}
