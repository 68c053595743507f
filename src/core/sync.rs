//! Keeps the currency catalog and the rate table in step with the upstream API.

use crate::core::catalog::CurrencyCatalog;
use crate::core::currency::CurrencyApi;
use crate::core::rates::RateTable;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;
use tracing::{debug, info, warn};

pub const DEFAULT_BASE_CURRENCY: &str = "USD";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Loading,
    Ready,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncStatus {
    pub phase: SyncPhase,
    pub last_updated: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl SyncStatus {
    fn loading(last_updated: Option<DateTime<Utc>>) -> Self {
        Self {
            phase: SyncPhase::Loading,
            last_updated,
            error: None,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.phase == SyncPhase::Loading
    }
}

/// Read-only view of the synchronized state.
#[derive(Debug, Clone)]
pub struct SyncSnapshot {
    pub catalog: Arc<CurrencyCatalog>,
    pub rates: Arc<RateTable>,
    pub base_currency: String,
    pub catalog_status: SyncStatus,
    pub rate_status: SyncStatus,
}

impl SyncSnapshot {
    fn new(base_currency: &str) -> Self {
        Self {
            catalog: Arc::new(CurrencyCatalog::new()),
            rates: Arc::new(RateTable::default()),
            base_currency: base_currency.to_string(),
            catalog_status: SyncStatus::loading(None),
            rate_status: SyncStatus::loading(None),
        }
    }

    /// True until the catalog is loaded and a first rate table was attempted.
    pub fn is_initial_loading(&self) -> bool {
        self.catalog_status.is_loading()
            || (self.rate_status.is_loading() && self.rate_status.last_updated.is_none())
    }

    /// Base currency of the installed rate table. After a failed base change
    /// this still names the previous base, not `base_currency`.
    pub fn rates_base(&self) -> &str {
        if self.rates.base().is_empty() {
            &self.base_currency
        } else {
            self.rates.base()
        }
    }

    /// Most recent error across the catalog and rate phases.
    pub fn error(&self) -> Option<&str> {
        self.rate_status
            .error
            .as_deref()
            .or(self.catalog_status.error.as_deref())
    }
}

/// Single writer of the catalog, rate table, base currency and sync status.
pub struct SyncController<A: CurrencyApi + ?Sized> {
    api: Arc<A>,
    state: watch::Sender<SyncSnapshot>,
    generation: AtomicU64,
}

impl<A: CurrencyApi + ?Sized> SyncController<A> {
    pub fn new(api: Arc<A>, base_currency: &str) -> Self {
        let (state, _) = watch::channel(SyncSnapshot::new(&base_currency.to_uppercase()));
        Self {
            api,
            state,
            generation: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> SyncSnapshot {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncSnapshot> {
        self.state.subscribe()
    }

    pub fn is_initial_loading(&self) -> bool {
        self.state.borrow().is_initial_loading()
    }

    /// Loads the catalog, then the rate table for the current base currency.
    pub async fn start(&self) {
        self.load_catalog().await;
        self.refresh().await;
    }

    pub async fn load_catalog(&self) {
        debug!("Fetching currencies...");
        self.state.send_modify(|s| {
            s.catalog_status = SyncStatus::loading(s.catalog_status.last_updated);
        });

        let (catalog, status) = match self.api.fetch_currencies().await {
            Ok(catalog) => {
                info!(currencies = catalog.len(), "Currency catalog loaded");
                let status = SyncStatus {
                    phase: SyncPhase::Ready,
                    last_updated: Some(Utc::now()),
                    error: None,
                };
                (catalog, status)
            }
            Err(e) => {
                warn!(error = %e, "Currency fetch failed, using fallback currencies");
                let status = SyncStatus {
                    phase: SyncPhase::Error,
                    last_updated: None,
                    error: Some(format!("Currency loading failed: {e}")),
                };
                (CurrencyCatalog::fallback(), status)
            }
        };

        self.state.send_modify(|s| {
            s.catalog = Arc::new(catalog);
            s.catalog_status = status;
        });
    }

    /// Switches the base currency and re-fetches rates. Setting the current
    /// base again does nothing.
    pub async fn set_base_currency(&self, code: &str) {
        let code = code.trim().to_uppercase();
        let changed = self.state.send_if_modified(|s| {
            if s.base_currency == code {
                false
            } else {
                s.base_currency = code.clone();
                true
            }
        });

        if changed {
            debug!(base = %code, "Base currency changed");
            self.refresh().await;
        } else {
            debug!(base = %code, "Base currency unchanged");
        }
    }

    /// Re-fetches the rate table for the current base currency.
    ///
    /// Every call issues a new fetch. Only the most recently issued fetch may
    /// install its result.
    pub async fn refresh(&self) {
        if self.state.borrow().catalog.is_empty() {
            debug!("Waiting for currencies to load before fetching rates");
            return;
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let mut base = String::new();
        self.state.send_modify(|s| {
            base = s.base_currency.clone();
            s.rate_status = SyncStatus::loading(s.rate_status.last_updated);
        });
        debug!(%base, generation, "Fetching exchange rates");

        let result = self.api.fetch_latest(&base).await;

        if self.generation.load(Ordering::SeqCst) != generation {
            debug!(%base, generation, "Discarding superseded rates response");
            return;
        }

        match result {
            Ok(latest) => {
                info!(%base, rates = latest.table.len(), "Exchange rates updated");
                let updated_at = latest.updated_at.unwrap_or_else(Utc::now);
                self.state.send_modify(|s| {
                    s.rates = Arc::new(latest.table);
                    s.rate_status = SyncStatus {
                        phase: SyncPhase::Ready,
                        last_updated: Some(updated_at),
                        error: None,
                    };
                });
            }
            Err(e) => {
                warn!(%base, error = %e, "Exchange rates fetch failed");
                self.state.send_modify(|s| {
                    s.rate_status = SyncStatus {
                        phase: SyncPhase::Error,
                        last_updated: s.rate_status.last_updated,
                        error: Some(format!("Exchange rates loading failed: {e}")),
                    };
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::SyncError;
    use crate::core::rates::LatestRates;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;
    use std::sync::Mutex;
    use std::time::Duration;

    struct MockApi {
        catalog: Result<CurrencyCatalog, SyncError>,
        latest_calls: Mutex<Vec<String>>,
        fail_rates: bool,
    }

    impl MockApi {
        fn new(catalog: Result<CurrencyCatalog, SyncError>) -> Self {
            Self {
                catalog,
                latest_calls: Mutex::new(Vec::new()),
                fail_rates: false,
            }
        }

        fn calls(&self) -> Vec<String> {
            self.latest_calls.lock().unwrap().clone()
        }
    }

    fn rates_for(base: &str) -> BTreeMap<String, f64> {
        let rate = match base {
            "EUR" => 1.1,
            "GBP" => 1.25,
            _ => 1.0,
        };
        BTreeMap::from([("USD".to_string(), rate)])
    }

    #[async_trait]
    impl CurrencyApi for MockApi {
        async fn fetch_currencies(&self) -> Result<CurrencyCatalog, SyncError> {
            self.catalog.clone()
        }

        async fn fetch_latest(&self, base: &str) -> Result<LatestRates, SyncError> {
            let call = self.latest_calls.lock().unwrap().len();
            self.latest_calls.lock().unwrap().push(base.to_string());
            if self.fail_rates && call > 0 {
                return Err(SyncError::NetworkFailure("connection reset".to_string()));
            }
            // Earlier calls resolve later than newer ones.
            let delay = 100u64.saturating_sub(call as u64 * 40);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok(LatestRates {
                table: RateTable::new(base, rates_for(base)),
                updated_at: None,
            })
        }

        async fn fetch_historical(
            &self,
            base: &str,
            _date: NaiveDate,
        ) -> Result<LatestRates, SyncError> {
            self.fetch_latest(base).await
        }

        async fn convert(&self, _from: &str, _to: &str, amount: f64) -> Result<f64, SyncError> {
            Ok(amount)
        }
    }

    fn catalog() -> CurrencyCatalog {
        [("USD", "US Dollar"), ("EUR", "Euro"), ("GBP", "Pound")]
            .iter()
            .map(|(c, n)| (c.to_string(), n.to_string()))
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_loads_catalog_then_rates() {
        let api = Arc::new(MockApi::new(Ok(catalog())));
        let controller = SyncController::new(Arc::clone(&api), "usd");
        assert!(controller.is_initial_loading());

        controller.start().await;

        let snapshot = controller.snapshot();
        assert_eq!(snapshot.catalog.len(), 3);
        assert_eq!(snapshot.catalog_status.phase, SyncPhase::Ready);
        assert_eq!(snapshot.rate_status.phase, SyncPhase::Ready);
        assert!(snapshot.rate_status.last_updated.is_some());
        assert_eq!(snapshot.rates.base(), "USD");
        assert_eq!(api.calls(), vec!["USD"]);
        assert!(!controller.is_initial_loading());
    }

    #[tokio::test(start_paused = true)]
    async fn test_catalog_failures_install_fallback() {
        for err in [
            SyncError::NetworkFailure("offline".to_string()),
            SyncError::MalformedResponse("bad json".to_string()),
            SyncError::EmptyResult("no currencies could be processed".to_string()),
        ] {
            let api = Arc::new(MockApi::new(Err(err.clone())));
            let controller = SyncController::new(Arc::clone(&api), "USD");
            controller.start().await;

            let snapshot = controller.snapshot();
            assert_eq!(snapshot.catalog.len(), 20);
            assert_eq!(snapshot.catalog_status.phase, SyncPhase::Error);
            assert_eq!(
                snapshot.catalog_status.error,
                Some(format!("Currency loading failed: {err}"))
            );
            // Rates still load against the fallback catalog.
            assert_eq!(snapshot.rate_status.phase, SyncPhase::Ready);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_rates_deferred_until_catalog_loaded() {
        let api = Arc::new(MockApi::new(Ok(catalog())));
        let controller = SyncController::new(Arc::clone(&api), "USD");

        controller.refresh().await;
        controller.set_base_currency("EUR").await;

        assert!(api.calls().is_empty());
        assert!(controller.snapshot().rates.is_empty());
        assert_eq!(controller.snapshot().base_currency, "EUR");
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_refetches_unchanged_base() {
        let api = Arc::new(MockApi::new(Ok(catalog())));
        let controller = SyncController::new(Arc::clone(&api), "USD");
        controller.start().await;

        controller.refresh().await;
        controller.refresh().await;

        assert_eq!(api.calls(), vec!["USD", "USD", "USD"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_setting_same_base_is_idempotent() {
        let api = Arc::new(MockApi::new(Ok(catalog())));
        let controller = SyncController::new(Arc::clone(&api), "USD");
        controller.start().await;
        let before = controller.snapshot();

        controller.set_base_currency("usd").await;

        assert_eq!(api.calls(), vec!["USD"]);
        assert!(Arc::ptr_eq(&before.rates, &controller.snapshot().rates));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_base_changes_keep_last_table() {
        let api = Arc::new(MockApi::new(Ok(catalog())));
        let controller = SyncController::new(Arc::clone(&api), "USD");
        controller.load_catalog().await;

        // EUR is issued first but resolves after GBP.
        tokio::join!(
            controller.set_base_currency("EUR"),
            controller.set_base_currency("GBP")
        );

        let snapshot = controller.snapshot();
        assert_eq!(api.calls(), vec!["EUR", "GBP"]);
        assert_eq!(snapshot.base_currency, "GBP");
        assert_eq!(snapshot.rates.base(), "GBP");
        assert_eq!(snapshot.rates.rate("USD"), Some(1.25));
        assert_eq!(snapshot.rate_status.phase, SyncPhase::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_refresh_keeps_stale_rates() {
        let mut api = MockApi::new(Ok(catalog()));
        api.fail_rates = true;
        let api = Arc::new(api);
        let controller = SyncController::new(Arc::clone(&api), "USD");
        controller.start().await;
        let loaded = controller.snapshot();

        controller.refresh().await;

        let snapshot = controller.snapshot();
        assert_eq!(snapshot.rate_status.phase, SyncPhase::Error);
        assert_eq!(
            snapshot.error(),
            Some("Exchange rates loading failed: network failure: connection reset")
        );
        assert!(Arc::ptr_eq(&loaded.rates, &snapshot.rates));
        assert_eq!(
            snapshot.rate_status.last_updated,
            loaded.rate_status.last_updated
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_base_change_keeps_previous_base_table() {
        let mut api = MockApi::new(Ok(catalog()));
        api.fail_rates = true;
        let controller = SyncController::new(Arc::new(api), "USD");
        controller.start().await;

        controller.set_base_currency("eur").await;

        let snapshot = controller.snapshot();
        assert_eq!(snapshot.base_currency, "EUR");
        assert_eq!(snapshot.rates.base(), "USD");
        assert_eq!(snapshot.rates_base(), "USD");
        assert_eq!(snapshot.rate_status.phase, SyncPhase::Error);
    }

    #[test]
    fn test_rates_base_before_first_table() {
        let snapshot = SyncSnapshot::new("GBP");
        assert_eq!(snapshot.rates_base(), "GBP");
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribers_observe_updates() {
        let api = Arc::new(MockApi::new(Ok(catalog())));
        let controller = SyncController::new(api, "USD");
        let mut rx = controller.subscribe();

        controller.start().await;

        assert!(rx.has_changed().unwrap());
        let snapshot = rx.borrow_and_update().clone();
        assert_eq!(snapshot.rates.base(), "USD");
    }
}
