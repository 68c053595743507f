//! Debounced currency conversion.
//!
//! Input changes restart a quiet-period timer; the conversion runs only once
//! the inputs have been stable for the whole period. Responses to requests
//! that have since been superseded are dropped.

use crate::core::conversion::{ConversionInput, ConversionResult, is_amount_text};
use crate::core::currency::CurrencyApi;
use crate::core::error::SyncError;
use crate::core::sync::SyncSnapshot;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversionState {
    pub converting: bool,
    pub result: Option<ConversionResult>,
    pub error: Option<String>,
}

struct Inner<A: CurrencyApi + ?Sized> {
    api: Arc<A>,
    sync: watch::Receiver<SyncSnapshot>,
    input: Mutex<ConversionInput>,
    sequence: AtomicU64,
    state: watch::Sender<ConversionState>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl<A: CurrencyApi + ?Sized> Inner<A> {
    async fn execute(&self) {
        let input = lock(&self.input).clone();

        let request = match input.request() {
            Ok(request) => request,
            Err(e) => {
                debug!(reason = %e, "Clearing conversion result");
                // Supersede anything still in flight.
                self.sequence.fetch_add(1, Ordering::SeqCst);
                self.state.send_modify(|s| {
                    s.converting = false;
                    s.result = None;
                });
                return;
            }
        };

        let loading = self.sync.borrow().is_initial_loading();
        if loading {
            debug!("Currency data still loading, skipping conversion");
            return;
        }

        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(
            sequence,
            amount = request.amount,
            from = %request.from,
            to = %request.to,
            "Converting"
        );
        self.state.send_modify(|s| {
            s.converting = true;
            s.error = None;
        });

        let result = self
            .api
            .convert(&request.from, &request.to, request.amount)
            .await;

        if self.sequence.load(Ordering::SeqCst) != sequence {
            debug!(sequence, "Discarding superseded conversion response");
            return;
        }

        self.state.send_modify(|s| {
            s.converting = false;
            match result {
                Ok(value) => {
                    s.result = Some(request.into_result(value));
                    s.error = None;
                }
                Err(e) => {
                    s.result = None;
                    s.error = Some(e.to_string());
                }
            }
        });
    }
}

pub struct ConversionRequester<A: CurrencyApi + ?Sized + 'static> {
    inner: Arc<Inner<A>>,
    quiet_period: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl<A: CurrencyApi + ?Sized + 'static> ConversionRequester<A> {
    pub fn new(
        api: Arc<A>,
        sync: watch::Receiver<SyncSnapshot>,
        input: ConversionInput,
        quiet_period: Duration,
    ) -> Self {
        let (state, _) = watch::channel(ConversionState::default());
        Self {
            inner: Arc::new(Inner {
                api,
                sync,
                input: Mutex::new(input),
                sequence: AtomicU64::new(0),
                state,
            }),
            quiet_period,
            pending: Mutex::new(None),
        }
    }

    pub fn input(&self) -> ConversionInput {
        lock(&self.inner.input).clone()
    }

    pub fn state(&self) -> ConversionState {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConversionState> {
        self.inner.state.subscribe()
    }

    /// Updates the amount text. Text that is not a plain decimal number is
    /// rejected and the previous amount is kept.
    pub fn set_amount(&self, text: &str) -> Result<(), SyncError> {
        let text = text.trim();
        if !is_amount_text(text) {
            return Err(SyncError::ValidationFailure(format!(
                "'{text}' is not a valid amount"
            )));
        }
        self.update(|input| input.amount = text.to_string());
        self.inner.state.send_modify(|s| s.error = None);
        Ok(())
    }

    pub fn set_from(&self, code: &str) {
        let code = code.trim().to_uppercase();
        self.update(|input| input.from = code);
    }

    pub fn set_to(&self, code: &str) {
        let code = code.trim().to_uppercase();
        self.update(|input| input.to = code);
    }

    pub fn swap(&self) {
        self.update(|input| std::mem::swap(&mut input.from, &mut input.to));
        self.inner.state.send_modify(|s| s.error = None);
    }

    /// Converts the current inputs immediately, cancelling any pending timer.
    pub async fn convert_now(&self) {
        self.cancel_pending();
        self.inner.execute().await;
    }

    /// Re-arms the debounce timer without changing the inputs.
    pub fn reschedule(&self) {
        self.schedule();
    }

    fn update(&self, change: impl FnOnce(&mut ConversionInput)) {
        change(&mut *lock(&self.inner.input));
        self.schedule();
    }

    fn cancel_pending(&self) {
        if let Some(handle) = lock(&self.pending).take() {
            handle.abort();
        }
    }

    fn schedule(&self) {
        let inner = Arc::clone(&self.inner);
        let quiet_period = self.quiet_period;

        let mut pending = lock(&self.pending);
        if let Some(handle) = pending.take() {
            handle.abort();
        }
        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(quiet_period).await;
            inner.execute().await;
        }));
    }
}

impl<A: CurrencyApi + ?Sized + 'static> Drop for ConversionRequester<A> {
    fn drop(&mut self) {
        self.cancel_pending();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::CurrencyCatalog;
    use crate::core::rates::{LatestRates, RateTable};
    use crate::core::sync::SyncController;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use tokio::time::{Instant, sleep};

    #[derive(Debug, Clone, PartialEq)]
    struct Call {
        at: Instant,
        from: String,
        to: String,
        amount: f64,
    }

    #[derive(Default)]
    struct RecordingApi {
        calls: Mutex<Vec<Call>>,
        /// Response latency per call index.
        latencies: Vec<u64>,
    }

    impl RecordingApi {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CurrencyApi for RecordingApi {
        async fn fetch_currencies(&self) -> Result<CurrencyCatalog, SyncError> {
            Ok(CurrencyCatalog::fallback())
        }

        async fn fetch_latest(&self, base: &str) -> Result<LatestRates, SyncError> {
            Ok(LatestRates {
                table: RateTable::new(base, Default::default()),
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

        async fn convert(&self, from: &str, to: &str, amount: f64) -> Result<f64, SyncError> {
            let index = {
                let mut calls = self.calls.lock().unwrap();
                calls.push(Call {
                    at: Instant::now(),
                    from: from.to_string(),
                    to: to.to_string(),
                    amount,
                });
                calls.len() - 1
            };
            if let Some(latency) = self.latencies.get(index) {
                sleep(Duration::from_millis(*latency)).await;
            }
            if from == "XXX" {
                return Err(SyncError::NetworkFailure("upstream unavailable".to_string()));
            }
            Ok(amount * 0.9)
        }
    }

    async fn ready_requester(
        api: Arc<RecordingApi>,
        input: ConversionInput,
    ) -> (SyncController<RecordingApi>, ConversionRequester<RecordingApi>) {
        let controller = SyncController::new(Arc::clone(&api), "USD");
        controller.start().await;
        let requester =
            ConversionRequester::new(api, controller.subscribe(), input, DEFAULT_QUIET_PERIOD);
        (controller, requester)
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_fires_once_after_quiet_period() {
        let api = Arc::new(RecordingApi::default());
        let (_controller, requester) =
            ready_requester(Arc::clone(&api), ConversionInput::new("", "USD", "EUR")).await;
        let start = Instant::now();

        requester.set_amount("1").unwrap();
        sleep(Duration::from_millis(100)).await;
        requester.set_amount("10").unwrap();
        sleep(Duration::from_millis(100)).await;
        requester.set_to("gbp");
        sleep(Duration::from_millis(2000)).await;

        let calls = api.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].at - start, Duration::from_millis(700));
        assert_eq!(calls[0].amount, 10.0);
        assert_eq!(calls[0].to, "GBP");

        let state = requester.state();
        assert!(!state.converting);
        let result = state.result.unwrap();
        assert_eq!(result.value, 9.0);
        assert_eq!(result.to, "GBP");
    }

    #[tokio::test(start_paused = true)]
    async fn test_nothing_fires_before_quiet_period() {
        let api = Arc::new(RecordingApi::default());
        let (_controller, requester) =
            ready_requester(Arc::clone(&api), ConversionInput::new("", "USD", "EUR")).await;

        requester.set_amount("5").unwrap();
        sleep(Duration::from_millis(499)).await;
        assert!(api.calls().is_empty());

        sleep(Duration::from_millis(2)).await;
        assert_eq!(api.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_amount_clears_result_without_request() {
        let api = Arc::new(RecordingApi::default());
        let (_controller, requester) =
            ready_requester(Arc::clone(&api), ConversionInput::new("100", "USD", "EUR")).await;
        requester.convert_now().await;
        assert!(requester.state().result.is_some());

        for amount in ["", "0", "0.000", "."] {
            requester.set_amount(amount).unwrap();
            sleep(Duration::from_millis(600)).await;
            assert!(requester.state().result.is_none(), "amount '{amount}'");
        }
        assert_eq!(api.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_amount_text_keeps_previous_amount() {
        let api = Arc::new(RecordingApi::default());
        let (_controller, requester) =
            ready_requester(Arc::clone(&api), ConversionInput::new("100", "USD", "EUR")).await;

        let result = requester.set_amount("-12");
        assert!(matches!(result, Err(SyncError::ValidationFailure(_))));
        assert_eq!(requester.input().amount, "100");
        assert!(api.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_skipped_while_initial_loading() {
        let api = Arc::new(RecordingApi::default());
        let controller = SyncController::new(Arc::clone(&api), "USD");
        let requester = ConversionRequester::new(
            Arc::clone(&api),
            controller.subscribe(),
            ConversionInput::new("", "USD", "EUR"),
            DEFAULT_QUIET_PERIOD,
        );

        requester.set_amount("25").unwrap();
        sleep(Duration::from_millis(600)).await;

        assert!(api.calls().is_empty());
        assert_eq!(requester.state(), ConversionState::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_response_is_discarded() {
        let api = Arc::new(RecordingApi {
            latencies: vec![300, 10],
            ..Default::default()
        });
        let (_controller, requester) =
            ready_requester(Arc::clone(&api), ConversionInput::new("100", "USD", "EUR")).await;

        tokio::join!(requester.convert_now(), async {
            sleep(Duration::from_millis(50)).await;
            requester.set_amount("200").unwrap();
            requester.convert_now().await;
        });
        sleep(Duration::from_millis(500)).await;

        assert_eq!(api.calls().len(), 2);
        let result = requester.state().result.unwrap();
        assert_eq!(result.amount, 200.0);
        assert_eq!(result.value, 180.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_conversion_error_is_reported() {
        let api = Arc::new(RecordingApi::default());
        let (_controller, requester) =
            ready_requester(Arc::clone(&api), ConversionInput::new("100", "XXX", "EUR")).await;

        requester.convert_now().await;

        let state = requester.state();
        assert!(state.result.is_none());
        assert_eq!(
            state.error.as_deref(),
            Some("network failure: upstream unavailable")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_swap_exchanges_currencies() {
        let api = Arc::new(RecordingApi::default());
        let (_controller, requester) =
            ready_requester(Arc::clone(&api), ConversionInput::new("100", "USD", "EUR")).await;

        requester.swap();
        sleep(Duration::from_millis(600)).await;

        let calls = api.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!((calls[0].from.as_str(), calls[0].to.as_str()), ("EUR", "USD"));
    }
}
