//! Currency data synchronization core

pub mod catalog;
pub mod config;
pub mod conversion;
pub mod currency;
pub mod error;
pub mod log;
pub mod rates;
pub mod requester;
pub mod sync;
pub mod view;

// Re-export main types for cleaner imports
pub use catalog::CurrencyCatalog;
pub use conversion::{ConversionInput, ConversionResult};
pub use currency::CurrencyApi;
pub use error::SyncError;
pub use rates::{LatestRates, RateTable};
pub use requester::{ConversionRequester, ConversionState};
pub use sync::{SyncController, SyncPhase, SyncSnapshot, SyncStatus};
pub use view::{RateTableView, SortDirection, SortKey};
