pub mod cli;
pub mod core;
pub mod providers;

use crate::core::config::AppConfig;
use crate::core::{ConversionInput, CurrencyApi, SortKey};
use crate::providers::BeaconProvider;
use anyhow::Result;
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    Currencies {
        search: Option<String>,
    },
    Rates {
        base: Option<String>,
        search: Option<String>,
        sort: SortKey,
        descending: bool,
    },
    Convert {
        amount: String,
        from: Option<String>,
        to: Option<String>,
    },
    History {
        dates: Vec<NaiveDate>,
        base: Option<String>,
        symbols: Vec<String>,
    },
    Interactive,
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("fxdesk starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!(
        base_url = %config.provider.base_url,
        base_currency = %config.base_currency,
        "Loaded config"
    );

    let api_key = config.provider.resolve_api_key()?;
    let api: Arc<dyn CurrencyApi> = Arc::new(BeaconProvider::with_timeout(
        &config.provider.base_url,
        &api_key,
        config.provider.timeout(),
    )?);

    match command {
        AppCommand::Currencies { search } => {
            cli::currencies::run(api, &config.base_currency, search.as_deref()).await
        }
        AppCommand::Rates {
            base,
            search,
            sort,
            descending,
        } => {
            let base = base.unwrap_or(config.base_currency);
            cli::rates::run(api, &base, search.as_deref(), sort, descending).await
        }
        AppCommand::Convert { amount, from, to } => {
            let input = ConversionInput::new(
                &amount,
                from.as_deref().unwrap_or(&config.converter.from),
                to.as_deref().unwrap_or(&config.converter.to),
            );
            cli::convert::run(api, &config.base_currency, input, config.debounce()).await
        }
        AppCommand::History {
            dates,
            base,
            symbols,
        } => {
            let base = base.unwrap_or(config.base_currency);
            cli::history::run(api, &base, &dates, &symbols).await
        }
        AppCommand::Interactive => {
            let input = ConversionInput::new(
                &config.converter.amount,
                &config.converter.from,
                &config.converter.to,
            );
            cli::interactive::run(api, &config.base_currency, input, config.debounce()).await
        }
    }
}
