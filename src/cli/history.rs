use super::ui;
use crate::core::{CurrencyApi, LatestRates, SyncError};
use anyhow::Result;
use chrono::NaiveDate;
use comfy_table::Cell;
use futures::future::join_all;
use std::sync::Arc;

pub fn display_history(
    base_currency: &str,
    symbols: &[String],
    history: &[(NaiveDate, Result<LatestRates, SyncError>)],
) -> String {
    let mut table = ui::new_styled_table();
    let mut header = vec![ui::header_cell("Currency")];
    header.extend(
        history
            .iter()
            .map(|(date, _)| ui::header_cell(&date.format("%Y-%m-%d").to_string())),
    );
    table.set_header(header);

    for symbol in symbols {
        let mut row = vec![Cell::new(symbol)];
        for (_, result) in history {
            let rate = result.as_ref().ok().and_then(|r| r.table.rate(symbol));
            row.push(match rate {
                Some(rate) => ui::rate_cell(rate),
                None => Cell::new("N/A"),
            });
        }
        table.add_row(row);
    }

    let mut output = format!(
        "{} {}\n{}",
        ui::style_text("Historical Rates", ui::StyleType::Title),
        ui::style_text(&format!("(1 {base_currency})"), ui::StyleType::Subtle),
        table
    );
    for (date, result) in history {
        if let Err(e) = result {
            output.push_str(&format!(
                "\n{}",
                ui::style_text(&format!("{date}: {e}"), ui::StyleType::Error)
            ));
        }
    }
    output
}

/// Fetches every date concurrently; each date keeps its own result.
pub async fn fetch_history(
    api: Arc<dyn CurrencyApi>,
    base_currency: &str,
    dates: &[NaiveDate],
) -> Vec<(NaiveDate, Result<LatestRates, SyncError>)> {
    let pb = ui::new_spinner("Fetching historical rates...");
    let futures = dates.iter().map(|date| {
        let api = Arc::clone(&api);
        let base = base_currency.to_string();
        async move { (*date, api.fetch_historical(&base, *date).await) }
    });
    let history = join_all(futures).await;
    pb.finish_and_clear();
    history
}

/// Requested symbols, or every code of the first loaded date when none are given.
pub fn resolve_symbols(
    symbols: &[String],
    history: &[(NaiveDate, Result<LatestRates, SyncError>)],
) -> Vec<String> {
    if symbols.is_empty() {
        history
            .iter()
            .find_map(|(_, r)| r.as_ref().ok())
            .map(|r| r.table.iter().map(|(code, _)| code.to_string()).collect())
            .unwrap_or_default()
    } else {
        symbols.iter().map(|s| s.to_uppercase()).collect()
    }
}

pub async fn run(
    api: Arc<dyn CurrencyApi>,
    base_currency: &str,
    dates: &[NaiveDate],
    symbols: &[String],
) -> Result<()> {
    let base_currency = base_currency.to_uppercase();
    let history = fetch_history(api, &base_currency, dates).await;
    let symbols = resolve_symbols(symbols, &history);

    println!("{}", display_history(&base_currency, &symbols, &history));

    if history.iter().all(|(_, r)| r.is_err()) {
        anyhow::bail!("No historical rates could be loaded");
    }
    Ok(())
}
