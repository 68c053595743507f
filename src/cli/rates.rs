use super::ui;
use crate::core::{
    CurrencyApi, RateTableView, SortDirection, SortKey, SyncController, SyncSnapshot,
};
use anyhow::Result;
use comfy_table::Cell;
use std::sync::Arc;

/// Renders the filtered, sorted rate table with its sync status.
pub fn display_rates(snapshot: &SyncSnapshot, view: &mut RateTableView) -> String {
    let mut output = format!(
        "{} {}\n",
        ui::style_text("Exchange Rates", ui::StyleType::Title),
        ui::style_text(
            &format!("(1 {})", snapshot.rates_base()),
            ui::StyleType::Subtle
        )
    );

    if snapshot.rates_base() != snapshot.base_currency {
        let notice = format!(
            "Showing {} rates, {} rates are not available yet",
            snapshot.rates_base(),
            snapshot.base_currency
        );
        output.push_str(&format!("{}\n", ui::style_text(&notice, ui::StyleType::Warning)));
    }

    if let Some(error) = &snapshot.catalog_status.error {
        output.push_str(&format!("{}\n", ui::style_text(error, ui::StyleType::Warning)));
    }
    if let Some(error) = &snapshot.rate_status.error {
        output.push_str(&format!("{}\n", ui::style_text(error, ui::StyleType::Error)));
    }

    let query = view.query().to_string();
    let sort_key = view.sort_key();
    let arrow = match view.direction() {
        SortDirection::Ascending => "↑",
        SortDirection::Descending => "↓",
    };

    let rows = view.rows(&snapshot.rates, &snapshot.catalog);
    if rows.is_empty() {
        let message = if query.is_empty() {
            "No exchange rates available".to_string()
        } else {
            format!("No currencies match '{query}'")
        };
        output.push_str(&ui::style_text(&message, ui::StyleType::Subtle));
        return output;
    }

    let header = |label: &str, key: SortKey| {
        if sort_key == key {
            ui::header_cell(&format!("{label} {arrow}"))
        } else {
            ui::header_cell(label)
        }
    };

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        header("Currency", SortKey::Currency),
        ui::header_cell("Name"),
        header("Rate", SortKey::Rate),
    ]);
    for row in rows {
        table.add_row(vec![
            Cell::new(&row.code),
            Cell::new(&row.name),
            ui::rate_cell(row.rate),
        ]);
    }
    output.push_str(&table.to_string());

    if snapshot.rate_status.last_updated.is_some() {
        output.push_str(&format!(
            "\n{}",
            ui::style_text(
                &format!(
                    "Last updated: {}",
                    ui::format_timestamp(snapshot.rate_status.last_updated)
                ),
                ui::StyleType::Subtle
            )
        ));
    }
    output
}

/// Runs the startup sync for `base_currency` behind a spinner.
pub async fn load_snapshot(api: Arc<dyn CurrencyApi>, base_currency: &str) -> SyncSnapshot {
    let controller = SyncController::new(api, base_currency);

    let pb = ui::new_spinner("Fetching exchange rates...");
    controller.start().await;
    pb.finish_and_clear();

    controller.snapshot()
}

pub fn new_view(search: Option<&str>, sort: SortKey, descending: bool) -> RateTableView {
    let mut view = RateTableView::new();
    view.set_query(search.unwrap_or_default());
    let direction = if descending {
        SortDirection::Descending
    } else {
        SortDirection::Ascending
    };
    view.set_sort(sort, direction);
    view
}

pub async fn run(
    api: Arc<dyn CurrencyApi>,
    base_currency: &str,
    search: Option<&str>,
    sort: SortKey,
    descending: bool,
) -> Result<()> {
    let snapshot = load_snapshot(api, base_currency).await;
    let mut view = new_view(search, sort, descending);

    println!("{}", display_rates(&snapshot, &mut view));

    if let Some(error) = &snapshot.rate_status.error {
        anyhow::bail!("{error}");
    }
    Ok(())
}
