use super::ui;
use crate::core::{CurrencyApi, CurrencyCatalog, SyncController};
use anyhow::Result;
use comfy_table::Cell;
use std::sync::Arc;

pub fn display_catalog(catalog: &CurrencyCatalog, search: Option<&str>) -> String {
    let query = search.unwrap_or_default().trim().to_lowercase();
    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell("Code"), ui::header_cell("Name")]);

    let mut count = 0;
    for (code, name) in catalog.iter().filter(|(code, name)| {
        code.to_lowercase().contains(&query) || name.to_lowercase().contains(&query)
    }) {
        table.add_row(vec![Cell::new(code), Cell::new(name)]);
        count += 1;
    }

    format!(
        "{}\n{}\n{}",
        ui::style_text("Currencies", ui::StyleType::Title),
        table,
        ui::style_text(&format!("{count} of {} currencies", catalog.len()), ui::StyleType::Subtle)
    )
}

pub async fn run(
    api: Arc<dyn CurrencyApi>,
    base_currency: &str,
    search: Option<&str>,
) -> Result<()> {
    let controller = SyncController::new(api, base_currency);

    let pb = ui::new_spinner("Fetching currencies...");
    controller.load_catalog().await;
    pb.finish_and_clear();

    let snapshot = controller.snapshot();
    if let Some(error) = &snapshot.catalog_status.error {
        eprintln!("{}", ui::style_text(error, ui::StyleType::Warning));
    }
    println!("{}", display_catalog(&snapshot.catalog, search));
    Ok(())
}
