use super::ui;
use crate::core::{
    ConversionInput, ConversionRequester, ConversionState, CurrencyApi, SyncController,
};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

pub fn display_conversion(state: &ConversionState) -> String {
    if state.converting {
        return ui::style_text("Converting...", ui::StyleType::Warning);
    }
    if let Some(error) = &state.error {
        return ui::style_text(&format!("Conversion failed: {error}"), ui::StyleType::Error);
    }
    match &state.result {
        Some(result) => format!(
            "{} {} = {}",
            ui::format_amount(result.amount),
            result.from,
            ui::style_text(
                &format!("{} {}", ui::format_amount(result.value), result.to),
                ui::StyleType::Value
            )
        ),
        None => ui::style_text("Enter an amount to convert", ui::StyleType::Subtle),
    }
}

/// Syncs, then converts `input` right away. Invalid input fails before any
/// request goes out.
pub async fn convert_once(
    api: Arc<dyn CurrencyApi>,
    base_currency: &str,
    input: ConversionInput,
    quiet_period: Duration,
) -> Result<ConversionState> {
    input.request()?;

    let controller = SyncController::new(Arc::clone(&api), base_currency);
    let requester = ConversionRequester::new(api, controller.subscribe(), input, quiet_period);

    let pb = ui::new_spinner("Converting...");
    controller.start().await;
    requester.convert_now().await;
    pb.finish_and_clear();

    if let Some(error) = controller.snapshot().catalog_status.error {
        eprintln!("{}", ui::style_text(&error, ui::StyleType::Warning));
    }
    Ok(requester.state())
}

pub async fn run(
    api: Arc<dyn CurrencyApi>,
    base_currency: &str,
    input: ConversionInput,
    quiet_period: Duration,
) -> Result<()> {
    let state = convert_once(api, base_currency, input, quiet_period).await?;
    println!("{}", display_conversion(&state));
    if let Some(error) = state.error {
        anyhow::bail!("Conversion failed: {error}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ConversionResult;

    #[test]
    fn test_display_conversion() {
        let state = ConversionState {
            converting: false,
            result: Some(ConversionResult {
                amount: 1000.0,
                from: "USD".to_string(),
                to: "EUR".to_string(),
                value: 921.456,
            }),
            error: None,
        };
        let output = display_conversion(&state);
        assert!(output.contains("1,000 USD"));
        assert!(output.contains("921.46 EUR"));
    }

    #[test]
    fn test_display_conversion_error_and_empty() {
        let state = ConversionState {
            error: Some("empty result: no conversion result".to_string()),
            ..Default::default()
        };
        assert!(display_conversion(&state).contains("Conversion failed: empty result"));
        assert!(display_conversion(&ConversionState::default()).contains("Enter an amount"));
    }
}
