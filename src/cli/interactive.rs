use super::{convert, rates, ui};
use crate::core::{
    ConversionInput, ConversionRequester, CurrencyApi, RateTableView, SortKey, SyncController,
};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

const HELP: &str = "\
Commands:
  amount <value>     set the amount to convert
  from <code>        set the source currency
  to <code>          set the target currency
  swap               swap source and target currencies
  convert            convert now
  base <code>        change the base currency of the rate table
  refresh            reload exchange rates
  search <text>      filter the rate table (empty to clear)
  sort <currency|rate>  sort the rate table, again to reverse
  rates              show the rate table
  help               show this help
  quit               exit";

#[derive(Debug, PartialEq)]
enum Command {
    Amount(String),
    From(String),
    To(String),
    Swap,
    Convert,
    Base(String),
    Refresh,
    Search(String),
    Sort(SortKey),
    Rates,
    Help,
    Quit,
}

fn parse_command(line: &str) -> Result<Command> {
    let line = line.trim();
    let (name, arg) = line.split_once(' ').unwrap_or((line, ""));
    let arg = arg.trim();
    let require = |what: &str| -> Result<String> {
        if arg.is_empty() {
            anyhow::bail!("Usage: {name} <{what}>");
        }
        Ok(arg.to_string())
    };

    Ok(match name.to_lowercase().as_str() {
        "amount" => Command::Amount(arg.to_string()),
        "from" => Command::From(require("code")?),
        "to" => Command::To(require("code")?),
        "swap" => Command::Swap,
        "convert" => Command::Convert,
        "base" => Command::Base(require("code")?),
        "refresh" => Command::Refresh,
        "search" => Command::Search(arg.to_string()),
        "sort" => Command::Sort(require("currency|rate")?.parse()?),
        "rates" => Command::Rates,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => anyhow::bail!("Unknown command '{other}', type 'help' for a list"),
    })
}

pub async fn run(
    api: Arc<dyn CurrencyApi>,
    base_currency: &str,
    input: ConversionInput,
    quiet_period: Duration,
) -> Result<()> {
    let controller = SyncController::new(Arc::clone(&api), base_currency);
    let requester = ConversionRequester::new(api, controller.subscribe(), input, quiet_period);
    let mut conversions = requester.subscribe();
    let mut view = RateTableView::new();

    let pb = ui::new_spinner("Loading currencies and rates...");
    controller.start().await;
    pb.finish_and_clear();
    println!("{}", rates::display_rates(&controller.snapshot(), &mut view));
    println!("{}", ui::style_text("Type 'help' for commands", ui::StyleType::Subtle));
    requester.reschedule();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            changed = conversions.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = conversions.borrow_and_update().clone();
                println!("{}", convert::display_conversion(&state));
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }
                let command = match parse_command(&line) {
                    Ok(command) => command,
                    Err(e) => {
                        println!("{}", ui::style_text(&e.to_string(), ui::StyleType::Error));
                        continue;
                    }
                };
                debug!(?command, "Interactive command");

                match command {
                    Command::Amount(text) => {
                        if let Err(e) = requester.set_amount(&text) {
                            println!("{}", ui::style_text(&e.to_string(), ui::StyleType::Error));
                        }
                    }
                    Command::From(code) => requester.set_from(&code),
                    Command::To(code) => requester.set_to(&code),
                    Command::Swap => requester.swap(),
                    Command::Convert => requester.convert_now().await,
                    Command::Base(code) => {
                        controller.set_base_currency(&code).await;
                        println!("{}", rates::display_rates(&controller.snapshot(), &mut view));
                    }
                    Command::Refresh => {
                        controller.refresh().await;
                        println!("{}", rates::display_rates(&controller.snapshot(), &mut view));
                    }
                    Command::Search(query) => {
                        view.set_query(&query);
                        println!("{}", rates::display_rates(&controller.snapshot(), &mut view));
                    }
                    Command::Sort(key) => {
                        view.toggle_sort(key);
                        println!("{}", rates::display_rates(&controller.snapshot(), &mut view));
                    }
                    Command::Rates => {
                        println!("{}", rates::display_rates(&controller.snapshot(), &mut view));
                    }
                    Command::Help => println!("{HELP}"),
                    Command::Quit => break,
                }
            }
        }
    }
    Ok(())
}
