use anyhow::Result;
use chrono::NaiveDate;
use clap::{CommandFactory, Parser, Subcommand};
use fxdesk::core::SortKey;
use fxdesk::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// List known currencies
    Currencies {
        /// Only show currencies whose code or name contains this text
        #[arg(short, long)]
        search: Option<String>,
    },
    /// Display the exchange rate table
    Rates {
        /// Base currency of the table
        #[arg(short, long)]
        base: Option<String>,
        /// Only show currencies whose code or name contains this text
        #[arg(short, long)]
        search: Option<String>,
        /// Sort by `currency` or `rate`
        #[arg(long, default_value = "currency")]
        sort: SortKey,
        /// Sort in descending order
        #[arg(long)]
        desc: bool,
    },
    /// Convert an amount between two currencies
    Convert {
        amount: String,
        /// Source currency
        #[arg(short, long)]
        from: Option<String>,
        /// Target currency
        #[arg(short, long)]
        to: Option<String>,
    },
    /// Display exchange rates for past dates
    History {
        /// Dates to fetch, as YYYY-MM-DD
        #[arg(short, long = "date", required = true)]
        dates: Vec<NaiveDate>,
        /// Base currency of the rates
        #[arg(short, long)]
        base: Option<String>,
        /// Currencies to show, all when omitted
        symbols: Vec<String>,
    },
    /// Interactive converter and rate browser
    Interactive,
}

impl From<Commands> for fxdesk::AppCommand {
    fn from(cmd: Commands) -> fxdesk::AppCommand {
        match cmd {
            Commands::Currencies { search } => fxdesk::AppCommand::Currencies { search },
            Commands::Rates {
                base,
                search,
                sort,
                desc,
            } => fxdesk::AppCommand::Rates {
                base,
                search,
                sort,
                descending: desc,
            },
            Commands::Convert { amount, from, to } => {
                fxdesk::AppCommand::Convert { amount, from, to }
            }
            Commands::History {
                dates,
                base,
                symbols,
            } => fxdesk::AppCommand::History {
                dates,
                base,
                symbols,
            },
            Commands::Interactive => fxdesk::AppCommand::Interactive,
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => fxdesk::cli::setup::setup(),
        Some(cmd) => fxdesk::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
