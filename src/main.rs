// Entrypoint for the `pizza` CLI.
// - Parses the command line, loads configuration from the environment and
//   hands off to the matching flow in `ui`.
// - Returns `anyhow::Result` so any library error ends the run with context.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use pizza_cli::{ui, ApiClient, Config};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pizza")]
#[command(version, about = "Find a store, browse its menu and order a pizza")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List open stores near an address ("street, city, region, zip")
    Stores {
        address: String,
        /// Look for carryout instead of delivery
        #[arg(long)]
        carryout: bool,
    },
    /// Show or search the menu of the closest store
    Menu {
        address: String,
        /// Only print variants whose name contains this text
        #[arg(short, long)]
        search: Option<String>,
    },
    /// Manage saved customers
    Customer {
        #[command(subcommand)]
        action: CustomerAction,
    },
    /// Build and place an order interactively (default)
    Order,
}

#[derive(Subcommand)]
enum CustomerAction {
    /// Prompt for customer details and save them
    Save {
        /// File name inside the customer directory
        name: String,
    },
    /// Print a saved customer
    Show {
        /// File name inside the customer directory, or a path
        name: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to load configuration")?;
    let api = ApiClient::from_config(&config).context("Failed to build HTTP client")?;

    match cli.command.unwrap_or(Commands::Order) {
        Commands::Stores { address, carryout } => ui::list_stores(&api, &address, carryout)?,
        Commands::Menu { address, search } => {
            ui::show_menu(&api, &config, &address, search.as_deref())?;
        }
        Commands::Customer { action } => match action {
            CustomerAction::Save { name } => ui::save_customer(&config, &name)?,
            CustomerAction::Show { name } => ui::show_customer(&config, &name)?,
        },
        Commands::Order => ui::order_flow(&api, &config)?,
    }
    Ok(())
}
