//! Marigold CLI - Database migrations and operator tools.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront database migrations
//! mg-cli migrate
//!
//! # Load charge rules from a YAML file
//! mg-cli charges seed charges.yaml --replace
//!
//! # Show configured charge rules
//! mg-cli charges list
//!
//! # Set a product's stock total
//! mg-cli stock set -p 42 -t 120 -n "Linen Shirt"
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `charges` - Seed and inspect charge rules
//! - `stock` - Administrative stock edits

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "mg-cli")]
#[command(author, version, about = "Marigold CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run storefront database migrations
    Migrate,
    /// Manage checkout charge rules
    Charges {
        #[command(subcommand)]
        action: ChargeAction,
    },
    /// Manage product stock totals
    Stock {
        #[command(subcommand)]
        action: StockAction,
    },
}

#[derive(Subcommand)]
enum ChargeAction {
    /// Load charge rules from a YAML file
    Seed {
        /// Path to the YAML file
        file: String,

        /// Delete existing rules before loading
        #[arg(long)]
        replace: bool,
    },
    /// List charge rules
    List {
        /// Only show active rules
        #[arg(long)]
        active: bool,
    },
}

#[derive(Subcommand)]
enum StockAction {
    /// Set a product's stock total, creating the product if needed
    Set {
        /// Product ID
        #[arg(short, long)]
        product: i32,

        /// New stock total
        #[arg(short, long)]
        total: i64,

        /// Product name (required for new products)
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Show total, reserved and available stock
    Show {
        /// Product ID
        #[arg(short, long)]
        product: i32,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::storefront().await?,
        Commands::Charges { action } => match action {
            ChargeAction::Seed { file, replace } => {
                commands::charges::seed(&file, replace).await?;
            }
            ChargeAction::List { active } => commands::charges::list(active).await?,
        },
        Commands::Stock { action } => match action {
            StockAction::Set {
                product,
                total,
                name,
            } => commands::stock::set(product, total, name.as_deref()).await?,
            StockAction::Show { product } => commands::stock::show(product).await?,
        },
    }
    Ok(())
}
