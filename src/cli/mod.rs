use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod formatters;
pub mod runner;

#[derive(Parser)]
#[command(name = "stock-manager")]
#[command(version, about = "Stock portfolio tracker with annualized return (APR)")]
#[command(
    long_about = "Keep named portfolios of stock purchases and measure their annualized return using historical closing prices. Run without a subcommand for the interactive menu."
)]
pub struct Cli {
    /// Disable colorized/ANSI output
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,

    /// Output results in JSON format
    #[arg(long = "json", global = true)]
    pub json: bool,

    /// SQLite database file (overrides config and STOCK_MANAGER_DB)
    #[arg(long = "db", global = true)]
    pub db: Option<PathBuf>,

    /// Config file (default: ~/.stock-manager/config.toml)
    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Do not contact price or symbol providers
    #[arg(long = "offline", global = true)]
    pub offline: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start the interactive menu (default)
    Menu,

    /// List all portfolios
    List,

    /// Show a portfolio's lots and its return since the first purchase
    Show {
        /// Portfolio ID
        id: i64,
    },

    /// Annualized return of a portfolio over a date window
    Apr {
        /// Portfolio ID
        id: i64,

        /// Start date (YYYY-MM-DD), defaults to the earliest purchase
        #[arg(long)]
        from: Option<String>,

        /// End date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        to: Option<String>,
    },

    /// Create a portfolio from lots given as SYMBOL:QTY:YYYY-MM-DD[:PRICE]
    Create {
        /// Portfolio name
        name: String,

        /// Lots; the close price on the buy date is fetched when PRICE is omitted
        #[arg(required = true)]
        lots: Vec<String>,
    },

    /// Create a portfolio of random S&P 500 purchases from the last three years
    Random {
        /// Number of lots to draw
        #[arg(long, default_value_t = 5)]
        count: usize,
    },

    /// Delete a portfolio and its lots
    Delete {
        /// Portfolio ID
        id: i64,
    },

    /// List the symbols offered for manual entry
    Symbols,
}
