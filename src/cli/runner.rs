//! Wiring of stores, price sources and catalogs, plus the subcommand handlers.

use anyhow::{anyhow, bail, Context, Result};
use chrono::{NaiveDate, Utc};
use colored::Colorize;
use std::io::Write;
use std::sync::Arc;
use tracing::{info, warn};

use crate::cli::formatters;
use crate::cli::Commands;
use crate::config::{AppConfig, ProviderKind};
use crate::db::{parse_date, Portfolio, SqlitePortfolioStore, Stock};
use crate::pricing::{
    AlphaVantageClient, CachedPriceSource, FmpClient, OfflinePriceSource, PriceSource,
};
use crate::services::{generate_random_portfolio, PortfolioService};
use crate::tickers::{Sp500Catalog, SymbolCatalog};

/// Everything a command needs, built once from the configuration
pub struct App {
    pub service: PortfolioService,
    pub catalog: Box<dyn SymbolCatalog>,
    pub today: NaiveDate,
}

impl App {
    pub fn new(service: PortfolioService, catalog: Box<dyn SymbolCatalog>) -> Self {
        Self {
            service,
            catalog,
            today: Utc::now().date_naive(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let store = SqlitePortfolioStore::open(config.db_path.clone())?;
        let prices = build_price_source(config)?;
        let service = PortfolioService::new(Arc::new(store), prices);
        Ok(Self::new(service, build_catalog(config)))
    }
}

/// Provider client wrapped in the per-process quote cache
pub fn build_price_source(config: &AppConfig) -> Result<Arc<dyn PriceSource>> {
    if config.offline {
        info!("Offline mode: price lookups are disabled");
        return Ok(Arc::new(OfflinePriceSource));
    }

    let api_key = config.api_key.clone().unwrap_or_default();
    if api_key.is_empty() {
        warn!(
            "No API key configured for provider '{}'; price lookups will fail",
            config.provider.as_str()
        );
    }

    let price_url = config.price_url.as_deref();
    let timeout = config.http_timeout();
    let source: Arc<dyn PriceSource> = match config.provider {
        ProviderKind::Fmp => Arc::new(CachedPriceSource::new(FmpClient::new(
            &api_key, price_url, timeout,
        )?)),
        ProviderKind::AlphaVantage => Arc::new(CachedPriceSource::new(
            AlphaVantageClient::new(&api_key, price_url, timeout)?,
        )),
    };
    Ok(source)
}

pub fn build_catalog(config: &AppConfig) -> Box<dyn SymbolCatalog> {
    let catalog = Sp500Catalog::new(config.symbols_url.as_deref(), None, config.http_timeout());
    if config.offline {
        Box::new(catalog.offline())
    } else {
        Box::new(catalog)
    }
}

/// A lot given on the command line as `SYMBOL:QTY:YYYY-MM-DD[:PRICE]`
#[derive(Debug, Clone, PartialEq)]
pub struct LotSpec {
    pub symbol: String,
    pub quantity: i64,
    pub buy_date: NaiveDate,
    pub buy_price: Option<f64>,
}

pub fn parse_lot_spec(spec: &str) -> Result<LotSpec> {
    let parts: Vec<&str> = spec.split(':').map(str::trim).collect();
    if !(3..=4).contains(&parts.len()) {
        bail!(
            "Invalid lot '{}': expected SYMBOL:QTY:YYYY-MM-DD[:PRICE]",
            spec
        );
    }

    let symbol = parts[0].to_ascii_uppercase();
    if symbol.is_empty() {
        bail!("Invalid lot '{}': symbol is empty", spec);
    }
    let quantity: i64 = parts[1]
        .parse()
        .map_err(|_| anyhow!("Invalid lot '{}': quantity '{}' is not a whole number", spec, parts[1]))?;
    let buy_date = parse_date(parts[2]).context(format!("Invalid lot '{}'", spec))?;
    let buy_price = match parts.get(3) {
        Some(price) => Some(
            price
                .trim_start_matches('$')
                .parse::<f64>()
                .map_err(|_| anyhow!("Invalid lot '{}': price '{}' is not a number", spec, price))?,
        ),
        None => None,
    };

    Ok(LotSpec {
        symbol,
        quantity,
        buy_date,
        buy_price,
    })
}

/// Execute one subcommand, writing its output to `out`
pub fn run_command(app: &App, command: Commands, json: bool, out: &mut dyn Write) -> Result<()> {
    match command {
        Commands::Menu => crate::ui::launch_menu(&app.service, app.catalog.as_ref()),
        Commands::List => handle_list(app, json, out),
        Commands::Show { id } => handle_show(app, id, json, out),
        Commands::Apr { id, from, to } => {
            handle_apr(app, id, from.as_deref(), to.as_deref(), json, out)
        }
        Commands::Create { name, lots } => handle_create(app, &name, &lots, json, out),
        Commands::Random { count } => handle_random(app, count, json, out),
        Commands::Delete { id } => handle_delete(app, id, out),
        Commands::Symbols => handle_symbols(app, out),
    }
}

fn handle_list(app: &App, json: bool, out: &mut dyn Write) -> Result<()> {
    let portfolios = app
        .service
        .get_all_portfolios()
        .context("Failed to load portfolios")?;

    if json {
        writeln!(out, "{}", formatters::format_portfolios_json(&portfolios))?;
    } else {
        write!(out, "{}", formatters::format_portfolio_list(&portfolios))?;
    }
    Ok(())
}

fn handle_show(app: &App, id: i64, json: bool, out: &mut dyn Write) -> Result<()> {
    let portfolio = app.service.require_portfolio(id)?;
    let apr = app
        .service
        .calculate_apr_since_purchase(&portfolio, app.today);

    if json {
        writeln!(
            out,
            "{}",
            formatters::format_portfolio_json(&portfolio, apr.as_ref())
        )?;
        return Ok(());
    }

    write!(out, "{}", formatters::format_portfolio_detail(&portfolio))?;
    match apr {
        Ok(report) => write!(out, "{}", formatters::format_apr_report(&report))?,
        Err(e) => writeln!(out, "APR: Could not calculate APR ({})", e)?,
    }
    Ok(())
}

fn handle_apr(
    app: &App,
    id: i64,
    from: Option<&str>,
    to: Option<&str>,
    json: bool,
    out: &mut dyn Write,
) -> Result<()> {
    let portfolio = app.service.require_portfolio(id)?;
    let end_date = match to {
        Some(value) => parse_date(value)?,
        None => app.today,
    };

    let report = match from {
        Some(value) => {
            let start_date = parse_date(value)?;
            app.service
                .calculate_apr_report(&portfolio, start_date, end_date)?
        }
        None => app
            .service
            .calculate_apr_since_purchase(&portfolio, end_date)?,
    };

    if json {
        writeln!(out, "{}", formatters::format_apr_json(&report))?;
    } else {
        write!(out, "{}", formatters::format_apr_report(&report))?;
    }
    Ok(())
}

fn handle_create(
    app: &App,
    name: &str,
    lots: &[String],
    json: bool,
    out: &mut dyn Write,
) -> Result<()> {
    let mut stocks = Vec::with_capacity(lots.len());

    for spec in lots {
        let lot = parse_lot_spec(spec)?;
        if lot.buy_date > app.today {
            bail!(
                "Purchase date {} of {} is in the future",
                lot.buy_date,
                lot.symbol
            );
        }

        let price = match lot.buy_price {
            Some(price) => price,
            None => app
                .service
                .get_price_close(&lot.symbol, lot.buy_date)
                .map_err(|e| {
                    if e.is_price_unavailable() {
                        anyhow!("{}. Append :PRICE to the lot to enter it manually", e)
                    } else {
                        anyhow!(e)
                    }
                })?,
        };

        stocks.push(Stock::new(&lot.symbol, lot.quantity, lot.buy_date, price)?);
    }

    let mut portfolio = Portfolio::new(name, stocks);
    let id = app.service.create_portfolio_manual(&mut portfolio)?;

    if json {
        writeln!(
            out,
            "{}",
            formatters::format_portfolios_json(std::slice::from_ref(&portfolio))
        )?;
    } else {
        writeln!(
            out,
            "{} Portfolio '{}' created (ID: {})",
            "✓".green(),
            portfolio.name,
            id
        )?;
    }
    Ok(())
}

fn handle_random(app: &App, count: usize, json: bool, out: &mut dyn Write) -> Result<()> {
    if count == 0 {
        bail!("--count must be at least 1");
    }

    let symbols = app
        .catalog
        .symbols()
        .context("Failed to load the S&P 500 symbol list")?;
    let (mut portfolio, skipped) = generate_random_portfolio(
        &app.service,
        &symbols,
        count,
        app.today,
        &mut rand::rng(),
    )?;

    for lot in &skipped {
        warn!("Skipped {} x{}: {}", lot.symbol, lot.quantity, lot.reason);
    }
    if portfolio.stocks.is_empty() {
        bail!("None of the {} random lots could be priced", count);
    }

    let id = app.service.create_portfolio_manual(&mut portfolio)?;
    let apr = app
        .service
        .calculate_apr_since_purchase(&portfolio, app.today);

    if json {
        writeln!(
            out,
            "{}",
            formatters::format_portfolio_json(&portfolio, apr.as_ref())
        )?;
        return Ok(());
    }

    writeln!(
        out,
        "{} Random portfolio '{}' created (ID: {})",
        "✓".green(),
        portfolio.name,
        id
    )?;
    write!(out, "{}", formatters::format_portfolio_detail(&portfolio))?;
    match apr {
        Ok(report) => write!(out, "{}", formatters::format_apr_report(&report))?,
        Err(e) => writeln!(out, "APR: Could not calculate APR ({})", e)?,
    }
    Ok(())
}

fn handle_delete(app: &App, id: i64, out: &mut dyn Write) -> Result<()> {
    match app.service.get_portfolio_by_id(id)? {
        Some(portfolio) => {
            app.service.delete_portfolio(id)?;
            writeln!(
                out,
                "{} Portfolio {} '{}' deleted",
                "✓".green(),
                id,
                portfolio.name
            )?;
        }
        None => writeln!(out, "Portfolio {} not found, nothing to delete", id)?,
    }
    Ok(())
}

fn handle_symbols(app: &App, out: &mut dyn Write) -> Result<()> {
    let symbols = app
        .catalog
        .symbols()
        .context("Failed to load the S&P 500 symbol list")?;
    for symbol in symbols {
        writeln!(out, "{}", symbol)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryPortfolioStore;
    use crate::pricing::InMemoryPriceSource;
    use crate::tickers::StaticCatalog;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn app(prices: InMemoryPriceSource) -> App {
        let service = PortfolioService::new(Arc::new(InMemoryPortfolioStore::new()), Arc::new(prices));
        let mut app = App::new(service, Box::new(StaticCatalog::new(&["AAPL", "MSFT"])));
        app.today = date(2021, 1, 15);
        app
    }

    fn run(app: &App, command: Commands) -> Result<String> {
        colored::control::set_override(false);
        let mut out = Vec::new();
        run_command(app, command, false, &mut out)?;
        Ok(String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_default_today_is_utc_date() {
        let before = Utc::now().date_naive();
        let service = PortfolioService::new(
            Arc::new(InMemoryPortfolioStore::new()),
            Arc::new(InMemoryPriceSource::new()),
        );
        let app = App::new(service, Box::new(StaticCatalog::new(&["AAPL"])));
        let after = Utc::now().date_naive();
        assert!(app.today == before || app.today == after);
    }

    #[test]
    fn test_parse_lot_spec() {
        let lot = parse_lot_spec("aapl:10:2020-01-15").unwrap();
        assert_eq!(lot.symbol, "AAPL");
        assert_eq!(lot.quantity, 10);
        assert_eq!(lot.buy_date, date(2020, 1, 15));
        assert_eq!(lot.buy_price, None);

        let lot = parse_lot_spec("MSFT:5:2020-01-15:$160.5").unwrap();
        assert_eq!(lot.buy_price, Some(160.5));
    }

    #[test]
    fn test_parse_lot_spec_rejects_malformed() {
        assert!(parse_lot_spec("AAPL:10").is_err());
        assert!(parse_lot_spec("AAPL:ten:2020-01-15").is_err());
        assert!(parse_lot_spec("AAPL:10:15/01/2020").is_err());
        assert!(parse_lot_spec(":10:2020-01-15").is_err());
        assert!(parse_lot_spec("AAPL:10:2020-01-15:cheap").is_err());
    }

    #[test]
    fn test_create_resolves_missing_price() {
        let app = app(InMemoryPriceSource::new()
            .with_close("AAPL", date(2020, 1, 15), 300.0)
            .with_close("AAPL", date(2021, 1, 15), 330.0));
        let output = run(
            &app,
            Commands::Create {
                name: "Tech".to_string(),
                lots: vec!["AAPL:10:2020-01-15".to_string()],
            },
        )
        .unwrap();
        assert!(output.contains("Portfolio 'Tech' created (ID: 1)"));

        let saved = app.service.require_portfolio(1).unwrap();
        assert_eq!(saved.stocks[0].buy_price, 300.0);

        let output = run(&app, Commands::Show { id: 1 }).unwrap();
        assert!(output.contains("APR 2020-01-15 to 2021-01-15"));
    }

    #[test]
    fn test_create_without_price_suggests_manual_entry() {
        let app = app(InMemoryPriceSource::new());
        let err = run(
            &app,
            Commands::Create {
                name: "Tech".to_string(),
                lots: vec!["AAPL:10:2020-01-15".to_string()],
            },
        )
        .unwrap_err();
        assert!(err.to_string().contains("Append :PRICE"));
        assert!(app.service.get_all_portfolios().unwrap().is_empty());
    }

    #[test]
    fn test_create_rejects_future_purchase() {
        let app = app(InMemoryPriceSource::new());
        let err = run(
            &app,
            Commands::Create {
                name: "Later".to_string(),
                lots: vec!["AAPL:1:2030-01-01:10".to_string()],
            },
        )
        .unwrap_err();
        assert!(err.to_string().contains("in the future"));
    }

    #[test]
    fn test_apr_with_explicit_window() {
        let app = app(InMemoryPriceSource::new().with_close("MSFT", date(2020, 7, 1), 200.0));
        run(
            &app,
            Commands::Create {
                name: "One".to_string(),
                lots: vec!["MSFT:2:2020-01-02:100".to_string()],
            },
        )
        .unwrap();

        let output = run(
            &app,
            Commands::Apr {
                id: 1,
                from: Some("2020-01-02".to_string()),
                to: Some("2020-07-01".to_string()),
            },
        )
        .unwrap();
        assert!(output.contains("APR 2020-01-02 to 2020-07-01"));
    }

    #[test]
    fn test_show_and_delete_missing_portfolio() {
        let app = app(InMemoryPriceSource::new());
        let err = run(&app, Commands::Show { id: 42 }).unwrap_err();
        assert!(err.to_string().contains("portfolio 42 not found"));

        let output = run(&app, Commands::Delete { id: 42 }).unwrap();
        assert!(output.contains("not found, nothing to delete"));
    }

    #[test]
    fn test_symbols_lists_catalog() {
        let app = app(InMemoryPriceSource::new());
        assert_eq!(run(&app, Commands::Symbols).unwrap(), "AAPL\nMSFT\n");
    }
}
