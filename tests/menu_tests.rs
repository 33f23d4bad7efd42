//! Interactive menu driven by scripted input against in-memory doubles

use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::io::Cursor;
use std::sync::Arc;
use stock_manager::db::{InMemoryPortfolioStore, Portfolio, PortfolioStore, Stock, StockPriceQuote};
use stock_manager::error::Result as CoreResult;
use stock_manager::pricing::{InMemoryPriceSource, PriceSource};
use stock_manager::services::PortfolioService;
use stock_manager::tickers::StaticCatalog;
use stock_manager::ui::{BufReadInput, Menu};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn today() -> NaiveDate {
    date(2021, 1, 15)
}

fn catalog() -> StaticCatalog {
    StaticCatalog::new(&["AAPL", "MSFT", "IBM"])
}

/// Run the menu over `script` and return everything it printed
fn run_menu(service: &PortfolioService, script: &str) -> String {
    colored::control::set_override(false);
    let catalog = catalog();
    let mut out = Vec::new();
    {
        let mut menu = Menu::new(
            service,
            &catalog,
            BufReadInput::new(Cursor::new(script.to_string())),
            &mut out,
        )
        .with_today(today())
        .with_rng(StdRng::seed_from_u64(5));
        menu.run().unwrap();
    }
    String::from_utf8(out).unwrap()
}

fn seeded_service(prices: InMemoryPriceSource) -> PortfolioService {
    let service =
        PortfolioService::new(Arc::new(InMemoryPortfolioStore::new()), Arc::new(prices));
    let mut portfolio = Portfolio::new(
        "Tech",
        vec![Stock::new("AAPL", 10, date(2020, 1, 15), 100.0).unwrap()],
    );
    service.create_portfolio_manual(&mut portfolio).unwrap();
    service
}

#[test]
fn test_exit_and_end_of_input() {
    let service = seeded_service(InMemoryPriceSource::new());
    assert!(run_menu(&service, "4\n").contains("Exiting..."));
    assert!(run_menu(&service, "").contains("Exiting..."));
    assert!(run_menu(&service, "9\n4\n").contains("Invalid option."));
}

#[test]
fn test_view_lists_portfolios_with_apr() {
    let service = seeded_service(InMemoryPriceSource::new().with_close("AAPL", today(), 110.0));
    let output = run_menu(&service, "1\n\n4\n");

    assert!(output.contains("Portfolio 1 - Tech"));
    assert!(output.contains("APR 2020-01-15 to 2021-01-15"));
    assert!(output.contains("Enter the ID of the portfolio to edit/delete"));
}

#[test]
fn test_view_reports_apr_failure() {
    let service = seeded_service(InMemoryPriceSource::new());
    let output = run_menu(&service, "1\n\n4\n");
    assert!(output.contains("APR: Could not calculate APR (insufficient data"));
}

#[test]
fn test_manual_creation_uses_fetched_price() {
    let service = PortfolioService::new(
        Arc::new(InMemoryPortfolioStore::new()),
        Arc::new(InMemoryPriceSource::new().with_close("MSFT", date(2020, 3, 2), 160.0)),
    );
    let output = run_menu(&service, "2\nBlue chips\n2\n5\n2020-03-02\n\n4\n");

    assert!(output.contains("Close price for MSFT on 2020-03-02: $160.00"));
    assert!(output.contains("Portfolio created successfully (ID: 1)."));
    let saved = service.require_portfolio(1).unwrap();
    assert_eq!(saved.name, "Blue chips");
    assert_eq!(saved.stocks, vec![Stock::new("MSFT", 5, date(2020, 3, 2), 160.0).unwrap()]);
}

#[test]
fn test_manual_creation_falls_back_to_typed_price() {
    let service = PortfolioService::new(
        Arc::new(InMemoryPortfolioStore::new()),
        Arc::new(InMemoryPriceSource::new()),
    );
    // First lot gets a typed price, second is skipped by leaving the price empty
    let script = "2\nManual\nibm\n3\n2019-06-03\n135.5\nAAPL\n1\n2019-06-03\n\n\n4\n";
    let output = run_menu(&service, script);

    assert!(output.contains("Could not retrieve the price"));
    assert!(output.contains("Skipping AAPL."));
    let saved = service.require_portfolio(1).unwrap();
    assert_eq!(saved.stocks.len(), 1);
    assert_eq!(saved.stocks[0].symbol, "IBM");
    assert_eq!(saved.stocks[0].buy_price, 135.5);
}

#[test]
fn test_manual_creation_validates_answers() {
    let service = PortfolioService::new(
        Arc::new(InMemoryPortfolioStore::new()),
        Arc::new(InMemoryPriceSource::new()),
    );
    let script = "2\nChecks\nTSLA\n99\nAAPL\n0\nAAPL\n1\n15/01/2020\nAAPL\n1\n2030-01-01\n\n4\n";
    let output = run_menu(&service, script);

    assert!(output.contains("Unknown symbol TSLA."));
    assert!(output.contains("Invalid input."));
    assert!(output.contains("Invalid quantity."));
    assert!(output.contains("Invalid date."));
    assert!(output.contains("Purchase date cannot be in the future."));
    assert!(output.contains("No stocks added to the portfolio."));
    assert!(service.get_all_portfolios().unwrap().is_empty());
}

#[test]
fn test_manual_creation_requires_name() {
    let service = seeded_service(InMemoryPriceSource::new());
    let output = run_menu(&service, "2\n\n4\n");
    assert!(output.contains("Portfolio name cannot be empty."));
}

#[test]
fn test_edit_renames_and_replaces_lots() {
    let service = seeded_service(
        InMemoryPriceSource::new().with_close("MSFT", date(2020, 6, 1), 180.0),
    );
    // View -> pick 1 -> edit -> rename, add MSFT, remove AAPL (lot 1), save
    let script = "1\n1\n1\n1\nRenamed\n2\nMSFT\n2\n2020-06-01\n3\n1\n4\n4\n";
    let output = run_menu(&service, script);

    assert!(output.contains("Removed AAPL x10."));
    assert!(output.contains("Portfolio updated successfully."));
    let saved = service.require_portfolio(1).unwrap();
    assert_eq!(saved.name, "Renamed");
    assert_eq!(saved.stocks, vec![Stock::new("MSFT", 2, date(2020, 6, 1), 180.0).unwrap()]);
}

#[test]
fn test_edit_discard_keeps_stored_portfolio() {
    let service = seeded_service(InMemoryPriceSource::new());
    let output = run_menu(&service, "1\n1\n1\n1\nOther\n5\n4\n");

    assert!(output.contains("Changes discarded."));
    assert_eq!(service.require_portfolio(1).unwrap().name, "Tech");
}

#[test]
fn test_delete_requires_confirmation() {
    let service = seeded_service(InMemoryPriceSource::new());

    let output = run_menu(&service, "1\n1\n2\nn\n4\n");
    assert!(output.contains("Deletion cancelled."));
    assert!(service.get_portfolio_by_id(1).unwrap().is_some());

    let output = run_menu(&service, "1\n1\n2\ny\n4\n");
    assert!(output.contains("Portfolio deleted successfully."));
    assert!(service.get_portfolio_by_id(1).unwrap().is_none());
}

#[test]
fn test_unknown_portfolio_id() {
    let service = seeded_service(InMemoryPriceSource::new());
    let output = run_menu(&service, "1\n77\n1\nabc\n4\n");
    assert!(output.contains("Portfolio 77 not found."));
    assert!(output.contains("Invalid ID."));
}

/// Portfolio stored as an old database would load it: one lot priced at 0
fn service_with_unpriced_lot(prices: InMemoryPriceSource) -> PortfolioService {
    let store = InMemoryPortfolioStore::new();
    let mut portfolio = Portfolio {
        id: None,
        name: "Old".into(),
        stocks: vec![Stock {
            symbol: "AAPL".into(),
            quantity: 10,
            buy_date: date(2020, 1, 15),
            buy_price: 0.0,
        }],
    };
    store.save(&mut portfolio).unwrap();
    PortfolioService::new(Arc::new(store), Arc::new(prices))
}

#[test]
fn test_edit_fills_in_missing_purchase_price() {
    let service = service_with_unpriced_lot(
        InMemoryPriceSource::new().with_close("AAPL", date(2020, 1, 15), 300.0),
    );
    let output = run_menu(&service, "1\n1\n1\n4\n4\n");

    assert!(output.contains("AAPL x10 bought on 2020-01-15 has no purchase price recorded."));
    assert!(output.contains("Portfolio updated successfully."));
    let saved = service.require_portfolio(1).unwrap();
    assert_eq!(saved.stocks, vec![Stock::new("AAPL", 10, date(2020, 1, 15), 300.0).unwrap()]);
}

#[test]
fn test_edit_drops_lot_without_purchase_price() {
    let service = service_with_unpriced_lot(InMemoryPriceSource::new());
    // No price available and none typed: the lot goes, then the save succeeds
    let output = run_menu(&service, "1\n1\n1\n\n4\n4\n");

    assert!(output.contains("Dropped AAPL x10."));
    assert!(output.contains("Portfolio updated successfully."));
    assert!(service.require_portfolio(1).unwrap().stocks.is_empty());
}

struct FlatPrice(f64);

impl PriceSource for FlatPrice {
    fn get_quote(&self, _symbol: &str, _date: NaiveDate) -> CoreResult<StockPriceQuote> {
        Ok(StockPriceQuote {
            open: self.0,
            close: self.0,
        })
    }
}

#[test]
fn test_random_portfolio_is_saved_with_apr() {
    let service = PortfolioService::new(
        Arc::new(InMemoryPortfolioStore::new()),
        Arc::new(FlatPrice(50.0)),
    );
    let output = run_menu(&service, "3\n4\n");

    assert!(output.contains("created successfully. APR: 0.00%"));
    let portfolios = service.get_all_portfolios().unwrap();
    assert_eq!(portfolios.len(), 1);
    assert_eq!(portfolios[0].stocks.len(), 5);
    assert!(portfolios[0].name.starts_with("Random Portfolio "));
}

#[test]
fn test_random_portfolio_without_prices_is_not_saved() {
    let service = PortfolioService::new(
        Arc::new(InMemoryPortfolioStore::new()),
        Arc::new(InMemoryPriceSource::new()),
    );
    let output = run_menu(&service, "3\n4\n");

    assert!(output.contains("continuing with the next..."));
    assert!(output.contains("No stocks could be priced; portfolio not created."));
    assert!(service.get_all_portfolios().unwrap().is_empty());
}
