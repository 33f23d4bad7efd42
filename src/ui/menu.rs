//! Numbered menu for browsing, creating, editing and deleting portfolios.

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use colored::Colorize;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::io::Write;

use super::LineInput;
use crate::cli::formatters::{format_apr, format_apr_report, format_portfolio_detail};
use crate::db::{parse_date, Portfolio, Stock};
use crate::services::{generate_random_portfolio, PortfolioService, DEFAULT_RANDOM_LOTS};
use crate::tickers::SymbolCatalog;

const SYMBOLS_PER_ROW: usize = 8;

/// Outcome of asking the user for one lot
enum LotEntry {
    Added(Stock),
    Skipped,
    Done,
}

enum PriceAnswer {
    Price(f64),
    Skip,
    EndOfInput,
}

pub struct Menu<'a, I, W> {
    service: &'a PortfolioService,
    catalog: &'a dyn SymbolCatalog,
    input: I,
    out: W,
    today: NaiveDate,
    rng: StdRng,
    finished: bool,
}

impl<'a, I: LineInput, W: Write> Menu<'a, I, W> {
    pub fn new(
        service: &'a PortfolioService,
        catalog: &'a dyn SymbolCatalog,
        input: I,
        out: W,
    ) -> Self {
        Self {
            service,
            catalog,
            input,
            out,
            today: Utc::now().date_naive(),
            rng: StdRng::from_os_rng(),
            finished: false,
        }
    }

    /// Fix the date used as "today" for APR end dates and purchase checks
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn run(&mut self) -> Result<()> {
        while !self.finished {
            writeln!(self.out, "\n{}", "Select an option:".bold())?;
            writeln!(self.out, "1. View portfolios")?;
            writeln!(self.out, "2. Create portfolio manually")?;
            writeln!(self.out, "3. Create random portfolio")?;
            writeln!(self.out, "4. Exit")?;

            let Some(choice) = self.ask("Option: ")? else {
                break;
            };

            match choice.as_str() {
                "1" => self.view_portfolios()?,
                "2" => self.create_portfolio_manual()?,
                "3" => self.create_portfolio_random()?,
                "4" | "q" | "quit" | "exit" => break,
                _ => writeln!(self.out, "Invalid option.")?,
            }
        }

        writeln!(self.out, "Exiting...")?;
        Ok(())
    }

    /// Trimmed answer, or `None` once input is exhausted
    fn ask(&mut self, prompt: &str) -> Result<Option<String>> {
        if self.finished {
            return Ok(None);
        }
        match self.input.read_line(prompt, &mut self.out)? {
            Some(line) => Ok(Some(line.trim().to_string())),
            None => {
                self.finished = true;
                Ok(None)
            }
        }
    }

    fn view_portfolios(&mut self) -> Result<()> {
        let portfolios = match self.service.get_all_portfolios() {
            Ok(portfolios) => portfolios,
            Err(e) => {
                writeln!(self.out, "Error retrieving portfolios: {}", e)?;
                return Ok(());
            }
        };

        if portfolios.is_empty() {
            writeln!(self.out, "No portfolios available.")?;
            return Ok(());
        }

        for portfolio in &portfolios {
            write!(self.out, "{}", format_portfolio_detail(portfolio))?;
            self.print_apr(portfolio)?;
        }

        let Some(answer) =
            self.ask("\nEnter the ID of the portfolio to edit/delete (or press Enter to return): ")?
        else {
            return Ok(());
        };
        if answer.is_empty() {
            return Ok(());
        }

        let Ok(id) = answer.parse::<i64>() else {
            writeln!(self.out, "Invalid ID.")?;
            return Ok(());
        };

        match self.service.get_portfolio_by_id(id) {
            Ok(Some(portfolio)) => self.manage_portfolio(portfolio),
            Ok(None) => {
                writeln!(self.out, "Portfolio {} not found.", id)?;
                Ok(())
            }
            Err(e) => {
                writeln!(self.out, "Error retrieving portfolio: {}", e)?;
                Ok(())
            }
        }
    }

    fn print_apr(&mut self, portfolio: &Portfolio) -> Result<()> {
        match self
            .service
            .calculate_apr_since_purchase(portfolio, self.today)
        {
            Ok(report) => write!(self.out, "{}", format_apr_report(&report))?,
            Err(e) => writeln!(self.out, "APR: Could not calculate APR ({})", e)?,
        }
        Ok(())
    }

    fn manage_portfolio(&mut self, portfolio: Portfolio) -> Result<()> {
        writeln!(self.out, "Portfolio: {}", portfolio.name)?;
        writeln!(self.out, "1. Edit portfolio")?;
        writeln!(self.out, "2. Delete portfolio")?;
        writeln!(self.out, "3. Return")?;

        let Some(choice) = self.ask("Option: ")? else {
            return Ok(());
        };

        match choice.as_str() {
            "1" => self.edit_portfolio(portfolio)?,
            "2" => self.delete_portfolio(&portfolio)?,
            "3" | "" => {}
            _ => writeln!(self.out, "Invalid option.")?,
        }
        Ok(())
    }

    fn delete_portfolio(&mut self, portfolio: &Portfolio) -> Result<()> {
        let Some(id) = portfolio.id else {
            return Ok(());
        };
        let Some(answer) = self.ask(&format!("Delete portfolio '{}'? [y/N]: ", portfolio.name))?
        else {
            return Ok(());
        };
        if !matches!(answer.to_ascii_lowercase().as_str(), "y" | "yes") {
            writeln!(self.out, "Deletion cancelled.")?;
            return Ok(());
        }

        match self.service.delete_portfolio(id) {
            Ok(()) => writeln!(self.out, "Portfolio deleted successfully.")?,
            Err(e) => writeln!(self.out, "Error deleting portfolio: {}", e)?,
        }
        Ok(())
    }

    /// Edits are applied to a working copy and stored in one update on save
    fn edit_portfolio(&mut self, mut portfolio: Portfolio) -> Result<()> {
        let mut symbols: Option<Vec<String>> = None;

        if !self.reprice_unpriced_lots(&mut portfolio)? {
            return Ok(());
        }

        loop {
            write!(self.out, "{}", format_portfolio_detail(&portfolio))?;
            writeln!(self.out, "1. Rename")?;
            writeln!(self.out, "2. Add stock")?;
            writeln!(self.out, "3. Remove stock")?;
            writeln!(self.out, "4. Save changes")?;
            writeln!(self.out, "5. Discard changes")?;

            let Some(choice) = self.ask("Option: ")? else {
                return Ok(());
            };

            match choice.as_str() {
                "1" => {
                    let Some(name) = self.ask("New name: ")? else {
                        return Ok(());
                    };
                    if name.is_empty() {
                        writeln!(self.out, "Portfolio name cannot be empty.")?;
                    } else {
                        portfolio.name = name;
                    }
                }
                "2" => {
                    if symbols.is_none() {
                        symbols = self.load_symbols()?;
                    }
                    let Some(list) = symbols.clone() else {
                        continue;
                    };
                    match self.prompt_lot(&list)? {
                        LotEntry::Added(stock) => portfolio.stocks.push(stock),
                        LotEntry::Skipped | LotEntry::Done => {}
                    }
                }
                "3" => {
                    let Some(answer) = self.ask("Number of the stock to remove: ")? else {
                        return Ok(());
                    };
                    match answer.parse::<usize>() {
                        Ok(n) if (1..=portfolio.stocks.len()).contains(&n) => {
                            let removed = portfolio.stocks.remove(n - 1);
                            writeln!(self.out, "Removed {} x{}.", removed.symbol, removed.quantity)?;
                        }
                        _ => writeln!(self.out, "Invalid stock number.")?,
                    }
                }
                "4" => {
                    match self.service.update_portfolio(&portfolio) {
                        Ok(()) => writeln!(self.out, "Portfolio updated successfully.")?,
                        Err(e) => writeln!(self.out, "Error saving portfolio: {}", e)?,
                    }
                    return Ok(());
                }
                "5" | "" => {
                    writeln!(self.out, "Changes discarded.")?;
                    return Ok(());
                }
                _ => writeln!(self.out, "Invalid option.")?,
            }
        }
    }

    fn load_symbols(&mut self) -> Result<Option<Vec<String>>> {
        match self.catalog.symbols() {
            Ok(symbols) if symbols.is_empty() => {
                writeln!(self.out, "The symbol list is empty.")?;
                Ok(None)
            }
            Ok(symbols) => {
                self.input.set_symbols(&symbols);
                Ok(Some(symbols))
            }
            Err(e) => {
                writeln!(self.out, "Error retrieving S&P 500 symbols: {:#}", e)?;
                Ok(None)
            }
        }
    }

    fn print_symbols(&mut self, symbols: &[String]) -> Result<()> {
        for (row, chunk) in symbols.chunks(SYMBOLS_PER_ROW).enumerate() {
            let line: Vec<String> = chunk
                .iter()
                .enumerate()
                .map(|(i, symbol)| format!("{:>3}. {:<6}", row * SYMBOLS_PER_ROW + i + 1, symbol))
                .collect();
            writeln!(self.out, "{}", line.join(" ").trim_end())?;
        }
        Ok(())
    }

    /// Ask for symbol, quantity and purchase date, then resolve the buy price.
    ///
    /// When the price source has no answer the user may type the price in.
    fn prompt_lot(&mut self, symbols: &[String]) -> Result<LotEntry> {
        let Some(answer) =
            self.ask("\nStock number or symbol (press Enter to finish): ")?
        else {
            return Ok(LotEntry::Done);
        };
        if answer.is_empty() {
            return Ok(LotEntry::Done);
        }

        let symbol = match answer.parse::<usize>() {
            Ok(n) if (1..=symbols.len()).contains(&n) => symbols[n - 1].clone(),
            Ok(_) => {
                writeln!(self.out, "Invalid input.")?;
                return Ok(LotEntry::Skipped);
            }
            Err(_) => {
                let upper = answer.to_ascii_uppercase();
                if !symbols.contains(&upper) {
                    writeln!(self.out, "Unknown symbol {}.", upper)?;
                    return Ok(LotEntry::Skipped);
                }
                upper
            }
        };

        let Some(qty) = self.ask(&format!("Enter the quantity of shares for {}: ", symbol))? else {
            return Ok(LotEntry::Done);
        };
        let quantity = match qty.parse::<i64>() {
            Ok(q) if q >= 1 => q,
            _ => {
                writeln!(self.out, "Invalid quantity.")?;
                return Ok(LotEntry::Skipped);
            }
        };

        let Some(date_input) =
            self.ask(&format!("Enter the purchase date (YYYY-MM-DD) for {}: ", symbol))?
        else {
            return Ok(LotEntry::Done);
        };
        let buy_date = match parse_date(&date_input) {
            Ok(date) => date,
            Err(_) => {
                writeln!(self.out, "Invalid date.")?;
                return Ok(LotEntry::Skipped);
            }
        };
        if buy_date > self.today {
            writeln!(self.out, "Purchase date cannot be in the future.")?;
            return Ok(LotEntry::Skipped);
        }

        let buy_price = match self.resolve_buy_price(&symbol, buy_date)? {
            PriceAnswer::Price(price) => price,
            PriceAnswer::Skip => return Ok(LotEntry::Skipped),
            PriceAnswer::EndOfInput => return Ok(LotEntry::Done),
        };

        match Stock::new(&symbol, quantity, buy_date, buy_price) {
            Ok(stock) => Ok(LotEntry::Added(stock)),
            Err(e) => {
                writeln!(self.out, "{}", e)?;
                Ok(LotEntry::Skipped)
            }
        }
    }

    /// Close price on the purchase date, or a typed one when no source has it
    fn resolve_buy_price(&mut self, symbol: &str, buy_date: NaiveDate) -> Result<PriceAnswer> {
        match self.service.get_price_close(symbol, buy_date) {
            Ok(price) => {
                writeln!(
                    self.out,
                    "Close price for {} on {}: ${:.2}",
                    symbol, buy_date, price
                )?;
                Ok(PriceAnswer::Price(price))
            }
            Err(e) if e.is_price_unavailable() => {
                writeln!(self.out, "Could not retrieve the price: {}", e)?;
                let Some(manual) = self.ask(&format!(
                    "Enter the close price for {} on {} manually (or press Enter to skip): ",
                    symbol, buy_date
                ))?
                else {
                    return Ok(PriceAnswer::EndOfInput);
                };
                if manual.is_empty() {
                    writeln!(self.out, "Skipping {}.", symbol)?;
                    return Ok(PriceAnswer::Skip);
                }
                match manual.trim_start_matches('$').parse::<f64>() {
                    Ok(price) if price.is_finite() && price > 0.0 => Ok(PriceAnswer::Price(price)),
                    _ => {
                        writeln!(self.out, "Invalid price.")?;
                        Ok(PriceAnswer::Skip)
                    }
                }
            }
            Err(e) => {
                writeln!(self.out, "Error getting price for {}: {}", symbol, e)?;
                Ok(PriceAnswer::Skip)
            }
        }
    }

    /// Fill in lots stored without a purchase price, dropping the ones that
    /// still have none. Returns false when input ran out.
    fn reprice_unpriced_lots(&mut self, portfolio: &mut Portfolio) -> Result<bool> {
        let mut index = 0;
        while index < portfolio.stocks.len() {
            let stock = &portfolio.stocks[index];
            if stock.buy_price.is_finite() && stock.buy_price > 0.0 {
                index += 1;
                continue;
            }

            let (symbol, quantity, buy_date) = (stock.symbol.clone(), stock.quantity, stock.buy_date);
            writeln!(
                self.out,
                "{} x{} bought on {} has no purchase price recorded.",
                symbol, quantity, buy_date
            )?;
            match self.resolve_buy_price(&symbol, buy_date)? {
                PriceAnswer::Price(price) => {
                    portfolio.stocks[index].buy_price = price;
                    index += 1;
                }
                PriceAnswer::Skip => {
                    portfolio.stocks.remove(index);
                    writeln!(self.out, "Dropped {} x{}.", symbol, quantity)?;
                }
                PriceAnswer::EndOfInput => return Ok(false),
            }
        }
        Ok(true)
    }

    fn create_portfolio_manual(&mut self) -> Result<()> {
        let Some(name) = self.ask("Enter the name of the portfolio: ")? else {
            return Ok(());
        };
        if name.is_empty() {
            writeln!(self.out, "Portfolio name cannot be empty.")?;
            return Ok(());
        }

        let Some(symbols) = self.load_symbols()? else {
            return Ok(());
        };

        writeln!(self.out, "\nS&P 500 stocks:")?;
        self.print_symbols(&symbols)?;

        let mut stocks = Vec::new();
        loop {
            match self.prompt_lot(&symbols)? {
                LotEntry::Added(stock) => {
                    writeln!(
                        self.out,
                        "Added {} x{} bought on {}.",
                        stock.symbol, stock.quantity, stock.buy_date
                    )?;
                    stocks.push(stock);
                }
                LotEntry::Skipped => {}
                LotEntry::Done => break,
            }
        }

        if stocks.is_empty() {
            writeln!(self.out, "No stocks added to the portfolio.")?;
            return Ok(());
        }

        let mut portfolio = Portfolio::new(&name, stocks);
        match self.service.create_portfolio_manual(&mut portfolio) {
            Ok(id) => writeln!(self.out, "Portfolio created successfully (ID: {}).", id)?,
            Err(e) => writeln!(self.out, "Error saving portfolio: {}", e)?,
        }
        Ok(())
    }

    fn create_portfolio_random(&mut self) -> Result<()> {
        let Some(symbols) = self.load_symbols()? else {
            return Ok(());
        };

        let (mut portfolio, skipped) = match generate_random_portfolio(
            self.service,
            &symbols,
            DEFAULT_RANDOM_LOTS,
            self.today,
            &mut self.rng,
        ) {
            Ok(generated) => generated,
            Err(e) => {
                writeln!(self.out, "Error generating portfolio: {}", e)?;
                return Ok(());
            }
        };

        for lot in &skipped {
            writeln!(
                self.out,
                "Error getting price for {}: {}... continuing with the next...",
                lot.symbol, lot.reason
            )?;
        }

        if portfolio.stocks.is_empty() {
            writeln!(self.out, "No stocks could be priced; portfolio not created.")?;
            return Ok(());
        }

        if let Err(e) = self.service.create_portfolio_manual(&mut portfolio) {
            writeln!(self.out, "Error saving portfolio: {}", e)?;
            return Ok(());
        }

        match self
            .service
            .calculate_apr_since_purchase(&portfolio, self.today)
        {
            Ok(report) => writeln!(
                self.out,
                "Random portfolio '{}' created successfully. APR: {}",
                portfolio.name,
                format_apr(report.apr)
            )?,
            Err(e) => writeln!(
                self.out,
                "Random portfolio '{}' created, but APR could not be calculated: {}",
                portfolio.name, e
            )?,
        }
        Ok(())
    }
}
