use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{PortfolioError, Result};

/// Date format used at every boundary (storage, APIs, user input)
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A single purchase lot, owned by exactly one portfolio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stock {
    pub symbol: String,
    pub quantity: i64,
    pub buy_date: NaiveDate,
    /// Close price on `buy_date`, captured once when the lot was created
    pub buy_price: f64,
}

impl Stock {
    /// Build a validated lot. Symbol is normalized to upper case.
    pub fn new(symbol: &str, quantity: i64, buy_date: NaiveDate, buy_price: f64) -> Result<Self> {
        let stock = Stock {
            symbol: symbol.trim().to_ascii_uppercase(),
            quantity,
            buy_date,
            buy_price,
        };
        stock.validate()?;
        Ok(stock)
    }

    pub fn validate(&self) -> Result<()> {
        if self.symbol.trim().is_empty() {
            return Err(PortfolioError::InvalidInput(
                "stock symbol must not be empty".to_string(),
            ));
        }
        if self.quantity < 1 {
            return Err(PortfolioError::InvalidInput(format!(
                "quantity for {} must be at least 1, got {}",
                self.symbol, self.quantity
            )));
        }
        if !self.buy_price.is_finite() || self.buy_price <= 0.0 {
            return Err(PortfolioError::InvalidInput(format!(
                "buy price for {} on {} must be positive, got {}",
                self.symbol, self.buy_date, self.buy_price
            )));
        }
        Ok(())
    }

    /// Cost basis of the lot
    pub fn initial_value(&self) -> f64 {
        self.buy_price * self.quantity as f64
    }
}

/// Named collection of stock lots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    /// Assigned by the store on save; `None` while transient
    pub id: Option<i64>,
    pub name: String,
    pub stocks: Vec<Stock>,
}

impl Portfolio {
    pub fn new(name: &str, stocks: Vec<Stock>) -> Self {
        Self {
            id: None,
            name: name.trim().to_string(),
            stocks,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(PortfolioError::InvalidInput(
                "portfolio name must not be empty".to_string(),
            ));
        }
        for stock in &self.stocks {
            stock.validate()?;
        }
        Ok(())
    }

    /// Earliest buy date across lots, if any
    pub fn earliest_buy_date(&self) -> Option<NaiveDate> {
        self.stocks.iter().map(|s| s.buy_date).min()
    }

    pub fn total_cost(&self) -> f64 {
        self.stocks.iter().map(Stock::initial_value).sum()
    }
}

/// Open/close pair for a symbol on one trading day. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StockPriceQuote {
    pub open: f64,
    pub close: f64,
}

/// Parse a `YYYY-MM-DD` date
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| {
        PortfolioError::InvalidInput(format!("invalid date '{}', expected YYYY-MM-DD", value.trim()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_stock_new_normalizes_symbol() {
        let stock = Stock::new("  aapl ", 10, date(2020, 1, 15), 300.0).unwrap();
        assert_eq!(stock.symbol, "AAPL");
        assert_eq!(stock.initial_value(), 3000.0);
    }

    #[test]
    fn test_stock_rejects_zero_quantity() {
        let err = Stock::new("MSFT", 0, date(2020, 1, 15), 100.0).unwrap_err();
        assert!(matches!(err, PortfolioError::InvalidInput(_)));
        assert!(err.to_string().contains("MSFT"));
    }

    #[test]
    fn test_stock_rejects_empty_symbol_and_bad_price() {
        assert!(Stock::new("  ", 1, date(2020, 1, 15), 100.0).is_err());
        assert!(Stock::new("IBM", 1, date(2020, 1, 15), 0.0).is_err());
        assert!(Stock::new("IBM", 1, date(2020, 1, 15), f64::NAN).is_err());
    }

    #[test]
    fn test_portfolio_validate_rejects_blank_name() {
        let portfolio = Portfolio::new("   ", vec![]);
        assert!(matches!(
            portfolio.validate(),
            Err(PortfolioError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_earliest_buy_date() {
        let portfolio = Portfolio::new(
            "Growth",
            vec![
                Stock::new("AAPL", 1, date(2021, 5, 3), 120.0).unwrap(),
                Stock::new("MSFT", 2, date(2019, 7, 1), 130.0).unwrap(),
            ],
        );
        assert_eq!(portfolio.earliest_buy_date(), Some(date(2019, 7, 1)));
        assert_eq!(Portfolio::new("Empty", vec![]).earliest_buy_date(), None);
        assert_eq!(portfolio.total_cost(), 380.0);
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date("2024-02-29").unwrap(), date(2024, 2, 29));
        assert!(parse_date("2023-02-29").is_err());
        assert!(parse_date("15/01/2020").is_err());
    }
}
