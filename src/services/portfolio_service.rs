//! Portfolio orchestration and annualized return calculation.
//!
//! The return is computed on the portfolio as a whole: the sum of every lot's
//! cost basis is compared to the sum of their values at the end date, so lots
//! are weighted by dollar size. A lot whose end price cannot be resolved is left
//! out of both sums instead of failing the whole calculation.

use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::db::{Portfolio, PortfolioStore};
use crate::error::{PortfolioError, Result};
use crate::pricing::PriceSource;

const HOURS_PER_YEAR: f64 = 24.0 * 365.0;

/// A lot left out of the APR because its end price was unavailable
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedLot {
    pub symbol: String,
    pub quantity: i64,
    pub reason: String,
}

/// Outcome of an APR calculation with the aggregates behind it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AprReport {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Annualized rate as a fraction (0.10 = 10%)
    pub apr: f64,
    pub total_initial: f64,
    pub total_final: f64,
    pub years: f64,
    pub priced_lots: usize,
    pub skipped: Vec<SkippedLot>,
}

pub struct PortfolioService {
    store: Arc<dyn PortfolioStore>,
    prices: Arc<dyn PriceSource>,
}

impl PortfolioService {
    pub fn new(store: Arc<dyn PortfolioStore>, prices: Arc<dyn PriceSource>) -> Self {
        Self { store, prices }
    }

    pub fn get_all_portfolios(&self) -> Result<Vec<Portfolio>> {
        self.store.get_all()
    }

    pub fn get_portfolio_by_id(&self, id: i64) -> Result<Option<Portfolio>> {
        self.store.get_by_id(id)
    }

    /// Like [`get_portfolio_by_id`](Self::get_portfolio_by_id) but a missing id is an error
    pub fn require_portfolio(&self, id: i64) -> Result<Portfolio> {
        self.store
            .get_by_id(id)?
            .ok_or(PortfolioError::NotFound { id })
    }

    /// Persist a portfolio whose lots are already priced. Sets `portfolio.id`.
    pub fn create_portfolio_manual(&self, portfolio: &mut Portfolio) -> Result<i64> {
        portfolio.validate()?;
        let id = self.store.save(portfolio)?;
        info!("Created portfolio {} '{}'", id, portfolio.name);
        Ok(id)
    }

    pub fn update_portfolio(&self, portfolio: &Portfolio) -> Result<()> {
        portfolio.validate()?;
        self.store.update(portfolio)
    }

    pub fn delete_portfolio(&self, id: i64) -> Result<()> {
        self.store.delete(id)
    }

    pub fn get_price_close(&self, symbol: &str, date: NaiveDate) -> Result<f64> {
        self.prices.get_price_close(symbol, date)
    }

    /// Annualized return over `[start_date, end_date)`
    pub fn calculate_apr(
        &self,
        portfolio: &Portfolio,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<f64> {
        self.calculate_apr_report(portfolio, start_date, end_date)
            .map(|report| report.apr)
    }

    /// APR from the earliest buy date up to `end_date`
    pub fn calculate_apr_since_purchase(
        &self,
        portfolio: &Portfolio,
        end_date: NaiveDate,
    ) -> Result<AprReport> {
        let start_date = portfolio.earliest_buy_date().ok_or_else(|| {
            PortfolioError::InsufficientData(format!(
                "portfolio '{}' has no lots",
                portfolio.name
            ))
        })?;
        self.calculate_apr_report(portfolio, start_date, end_date)
    }

    pub fn calculate_apr_report(
        &self,
        portfolio: &Portfolio,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<AprReport> {
        if end_date < start_date {
            return Err(PortfolioError::InvalidInput(format!(
                "end date {} is before start date {}",
                end_date, start_date
            )));
        }

        let mut total_initial = 0.0;
        let mut total_final = 0.0;
        let mut priced_lots = 0;
        let mut skipped = Vec::new();

        for stock in &portfolio.stocks {
            // Lots migrated from databases without a buy_price column hold 0
            let initial_value = stock.initial_value();
            if !initial_value.is_finite() || initial_value <= 0.0 {
                warn!(
                    "Skipping {} in portfolio '{}': no purchase price recorded",
                    stock.symbol, portfolio.name
                );
                skipped.push(SkippedLot {
                    symbol: stock.symbol.clone(),
                    quantity: stock.quantity,
                    reason: format!(
                        "no purchase price recorded for {} on {}",
                        stock.symbol, stock.buy_date
                    ),
                });
                continue;
            }

            let final_price = match self.prices.get_price_close(&stock.symbol, end_date) {
                Ok(price) => price,
                Err(e) if e.is_price_unavailable() => {
                    warn!(
                        "Skipping {} in portfolio '{}': {}",
                        stock.symbol, portfolio.name, e
                    );
                    skipped.push(SkippedLot {
                        symbol: stock.symbol.clone(),
                        quantity: stock.quantity,
                        reason: e.to_string(),
                    });
                    continue;
                }
                Err(e) => return Err(e),
            };

            // Start leg uses the stored purchase price, never a fresh lookup
            total_initial += initial_value;
            total_final += final_price * stock.quantity as f64;
            priced_lots += 1;
        }

        if priced_lots == 0 || total_initial == 0.0 {
            return Err(PortfolioError::InsufficientData(format!(
                "no lot of portfolio '{}' has a usable price on {}",
                portfolio.name, end_date
            )));
        }

        let hours = end_date.signed_duration_since(start_date).num_hours() as f64;
        let years = hours / HOURS_PER_YEAR;

        let apr = if years == 0.0 {
            0.0
        } else {
            (total_final / total_initial).powf(1.0 / years) - 1.0
        };

        debug!(
            "APR for '{}': initial={:.2} final={:.2} years={:.4} apr={:.6}",
            portfolio.name, total_initial, total_final, years, apr
        );

        Ok(AprReport {
            start_date,
            end_date,
            apr,
            total_initial,
            total_final,
            years,
            priced_lots,
            skipped,
        })
    }
}
