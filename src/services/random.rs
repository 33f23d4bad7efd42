//! Random portfolio generation from a symbol list.

use chrono::{Duration, Months, NaiveDate};
use rand::Rng;
use tracing::warn;

use super::{PortfolioService, SkippedLot};
use crate::db::{Portfolio, Stock};
use crate::error::{PortfolioError, Result};

pub const DEFAULT_RANDOM_LOTS: usize = 5;
const MAX_RANDOM_QUANTITY: i64 = 100;
const LOOKBACK_MONTHS: u32 = 36;

/// Draw `count` lots (random symbol, quantity 1..=100, buy date within the
/// three years before `today`) and price each at its buy-date close.
///
/// Lots whose price cannot be resolved are returned as skipped. The portfolio
/// is not saved.
pub fn generate_random_portfolio<R: Rng>(
    service: &PortfolioService,
    symbols: &[String],
    count: usize,
    today: NaiveDate,
    rng: &mut R,
) -> Result<(Portfolio, Vec<SkippedLot>)> {
    if symbols.is_empty() {
        return Err(PortfolioError::InvalidInput(
            "symbol list is empty".to_string(),
        ));
    }

    let start = today
        .checked_sub_months(Months::new(LOOKBACK_MONTHS))
        .unwrap_or(today);
    let span_days = (today - start).num_days().max(1);

    let mut stocks = Vec::with_capacity(count);
    let mut skipped = Vec::new();

    for _ in 0..count {
        let symbol = &symbols[rng.random_range(0..symbols.len())];
        let quantity = rng.random_range(1..=MAX_RANDOM_QUANTITY);
        let buy_date = start + Duration::days(rng.random_range(0..span_days));

        let price = match service.get_price_close(symbol, buy_date) {
            Ok(price) => price,
            Err(e) if e.is_price_unavailable() => {
                warn!("Random lot {} on {} skipped: {}", symbol, buy_date, e);
                skipped.push(SkippedLot {
                    symbol: symbol.clone(),
                    quantity,
                    reason: e.to_string(),
                });
                continue;
            }
            Err(e) => return Err(e),
        };

        match Stock::new(symbol, quantity, buy_date, price) {
            Ok(stock) => stocks.push(stock),
            Err(e) => skipped.push(SkippedLot {
                symbol: symbol.clone(),
                quantity,
                reason: e.to_string(),
            }),
        }
    }

    let name = format!("Random Portfolio {}", rng.random_range(0..1000));
    Ok((Portfolio::new(&name, stocks), skipped))
}
