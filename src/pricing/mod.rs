// Pricing module - historical price sources and the per-process quote cache

pub mod alphavantage;
pub mod fmp;

use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, warn};

use crate::db::StockPriceQuote;
use crate::error::{PortfolioError, Result};

pub use alphavantage::AlphaVantageClient;
pub use fmp::FmpClient;

/// Resolves historical open/close prices for a symbol on one calendar day.
///
/// Implementations return [`PortfolioError::PriceUnavailable`] when the
/// upstream cannot answer for that exact date. They never fall back to a
/// neighbouring day.
pub trait PriceSource: Send + Sync {
    fn get_quote(&self, symbol: &str, date: NaiveDate) -> Result<StockPriceQuote>;

    fn get_price_close(&self, symbol: &str, date: NaiveDate) -> Result<f64> {
        self.get_quote(symbol, date).map(|quote| quote.close)
    }

    fn get_price_open(&self, symbol: &str, date: NaiveDate) -> Result<f64> {
        self.get_quote(symbol, date).map(|quote| quote.open)
    }
}

impl<T: PriceSource + ?Sized> PriceSource for Box<T> {
    fn get_quote(&self, symbol: &str, date: NaiveDate) -> Result<StockPriceQuote> {
        (**self).get_quote(symbol, date)
    }
}

impl<T: PriceSource + ?Sized> PriceSource for Arc<T> {
    fn get_quote(&self, symbol: &str, date: NaiveDate) -> Result<StockPriceQuote> {
        (**self).get_quote(symbol, date)
    }
}

type QuoteKey = (String, NaiveDate);

/// Caches successful quotes for the lifetime of the process.
///
/// Historical closes never change, so entries are never invalidated. Failures
/// are not cached; the next call asks upstream again.
pub struct CachedPriceSource<S> {
    inner: S,
    cache: RwLock<HashMap<QuoteKey, StockPriceQuote>>,
}

impl<S: PriceSource> CachedPriceSource<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Number of cached quotes
    pub fn cache_len(&self) -> usize {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: PriceSource> PriceSource for CachedPriceSource<S> {
    fn get_quote(&self, symbol: &str, date: NaiveDate) -> Result<StockPriceQuote> {
        let key = (symbol.trim().to_ascii_uppercase(), date);

        {
            let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(quote) = cache.get(&key) {
                debug!("Using cached quote for {} on {}", key.0, date);
                return Ok(*quote);
            }
        }

        let quote = self.inner.get_quote(&key.0, date)?;

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        cache.insert(key, quote);
        Ok(quote)
    }
}

/// Fixed quotes held in memory. Counts every lookup, which makes it
/// handy for asserting cache behavior in tests and for offline runs.
#[derive(Debug, Default)]
pub struct InMemoryPriceSource {
    quotes: HashMap<QuoteKey, StockPriceQuote>,
    calls: AtomicUsize,
}

impl InMemoryPriceSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quote(mut self, symbol: &str, date: NaiveDate, open: f64, close: f64) -> Self {
        self.insert(symbol, date, StockPriceQuote { open, close });
        self
    }

    pub fn with_close(self, symbol: &str, date: NaiveDate, close: f64) -> Self {
        self.with_quote(symbol, date, close, close)
    }

    pub fn insert(&mut self, symbol: &str, date: NaiveDate, quote: StockPriceQuote) {
        self.quotes
            .insert((symbol.trim().to_ascii_uppercase(), date), quote);
    }

    /// Number of lookups served so far (hits and misses)
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl PriceSource for InMemoryPriceSource {
    fn get_quote(&self, symbol: &str, date: NaiveDate) -> Result<StockPriceQuote> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let key = (symbol.trim().to_ascii_uppercase(), date);
        self.quotes.get(&key).copied().ok_or_else(|| {
            PortfolioError::price_unavailable(&key.0, date, "no quote recorded for that date")
        })
    }
}

/// Price source used when network access is disabled
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflinePriceSource;

impl PriceSource for OfflinePriceSource {
    fn get_quote(&self, symbol: &str, date: NaiveDate) -> Result<StockPriceQuote> {
        warn!("Offline mode: not fetching price for {} on {}", symbol, date);
        Err(PortfolioError::price_unavailable(
            symbol,
            date,
            "offline mode is enabled",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_close_and_open_come_from_same_quote() {
        let source = InMemoryPriceSource::new().with_quote("AAPL", date(2020, 1, 15), 311.85, 311.34);
        assert_eq!(source.get_price_open("AAPL", date(2020, 1, 15)).unwrap(), 311.85);
        assert_eq!(source.get_price_close("aapl", date(2020, 1, 15)).unwrap(), 311.34);
        assert_eq!(source.calls(), 2);
    }

    #[test]
    fn test_cache_serves_second_lookup() {
        let cached = CachedPriceSource::new(
            InMemoryPriceSource::new().with_close("MSFT", date(2021, 6, 1), 247.4),
        );

        let first = cached.get_price_close("MSFT", date(2021, 6, 1)).unwrap();
        let second = cached.get_price_close("msft", date(2021, 6, 1)).unwrap();

        assert_eq!(first, second);
        assert_eq!(cached.inner().calls(), 1);
        assert_eq!(cached.cache_len(), 1);
    }

    #[test]
    fn test_cache_does_not_store_failures() {
        let cached = CachedPriceSource::new(InMemoryPriceSource::new());

        assert!(cached.get_price_close("NOPE", date(2021, 6, 1)).is_err());
        assert!(cached.get_price_close("NOPE", date(2021, 6, 1)).is_err());

        assert_eq!(cached.inner().calls(), 2);
        assert_eq!(cached.cache_len(), 0);
    }

    #[test]
    fn test_cache_keys_on_exact_date() {
        let cached = CachedPriceSource::new(
            InMemoryPriceSource::new().with_close("IBM", date(2022, 3, 4), 126.6),
        );
        cached.get_price_close("IBM", date(2022, 3, 4)).unwrap();

        let err = cached.get_price_close("IBM", date(2022, 3, 5)).unwrap_err();
        assert!(err.is_price_unavailable());
    }

    #[test]
    fn test_offline_source_is_always_unavailable() {
        let err = OfflinePriceSource
            .get_price_close("AAPL", date(2020, 1, 15))
            .unwrap_err();
        assert!(err.is_price_unavailable());
    }
}
