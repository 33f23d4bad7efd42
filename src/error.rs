//! Error handling for stock-manager
//!
//! Core components (store, price sources, service) return [`PortfolioError`] so
//! callers can tell a missing price apart from a broken database. The binary and
//! the presentation layer wrap these in anyhow for context chaining.

use chrono::NaiveDate;
use thiserror::Error;

/// Core error types for portfolio operations
#[derive(Error, Debug)]
pub enum PortfolioError {
    #[error("portfolio {id} not found")]
    NotFound { id: i64 },

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("price unavailable for {symbol} on {date}: {reason}")]
    PriceUnavailable {
        symbol: String,
        date: NaiveDate,
        reason: String,
    },

    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl PortfolioError {
    pub fn price_unavailable(symbol: &str, date: NaiveDate, reason: impl Into<String>) -> Self {
        PortfolioError::PriceUnavailable {
            symbol: symbol.to_string(),
            date,
            reason: reason.into(),
        }
    }

    /// True for outcomes a caller may recover from by skipping or asking for input
    pub fn is_price_unavailable(&self) -> bool {
        matches!(self, PortfolioError::PriceUnavailable { .. })
    }
}

impl From<rusqlite::Error> for PortfolioError {
    fn from(err: rusqlite::Error) -> Self {
        PortfolioError::Persistence(err.to_string())
    }
}

/// Result type alias for core portfolio operations
pub type Result<T, E = PortfolioError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_formatting_is_readable() {
        let err = PortfolioError::Persistence("disk I/O error".to_string());
        assert_eq!(err.to_string(), "persistence error: disk I/O error");

        let err = PortfolioError::NotFound { id: 42 };
        assert_eq!(err.to_string(), "portfolio 42 not found");
    }

    #[test]
    fn test_price_unavailable_names_symbol_and_date() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        let err = PortfolioError::price_unavailable("AAPL", date, "no trading on that day");
        let msg = err.to_string();
        assert!(msg.contains("AAPL"));
        assert!(msg.contains("2024-03-09"));
        assert!(err.is_price_unavailable());
        assert!(!PortfolioError::InsufficientData("x".into()).is_price_unavailable());
    }

    #[test]
    fn test_rusqlite_errors_become_persistence() {
        let err: PortfolioError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, PortfolioError::Persistence(_)));
    }

    #[test]
    fn test_anyhow_context_chains_errors() {
        use anyhow::Context;
        let result: anyhow::Result<()> = Err(PortfolioError::InvalidInput(
            "quantity must be at least 1".into(),
        ))
        .context("failed to create portfolio");
        let err = result.unwrap_err();
        assert!(err.to_string().contains("failed to create portfolio"));
        assert!(format!("{:?}", err).contains("quantity must be at least 1"));
    }
}
