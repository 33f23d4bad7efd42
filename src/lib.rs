//! Stock Manager - stock portfolio tracker with annualized return
//!
//! Portfolios of purchase lots are kept in SQLite, historical prices come from a
//! pluggable provider behind a cache, and the service layer computes the
//! portfolio-level APR between two dates.

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod pricing;
pub mod services;
pub mod tickers;
pub mod ui;
pub mod utils;
