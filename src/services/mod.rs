pub mod portfolio_service;
pub mod random;

pub use portfolio_service::{AprReport, PortfolioService, SkippedLot};
pub use random::{generate_random_portfolio, DEFAULT_RANDOM_LOTS};
