//! In-memory portfolio store for tests and offline runs.
//!
//! Aggregates are replaced as a whole under a mutex, which gives the same
//! all-or-nothing behavior as the SQLite transactions.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::models::Portfolio;
use super::PortfolioStore;
use crate::error::{PortfolioError, Result};

#[derive(Debug, Default)]
struct State {
    next_id: i64,
    portfolios: BTreeMap<i64, Portfolio>,
}

#[derive(Debug, Default)]
pub struct InMemoryPortfolioStore {
    state: Mutex<State>,
}

impl InMemoryPortfolioStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| PortfolioError::Persistence("in-memory store mutex poisoned".into()))
    }

    pub fn len(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .portfolios
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PortfolioStore for InMemoryPortfolioStore {
    fn get_all(&self) -> Result<Vec<Portfolio>> {
        Ok(self.lock()?.portfolios.values().cloned().collect())
    }

    fn get_by_id(&self, id: i64) -> Result<Option<Portfolio>> {
        Ok(self.lock()?.portfolios.get(&id).cloned())
    }

    fn save(&self, portfolio: &mut Portfolio) -> Result<i64> {
        if let Some(stock) = portfolio.stocks.iter().find(|s| s.quantity < 1) {
            // Mirrors the CHECK constraint of the SQL schema
            return Err(PortfolioError::Persistence(format!(
                "quantity for {} must be positive",
                stock.symbol
            )));
        }

        let mut state = self.lock()?;
        state.next_id += 1;
        let id = state.next_id;

        let mut stored = portfolio.clone();
        stored.id = Some(id);
        state.portfolios.insert(id, stored);

        portfolio.id = Some(id);
        Ok(id)
    }

    fn update(&self, portfolio: &Portfolio) -> Result<()> {
        let id = portfolio.id.ok_or_else(|| {
            PortfolioError::InvalidInput(format!(
                "portfolio '{}' has not been saved yet",
                portfolio.name
            ))
        })?;
        if let Some(stock) = portfolio.stocks.iter().find(|s| s.quantity < 1) {
            return Err(PortfolioError::Persistence(format!(
                "quantity for {} must be positive",
                stock.symbol
            )));
        }

        let mut state = self.lock()?;
        match state.portfolios.get_mut(&id) {
            Some(existing) => {
                *existing = portfolio.clone();
                Ok(())
            }
            None => Err(PortfolioError::NotFound { id }),
        }
    }

    fn delete(&self, id: i64) -> Result<()> {
        self.lock()?.portfolios.remove(&id);
        Ok(())
    }
}
