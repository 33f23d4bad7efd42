//! SQLite-backed portfolio store.
//!
//! Each mutating operation runs inside a single rusqlite transaction. The
//! transaction is committed only after every statement succeeded; returning
//! early drops it, which rolls back.

use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use super::models::{Portfolio, Stock};
use super::PortfolioStore;
use crate::error::{PortfolioError, Result};

pub struct SqlitePortfolioStore {
    conn: Mutex<Connection>,
}

impl SqlitePortfolioStore {
    /// Open (creating if needed) the database at `db_path`, or the default path.
    pub fn open(db_path: Option<PathBuf>) -> anyhow::Result<Self> {
        let conn = super::init_database(db_path)?;
        Ok(Self::from_connection(conn))
    }

    /// Throwaway database, used by tests.
    pub fn open_in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        super::apply_schema(&conn)?;
        Ok(Self::from_connection(conn))
    }

    /// Wrap a connection whose schema is already applied.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| PortfolioError::Persistence("database connection mutex poisoned".into()))
    }
}

fn insert_stocks(tx: &Transaction<'_>, portfolio_id: i64, stocks: &[Stock]) -> Result<()> {
    let mut stmt = tx.prepare(
        "INSERT INTO stocks (portfolio_id, symbol, quantity, buy_date, buy_price)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;

    for stock in stocks {
        stmt.execute(params![
            portfolio_id,
            stock.symbol,
            stock.quantity,
            stock.buy_date,
            stock.buy_price,
        ])
        .map_err(|e| {
            PortfolioError::Persistence(format!(
                "failed to insert lot {} ({} on {}) for portfolio {}: {}",
                stock.symbol, stock.quantity, stock.buy_date, portfolio_id, e
            ))
        })?;
    }

    Ok(())
}

fn map_stock(row: &rusqlite::Row) -> rusqlite::Result<Stock> {
    Ok(Stock {
        symbol: row.get(0)?,
        quantity: row.get(1)?,
        buy_date: row.get(2)?,
        buy_price: row.get(3)?,
    })
}

fn get_stocks_by_portfolio_id(conn: &Connection, portfolio_id: i64) -> Result<Vec<Stock>> {
    let mut stmt = conn.prepare(
        "SELECT symbol, quantity, buy_date, buy_price
         FROM stocks
         WHERE portfolio_id = ?1
         ORDER BY id",
    )?;

    let stocks = stmt
        .query_map([portfolio_id], map_stock)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(stocks)
}

impl PortfolioStore for SqlitePortfolioStore {
    fn get_all(&self) -> Result<Vec<Portfolio>> {
        let mut conn = self.lock()?;
        // Read both tables from one snapshot
        let tx = conn.transaction()?;

        let mut lots: HashMap<i64, Vec<Stock>> = HashMap::new();
        {
            let mut stmt = tx.prepare(
                "SELECT portfolio_id, symbol, quantity, buy_date, buy_price
                 FROM stocks
                 ORDER BY portfolio_id, id",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    Stock {
                        symbol: row.get(1)?,
                        quantity: row.get(2)?,
                        buy_date: row.get(3)?,
                        buy_price: row.get(4)?,
                    },
                ))
            })?;
            for row in rows {
                let (portfolio_id, stock) = row?;
                lots.entry(portfolio_id).or_default().push(stock);
            }
        }

        let portfolios = {
            let mut stmt = tx.prepare("SELECT id, name FROM portfolios ORDER BY id")?;
            let rows = stmt
                .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?
                .collect::<Result<Vec<_>, _>>()?;
            rows.into_iter()
                .map(|(id, name)| Portfolio {
                    id: Some(id),
                    name,
                    stocks: lots.remove(&id).unwrap_or_default(),
                })
                .collect::<Vec<_>>()
        };

        tx.commit()?;
        debug!("Loaded {} portfolios", portfolios.len());
        Ok(portfolios)
    }

    fn get_by_id(&self, id: i64) -> Result<Option<Portfolio>> {
        let conn = self.lock()?;

        let name: Option<String> = conn
            .query_row("SELECT name FROM portfolios WHERE id = ?1", [id], |row| {
                row.get(0)
            })
            .optional()?;

        let Some(name) = name else {
            return Ok(None);
        };

        let stocks = get_stocks_by_portfolio_id(&conn, id)?;
        Ok(Some(Portfolio {
            id: Some(id),
            name,
            stocks,
        }))
    }

    fn save(&self, portfolio: &mut Portfolio) -> Result<i64> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO portfolios (name) VALUES (?1)",
            params![portfolio.name],
        )?;
        let portfolio_id = tx.last_insert_rowid();

        insert_stocks(&tx, portfolio_id, &portfolio.stocks)?;

        tx.commit()?;
        portfolio.id = Some(portfolio_id);

        info!(
            "Saved portfolio {} '{}' with {} lots",
            portfolio_id,
            portfolio.name,
            portfolio.stocks.len()
        );
        Ok(portfolio_id)
    }

    fn update(&self, portfolio: &Portfolio) -> Result<()> {
        let id = portfolio.id.ok_or_else(|| {
            PortfolioError::InvalidInput(format!(
                "portfolio '{}' has not been saved yet",
                portfolio.name
            ))
        })?;

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let changed = tx.execute(
            "UPDATE portfolios SET name = ?1 WHERE id = ?2",
            params![portfolio.name, id],
        )?;
        if changed == 0 {
            return Err(PortfolioError::NotFound { id });
        }

        tx.execute("DELETE FROM stocks WHERE portfolio_id = ?1", [id])?;
        insert_stocks(&tx, id, &portfolio.stocks)?;

        tx.commit()?;
        info!(
            "Updated portfolio {} '{}' ({} lots)",
            id,
            portfolio.name,
            portfolio.stocks.len()
        );
        Ok(())
    }

    fn delete(&self, id: i64) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let lots = tx.execute("DELETE FROM stocks WHERE portfolio_id = ?1", [id])?;
        let removed = tx.execute("DELETE FROM portfolios WHERE id = ?1", [id])?;

        tx.commit()?;
        if removed > 0 {
            info!("Deleted portfolio {} and {} lots", id, lots);
        } else {
            debug!("Delete of missing portfolio {} ignored", id);
        }
        Ok(())
    }
}
