// Database module - SQLite connection, schema and portfolio stores

pub mod memory;
pub mod models;
pub mod sqlite;

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::PathBuf;
use tracing::info;

pub use memory::InMemoryPortfolioStore;
pub use models::{parse_date, Portfolio, Stock, StockPriceQuote, DATE_FORMAT};
pub use sqlite::SqlitePortfolioStore;

/// Durable, transactional CRUD over portfolio aggregates.
///
/// Every mutating call is all-or-nothing: on error no partial rows remain.
pub trait PortfolioStore: Send + Sync {
    /// Every portfolio with its lots loaded. Empty store yields an empty list.
    fn get_all(&self) -> crate::error::Result<Vec<Portfolio>>;

    /// `Ok(None)` when the id does not exist.
    fn get_by_id(&self, id: i64) -> crate::error::Result<Option<Portfolio>>;

    /// Insert the portfolio and all its lots, assigning `portfolio.id`.
    fn save(&self, portfolio: &mut Portfolio) -> crate::error::Result<i64>;

    /// Replace name and the whole lot set of an existing portfolio.
    fn update(&self, portfolio: &Portfolio) -> crate::error::Result<()>;

    /// Remove the portfolio and its lots. Missing ids are not an error.
    fn delete(&self, id: i64) -> crate::error::Result<()>;
}

/// Get the default database path (~/.stock-manager/portfolios.db)
pub fn get_default_db_path() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    let app_dir = PathBuf::from(home).join(".stock-manager");

    std::fs::create_dir_all(&app_dir).context("Failed to create .stock-manager directory")?;

    Ok(app_dir.join("portfolios.db"))
}

/// Open database connection
pub fn open_db(db_path: Option<PathBuf>) -> Result<Connection> {
    let path = match db_path {
        Some(path) => path,
        None => get_default_db_path()?,
    };
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .context(format!("Failed to create database directory {:?}", parent))?;
        }
    }
    let conn = Connection::open(&path).context(format!("Failed to open database at {:?}", path))?;

    // Enable foreign keys
    conn.execute("PRAGMA foreign_keys = ON", [])
        .context("Failed to enable foreign keys")?;

    Ok(conn)
}

/// Create tables and bring older databases up to date.
pub fn apply_schema(conn: &Connection) -> Result<()> {
    let schema_sql = include_str!("schema.sql");
    conn.execute_batch(schema_sql)
        .context("Failed to execute schema")?;

    // Databases created before lots carried their purchase price
    if !column_exists(conn, "stocks", "buy_price")? {
        info!("Migrating stocks table: adding buy_price column");
        conn.execute(
            "ALTER TABLE stocks ADD COLUMN buy_price REAL NOT NULL DEFAULT 0",
            [],
        )
        .context("Failed to add buy_price column")?;
    }

    Ok(())
}

/// Initialize the database with schema
pub fn init_database(db_path: Option<PathBuf>) -> Result<Connection> {
    let path = match db_path {
        Some(path) => path,
        None => get_default_db_path()?,
    };

    info!("Initializing database at: {:?}", path);

    let conn = open_db(Some(path))?;
    apply_schema(&conn)?;

    Ok(conn)
}

fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names.iter().any(|name| name.eq_ignore_ascii_case(column)))
}
