//! Output formatting module for CLI display
//!
//! Portfolios and APR reports rendered as tables or JSON. Calculation lives in
//! the service; nothing here touches the store or a price source.

use colored::Colorize;
use serde::Serialize;
use tabled::{
    settings::{object::Columns, Alignment, Style},
    Table, Tabled,
};

use crate::db::Portfolio;
use crate::services::AprReport;
use crate::utils::{format_currency, format_percent};

/// Colored APR string: green for gains, red for losses
pub fn format_apr(apr: f64) -> String {
    let text = format_percent(apr);
    if apr >= 0.0 {
        text.green().to_string()
    } else {
        text.red().to_string()
    }
}

/// Summary table of every portfolio
pub fn format_portfolio_list(portfolios: &[Portfolio]) -> String {
    if portfolios.is_empty() {
        return format!("{}\n", "No portfolios found.".yellow());
    }

    #[derive(Tabled)]
    struct PortfolioRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Lots")]
        lots: usize,
        #[tabled(rename = "First Purchase")]
        first_purchase: String,
        #[tabled(rename = "Cost Basis")]
        cost: String,
    }

    let rows: Vec<PortfolioRow> = portfolios
        .iter()
        .map(|p| PortfolioRow {
            id: p.id.map(|id| id.to_string()).unwrap_or_else(|| "-".to_string()),
            name: p.name.clone(),
            lots: p.stocks.len(),
            first_purchase: p
                .earliest_buy_date()
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".to_string()),
            cost: format_currency(p.total_cost()),
        })
        .collect();

    let mut table = Table::new(&rows);
    table.with(Style::rounded());
    table.modify(Columns::new(2..), Alignment::right());

    format!("\n{} Portfolios\n\n{}\n", "📁".cyan().bold(), table)
}

/// Lots of a single portfolio
pub fn format_portfolio_detail(portfolio: &Portfolio) -> String {
    let title = match portfolio.id {
        Some(id) => format!("Portfolio {} - {}", id, portfolio.name),
        None => format!("Portfolio - {}", portfolio.name),
    };
    let mut output = format!("\n{} {}\n\n", "📊".cyan().bold(), title.bold());

    if portfolio.stocks.is_empty() {
        output.push_str("  (no stocks)\n");
        return output;
    }

    #[derive(Tabled)]
    struct LotRow {
        #[tabled(rename = "#")]
        index: usize,
        #[tabled(rename = "Symbol")]
        symbol: String,
        #[tabled(rename = "Quantity")]
        quantity: i64,
        #[tabled(rename = "Buy Date")]
        buy_date: String,
        #[tabled(rename = "Buy Price")]
        buy_price: String,
        #[tabled(rename = "Cost")]
        cost: String,
    }

    let rows: Vec<LotRow> = portfolio
        .stocks
        .iter()
        .enumerate()
        .map(|(i, s)| LotRow {
            index: i + 1,
            symbol: s.symbol.clone(),
            quantity: s.quantity,
            buy_date: s.buy_date.to_string(),
            buy_price: format_currency(s.buy_price),
            cost: format_currency(s.initial_value()),
        })
        .collect();

    let mut table = Table::new(&rows);
    table.with(Style::rounded());
    table.modify(Columns::new(2..3), Alignment::right());
    table.modify(Columns::new(4..), Alignment::right());

    output.push_str(&table.to_string());
    output.push('\n');
    output.push_str(&format!(
        "Total cost basis: {}\n",
        format_currency(portfolio.total_cost()).bold()
    ));
    output
}

pub fn format_apr_report(report: &AprReport) -> String {
    let mut output = String::new();
    output.push_str(&format!(
        "APR {} to {}: {}\n",
        report.start_date,
        report.end_date,
        format_apr(report.apr).bold()
    ));
    output.push_str(&format!(
        "  Initial value: {}  Final value: {}  ({} lot(s) over {:.2} years)\n",
        format_currency(report.total_initial),
        format_currency(report.total_final),
        report.priced_lots,
        report.years
    ));

    for lot in &report.skipped {
        output.push_str(&format!(
            "  {} {} x{} left out: {}\n",
            "⚠".yellow(),
            lot.symbol,
            lot.quantity,
            lot.reason.dimmed()
        ));
    }
    output
}

/// Plain-data shape of a portfolio plus an optional return figure
#[derive(Serialize)]
struct JsonPortfolio<'a> {
    #[serde(flatten)]
    portfolio: &'a Portfolio,
    total_cost: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    apr: Option<&'a AprReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    apr_error: Option<String>,
}

pub fn format_portfolios_json(portfolios: &[Portfolio]) -> String {
    let items: Vec<JsonPortfolio<'_>> = portfolios
        .iter()
        .map(|p| JsonPortfolio {
            portfolio: p,
            total_cost: p.total_cost(),
            apr: None,
            apr_error: None,
        })
        .collect();
    to_json(&items)
}

pub fn format_portfolio_json(
    portfolio: &Portfolio,
    apr: Result<&AprReport, &crate::error::PortfolioError>,
) -> String {
    let (apr, apr_error) = match apr {
        Ok(report) => (Some(report), None),
        Err(e) => (None, Some(e.to_string())),
    };
    to_json(&JsonPortfolio {
        portfolio,
        total_cost: portfolio.total_cost(),
        apr,
        apr_error,
    })
}

pub fn format_apr_json(report: &AprReport) -> String {
    to_json(report)
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| format!(r#"{{"error": "JSON serialization failed: {}"}}"#, e))
}
