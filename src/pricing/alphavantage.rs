use anyhow::{anyhow, Context};
use chrono::NaiveDate;
use reqwest::blocking::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, warn};

use super::PriceSource;
use crate::db::{StockPriceQuote, DATE_FORMAT};
use crate::error::{PortfolioError, Result};

pub const ALPHAVANTAGE_BASE_URL: &str = "https://www.alphavantage.co";

/// Alpha Vantage TIME_SERIES_DAILY_ADJUSTED response
#[derive(Debug, Deserialize)]
struct DailyAdjustedResponse {
    #[serde(rename = "Time Series (Daily)")]
    time_series: Option<HashMap<String, DailyBar>>,
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DailyBar {
    #[serde(rename = "1. open")]
    open: String,
    #[serde(rename = "4. close")]
    close: String,
    #[serde(rename = "5. adjusted close")]
    adjusted_close: Option<String>,
}

pub struct AlphaVantageClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl AlphaVantageClient {
    pub fn new(api_key: &str, base_url: Option<&str>, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent("Mozilla/5.0 (compatible; StockManager/1.0)")
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client for Alpha Vantage")?;

        Ok(Self {
            client,
            base_url: base_url
                .unwrap_or(ALPHAVANTAGE_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn fetch(&self, symbol: &str) -> anyhow::Result<String> {
        let url = format!("{}/query", self.base_url);

        info!("Fetching daily series for {} from Alpha Vantage", symbol);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("function", "TIME_SERIES_DAILY_ADJUSTED"),
                ("symbol", symbol),
                ("outputsize", "full"),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .map_err(|e| e.without_url())
            .context("Failed to send request to Alpha Vantage")?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "Alpha Vantage returned error status: {}",
                response.status()
            ));
        }

        response
            .text()
            .map_err(|e| e.without_url())
            .context("Failed to read Alpha Vantage response")
    }
}

/// Extract the bar for exactly `date` from a daily-adjusted response body.
pub fn parse_alphavantage_quote(body: &str, date: NaiveDate) -> anyhow::Result<StockPriceQuote> {
    let data: DailyAdjustedResponse =
        serde_json::from_str(body).context("Failed to parse Alpha Vantage response")?;

    if let Some(message) = data.error_message.or(data.note).or(data.information) {
        return Err(anyhow!("Alpha Vantage API error: {}", message));
    }

    let series = data
        .time_series
        .ok_or_else(|| anyhow!("No price history returned"))?;

    let key = date.format(DATE_FORMAT).to_string();
    let bar = series
        .get(&key)
        .ok_or_else(|| anyhow!("no price data for {}", key))?;

    let open = parse_price(&bar.open, "open")?;
    let close = match bar.adjusted_close.as_deref() {
        Some(adjusted) => parse_price(adjusted, "adjusted close")?,
        None => parse_price(&bar.close, "close")?,
    };

    Ok(StockPriceQuote { open, close })
}

fn parse_price(value: &str, field: &str) -> anyhow::Result<f64> {
    value
        .trim()
        .parse::<f64>()
        .context(format!("Invalid {} price '{}'", field, value))
}

impl PriceSource for AlphaVantageClient {
    fn get_quote(&self, symbol: &str, date: NaiveDate) -> Result<StockPriceQuote> {
        let quote = self
            .fetch(symbol)
            .and_then(|body| parse_alphavantage_quote(&body, date));

        quote.map_err(|e| {
            warn!(
                "Alpha Vantage price lookup failed for {} on {}: {:#}",
                symbol, date, e
            );
            PortfolioError::price_unavailable(symbol, date, format!("{:#}", e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    const BODY: &str = r#"{
        "Meta Data": {"2. Symbol": "IBM"},
        "Time Series (Daily)": {
            "2023-05-05": {
                "1. open": "123.1100",
                "2. high": "124.1000",
                "3. low": "122.8100",
                "4. close": "123.6500",
                "5. adjusted close": "116.9731",
                "6. volume": "4971736"
            }
        }
    }"#;

    #[test]
    fn test_parse_uses_adjusted_close() {
        let quote = parse_alphavantage_quote(BODY, date(2023, 5, 5)).unwrap();
        assert_eq!(quote.open, 123.11);
        assert_eq!(quote.close, 116.9731);
    }

    #[test]
    fn test_parse_weekend_has_no_bar() {
        let err = parse_alphavantage_quote(BODY, date(2023, 5, 6)).unwrap_err();
        assert!(err.to_string().contains("2023-05-06"));
    }

    #[test]
    fn test_parse_surfaces_api_messages() {
        let body = r#"{"Note": "Thank you for using Alpha Vantage! Our standard API rate limit is 25 requests per day."}"#;
        let err = parse_alphavantage_quote(body, date(2023, 5, 5)).unwrap_err();
        assert!(err.to_string().contains("rate limit"));

        let body = r#"{"Error Message": "Invalid API call."}"#;
        assert!(parse_alphavantage_quote(body, date(2023, 5, 5)).is_err());
    }

    #[test]
    fn test_transport_error_does_not_leak_api_key() {
        let client = AlphaVantageClient::new(
            "SUPERSECRETKEY",
            Some("http://127.0.0.1:9"),
            Duration::from_millis(300),
        )
        .unwrap();
        let err = client.get_price_close("IBM", date(2023, 5, 5)).unwrap_err();
        assert!(matches!(err, PortfolioError::PriceUnavailable { .. }));
        let text = format!("{} {:?}", err, err);
        assert!(!text.contains("SUPERSECRETKEY"), "key leaked: {}", text);
    }
}
