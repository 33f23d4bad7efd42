use anyhow::{anyhow, Context};
use chrono::{Days, NaiveDate};
use reqwest::blocking::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::PriceSource;
use crate::db::{StockPriceQuote, DATE_FORMAT};
use crate::error::{PortfolioError, Result};

pub const FMP_BASE_URL: &str = "https://financialmodelingprep.com";

/// Financial Modeling Prep historical price response
#[derive(Debug, Deserialize)]
struct FmpHistoricalResponse {
    #[allow(dead_code)]
    symbol: Option<String>,
    #[serde(default)]
    historical: Vec<FmpHistoricalPoint>,
}

#[derive(Debug, Deserialize)]
struct FmpHistoricalPoint {
    date: String,
    open: f64,
    close: f64,
    #[serde(rename = "adjClose")]
    adj_close: Option<f64>,
}

/// Blocking client for the FMP `historical-price-full` endpoint
pub struct FmpClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl FmpClient {
    pub fn new(api_key: &str, base_url: Option<&str>, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent("Mozilla/5.0 (compatible; StockManager/1.0)")
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client for Financial Modeling Prep")?;

        Ok(Self {
            client,
            base_url: base_url
                .unwrap_or(FMP_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn fetch(&self, symbol: &str, date: NaiveDate) -> anyhow::Result<FmpHistoricalResponse> {
        let to = date
            .checked_add_days(Days::new(1))
            .ok_or_else(|| anyhow!("date {} out of range", date))?;
        let mut url = reqwest::Url::parse(&self.base_url)
            .context("Invalid Financial Modeling Prep base URL")?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("Financial Modeling Prep base URL cannot take a path"))?
            .pop_if_empty()
            .extend(["api", "v3", "historical-price-full", symbol]);

        info!("Fetching {} prices for {} from Financial Modeling Prep", symbol, date);

        let from = date.format(DATE_FORMAT).to_string();
        let to = to.format(DATE_FORMAT).to_string();
        let response = self
            .client
            .get(url)
            .query(&[
                ("from", from.as_str()),
                ("to", to.as_str()),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .map_err(|e| e.without_url())
            .context("Failed to send request to Financial Modeling Prep")?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "Financial Modeling Prep returned error status: {}",
                response.status()
            ));
        }

        response
            .json()
            .map_err(|e| e.without_url())
            .context("Failed to parse Financial Modeling Prep response")
    }
}

/// Pick the data point for exactly `date` out of an FMP response body.
pub fn parse_fmp_quote(body: &str, date: NaiveDate) -> anyhow::Result<StockPriceQuote> {
    let response: FmpHistoricalResponse =
        serde_json::from_str(body).context("Failed to parse Financial Modeling Prep response")?;
    quote_for_date(response, date)
}

fn quote_for_date(response: FmpHistoricalResponse, date: NaiveDate) -> anyhow::Result<StockPriceQuote> {
    let wanted = date.format(DATE_FORMAT).to_string();
    let point = response
        .historical
        .into_iter()
        .find(|p| p.date == wanted)
        .ok_or_else(|| anyhow!("no price data for {}", wanted))?;

    Ok(StockPriceQuote {
        open: point.open,
        close: point.adj_close.unwrap_or(point.close),
    })
}

impl PriceSource for FmpClient {
    fn get_quote(&self, symbol: &str, date: NaiveDate) -> Result<StockPriceQuote> {
        let quote = self
            .fetch(symbol, date)
            .and_then(|response| quote_for_date(response, date));

        match quote {
            Ok(quote) => {
                debug!("FMP quote for {} on {}: {:?}", symbol, date, quote);
                Ok(quote)
            }
            Err(e) => {
                warn!("FMP price lookup failed for {} on {}: {:#}", symbol, date, e);
                Err(PortfolioError::price_unavailable(symbol, date, format!("{:#}", e)))
            }
        }
    }
}
