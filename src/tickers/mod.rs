//! Symbol catalog: the list of tradable tickers offered for manual entry.
//!
//! The S&P 500 constituents CSV is downloaded once and cached on disk for a
//! day. Only the presentation layer consults the catalog.

use anyhow::{anyhow, Context, Result};
use reqwest::blocking::Client;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{info, warn};

pub const SP500_URL: &str =
    "https://raw.githubusercontent.com/datasets/s-and-p-500-companies/main/data/constituents.csv";
const CACHE_FILENAME: &str = "constituents.csv";
const CACHE_MAX_AGE_HOURS: u64 = 24;

pub trait SymbolCatalog {
    /// Ordered list of ticker symbols
    fn symbols(&self) -> Result<Vec<String>>;
}

/// Fixed list of symbols
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    symbols: Vec<String>,
}

impl StaticCatalog {
    pub fn new<S: AsRef<str>>(symbols: &[S]) -> Self {
        Self {
            symbols: symbols.iter().map(|s| s.as_ref().to_string()).collect(),
        }
    }
}

impl SymbolCatalog for StaticCatalog {
    fn symbols(&self) -> Result<Vec<String>> {
        Ok(self.symbols.clone())
    }
}

/// S&P 500 constituents fetched over HTTP with an on-disk cache
pub struct Sp500Catalog {
    url: String,
    cache_dir: Option<PathBuf>,
    timeout: Duration,
    offline: bool,
}

impl Sp500Catalog {
    pub fn new(url: Option<&str>, cache_dir: Option<PathBuf>, timeout: Duration) -> Self {
        Self {
            url: url.unwrap_or(SP500_URL).to_string(),
            cache_dir,
            timeout,
            offline: false,
        }
    }

    /// Only read the on-disk cache, whatever its age
    pub fn offline(mut self) -> Self {
        self.offline = true;
        self
    }

    fn refresh(&self, cache_dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(cache_dir).context("Failed to create symbols cache directory")?;

        let csv_path = cache_dir.join(CACHE_FILENAME);
        if self.offline {
            if csv_path.exists() {
                return Ok(csv_path);
            }
            return Err(anyhow!(
                "Offline mode and no cached symbols list at {:?}",
                csv_path
            ));
        }
        if csv_path.exists() && !cache_is_stale(&csv_path)? {
            return Ok(csv_path);
        }

        match download(&self.url, self.timeout) {
            Ok(bytes) => {
                let tmp_path = cache_dir.join(format!("{}.tmp", CACHE_FILENAME));
                fs::write(&tmp_path, &bytes).context("Failed to write symbols cache")?;
                fs::rename(&tmp_path, &csv_path)
                    .context("Failed to finalize symbols cache file")?;
                Ok(csv_path)
            }
            Err(e) if csv_path.exists() => {
                warn!("Using stale symbols list, refresh failed: {:#}", e);
                Ok(csv_path)
            }
            Err(e) => Err(e),
        }
    }
}

impl SymbolCatalog for Sp500Catalog {
    fn symbols(&self) -> Result<Vec<String>> {
        let cache_dir = match &self.cache_dir {
            Some(dir) => dir.clone(),
            None => get_symbols_cache_dir()?,
        };
        let csv_path = self.refresh(&cache_dir)?;
        let file = fs::File::open(&csv_path).context("Failed to open cached symbols CSV")?;
        parse_constituents_csv(file)
    }
}

pub fn get_symbols_cache_dir() -> Result<PathBuf> {
    let cache_dir = std::env::var_os("XDG_CACHE_HOME")
        .map(PathBuf::from)
        .or_else(dir_spec::cache_home)
        .ok_or_else(|| anyhow!("Could not determine cache directory"))?;
    Ok(cache_dir.join("stock-manager").join("symbols"))
}

fn download(url: &str, timeout: Duration) -> Result<Vec<u8>> {
    info!("Downloading: {}", url);
    let client = Client::builder()
        .timeout(timeout)
        .build()
        .context("Failed to build HTTP client")?;
    let bytes = client
        .get(url)
        .send()
        .context("Failed to download symbols list")?
        .error_for_status()
        .context("Symbols list returned an error status")?
        .bytes()
        .context("Failed to read symbols list")?;
    Ok(bytes.to_vec())
}

fn cache_is_stale(csv_path: &Path) -> Result<bool> {
    let modified = fs::metadata(csv_path)
        .context("Failed to read symbols cache metadata")?
        .modified()
        .context("Failed to read symbols cache mtime")?;
    let age = SystemTime::now()
        .duration_since(modified)
        .unwrap_or(Duration::from_secs(0));
    Ok(age.as_secs() > CACHE_MAX_AGE_HOURS * 3600)
}

/// Read symbols from the first column of a constituents CSV (header skipped)
pub fn parse_constituents_csv<R: Read>(reader: R) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let mut symbols = Vec::new();
    for record in reader.records() {
        let record = record.context("Failed to parse symbols CSV")?;
        let symbol = record.get(0).map(str::trim).unwrap_or_default();
        if symbol.is_empty() {
            continue;
        }
        symbols.push(symbol.to_ascii_uppercase());
    }

    if symbols.is_empty() {
        return Err(anyhow!("Symbols CSV contained no tickers"));
    }
    Ok(symbols)
}
