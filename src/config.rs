//! Application configuration.
//!
//! Values come from, in increasing precedence: built-in defaults, the optional
//! `~/.stock-manager/config.toml`, and environment variables (a `.env` file in
//! the working directory is loaded into the environment by the binary).

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const ENV_DB: &str = "STOCK_MANAGER_DB";
pub const ENV_PROVIDER: &str = "STOCK_MANAGER_PROVIDER";
pub const ENV_PRICE_URL: &str = "STOCK_MANAGER_PRICE_URL";
pub const ENV_SYMBOLS_URL: &str = "STOCK_MANAGER_SYMBOLS_URL";
pub const ENV_HTTP_TIMEOUT: &str = "STOCK_MANAGER_HTTP_TIMEOUT_SECS";
pub const ENV_OFFLINE: &str = "STOCK_MANAGER_OFFLINE";
pub const ENV_FMP_API_KEY: &str = "FMP_API_KEY";
pub const ENV_ALPHAVANTAGE_API_KEY: &str = "ALPHAVANTAGE_API_KEY";

/// Upstream price provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Fmp,
    AlphaVantage,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Fmp => "fmp",
            ProviderKind::AlphaVantage => "alphavantage",
        }
    }

    fn api_key_env(&self) -> &'static str {
        match self {
            ProviderKind::Fmp => ENV_FMP_API_KEY,
            ProviderKind::AlphaVantage => ENV_ALPHAVANTAGE_API_KEY,
        }
    }
}

impl FromStr for ProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fmp" | "financialmodelingprep" => Ok(ProviderKind::Fmp),
            "alphavantage" | "alpha_vantage" | "av" => Ok(ProviderKind::AlphaVantage),
            other => Err(anyhow!("Unknown price provider '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// SQLite file; defaults to ~/.stock-manager/portfolios.db
    pub db_path: Option<PathBuf>,
    pub provider: ProviderKind,
    pub api_key: Option<String>,
    /// Override of the provider base URL
    pub price_url: Option<String>,
    pub symbols_url: Option<String>,
    pub http_timeout_secs: u64,
    /// Never touch the network; prices are unavailable
    pub offline: bool,
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            provider: ProviderKind::Fmp,
            api_key: None,
            price_url: None,
            symbols_url: None,
            http_timeout_secs: 10,
            offline: false,
            log_level: "warn".to_string(),
        }
    }
}

impl AppConfig {
    /// Load the config file (if present) and apply environment overrides
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let path = match config_path {
            Some(path) => Some(path.to_path_buf()),
            None => default_config_path(),
        };

        let mut config = match path {
            Some(path) if path.exists() => Self::from_file(&path)?,
            Some(path) if config_path.is_some() => {
                return Err(anyhow!("Config file not found: {:?}", path));
            }
            _ => Self::default(),
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config file {:?}", path))?;
        Self::from_toml(&content).context(format!("Invalid config file {:?}", path))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse TOML config")
    }

    /// Apply overrides from an environment lookup
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(db) = get(ENV_DB) {
            self.db_path = Some(PathBuf::from(db));
        }
        if let Some(provider) = get(ENV_PROVIDER) {
            self.provider = provider.parse()?;
        }
        if let Some(key) = get(self.provider.api_key_env()) {
            self.api_key = Some(key);
        }
        if let Some(url) = get(ENV_PRICE_URL) {
            self.price_url = Some(url);
        }
        if let Some(url) = get(ENV_SYMBOLS_URL) {
            self.symbols_url = Some(url);
        }
        if let Some(secs) = get(ENV_HTTP_TIMEOUT) {
            self.http_timeout_secs = secs
                .trim()
                .parse()
                .context(format!("{} must be a number of seconds", ENV_HTTP_TIMEOUT))?;
        }
        if let Some(offline) = get(ENV_OFFLINE) {
            self.offline = matches!(
                offline.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes"
            );
        }
        if let Some(level) = get("RUST_LOG") {
            self.log_level = level;
        }
        Ok(())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs.max(1))
    }
}

/// ~/.stock-manager/config.toml
pub fn default_config_path() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .map(|home| PathBuf::from(home).join(".stock-manager").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.provider, ProviderKind::Fmp);
        assert_eq!(config.http_timeout(), Duration::from_secs(10));
        assert!(!config.offline);
    }

    #[test]
    fn test_from_toml_partial() {
        let config = AppConfig::from_toml(
            r#"
            provider = "alphavantage"
            api_key = "secret"
            http_timeout_secs = 3
            "#,
        )
        .unwrap();
        assert_eq!(config.provider, ProviderKind::AlphaVantage);
        assert_eq!(config.api_key.as_deref(), Some("secret"));
        assert_eq!(config.http_timeout_secs, 3);
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn test_env_overrides_file() {
        let mut config = AppConfig::from_toml("api_key = \"from-file\"").unwrap();
        config
            .apply_env(env(&[
                (ENV_FMP_API_KEY, "from-env"),
                (ENV_DB, "/tmp/p.db"),
                (ENV_OFFLINE, "true"),
            ]))
            .unwrap();
        assert_eq!(config.api_key.as_deref(), Some("from-env"));
        assert_eq!(config.db_path, Some(PathBuf::from("/tmp/p.db")));
        assert!(config.offline);
    }

    #[test]
    fn test_api_key_follows_selected_provider() {
        let mut config = AppConfig::default();
        config
            .apply_env(env(&[
                (ENV_PROVIDER, "alphavantage"),
                (ENV_FMP_API_KEY, "fmp-key"),
                (ENV_ALPHAVANTAGE_API_KEY, "av-key"),
            ]))
            .unwrap();
        assert_eq!(config.provider, ProviderKind::AlphaVantage);
        assert_eq!(config.api_key.as_deref(), Some("av-key"));
    }

    #[test]
    fn test_invalid_env_values_are_errors() {
        let mut config = AppConfig::default();
        assert!(config
            .apply_env(env(&[(ENV_HTTP_TIMEOUT, "soon")]))
            .is_err());
        assert!(config
            .apply_env(env(&[(ENV_PROVIDER, "bloomberg")]))
            .is_err());
    }

    #[test]
    fn test_load_missing_explicit_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(AppConfig::load(Some(&dir.path().join("nope.toml"))).is_err());
    }
}
