//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All optional:
//! - `PIZZA_API_URL` - API base URL (default: the country's public host)
//! - `PIZZA_COUNTRY` - `us` or `ca` (default: us)
//! - `PIZZA_LANG` - menu language (default: en)
//! - `PIZZA_CUSTOMER_DIR` - where saved customers live (default: ~/.pizza-cli/customers)
//! - `PIZZA_HTTP_TIMEOUT_SECS` - request timeout in seconds (default: 30)

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::urls::{Country, Urls};

const DEFAULT_LANG: &str = "en";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Runtime configuration for the API client and CLI.
#[derive(Debug, Clone)]
pub struct Config {
    /// Explicit API base overriding the country default
    pub api_url: Option<String>,
    pub country: Country,
    /// Language code passed to the menu endpoint
    pub lang: String,
    /// Directory holding saved customer files
    pub customer_dir: PathBuf,
    pub timeout: Duration,
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but cannot be parsed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_url = lookup("PIZZA_API_URL").filter(|v| !v.trim().is_empty());

        let country = match lookup("PIZZA_COUNTRY") {
            Some(raw) => raw
                .parse::<Country>()
                .map_err(|e| ConfigError::InvalidEnvVar("PIZZA_COUNTRY".into(), e.to_string()))?,
            None => Country::default(),
        };

        let lang = lookup("PIZZA_LANG").unwrap_or_else(|| DEFAULT_LANG.to_string());

        let customer_dir = lookup("PIZZA_CUSTOMER_DIR").map_or_else(default_customer_dir, PathBuf::from);

        let timeout_secs = match lookup("PIZZA_HTTP_TIMEOUT_SECS") {
            Some(raw) => raw.trim().parse::<u64>().map_err(|e| {
                ConfigError::InvalidEnvVar("PIZZA_HTTP_TIMEOUT_SECS".into(), e.to_string())
            })?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Self {
            api_url,
            country,
            lang,
            customer_dir,
            timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// Endpoint URLs implied by this configuration.
    #[must_use]
    pub fn urls(&self) -> Urls {
        self.api_url
            .as_deref()
            .map_or_else(|| Urls::new(self.country), Urls::with_base)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: None,
            country: Country::default(),
            lang: DEFAULT_LANG.to_string(),
            customer_dir: default_customer_dir(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

fn default_customer_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".pizza-cli")
        .join("customers")
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.country, Country::Usa);
        assert_eq!(config.lang, "en");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.urls(), Urls::new(Country::Usa));
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("PIZZA_API_URL", "http://localhost:9000"),
            ("PIZZA_COUNTRY", "ca"),
            ("PIZZA_LANG", "fr"),
            ("PIZZA_CUSTOMER_DIR", "/tmp/customers"),
            ("PIZZA_HTTP_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();
        assert_eq!(config.country, Country::Canada);
        assert_eq!(config.lang, "fr");
        assert_eq!(config.customer_dir, PathBuf::from("/tmp/customers"));
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.urls().base(), "http://localhost:9000");
    }

    #[test]
    fn test_invalid_timeout() {
        let result = Config::from_lookup(lookup_from(&[("PIZZA_HTTP_TIMEOUT_SECS", "soon")]));
        assert!(matches!(result, Err(ConfigError::InvalidEnvVar(name, _)) if name == "PIZZA_HTTP_TIMEOUT_SECS"));
    }

    #[test]
    fn test_invalid_country() {
        let result = Config::from_lookup(lookup_from(&[("PIZZA_COUNTRY", "narnia")]));
        assert!(result.is_err());
    }
}
