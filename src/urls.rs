//! Endpoint templates for the ordering API.
//!
//! The API is hosted per country. Paths are the same everywhere; only the
//! host differs. A custom base can be supplied to point the client at a
//! different host (a staging mirror, or a mock server in tests).

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Countries the ordering API serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Country {
    #[default]
    Usa,
    Canada,
}

impl Country {
    /// Default API host for the country.
    #[must_use]
    pub const fn base_url(self) -> &'static str {
        match self {
            Self::Usa => "https://order.dominos.com",
            Self::Canada => "https://order.dominos.ca",
        }
    }
}

impl fmt::Display for Country {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Usa => f.write_str("us"),
            Self::Canada => f.write_str("ca"),
        }
    }
}

impl FromStr for Country {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "us" | "usa" => Ok(Self::Usa),
            "ca" | "can" | "canada" => Ok(Self::Canada),
            other => Err(Error::MalformedInput(format!("unknown country '{other}'"))),
        }
    }
}

/// Resolved endpoint URLs for one API host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Urls {
    base: String,
}

impl Urls {
    /// URLs for the country's public API host.
    #[must_use]
    pub fn new(country: Country) -> Self {
        Self::with_base(country.base_url())
    }

    /// URLs rooted at an arbitrary base, e.g. `http://127.0.0.1:5000`.
    #[must_use]
    pub fn with_base(base: &str) -> Self {
        Self {
            base: base.trim_end_matches('/').to_string(),
        }
    }

    #[must_use]
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Store locator. Query parameters are added by the caller.
    #[must_use]
    pub fn find_url(&self) -> String {
        format!("{}/power/store-locator", self.base)
    }

    #[must_use]
    pub fn info_url(&self, store_id: &str) -> String {
        format!("{}/power/store/{store_id}/profile", self.base)
    }

    #[must_use]
    pub fn menu_url(&self, store_id: &str) -> String {
        format!("{}/power/store/{store_id}/menu", self.base)
    }

    #[must_use]
    pub fn validate_url(&self) -> String {
        format!("{}/power/validate-order", self.base)
    }

    #[must_use]
    pub fn price_url(&self) -> String {
        format!("{}/power/price-order", self.base)
    }

    #[must_use]
    pub fn place_url(&self) -> String {
        format!("{}/power/place-order", self.base)
    }
}

impl Default for Urls {
    fn default() -> Self {
        Self::new(Country::default())
    }
}
