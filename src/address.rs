//! Postal addresses and store lookup.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;
use tracing::{debug, instrument};

use crate::api::ApiClient;
use crate::error::{Error, Result};
use crate::order::ServiceMethod;
use crate::store::Store;
use crate::urls::Country;

/// A North American street address.
///
/// Every field is trimmed on construction. The postal code is text even when
/// the caller has it as a number. `country` is not part of the text form;
/// it defaults to [`Country::Usa`] and is handed to every store found nearby.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub street: String,
    pub city: String,
    pub region: String,
    pub zip: String,
    pub country: Country,
}

impl Address {
    pub fn new(
        street: impl AsRef<str>,
        city: impl AsRef<str>,
        region: impl AsRef<str>,
        zip: impl ToString,
    ) -> Self {
        Self {
            street: street.as_ref().trim().to_string(),
            city: city.as_ref().trim().to_string(),
            region: region.as_ref().trim().to_string(),
            zip: zip.to_string().trim().to_string(),
            country: Country::default(),
        }
    }

    #[must_use]
    pub fn with_country(mut self, country: Country) -> Self {
        self.country = country;
        self
    }

    /// First locator line: the street.
    #[must_use]
    pub fn line1(&self) -> String {
        self.street.clone()
    }

    /// Second locator line: `city, region, zip`.
    #[must_use]
    pub fn line2(&self) -> String {
        format!("{}, {}, {}", self.city, self.region, self.zip)
    }

    /// Stores near this address that are online and open for `service`,
    /// closest first as ranked by the locator.
    ///
    /// Delivery additionally requires the store to be a delivery store.
    ///
    /// # Errors
    ///
    /// Returns an error if the locator request fails or a store entry has no id.
    #[instrument(skip(self, api), fields(address = %self))]
    pub fn nearby_stores(&self, api: &ApiClient, service: ServiceMethod) -> Result<Vec<Store>> {
        let line1 = self.line1();
        let line2 = self.line2();
        let data = api.get_json(
            &api.urls().find_url(),
            &[("s", line1.as_str()), ("c", line2.as_str()), ("type", service.as_str())],
        )?;

        let stores = data
            .get("Stores")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        let open: Vec<Store> = stores
            .iter()
            .filter(|s| is_open_for(s, &service))
            .cloned()
            .map(|entry| Store::from_locator(entry, self.country))
            .collect::<Result<_>>()?;

        debug!(found = stores.len(), open = open.len(), "store locator filtered");
        Ok(open)
    }

    /// The first store [`Address::nearby_stores`] returns.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] when no store is open for `service`.
    pub fn closest_store(&self, api: &ApiClient, service: ServiceMethod) -> Result<Store> {
        self.nearby_stores(api, service)?
            .into_iter()
            .next()
            .ok_or_else(|| Error::NotFound("No local stores are currently open".to_string()))
    }
}

fn is_open_for(store: &Value, service: &ServiceMethod) -> bool {
    let flag = |key: &str| store.get(key).and_then(Value::as_bool).unwrap_or(false);
    let service_open = store
        .get("ServiceIsOpen")
        .and_then(|m| m.get(service.as_str()))
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let delivery_ok = *service != ServiceMethod::Delivery || flag("IsDeliveryStore");
    delivery_ok && flag("IsOnlineNow") && service_open
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}, {}, {}", self.street, self.city, self.region, self.zip)
    }
}

/// Parse the comma-joined form, `street, city[, region[, zip]]`.
impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split(',');
        let street = parts.next().unwrap_or_default();
        let city = parts.next().ok_or_else(|| {
            Error::MalformedInput(format!("address '{s}' needs at least street and city"))
        })?;
        let region = parts.next().unwrap_or_default();
        let zip = parts.next().unwrap_or_default();
        if parts.next().is_some() {
            return Err(Error::MalformedInput(format!(
                "address '{s}' has more than four comma-separated parts"
            )));
        }
        Ok(Self::new(street, city, region, zip))
    }
}
