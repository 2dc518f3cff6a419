//! Remote store handle returned by the store locator.

use std::fmt;

use serde_json::Value;
use tracing::instrument;

use crate::api::ApiClient;
use crate::error::{Error, Result};
use crate::menu::Menu;
use crate::urls::Country;

/// A store as the locator described it.
///
/// The raw attributes are kept verbatim; only the identifier is pulled out.
#[derive(Debug, Clone, PartialEq)]
pub struct Store {
    pub id: String,
    pub country: Country,
    pub data: Value,
}

impl Store {
    /// Build a store from one entry of the locator's `Stores` list.
    ///
    /// `StoreID` may arrive as a number or a string; both are kept as text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedInput`] if `StoreID` is missing.
    pub fn from_locator(data: Value, country: Country) -> Result<Self> {
        let id = match data.get("StoreID") {
            Some(Value::String(s)) => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            _ => {
                return Err(Error::MalformedInput(
                    "store entry has no StoreID".to_string(),
                ))
            }
        };
        Ok(Self { id, country, data })
    }

    /// Fetch the store profile (hours, phone, service estimates).
    ///
    /// # Errors
    ///
    /// Returns an error if the profile request fails.
    #[instrument(skip(self, api), fields(store_id = %self.id))]
    pub fn details(&self, api: &ApiClient) -> Result<Value> {
        api.get_json(&api.urls().info_url(&self.id), &[])
    }

    /// Fetch this store's menu.
    ///
    /// # Errors
    ///
    /// Returns an error if the menu request fails or the catalog is malformed.
    pub fn menu(&self, api: &ApiClient, lang: &str) -> Result<Menu> {
        Menu::from_store(api, &self.id, lang)
    }
}

impl fmt::Display for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let line = |key: &str| self.data.get(key).and_then(Value::as_str).unwrap_or("");
        write!(f, "Store #{}", self.id)?;
        let address = line("AddressDescription");
        if !address.is_empty() {
            write!(f, "\n{}", address.trim())?;
        }
        let phone = line("Phone");
        if !phone.is_empty() {
            write!(f, "\nPhone: {phone}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use serde_json::json;

    use super::*;
    use crate::urls::Urls;

    #[test]
    fn test_numeric_store_id_becomes_text() {
        let store =
            Store::from_locator(json!({"StoreID": 4336, "Phone": "865-555-0100"}), Country::Usa)
                .unwrap();
        assert_eq!(store.id, "4336");
        assert_eq!(store.country, Country::Usa);
    }

    #[test]
    fn test_missing_store_id() {
        let result = Store::from_locator(json!({"Phone": "865-555-0100"}), Country::Usa);
        assert!(matches!(result, Err(Error::MalformedInput(_))));
    }

    #[test]
    fn test_display_includes_phone() {
        let store =
            Store::from_locator(json!({"StoreID": "12", "Phone": "555"}), Country::Usa).unwrap();
        assert_eq!(store.to_string(), "Store #12\nPhone: 555");
    }

    #[test]
    fn test_details_hits_profile_endpoint() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/power/store/12/profile");
            then.status(200).json_body(json!({"StoreID": "12", "IsOpen": true}));
        });
        let api = ApiClient::new(Urls::with_base(&server.base_url())).unwrap();
        let store = Store::from_locator(json!({"StoreID": "12"}), Country::Usa).unwrap();

        let details = store.details(&api).unwrap();

        mock.assert();
        assert_eq!(details["IsOpen"], true);
    }
}
