//! Order assembly and checkout round-trips.
//!
//! An [`Order`] owns one [`OrderDocument`], the structured form of the JSON
//! object the API expects under `"Order"`. The document is seeded with the
//! fields the API requires, mutated locally as items are added, and partially
//! overwritten by the server's reply on price and validate calls.
//!
//! The merge back from the server is one-directional and lossy on purpose:
//! an empty list from the server keeps the local list, whatever the field is
//! called, and a value that does not fit its field is skipped. See
//! [`OrderDocument::merge_from`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};

use crate::address::Address;
use crate::api::ApiClient;
use crate::customer::Customer;
use crate::error::{Error, Result};
use crate::lenient::{bool_or_string, optional_string, string_or_scalar};
use crate::menu::{Menu, Variant};
use crate::payment::CreditCard;
use crate::store::Store;

/// Status value the API uses to signal a failed price or validate call.
const STATUS_FAILURE: i64 = -1;

/// Fulfilment mode.
///
/// The server may answer with modes this client never requests (for example
/// `DriveUpCarryout`); those are kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ServiceMethod {
    #[default]
    Delivery,
    Carryout,
    Other(String),
}

impl ServiceMethod {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Delivery => "Delivery",
            Self::Carryout => "Carryout",
            Self::Other(name) => name,
        }
    }

    fn from_wire(name: String) -> Self {
        match name.as_str() {
            "Delivery" => Self::Delivery,
            "Carryout" => Self::Carryout,
            _ => Self::Other(name),
        }
    }
}

impl Serialize for ServiceMethod {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ServiceMethod {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::from_wire)
    }
}

impl fmt::Display for ServiceMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "delivery" => Ok(Self::Delivery),
            "carryout" => Ok(Self::Carryout),
            other => Err(Error::MalformedInput(format!("unknown service method '{other}'"))),
        }
    }
}

/// How a field returned by the server is folded into the local document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeRule {
    /// Take the server value.
    Overwrite,
    /// Take the server value unless it is an empty list.
    KeepLocalIfEmpty,
}

/// Rule for fields missing from [`MERGE_RULES`], including fields only the
/// server knows about. An empty list from the server never clobbers a local one.
pub const DEFAULT_MERGE_RULE: MergeRule = MergeRule::KeepLocalIfEmpty;

/// Per-field merge rules for the list fields this client owns.
pub const MERGE_RULES: &[(&str, MergeRule)] = &[
    ("Products", MergeRule::KeepLocalIfEmpty),
    ("Coupons", MergeRule::KeepLocalIfEmpty),
    ("Payments", MergeRule::KeepLocalIfEmpty),
];

/// Rule applied to a server-returned field.
#[must_use]
pub fn merge_rule(field: &str) -> MergeRule {
    MERGE_RULES
        .iter()
        .find(|(name, _)| *name == field)
        .map_or(DEFAULT_MERGE_RULE, |(_, rule)| *rule)
}

/// Delivery address block of the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OrderAddress {
    #[serde(default, deserialize_with = "string_or_scalar")]
    pub street: String,
    #[serde(default, deserialize_with = "string_or_scalar")]
    pub city: String,
    #[serde(default, deserialize_with = "string_or_scalar")]
    pub region: String,
    #[serde(default, deserialize_with = "string_or_scalar")]
    pub postal_code: String,
    #[serde(rename = "Type", default, deserialize_with = "string_or_scalar")]
    pub kind: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl OrderAddress {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.street.is_empty()
            && self.city.is_empty()
            && self.region.is_empty()
            && self.postal_code.is_empty()
    }
}

impl From<&Address> for OrderAddress {
    fn from(address: &Address) -> Self {
        Self {
            street: address.street.clone(),
            city: address.city.clone(),
            region: address.region.clone(),
            postal_code: address.zip.clone(),
            kind: "House".to_string(),
            extra: Map::new(),
        }
    }
}

/// One product or coupon line.
///
/// `attributes` carries the variant's catalog fields (name, price, tags...)
/// and whatever the server adds on price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    #[serde(rename = "Code")]
    pub code: String,
    #[serde(rename = "ID", default)]
    pub id: u32,
    #[serde(rename = "isNew", default)]
    pub is_new: bool,
    #[serde(rename = "Qty", default = "default_qty")]
    pub qty: u32,
    #[serde(rename = "AutoRemove", default)]
    pub auto_remove: bool,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

const fn default_qty() -> u32 {
    1
}

impl OrderLine {
    fn from_variant(variant: &Variant, id: u32, qty: u32) -> Result<Self> {
        let Value::Object(mut attributes) = serde_json::to_value(variant)? else {
            return Err(Error::MalformedInput(format!(
                "variant {} did not serialize to an object",
                variant.code
            )));
        };
        for key in ["Code", "ID", "isNew", "Qty", "AutoRemove"] {
            attributes.remove(key);
        }
        Ok(Self {
            code: variant.code.clone(),
            id,
            is_new: true,
            qty,
            auto_remove: false,
            attributes,
        })
    }
}

/// A payment entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "Type")]
pub enum Payment {
    Cash,
    #[serde(rename_all = "PascalCase")]
    CreditCard {
        expiration: String,
        amount: f64,
        card_type: String,
        number: u64,
        security_code: u32,
        postal_code: u32,
    },
}

/// The order as exchanged with the API.
///
/// Scalar fields accept whatever JSON scalar the server sends (`25` or
/// `"25"`), so a reply never fails to merge over a type change alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OrderDocument {
    pub address: OrderAddress,
    pub coupons: Vec<OrderLine>,
    #[serde(rename = "CustomerID", deserialize_with = "string_or_scalar")]
    pub customer_id: String,
    #[serde(deserialize_with = "string_or_scalar")]
    pub extension: String,
    #[serde(deserialize_with = "string_or_scalar")]
    pub order_channel: String,
    #[serde(rename = "OrderID", deserialize_with = "string_or_scalar")]
    pub order_id: String,
    #[serde(deserialize_with = "bool_or_string")]
    pub no_combine: bool,
    #[serde(deserialize_with = "string_or_scalar")]
    pub order_method: String,
    #[serde(default, deserialize_with = "optional_string")]
    pub order_taker: Option<String>,
    pub payments: Vec<Payment>,
    pub products: Vec<OrderLine>,
    #[serde(deserialize_with = "string_or_scalar")]
    pub market: String,
    #[serde(deserialize_with = "string_or_scalar")]
    pub currency: String,
    pub service_method: ServiceMethod,
    pub tags: Map<String, Value>,
    #[serde(deserialize_with = "string_or_scalar")]
    pub version: String,
    #[serde(rename = "SourceOrganizationURI", deserialize_with = "string_or_scalar")]
    pub source_organization_uri: String,
    #[serde(deserialize_with = "string_or_scalar")]
    pub language_code: String,
    pub partners: Map<String, Value>,
    #[serde(deserialize_with = "bool_or_string")]
    pub new_user: bool,
    #[serde(rename = "metaData")]
    pub meta_data: Map<String, Value>,
    pub amounts: Map<String, Value>,
    #[serde(deserialize_with = "string_or_scalar")]
    pub business_date: String,
    #[serde(deserialize_with = "string_or_scalar")]
    pub estimated_wait_minutes: String,
    #[serde(deserialize_with = "string_or_scalar")]
    pub price_order_time: String,
    pub amounts_breakdown: Map<String, Value>,
    #[serde(
        rename = "StoreID",
        default,
        deserialize_with = "optional_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub store_id: Option<String>,
    #[serde(default, deserialize_with = "optional_string", skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "optional_string", skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, deserialize_with = "optional_string", skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "optional_string", skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Fields the server returned that this type does not name.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl OrderDocument {
    /// A document with the defaults the API requires.
    #[must_use]
    pub fn new(address: OrderAddress, language: &str) -> Self {
        Self {
            address,
            coupons: Vec::new(),
            customer_id: String::new(),
            extension: String::new(),
            order_channel: "OLO".to_string(),
            order_id: String::new(),
            no_combine: true,
            order_method: "Web".to_string(),
            order_taker: None,
            payments: Vec::new(),
            products: Vec::new(),
            market: String::new(),
            currency: String::new(),
            service_method: ServiceMethod::Delivery,
            tags: Map::new(),
            version: "1.0".to_string(),
            source_organization_uri: "order.dominos.com".to_string(),
            language_code: language.to_string(),
            partners: Map::new(),
            new_user: true,
            meta_data: Map::new(),
            amounts: Map::new(),
            business_date: String::new(),
            estimated_wait_minutes: String::new(),
            price_order_time: String::new(),
            amounts_breakdown: Map::new(),
            store_id: None,
            email: None,
            first_name: None,
            last_name: None,
            phone: None,
            extra: Map::new(),
        }
    }

    /// Fold a server-returned `Order` object into this document.
    ///
    /// Fields are merged one at a time, each following [`merge_rule`]. A
    /// `null` never replaces a local value that is not itself `null`. A server
    /// value that cannot be represented in its field (an object where a list
    /// of lines belongs, say) is skipped with a warning; the remaining fields
    /// are still adopted. Returns the names of the skipped fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the local document cannot be encoded.
    pub fn merge_from(&mut self, server: &Map<String, Value>) -> Result<Vec<String>> {
        let Value::Object(mut local) = serde_json::to_value(&*self)? else {
            return Err(Error::MalformedInput(
                "order document did not serialize to an object".to_string(),
            ));
        };

        let mut merged = self.clone();
        let mut skipped = Vec::new();
        for (key, value) in server {
            let keep_local = match value {
                Value::Array(items) if items.is_empty() => {
                    merge_rule(key) == MergeRule::KeepLocalIfEmpty
                }
                Value::Null => local.get(key).is_some_and(|v| !v.is_null()),
                _ => false,
            };
            if keep_local {
                debug!(field = %key, "keeping local value");
                continue;
            }

            let mut candidate = local.clone();
            candidate.insert(key.clone(), value.clone());
            match serde_json::from_value::<Self>(Value::Object(candidate.clone())) {
                Ok(doc) => {
                    merged = doc;
                    local = candidate;
                }
                Err(e) => {
                    warn!(field = %key, error = %e, "server value does not fit, keeping local");
                    skipped.push(key.clone());
                }
            }
        }

        *self = merged;
        Ok(skipped)
    }

    fn require_sendable(&self) -> Result<()> {
        if self.products.is_empty() {
            return Err(Error::Validation(
                "order has invalid value for key \"Products\"".to_string(),
            ));
        }
        if self.store_id.as_deref().map_or(true, str::is_empty) {
            return Err(Error::Validation(
                "order has invalid value for key \"StoreID\"".to_string(),
            ));
        }
        if self.address.is_empty() {
            return Err(Error::Validation(
                "order has invalid value for key \"Address\"".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct OrderEnvelope<'a> {
    #[serde(rename = "Order")]
    order: &'a OrderDocument,
}

/// A checkout session for one customer at one store.
#[derive(Debug)]
pub struct Order {
    document: OrderDocument,
    customer: Customer,
    store: Store,
    menu: Menu,
    api: ApiClient,
    next_line_id: u32,
}

impl Order {
    /// Start an order, fetching the store's menu.
    ///
    /// # Errors
    ///
    /// Returns an error if the menu cannot be fetched or the customer has no
    /// address.
    pub fn new(api: &ApiClient, store: Store, customer: Customer, lang: &str) -> Result<Self> {
        let menu = Menu::from_store(api, &store.id, lang)?;
        Self::with_menu(api.clone(), store, customer, menu, lang)
    }

    /// Start an order against an already loaded menu.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the customer has no address.
    pub fn with_menu(
        api: ApiClient,
        store: Store,
        customer: Customer,
        menu: Menu,
        lang: &str,
    ) -> Result<Self> {
        let address = customer.address.as_ref().ok_or_else(|| {
            Error::Validation("customer needs an address to start an order".to_string())
        })?;
        let document = OrderDocument::new(OrderAddress::from(address), lang);
        Ok(Self {
            document,
            customer,
            store,
            menu,
            api,
            next_line_id: 1,
        })
    }

    #[must_use]
    pub fn document(&self) -> &OrderDocument {
        &self.document
    }

    #[must_use]
    pub fn menu(&self) -> &Menu {
        &self.menu
    }

    /// Mutable menu access, for [`Menu::search`].
    pub fn menu_mut(&mut self) -> &mut Menu {
        &mut self.menu
    }

    #[must_use]
    pub fn customer(&self) -> &Customer {
        &self.customer
    }

    #[must_use]
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Add `qty` of the variant `code` to the products.
    ///
    /// `options` is accepted for callers that pass topping choices, but is
    /// not applied to the line.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the menu has no such variant; the
    /// document is unchanged.
    pub fn add_item(&mut self, code: &str, qty: u32, options: &[String]) -> Result<&OrderLine> {
        if !options.is_empty() {
            warn!(code, ?options, "item options are not applied");
        }
        let line = self.new_line(code, qty)?;
        debug!(code, qty, id = line.id, "adding item");
        self.document.products.push(line);
        last_line(&self.document.products)
    }

    /// Add `qty` of the coupon `code`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the menu has no such variant.
    pub fn add_coupon(&mut self, code: &str, qty: u32) -> Result<&OrderLine> {
        let line = self.new_line(code, qty)?;
        debug!(code, qty, id = line.id, "adding coupon");
        self.document.coupons.push(line);
        last_line(&self.document.coupons)
    }

    fn new_line(&mut self, code: &str, qty: u32) -> Result<OrderLine> {
        let variant = self
            .menu
            .variant(code)
            .ok_or_else(|| Error::NotFound(format!("no menu item with code {code}")))?;
        let line = OrderLine::from_variant(variant, self.next_line_id, qty)?;
        self.next_line_id += 1;
        Ok(line)
    }

    /// Remove the first product line with `code`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no product line has that code.
    pub fn remove_item(&mut self, code: &str) -> Result<OrderLine> {
        remove_first(&mut self.document.products, code)
    }

    /// Remove the first coupon line with `code`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no coupon line has that code.
    pub fn remove_coupon(&mut self, code: &str) -> Result<OrderLine> {
        remove_first(&mut self.document.coupons, code)
    }

    pub fn change_to_carryout(&mut self) {
        self.document.service_method = ServiceMethod::Carryout;
    }

    pub fn change_to_delivery(&mut self) {
        self.document.service_method = ServiceMethod::Delivery;
    }

    /// POST the document to `url`, optionally merging the reply back.
    ///
    /// Store and customer contact fields are stamped onto the document first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] when Products, StoreID or Address is
    /// empty (nothing is sent), [`Error::Transport`] on a failed request, and
    /// [`Error::MalformedInput`] when a merge is requested but the reply has
    /// no `Order` object.
    #[instrument(skip(self), fields(store_id = %self.store.id))]
    pub fn send(&mut self, url: &str, merge: bool) -> Result<Value> {
        self.document.store_id = Some(self.store.id.clone());
        self.document.email = Some(self.customer.email.clone());
        self.document.first_name = Some(self.customer.first_name.clone());
        self.document.last_name = Some(self.customer.last_name.clone());
        self.document.phone = Some(self.customer.phone.clone());

        self.document.require_sendable()?;

        let reply = self.api.post_json(
            url,
            &OrderEnvelope {
                order: &self.document,
            },
        )?;

        if merge {
            let server = reply
                .get("Order")
                .and_then(Value::as_object)
                .ok_or_else(|| Error::MalformedInput("reply has no Order object".to_string()))?;
            self.document.merge_from(server)?;
        }
        Ok(reply)
    }

    /// Ask the API to validate the order.
    ///
    /// # Errors
    ///
    /// Returns any error from [`Order::send`], or [`Error::MalformedInput`]
    /// if the reply carries no `Status`.
    pub fn validate(&mut self) -> Result<bool> {
        let url = self.api.urls().validate_url();
        let reply = self.send(&url, true)?;
        Ok(status_of(&reply)? != STATUS_FAILURE)
    }

    /// Price the order, then set its payment to cash (`None`) or the card.
    ///
    /// Card number, CVV and postal code are sent as integers, so leading
    /// zeros do not survive.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if pricing fails, and
    /// [`Error::MalformedInput`] if a card field is not numeric.
    pub fn pay_with(&mut self, card: Option<&CreditCard>) -> Result<Value> {
        let url = self.api.urls().price_url();
        let reply = self.send(&url, true)?;

        if status_of(&reply)? == STATUS_FAILURE {
            return Err(Error::Validation(format!("get price failed: {reply}")));
        }

        let payment = match card {
            None => Payment::Cash,
            Some(card) => Payment::CreditCard {
                expiration: card.expiration.clone(),
                amount: self
                    .document
                    .amounts
                    .get("Customer")
                    .and_then(Value::as_f64)
                    .unwrap_or(0.0),
                card_type: card.card_type.clone(),
                number: parse_numeric("card number", &card.number)?,
                security_code: parse_numeric("security code", &card.cvv)?,
                postal_code: parse_numeric("postal code", &card.zip)?,
            },
        };
        self.document.payments = vec![payment];
        Ok(reply)
    }

    /// Pay and place the order. The place reply is returned but not merged.
    ///
    /// # Errors
    ///
    /// Returns any error from [`Order::pay_with`] or [`Order::send`].
    pub fn place(&mut self, card: Option<&CreditCard>) -> Result<Value> {
        self.pay_with(card)?;
        let url = self.api.urls().place_url();
        let reply = self.send(&url, false)?;
        info!(store_id = %self.store.id, status = ?reply.get("Status"), "order placed");
        Ok(reply)
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.document.products.len();
        if count == 0 {
            write!(f, "An order for {} with no items in it", self.customer.first_name)
        } else {
            write!(f, "An order for {} with {count} items in it", self.customer.first_name)
        }
    }
}

fn last_line(lines: &[OrderLine]) -> Result<&OrderLine> {
    lines
        .last()
        .ok_or_else(|| Error::NotFound("order has no lines".to_string()))
}

fn remove_first(lines: &mut Vec<OrderLine>, code: &str) -> Result<OrderLine> {
    let index = lines
        .iter()
        .position(|line| line.code == code)
        .ok_or_else(|| Error::NotFound(format!("no line with code {code} in the order")))?;
    Ok(lines.remove(index))
}

fn status_of(reply: &Value) -> Result<i64> {
    reply
        .get("Status")
        .and_then(Value::as_i64)
        .ok_or_else(|| Error::MalformedInput("reply has no numeric Status".to_string()))
}

fn parse_numeric<T: FromStr>(field: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| Error::MalformedInput(format!("{field} must be numeric")))
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use rstest::rstest;
    use serde_json::json;

    use super::*;
    use crate::menu::tests::sample_catalog;
    use crate::urls::{Country, Urls};

    fn customer() -> Customer {
        Customer::new(
            "Stephen",
            "Monroe",
            "stephen@example.com",
            "980-555-0142",
            Some(Address::new("705 17th Street", "Knoxville", "TN", "37916")),
        )
    }

    fn store() -> Store {
        Store::from_locator(json!({"StoreID": "4336"}), Country::Usa).unwrap()
    }

    fn order_with(base: &str, menu: Menu) -> Order {
        let api = ApiClient::new(Urls::with_base(base)).unwrap();
        Order::with_menu(api, store(), customer(), menu, "en").unwrap()
    }

    fn offline_order() -> Order {
        order_with("http://127.0.0.1:1", Menu::parse(sample_catalog()).unwrap())
    }

    fn priced_reply(customer_amount: f64) -> Value {
        json!({
            "Status": 1,
            "Order": {
                "Products": [],
                "Payments": [],
                "Amounts": {"Customer": customer_amount},
                "Currency": "USD",
                "EstimatedWaitMinutes": "25-35",
                "PriceOrderTime": null
            }
        })
    }

    #[test]
    fn test_seeded_document_shape() {
        let order = offline_order();
        let doc = serde_json::to_value(order.document()).unwrap();

        assert_eq!(doc["Address"]["Street"], "705 17th Street");
        assert_eq!(doc["Address"]["PostalCode"], "37916");
        assert_eq!(doc["Address"]["Type"], "House");
        assert_eq!(doc["OrderChannel"], "OLO");
        assert_eq!(doc["OrderMethod"], "Web");
        assert_eq!(doc["ServiceMethod"], "Delivery");
        assert_eq!(doc["SourceOrganizationURI"], "order.dominos.com");
        assert_eq!(doc["LanguageCode"], "en");
        assert_eq!(doc["Version"], "1.0");
        assert_eq!(doc["NoCombine"], true);
        assert_eq!(doc["NewUser"], true);
        assert!(doc["OrderTaker"].is_null());
        assert_eq!(doc["metaData"], json!({}));
        assert_eq!(doc["Products"], json!([]));
        assert!(doc.get("StoreID").is_none());
    }

    #[test]
    fn test_customer_without_address_is_rejected() {
        let api = ApiClient::new(Urls::default()).unwrap();
        let mut nobody = customer();
        nobody.address = None;

        let result = Order::with_menu(api, store(), nobody, Menu::default(), "en");
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn test_add_item_unknown_code_leaves_products_unchanged() {
        let mut order = order_with("http://127.0.0.1:1", Menu::default());
        assert_eq!(order.document().products.len(), 0);

        let result = order.add_item("X9", 1, &[]);

        assert!(matches!(result, Err(Error::NotFound(_))));
        assert_eq!(order.document().products.len(), 0);
    }

    #[test]
    fn test_add_item_stamps_line() {
        let mut order = offline_order();

        let line = order.add_item("14SCREEN", 2, &[]).unwrap().clone();
        assert_eq!(line.id, 1);
        assert_eq!(line.qty, 2);
        assert!(line.is_new);
        assert!(!line.auto_remove);

        let json = serde_json::to_value(&line).unwrap();
        assert_eq!(json["Code"], "14SCREEN");
        assert_eq!(json["Price"], "13.99");
        assert_eq!(json["isNew"], true);
        assert_eq!(json["ProductCode"], "S_PIZZA");

        let second = order.add_item("B8PCPT", 1, &["X=1".to_string()]).unwrap();
        assert_eq!(second.id, 2);
        assert_eq!(order.document().products.len(), 2);
    }

    #[test]
    fn test_remove_item_takes_first_match() {
        let mut order = offline_order();
        order.add_item("14SCREEN", 1, &[]).unwrap();
        order.add_item("B8PCPT", 1, &[]).unwrap();
        order.add_item("14SCREEN", 3, &[]).unwrap();

        let removed = order.remove_item("14SCREEN").unwrap();

        assert_eq!(removed.id, 1);
        let remaining: Vec<u32> = order.document().products.iter().map(|l| l.id).collect();
        assert_eq!(remaining, [2, 3]);
        assert!(matches!(order.remove_item("NOPE"), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_coupons_are_kept_separately() {
        let mut order = offline_order();
        order.add_coupon("9193", 1).unwrap();

        assert_eq!(order.document().coupons.len(), 1);
        assert!(order.document().products.is_empty());
        assert_eq!(order.remove_coupon("9193").unwrap().code, "9193");
        assert!(matches!(order.remove_coupon("9193"), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_service_method_switching() {
        let mut order = offline_order();
        order.change_to_carryout();
        assert_eq!(order.document().service_method, ServiceMethod::Carryout);
        order.change_to_delivery();
        assert_eq!(order.document().service_method, ServiceMethod::Delivery);
    }

    #[rstest]
    #[case("Products", MergeRule::KeepLocalIfEmpty)]
    #[case("Coupons", MergeRule::KeepLocalIfEmpty)]
    #[case("Payments", MergeRule::KeepLocalIfEmpty)]
    #[case("StatusItems", MergeRule::KeepLocalIfEmpty)]
    #[case("Currency", MergeRule::KeepLocalIfEmpty)]
    fn test_merge_rule_table(#[case] field: &str, #[case] expected: MergeRule) {
        assert_eq!(merge_rule(field), expected);
    }

    #[test]
    fn test_merge_keeps_local_list_when_server_list_is_empty() {
        let mut order = offline_order();
        order.add_item("14SCREEN", 1, &[]).unwrap();
        let mut doc = order.document().clone();

        let server = json!({"Products": [], "Currency": "USD", "Promotions": {"Valid": []}});
        doc.merge_from(server.as_object().unwrap()).unwrap();

        assert_eq!(doc.products.len(), 1);
        assert_eq!(doc.currency, "USD");
        assert_eq!(doc.extra["Promotions"], json!({"Valid": []}));
    }

    #[test]
    fn test_merge_keeps_unlisted_local_list_when_server_list_is_empty() {
        let mut doc = offline_order().document().clone();
        doc.extra.insert("StatusItems".to_string(), json!([{"Code": "X"}]));

        let server = json!({"StatusItems": []});
        doc.merge_from(server.as_object().unwrap()).unwrap();

        assert_eq!(doc.extra["StatusItems"], json!([{"Code": "X"}]));
    }

    #[test]
    fn test_merge_reads_numeric_scalar_as_text() {
        let mut doc = offline_order().document().clone();

        let server = json!({"EstimatedWaitMinutes": 25, "Currency": "USD", "NoCombine": "false"});
        let skipped = doc.merge_from(server.as_object().unwrap()).unwrap();

        assert!(skipped.is_empty());
        assert_eq!(doc.estimated_wait_minutes, "25");
        assert_eq!(doc.currency, "USD");
        assert!(!doc.no_combine);
    }

    #[test]
    fn test_merge_keeps_unknown_service_method() {
        let mut doc = offline_order().document().clone();

        let server = json!({"ServiceMethod": "DriveUpCarryout", "OrderID": "z"});
        doc.merge_from(server.as_object().unwrap()).unwrap();

        assert_eq!(doc.service_method, ServiceMethod::Other("DriveUpCarryout".to_string()));
        assert_eq!(doc.order_id, "z");
        let encoded = serde_json::to_value(&doc).unwrap();
        assert_eq!(encoded["ServiceMethod"], "DriveUpCarryout");
    }

    #[test]
    fn test_merge_skips_field_that_does_not_fit() {
        let mut order = offline_order();
        order.add_item("14SCREEN", 1, &[]).unwrap();
        let mut doc = order.document().clone();

        let server = json!({"Products": {"Code": "14SCREEN"}, "Currency": "USD"});
        let skipped = doc.merge_from(server.as_object().unwrap()).unwrap();

        assert_eq!(skipped, ["Products"]);
        assert_eq!(doc.products.len(), 1);
        assert_eq!(doc.currency, "USD");
    }

    #[test]
    fn test_merge_adopts_non_empty_server_lists() {
        let mut doc = offline_order().document().clone();
        let server = json!({"Products": [{"Code": "14SCREEN", "Qty": 1, "ID": 1, "Price": 13.99}]});

        doc.merge_from(server.as_object().unwrap()).unwrap();

        assert_eq!(doc.products.len(), 1);
        assert_eq!(doc.products[0].attributes["Price"], 13.99);
    }

    #[test]
    fn test_merge_ignores_null_over_typed_value() {
        let mut doc = offline_order().document().clone();
        let server = json!({"Version": null, "OrderTaker": null});

        doc.merge_from(server.as_object().unwrap()).unwrap();

        assert_eq!(doc.version, "1.0");
        assert_eq!(doc.order_taker, None);
    }

    #[test]
    fn test_send_without_products_is_rejected_before_request() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST);
            then.status(200).json_body(json!({"Status": 1, "Order": {}}));
        });
        let mut order = order_with(&server.base_url(), Menu::parse(sample_catalog()).unwrap());

        let result = order.validate();

        assert!(matches!(result, Err(Error::Validation(msg)) if msg.contains("Products")));
        mock.assert_hits(0);
    }

    #[rstest]
    #[case(1, true)]
    #[case(-1, false)]
    fn test_validate_reads_status(#[case] status: i64, #[case] expected: bool) {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/power/validate-order");
            then.status(200)
                .json_body(json!({"Status": status, "Order": {"OrderID": "abc123"}}));
        });
        let mut order = order_with(&server.base_url(), Menu::parse(sample_catalog()).unwrap());
        order.add_item("14SCREEN", 1, &[]).unwrap();

        assert_eq!(order.validate().unwrap(), expected);
        mock.assert();
        assert_eq!(order.document().order_id, "abc123");
        assert_eq!(order.document().store_id.as_deref(), Some("4336"));
        assert_eq!(order.document().email.as_deref(), Some("stephen@example.com"));
    }

    #[test]
    fn test_transport_failure_surfaces() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/power/validate-order");
            then.status(500).body("boom");
        });
        let mut order = order_with(&server.base_url(), Menu::parse(sample_catalog()).unwrap());
        order.add_item("14SCREEN", 1, &[]).unwrap();

        assert!(matches!(order.validate(), Err(Error::Transport(_))));
    }

    #[test]
    fn test_pay_with_cash() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/power/price-order");
            then.status(200).json_body(priced_reply(21.5));
        });
        let mut order = order_with(&server.base_url(), Menu::parse(sample_catalog()).unwrap());
        order.add_item("14SCREEN", 1, &[]).unwrap();

        order.pay_with(None).unwrap();

        let doc = order.document();
        assert_eq!(doc.payments, [Payment::Cash]);
        assert_eq!(doc.products.len(), 1);
        assert_eq!(doc.currency, "USD");
        assert_eq!(doc.estimated_wait_minutes, "25-35");
        assert_eq!(serde_json::to_value(&doc.payments).unwrap(), json!([{"Type": "Cash"}]));
    }

    #[test]
    fn test_pay_with_numeric_wait_estimate() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/power/price-order");
            then.status(200).json_body(json!({
                "Status": 1,
                "Order": {
                    "Amounts": {"Customer": 18.25},
                    "EstimatedWaitMinutes": 25,
                    "ServiceMethod": "DriveUpCarryout"
                }
            }));
        });
        let mut order = order_with(&server.base_url(), Menu::parse(sample_catalog()).unwrap());
        order.add_item("14SCREEN", 1, &[]).unwrap();

        order.pay_with(None).unwrap();

        let doc = order.document();
        assert_eq!(doc.payments, [Payment::Cash]);
        assert_eq!(doc.estimated_wait_minutes, "25");
        assert_eq!(doc.service_method.as_str(), "DriveUpCarryout");
    }

    #[test]
    fn test_pay_with_card_coerces_numbers() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/power/price-order");
            then.status(200).json_body(priced_reply(21.5));
        });
        let mut order = order_with(&server.base_url(), Menu::parse(sample_catalog()).unwrap());
        order.add_item("14SCREEN", 1, &[]).unwrap();
        let card = CreditCard::new("4111111111111111", "01/27", "023", "01234");

        order.pay_with(Some(&card)).unwrap();

        let payments = serde_json::to_value(&order.document().payments).unwrap();
        assert_eq!(
            payments,
            json!([{
                "Type": "CreditCard",
                "Expiration": "0127",
                "Amount": 21.5,
                "CardType": "VISA",
                "Number": 4_111_111_111_111_111_u64,
                "SecurityCode": 23,
                "PostalCode": 1234
            }])
        );
    }

    #[test]
    fn test_pay_with_non_numeric_postal_code() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/power/price-order");
            then.status(200).json_body(priced_reply(10.0));
        });
        let mut order = order_with(&server.base_url(), Menu::parse(sample_catalog()).unwrap());
        order.add_item("14SCREEN", 1, &[]).unwrap();
        let card = CreditCard::new("4111111111111111", "0127", "123", "K1A 0B1");

        assert!(matches!(order.pay_with(Some(&card)), Err(Error::MalformedInput(_))));
    }

    #[test]
    fn test_pay_with_failed_price() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/power/price-order");
            then.status(200).json_body(json!({"Status": -1, "Order": {}}));
        });
        let mut order = order_with(&server.base_url(), Menu::parse(sample_catalog()).unwrap());
        order.add_item("14SCREEN", 1, &[]).unwrap();

        assert!(matches!(order.pay_with(None), Err(Error::Validation(_))));
        assert!(order.document().payments.is_empty());
    }

    #[test]
    fn test_place_does_not_merge_reply() {
        let server = MockServer::start();
        let price = server.mock(|when, then| {
            when.method(POST).path("/power/price-order");
            then.status(200).json_body(priced_reply(12.0));
        });
        let place = server.mock(|when, then| {
            when.method(POST).path("/power/place-order");
            then.status(200)
                .json_body(json!({"Status": 1, "Order": {"OrderID": "placed-1", "Products": []}}));
        });
        let mut order = order_with(&server.base_url(), Menu::parse(sample_catalog()).unwrap());
        order.add_item("14SCREEN", 1, &[]).unwrap();

        let reply = order.place(None).unwrap();

        price.assert();
        place.assert();
        assert_eq!(reply["Order"]["OrderID"], "placed-1");
        assert_eq!(order.document().order_id, "");
        assert_eq!(order.document().payments, [Payment::Cash]);
    }

    #[test]
    fn test_display_counts_items() {
        let mut order = offline_order();
        assert_eq!(order.to_string(), "An order for Stephen with no items in it");
        order.add_item("14SCREEN", 1, &[]).unwrap();
        assert_eq!(order.to_string(), "An order for Stephen with 1 items in it");
    }

    #[test]
    fn test_service_method_from_str() {
        assert_eq!("carryout".parse::<ServiceMethod>().unwrap(), ServiceMethod::Carryout);
        assert!("pickup".parse::<ServiceMethod>().is_err());
        let wire: ServiceMethod = serde_json::from_value(json!("Carryout")).unwrap();
        assert_eq!(wire, ServiceMethod::Carryout);
    }
}
