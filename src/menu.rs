//! Store menu: variants, catalog items and the category trees.
//!
//! The remote catalog is a deeply nested JSON document. Three parts matter:
//!
//! - `Variants`: every orderable configuration, keyed by code. This is what
//!   goes into an order.
//! - `Products`, `Coupons`, `PreconfiguredProducts`: catalog entries, indexed
//!   together into one flat code → [`MenuItem`] map.
//! - `Categorization`: one tree per root (`Food`, `Coupons`,
//!   `PreconfiguredProducts`) whose leaves reference catalog codes.
//!
//! Categories live in an arena (`Vec<MenuCategory>`) and point at each other
//! by [`CategoryId`]; items point back at the categories holding them the same
//! way. A catalog without variants yields an empty menu, not an error.

use std::collections::BTreeMap;
use std::io::Write;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, instrument};

use crate::api::ApiClient;
use crate::error::{Error, Result};
use crate::lenient::string_or_scalar;

/// Index of a category in the menu's arena.
pub type CategoryId = usize;

/// Category roots rendered by [`Menu::display`], with their banners.
const DISPLAY_ROOTS: [(&str, &str); 3] = [
    ("Coupons", "Coupon Menu"),
    ("PreconfiguredProducts", "Preconfigured Menu"),
    ("Food", "Regular Menu"),
];

/// What to do when a category lists a code the catalog does not define.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingProductPolicy {
    /// Leave the code out of the category. The live API does this routinely.
    #[default]
    Skip,
    /// Stop parsing with [`Error::NotFound`].
    Fail,
}

/// One orderable configuration of a product.
///
/// Attributes this crate does not interpret are kept in `extra` and sent
/// back to the API unchanged when the variant is ordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Variant {
    pub code: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "string_or_scalar")]
    pub price: String,
    #[serde(default)]
    pub tags: Map<String, Value>,
    #[serde(default)]
    pub toppings: BTreeMap<String, String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Variant {
    /// Rebuild `toppings` from the `DefaultToppings` tag (`"X=1,C=1"`).
    ///
    /// Empty entries are dropped; an entry without `=` maps to an empty amount.
    pub fn refresh_toppings(&mut self) {
        let defaults = self
            .tags
            .get("DefaultToppings")
            .and_then(Value::as_str)
            .unwrap_or_default();
        self.toppings = defaults
            .split(',')
            .filter(|entry| !entry.is_empty())
            .map(|entry| match entry.split_once('=') {
                Some((code, amount)) => (code.to_string(), amount.to_string()),
                None => (entry.to_string(), String::new()),
            })
            .collect();
    }
}

/// A catalog entry: product, coupon or preconfigured product.
#[derive(Debug, Clone, PartialEq)]
pub struct MenuItem {
    pub code: String,
    pub name: String,
    /// The raw catalog object.
    pub data: Value,
    /// Categories that list this item.
    pub categories: Vec<CategoryId>,
}

/// A node in one of the category trees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuCategory {
    pub code: String,
    pub name: String,
    pub parent: Option<CategoryId>,
    pub subcategories: Vec<CategoryId>,
    /// Codes of items in this category; each is present in the item index.
    pub products: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Catalog {
    #[serde(default)]
    variants: IndexMap<String, Variant>,
    #[serde(default)]
    products: Map<String, Value>,
    #[serde(default)]
    coupons: Map<String, Value>,
    #[serde(default)]
    preconfigured_products: Map<String, Value>,
    #[serde(default)]
    categorization: BTreeMap<String, CategoryNode>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CategoryNode {
    code: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    categories: Vec<CategoryNode>,
    #[serde(default)]
    products: Vec<String>,
}

#[derive(Deserialize)]
struct ItemHeader {
    #[serde(rename = "Code")]
    code: String,
    #[serde(rename = "Name", default)]
    name: String,
}

/// Parsed store menu.
#[derive(Debug, Clone, Default)]
pub struct Menu {
    variants: IndexMap<String, Variant>,
    items: BTreeMap<String, MenuItem>,
    categories: Vec<MenuCategory>,
    roots: BTreeMap<String, CategoryId>,
    products: Vec<String>,
    coupons: Vec<String>,
    preconfigured: Vec<String>,
    policy: MissingProductPolicy,
}

impl Menu {
    /// Fetch and parse the menu of a store.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the catalog is malformed.
    #[instrument(skip(api))]
    pub fn from_store(api: &ApiClient, store_id: &str, lang: &str) -> Result<Self> {
        let data = api.get_json(
            &api.urls().menu_url(store_id),
            &[("lang", lang), ("structured", "true")],
        )?;
        let menu = Self::parse(data)?;
        debug!(items = menu.get_item_count(), "menu loaded");
        Ok(menu)
    }

    /// Parse a catalog, skipping category entries that reference unknown codes.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog does not have the expected shape.
    pub fn parse(data: Value) -> Result<Self> {
        Self::parse_with_policy(data, MissingProductPolicy::Skip)
    }

    /// Parse a catalog with an explicit policy for unknown category entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog does not have the expected shape, or
    /// under [`MissingProductPolicy::Fail`] when a category lists an unknown code.
    pub fn parse_with_policy(data: Value, policy: MissingProductPolicy) -> Result<Self> {
        let catalog: Catalog = serde_json::from_value(data)?;
        let mut menu = Self {
            policy,
            ..Self::default()
        };
        if catalog.variants.is_empty() {
            return Ok(menu);
        }
        menu.variants = catalog.variants;

        menu.products = menu.parse_items(&catalog.products)?;
        menu.coupons = menu.parse_items(&catalog.coupons)?;
        menu.preconfigured = menu.parse_items(&catalog.preconfigured_products)?;

        for (key, node) in &catalog.categorization {
            let root = menu.build_categories(node, None)?;
            menu.roots.insert(key.clone(), root);
        }
        Ok(menu)
    }

    fn parse_items(&mut self, section: &Map<String, Value>) -> Result<Vec<String>> {
        let mut codes = Vec::with_capacity(section.len());
        for (key, raw) in section {
            let header = ItemHeader::deserialize(raw).map_err(|e| {
                Error::MalformedInput(format!("catalog entry '{key}': {e}"))
            })?;
            codes.push(header.code.clone());
            self.items.insert(
                header.code.clone(),
                MenuItem {
                    code: header.code,
                    name: header.name,
                    data: raw.clone(),
                    categories: Vec::new(),
                },
            );
        }
        Ok(codes)
    }

    fn build_categories(&mut self, node: &CategoryNode, parent: Option<CategoryId>) -> Result<CategoryId> {
        let id = self.categories.len();
        self.categories.push(MenuCategory {
            code: node.code.clone(),
            name: node.name.clone(),
            parent,
            subcategories: Vec::new(),
            products: Vec::new(),
        });

        for sub in &node.categories {
            let child = self.build_categories(sub, Some(id))?;
            self.categories[id].subcategories.push(child);
        }

        for code in &node.products {
            match self.items.get_mut(code) {
                Some(item) => {
                    item.categories.push(id);
                    self.categories[id].products.push(code.clone());
                }
                None if self.policy == MissingProductPolicy::Skip => {
                    debug!(product = %code, category = %node.code, "skipping unknown product");
                }
                None => {
                    return Err(Error::NotFound(format!(
                        "product {code} listed in category {} is not in the menu",
                        node.code
                    )));
                }
            }
        }
        Ok(id)
    }

    /// Number of entries in the flat item index.
    #[must_use]
    pub fn get_item_count(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    #[must_use]
    pub fn variant(&self, code: &str) -> Option<&Variant> {
        self.variants.get(code)
    }

    pub fn variants(&self) -> impl Iterator<Item = &Variant> {
        self.variants.values()
    }

    #[must_use]
    pub fn item(&self, code: &str) -> Option<&MenuItem> {
        self.items.get(code)
    }

    /// Codes from the `Products` section, in catalog order.
    #[must_use]
    pub fn products(&self) -> &[String] {
        &self.products
    }

    #[must_use]
    pub fn coupons(&self) -> &[String] {
        &self.coupons
    }

    #[must_use]
    pub fn preconfigured(&self) -> &[String] {
        &self.preconfigured
    }

    #[must_use]
    pub fn category(&self, id: CategoryId) -> Option<&MenuCategory> {
        self.categories.get(id)
    }

    /// Root category registered under `key` (`Food`, `Coupons`, ...).
    #[must_use]
    pub fn root(&self, key: &str) -> Option<CategoryId> {
        self.roots.get(key).copied()
    }

    /// Codes from the root down to `id`, concatenated.
    #[must_use]
    pub fn category_path(&self, id: CategoryId) -> Option<String> {
        let mut codes = Vec::new();
        let mut current = Some(id);
        while let Some(cid) = current {
            let category = self.categories.get(cid)?;
            codes.push(category.code.as_str());
            current = category.parent;
        }
        codes.reverse();
        Some(codes.concat())
    }

    /// Find variants whose name contains `name` (case-sensitive) and write
    /// `name\tcode\tprice` for each to `out`. Returns the matching codes.
    ///
    /// Every variant's toppings are recomputed from its tags on each call,
    /// matched or not.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to `out` fails.
    pub fn search<W: Write>(&mut self, name: &str, out: &mut W) -> Result<Vec<String>> {
        let mut matches = Vec::new();
        for variant in self.variants.values_mut() {
            variant.refresh_toppings();
            if variant.name.contains(name) {
                writeln!(out, "{}\t{}\t{}", variant.name, variant.code, variant.price)?;
                matches.push(variant.code.clone());
            }
        }
        Ok(matches)
    }

    /// Render the coupon, preconfigured and regular menus as an indented tree.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if one of the three roots is missing, or an
    /// I/O error from `out`.
    pub fn display<W: Write>(&self, out: &mut W) -> Result<()> {
        let roots = DISPLAY_ROOTS
            .iter()
            .map(|(key, banner)| {
                self.root(key)
                    .map(|id| (id, *banner))
                    .ok_or_else(|| Error::NotFound(format!("menu has no '{key}' category")))
            })
            .collect::<Result<Vec<_>>>()?;

        for (id, banner) in roots {
            writeln!(out, "************ {banner} ************")?;
            self.write_category(out, id, 1)?;
        }
        Ok(())
    }

    fn write_category<W: Write>(&self, out: &mut W, id: CategoryId, depth: usize) -> Result<()> {
        let Some(category) = self.categories.get(id) else {
            return Ok(());
        };
        if category.products.is_empty() && category.subcategories.is_empty() {
            return Ok(());
        }

        let indent = "  ".repeat(depth + 1);
        writeln!(out, "{indent}{}", category.name)?;
        for &child in &category.subcategories {
            self.write_category(out, child, depth + 1)?;
        }
        for code in &category.products {
            let name = self.items.get(code).map_or("", |item| item.name.as_str());
            writeln!(out, "{indent}  [{code}] {name}")?;
        }
        Ok(())
    }
}
