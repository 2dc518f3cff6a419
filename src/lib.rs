// Library root
// ------------
// A small client for the pizza ordering API plus the pieces the `pizza`
// binary needs to drive it interactively.
//
// Module responsibilities:
// - `api`: blocking HTTP client for the ordering endpoints.
// - `urls`: endpoint templates per country.
// - `config`: environment-driven settings.
// - `address`, `store`: store lookup near an address.
// - `customer`: contact details and their saved-file form.
// - `menu`: catalog parsing, category trees, search and display.
// - `order`: order document assembly and checkout round-trips.
// - `payment`: card details and network detection.
// - `ui`: terminal flows used by the binary.
// - `xml`: XML response bodies as JSON values.
pub mod address;
pub mod api;
pub mod config;
pub mod customer;
pub mod error;
mod lenient;
pub mod menu;
pub mod order;
pub mod payment;
pub mod store;
pub mod ui;
pub mod urls;
pub mod xml;

pub use address::Address;
pub use api::ApiClient;
pub use config::Config;
pub use customer::Customer;
pub use error::{Error, Result};
pub use menu::Menu;
pub use order::{Order, ServiceMethod};
pub use payment::CreditCard;
pub use store::Store;
