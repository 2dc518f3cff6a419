//! Customer contact details and their flat-file form.
//!
//! Saved customers are small JSON objects with the keys `first_name`,
//! `last_name`, `email`, `phone` and `address`. The address is stored as one
//! comma-joined string, not as an object, so existing files keep loading.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::address::Address;
use crate::error::Result;

/// Directory that relative customer file names are resolved under.
pub const CUSTOMER_DIR: &str = "customers";

/// The person the order is for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Customer {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub address: Option<Address>,
}

/// On-disk shape. Field names are fixed by files already in the wild.
#[derive(Serialize, Deserialize)]
struct CustomerFile {
    first_name: String,
    last_name: String,
    email: String,
    phone: String,
    address: Option<String>,
}

impl Customer {
    pub fn new(
        first_name: &str,
        last_name: &str,
        email: &str,
        phone: &str,
        address: Option<Address>,
    ) -> Self {
        Self {
            first_name: first_name.trim().to_string(),
            last_name: last_name.trim().to_string(),
            email: email.trim().to_string(),
            phone: phone.trim().to_string(),
            address,
        }
    }

    /// Write the customer as JSON.
    ///
    /// A relative path that does not already start with `customers` is placed
    /// under that directory. Parent directories are created as needed.
    /// Returns the path actually written.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let path = resolve_path(path.as_ref());
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = CustomerFile {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            address: self.address.as_ref().map(ToString::to_string),
        };
        fs::write(&path, serde_json::to_string(&file)?)?;
        debug!(path = %path.display(), "customer saved");
        Ok(path)
    }

    /// Load a customer previously written by [`Customer::save`].
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not a customer JSON
    /// object, or holds an unparseable address.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path.as_ref())?;
        let file: CustomerFile = serde_json::from_str(&raw)?;
        let address = match file.address.as_deref() {
            Some(s) if !s.trim().is_empty() => Some(s.parse::<Address>()?),
            _ => None,
        };
        Ok(Self::new(
            &file.first_name,
            &file.last_name,
            &file.email,
            &file.phone,
            address,
        ))
    }
}

fn resolve_path(path: &Path) -> PathBuf {
    if path.is_relative() && !path.starts_with(CUSTOMER_DIR) {
        Path::new(CUSTOMER_DIR).join(path)
    } else {
        path.to_path_buf()
    }
}

impl fmt::Display for Customer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Name: {} {}", self.first_name, self.last_name)?;
        writeln!(f, "Email: {}", self.email)?;
        writeln!(f, "Phone: {}", self.phone)?;
        match &self.address {
            Some(address) => write!(f, "Address: {address}"),
            None => write!(f, "Address: None"),
        }
    }
}
