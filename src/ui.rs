// UI layer: terminal flows built on `dialoguer` prompts and `indicatif`
// spinners. Each flow is synchronous; library errors inside the ordering
// loop are printed and the user is asked again, anything else ends the run.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use dialoguer::{Confirm, Input, Password, Select};
use indicatif::{ProgressBar, ProgressStyle};

use crate::address::Address;
use crate::api::ApiClient;
use crate::config::Config;
use crate::customer::Customer;
use crate::menu::Menu;
use crate::order::{Order, ServiceMethod};
use crate::payment::CreditCard;

/// Print the open stores near `address`, closest first.
pub fn list_stores(api: &ApiClient, address: &str, carryout: bool) -> Result<()> {
    let address: Address = address.parse().context("Could not read address")?;
    let service = if carryout {
        ServiceMethod::Carryout
    } else {
        ServiceMethod::Delivery
    };

    let pb = spinner("Looking for stores...")?;
    let stores = address.nearby_stores(api, service.clone());
    pb.finish_and_clear();

    let stores = stores.context("Store lookup failed")?;
    if stores.is_empty() {
        println!("No local stores are currently open for {service}.");
    }
    for store in stores {
        println!("{store}\n");
    }
    Ok(())
}

/// Print the menu tree of the closest store, or only the variants matching `search`.
pub fn show_menu(api: &ApiClient, config: &Config, address: &str, search: Option<&str>) -> Result<()> {
    let address = address
        .parse::<Address>()
        .context("Could not read address")?
        .with_country(config.country);

    let pb = spinner("Loading menu...")?;
    let menu = address
        .closest_store(api, ServiceMethod::Carryout)
        .and_then(|store| Menu::from_store(api, &store.id, &config.lang));
    pb.finish_and_clear();

    let mut menu = menu.context("Could not load the menu")?;
    let mut stdout = io::stdout().lock();
    match search {
        Some(term) => {
            let matches = menu.search(term, &mut stdout)?;
            if matches.is_empty() {
                println!("Nothing on the menu matches '{term}'.");
            }
        }
        None => menu.display(&mut stdout)?,
    }
    Ok(())
}

/// Prompt for customer details and save them under the customer directory.
pub fn save_customer(config: &Config, name: &str) -> Result<()> {
    let customer = prompt_customer()?;
    let path = customer.save(customer_file(config, Path::new(name)))?;
    println!("Saved to {}", path.display());
    Ok(())
}

/// Print a saved customer.
pub fn show_customer(config: &Config, name: &Path) -> Result<()> {
    let path = customer_file(config, name);
    let customer = Customer::load(&path).with_context(|| format!("Reading {}", path.display()))?;
    println!("{customer}");
    Ok(())
}

/// Full interactive ordering session: customer, store, items, payment, place.
pub fn order_flow(api: &ApiClient, config: &Config) -> Result<()> {
    let customer = choose_customer(config)?;
    let Some(address) = customer.address.clone() else {
        anyhow::bail!("Customer {} has no address", customer.first_name);
    };
    let address = address.with_country(config.country);

    let methods = [ServiceMethod::Delivery, ServiceMethod::Carryout];
    let service = methods[Select::new()
        .with_prompt("Delivery or carryout?")
        .items(&methods)
        .default(0)
        .interact()?]
    .clone();

    let pb = spinner("Finding the closest store...")?;
    let store = address.closest_store(api, service.clone());
    pb.finish_and_clear();
    let store = store.context("Store lookup failed")?;
    println!("Ordering from:\n{store}\n");

    let pb = spinner("Loading menu...")?;
    let order = Order::new(api, store, customer, &config.lang);
    pb.finish_and_clear();
    let mut order = order.context("Could not start the order")?;
    if service == ServiceMethod::Carryout {
        order.change_to_carryout();
    }

    add_items(&mut order)?;
    if order.document().products.is_empty() {
        println!("Nothing ordered.");
        return Ok(());
    }

    println!("\n{order}:");
    for line in &order.document().products {
        let name = line.attributes.get("Name").and_then(|v| v.as_str()).unwrap_or("");
        println!("  {} x {} [{}]", line.qty, name, line.code);
    }

    let card = choose_payment()?;
    if !Confirm::new().with_prompt("Place this order?").interact()? {
        println!("Order cancelled.");
        return Ok(());
    }

    let pb = spinner("Placing order...")?;
    let reply = order.place(card.as_ref());
    pb.finish_and_clear();
    let reply = reply.context("Placing the order failed")?;

    let placed_id = reply
        .get("Order")
        .and_then(|o| o.get("OrderID"))
        .and_then(|v| v.as_str())
        .unwrap_or("");
    println!("Order placed! {placed_id}");
    Ok(())
}

/// Search-and-add loop. An empty search term ends it.
fn add_items(order: &mut Order) -> Result<()> {
    loop {
        let term: String = Input::new()
            .with_prompt("Search the menu (empty to finish)")
            .allow_empty(true)
            .interact_text()?;
        if term.trim().is_empty() {
            return Ok(());
        }

        let matches = order.menu_mut().search(term.trim(), &mut io::stdout().lock())?;
        if matches.is_empty() {
            println!("No matches.");
            continue;
        }

        let code: String = Input::new()
            .with_prompt("Code to add (empty to search again)")
            .allow_empty(true)
            .interact_text()?;
        if code.trim().is_empty() {
            continue;
        }
        let qty: u32 = Input::new().with_prompt("Quantity").default(1).interact_text()?;

        match order.add_item(code.trim(), qty, &[]) {
            Ok(line) => println!("Added {} x {}", line.qty, line.code),
            Err(e) => println!("Could not add item: {e}"),
        }
    }
}

fn choose_payment() -> Result<Option<CreditCard>> {
    let options = ["Cash", "Credit card"];
    if Select::new()
        .with_prompt("Payment")
        .items(&options)
        .default(0)
        .interact()?
        == 0
    {
        return Ok(None);
    }

    loop {
        let number: String = Password::new().with_prompt("Card number").interact()?;
        let expiration: String = Input::new().with_prompt("Expiration (MM/YY)").interact_text()?;
        let cvv: String = Password::new().with_prompt("CVV").interact()?;
        let zip: String = Input::new().with_prompt("Billing postal code").interact_text()?;
        let card = CreditCard::new(&number, &expiration, &cvv, &zip);
        if card.is_valid() {
            return Ok(Some(card));
        }
        println!("That card does not look right, please try again.");
    }
}

/// Pick a saved customer or enter a new one (optionally saving it).
fn choose_customer(config: &Config) -> Result<Customer> {
    let saved = saved_customers(&config.customer_dir);
    let mut items: Vec<String> = saved
        .iter()
        .filter_map(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
        .collect();
    items.push("New customer".to_string());

    let selection = Select::new()
        .with_prompt("Who is ordering?")
        .items(&items)
        .default(0)
        .interact()?;
    if let Some(path) = saved.get(selection) {
        return Customer::load(path).with_context(|| format!("Reading {}", path.display()));
    }

    let customer = prompt_customer()?;
    if Confirm::new().with_prompt("Save this customer?").interact()? {
        let name: String = Input::new()
            .with_prompt("File name")
            .default(format!("{}.json", customer.first_name.to_lowercase()))
            .interact_text()?;
        let path = customer.save(customer_file(config, Path::new(&name)))?;
        println!("Saved to {}", path.display());
    }
    Ok(customer)
}

fn prompt_customer() -> Result<Customer> {
    let first: String = Input::new().with_prompt("First name").interact_text()?;
    let last: String = Input::new().with_prompt("Last name").interact_text()?;
    let email: String = Input::new().with_prompt("Email").interact_text()?;
    let phone: String = Input::new().with_prompt("Phone").interact_text()?;
    let address = loop {
        let raw: String = Input::new()
            .with_prompt("Address (street, city, region, zip)")
            .interact_text()?;
        match raw.parse::<Address>() {
            Ok(address) => break address,
            Err(e) => println!("{e}"),
        }
    };
    Ok(Customer::new(&first, &last, &email, &phone, Some(address)))
}

fn saved_customers(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();
    paths
}

/// Absolute paths are used as given; anything else lives in the customer directory.
fn customer_file(config: &Config, name: &Path) -> PathBuf {
    if name.is_absolute() {
        name.to_path_buf()
    } else {
        config.customer_dir.join(name)
    }
}

fn spinner(msg: &'static str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::with_template("{spinner} {msg}")?);
    pb.set_message(msg);
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}
