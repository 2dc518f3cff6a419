// API client module: a small blocking HTTP client for the ordering API.
// Every call is synchronous and fails fast; there is no retry policy here.

use std::str::FromStr;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, REFERER};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::urls::Urls;
use crate::xml;

/// Referer the order endpoints expect on POSTs.
const ORDER_REFERER: &str = "https://order.dominos.com/en/pages/order/";

/// Response formats a GET endpoint may be asked to return.
///
/// XML bodies are converted to the same [`Value`] shape JSON callers get.
/// Any other name is an error rather than a silent fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFormat {
    Json,
    Xml,
}

impl FromStr for DataFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "xml" => Ok(Self::Xml),
            other => Err(Error::MalformedInput(format!(
                "unsupported data format '{other}', expected 'json' or 'xml'"
            ))),
        }
    }
}

/// Blocking API client: holds a reqwest client and the resolved endpoint URLs.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    urls: Urls,
}

impl ApiClient {
    /// Create a client against the given endpoints with reqwest defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(urls: Urls) -> Result<Self> {
        let client = Client::builder().build()?;
        Ok(Self { client, urls })
    }

    /// Create a client from loaded configuration (base URL and timeout).
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            urls: config.urls(),
        })
    }

    #[must_use]
    pub fn urls(&self) -> &Urls {
        &self.urls
    }

    /// GET a JSON document. Non-2xx responses become [`Error::Transport`].
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, non-2xx status, or an
    /// undecodable body.
    #[instrument(skip(self, query))]
    pub fn get_json(&self, url: &str, query: &[(&str, &str)]) -> Result<Value> {
        let res = self.client.get(url).query(query).send()?;
        let status = res.status();
        if !status.is_success() {
            let txt = res.text().unwrap_or_default();
            return Err(Error::Transport(format!("GET {url} failed: {status} - {txt}")));
        }
        let body: Value = res.json()?;
        debug!(%status, "GET completed");
        Ok(body)
    }

    /// GET an XML document and convert it with [`xml::to_json`].
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, non-2xx status, or a body that
    /// is not well-formed XML.
    #[instrument(skip(self, query))]
    pub fn get_xml(&self, url: &str, query: &[(&str, &str)]) -> Result<Value> {
        let res = self.client.get(url).query(query).send()?;
        let status = res.status();
        if !status.is_success() {
            let txt = res.text().unwrap_or_default();
            return Err(Error::Transport(format!("GET {url} failed: {status} - {txt}")));
        }
        let body = res.text()?;
        debug!(%status, bytes = body.len(), "GET completed");
        xml::to_json(&body)
    }

    /// GET an endpoint, decoding the body as the requested format.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedInput`] for an unsupported format, otherwise
    /// whatever [`ApiClient::get_json`] or [`ApiClient::get_xml`] returns.
    pub fn request_data(&self, url: &str, format: &str, query: &[(&str, &str)]) -> Result<Value> {
        match format.parse::<DataFormat>()? {
            DataFormat::Json => self.get_json(url, query),
            DataFormat::Xml => self.get_xml(url, query),
        }
    }

    /// POST a JSON body to an order endpoint and decode the JSON reply.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, non-2xx status, or an
    /// undecodable body.
    #[instrument(skip(self, body))]
    pub fn post_json<B: Serialize + ?Sized>(&self, url: &str, body: &B) -> Result<Value> {
        let res = self
            .client
            .post(url)
            .headers(order_headers())
            .json(body)
            .send()?;
        let status = res.status();
        if !status.is_success() {
            let txt = res.text().unwrap_or_default();
            return Err(Error::Transport(format!("POST {url} failed: {status} - {txt}")));
        }
        let reply: Value = res.json()?;
        debug!(%status, "POST completed");
        Ok(reply)
    }
}

fn order_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(REFERER, HeaderValue::from_static(ORDER_REFERER));
    headers
}
