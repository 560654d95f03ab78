//! HTTP resolver for the shop's listing pages and order-tracking form
//!
//! Stock state is read straight off the listing markup: the shop renders
//! a sold-out marker on dead listings and the add-to-cart button on live
//! ones. The display name lives on a partial detail page referenced from
//! the listing. Order status comes back from a form post as the third
//! cell of the tracking panel.

use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tracing::debug;

use crate::error::ResolveResult;
use crate::{EntityResolver, ProductSnapshot, StockStatus};

const OUT_OF_STOCK_MARKER: &str = ">Tükendi<";
const IN_STOCK_MARKER: &str = ">Sepete Ekle<";

const DEFAULT_SHOP_BASE: &str = "https://www.vatanbilgisayar.com";
const ORDER_TRACKING_PATH: &str = "/siparistakip";
const BROWSER_USER_AGENT: &str = "Mozilla/5.0";
const REQUEST_TIMEOUT_SECS: u64 = 30;

const NAME_FALLBACK: &str = "Name not found";
const STATUS_FALLBACK: &str = "Unknown";

/// Resolver that scrapes entity state over HTTP.
pub struct HttpResolver {
    client: reqwest::Client,
    shop_base: String,
    detail_url_re: Regex,
    product_name_re: Regex,
    panel_cell_re: Regex,
}

impl HttpResolver {
    /// Build a resolver against the production shop.
    pub fn new() -> ResolveResult<Self> {
        Self::with_base(DEFAULT_SHOP_BASE)
    }

    /// Build a resolver against an alternate shop base URL.
    ///
    /// The base is used to resolve relative detail-page links and as the
    /// host of the order-tracking endpoint.
    pub fn with_base(shop_base: impl Into<String>) -> ResolveResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            shop_base: shop_base.into(),
            detail_url_re: Regex::new(r#"id="detailPartialPage"\s+data-url="(.*?)""#).unwrap(),
            product_name_re: Regex::new(
                r#"(?is)<h1[^>]*class="product-list__product-name"[^>]*>\s*(.*?)\s*</h1>"#,
            )
            .unwrap(),
            panel_cell_re: Regex::new(r#"<span class="panel__cell">(.*?)</span>"#).unwrap(),
        })
    }

    async fn fetch_text(&self, url: &str) -> ResolveResult<String> {
        debug!(url = %url, "Fetching page");
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }

    /// Detail-page URL referenced from the listing, absolutized against
    /// the shop base when the markup carries a relative link.
    fn detail_url(&self, listing: &str) -> Option<String> {
        let raw = self.detail_url_re.captures(listing)?.get(1)?.as_str();
        if raw.starts_with("http") {
            Some(raw.to_string())
        } else {
            Some(format!("{}{raw}", self.shop_base))
        }
    }

    fn extract_name(&self, html: &str) -> String {
        self.product_name_re
            .captures(html)
            .and_then(|caps| caps.get(1))
            .map_or_else(|| NAME_FALLBACK.to_string(), |m| m.as_str().trim().to_string())
    }

    /// Order status is the third cell of the tracking panel.
    fn extract_order_status(&self, html: &str) -> String {
        self.panel_cell_re
            .captures_iter(html)
            .nth(2)
            .and_then(|caps| caps.get(1))
            .map_or_else(
                || STATUS_FALLBACK.to_string(),
                |m| decode_entities(m.as_str().trim()),
            )
    }
}

#[async_trait]
impl EntityResolver for HttpResolver {
    async fn resolve_product(&self, url: &str) -> ResolveResult<ProductSnapshot> {
        let listing = self.fetch_text(url).await?;
        let stock = parse_stock(&listing);

        // The name lives on the detail partial page when the listing
        // references one, otherwise on the listing itself.
        let name = match self.detail_url(&listing) {
            Some(detail_url) => {
                let detail = self.fetch_text(&detail_url).await?;
                self.extract_name(&detail)
            }
            None => self.extract_name(&listing),
        };

        debug!(url = %url, name = %name, stock = %stock, "Resolved product");
        Ok(ProductSnapshot { name, stock })
    }

    async fn resolve_order(
        &self,
        tracking_number: &str,
        contact_email: &str,
    ) -> ResolveResult<String> {
        let url = format!("{}{ORDER_TRACKING_PATH}", self.shop_base);
        let response = self
            .client
            .post(&url)
            .form(&[
                ("Item1.SipNo", tracking_number),
                ("Item1.Email", contact_email),
            ])
            .send()
            .await?
            .error_for_status()?;
        let html = response.text().await?;

        let status = self.extract_order_status(&html);
        debug!(tracking_number = %tracking_number, status = %status, "Resolved order");
        Ok(status)
    }
}

fn parse_stock(listing: &str) -> StockStatus {
    if listing.contains(OUT_OF_STOCK_MARKER) {
        StockStatus::OutOfStock
    } else if listing.contains(IN_STOCK_MARKER) {
        StockStatus::InStock
    } else {
        StockStatus::Unknown
    }
}

/// The tracking panel escapes the dotless-i and s-cedilla the shop's
/// status strings use.
fn decode_entities(text: &str) -> String {
    text.replace("&#x15F;", "ş").replace("&#x131;", "ı")
}
