//! Remote state resolution for watched entities
//!
//! Defines the resolver seam the monitoring engine checks entities
//! through, plus the HTTP implementation that scrapes the shop's listing
//! pages and order-tracking form. The engine only ever talks to the
//! [`EntityResolver`] trait, so tests can swap in scripted resolvers.

pub mod error;
pub mod http;

pub use error::{ResolveError, ResolveResult};
pub use http::HttpResolver;

use std::fmt;

use async_trait::async_trait;

/// Stock state of a product listing as reported by a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockStatus {
    /// Page fetched but neither stock marker was present.
    Unknown,
    InStock,
    OutOfStock,
}

impl fmt::Display for StockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "Unknown"),
            Self::InStock => write!(f, "In stock"),
            Self::OutOfStock => write!(f, "Out of stock"),
        }
    }
}

/// Display name and stock state fetched in a single product resolution.
#[derive(Debug, Clone)]
pub struct ProductSnapshot {
    pub name: String,
    pub stock: StockStatus,
}

/// Fetches the current remote state of watched entities.
///
/// Implementations must be safe to share across the scheduler task and
/// the interactive command surface.
#[async_trait]
pub trait EntityResolver: Send + Sync {
    /// Resolve a product listing to its display name and stock state.
    async fn resolve_product(&self, url: &str) -> ResolveResult<ProductSnapshot>;

    /// Resolve an order to its current free-text status.
    async fn resolve_order(
        &self,
        tracking_number: &str,
        contact_email: &str,
    ) -> ResolveResult<String>;
}
