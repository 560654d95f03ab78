//! Watched entity types.

use std::fmt;

use resolver::StockStatus;

/// Registry-assigned handle for a watched entity.
///
/// Ids are process-local and never persisted. State commits address
/// entries by id, so they stay correct when registrations or removals
/// race a check pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId(u64);

impl WatchId {
    pub(crate) const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for WatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A product listing under watch.
#[derive(Debug, Clone)]
pub struct WatchedProduct {
    pub id: WatchId,
    /// Opaque listing locator; identifies the product for resolution.
    pub url: String,
    /// Display name, resolved at registration. Empty after a reload
    /// until the first check fills it back in.
    pub name: String,
    /// `None` until the first successful check of this process lifetime.
    pub stock: Option<StockStatus>,
    /// Resolution-failure streak, runtime only.
    pub consecutive_failures: u32,
}

impl WatchedProduct {
    /// Rendered stock state, `Unknown` before the first check.
    #[must_use]
    pub fn stock_label(&self) -> String {
        self.stock
            .map_or_else(|| StockStatus::Unknown.to_string(), |s| s.to_string())
    }
}

/// A shipment order under watch.
#[derive(Debug, Clone)]
pub struct WatchedOrder {
    pub id: WatchId,
    pub tracking_number: String,
    pub contact_email: String,
    /// `None` until the first successful check of this process lifetime.
    /// Registration resolves it eagerly; a reload leaves it unset.
    pub status: Option<String>,
    /// Resolution-failure streak, runtime only.
    pub consecutive_failures: u32,
}

impl WatchedOrder {
    /// Rendered status, empty before the first check.
    #[must_use]
    pub fn status_label(&self) -> &str {
        self.status.as_deref().unwrap_or("")
    }
}
