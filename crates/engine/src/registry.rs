//! Concurrency-safe watch collections.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::RwLock;

use resolver::ProductSnapshot;

use crate::entities::{WatchId, WatchedOrder, WatchedProduct};

/// Shared collections of watched entities.
///
/// Registrations from the command surface may race a check pass. Every
/// entry is fully formed before it is pushed, iteration works on cloned
/// snapshots, and state commits address entries by id, so a racing
/// append or removal never corrupts an entry. An in-flight pass may or
/// may not see entries added after it started.
#[derive(Default)]
pub struct WatchRegistry {
    products: RwLock<Vec<WatchedProduct>>,
    orders: RwLock<Vec<WatchedOrder>>,
    next_id: AtomicU64,
}

impl WatchRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> WatchId {
        WatchId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Append a product watch. Duplicate URLs are tolerated; each entry
    /// keeps its own state.
    pub async fn insert_product(
        &self,
        url: impl Into<String>,
        name: impl Into<String>,
    ) -> WatchedProduct {
        let product = WatchedProduct {
            id: self.next_id(),
            url: url.into(),
            name: name.into(),
            stock: None,
            consecutive_failures: 0,
        };
        self.products.write().await.push(product.clone());
        product
    }

    /// Append an order watch with its registration-time status, or
    /// `None` when reloading from the durable file.
    pub async fn insert_order(
        &self,
        tracking_number: impl Into<String>,
        contact_email: impl Into<String>,
        status: Option<String>,
    ) -> WatchedOrder {
        let order = WatchedOrder {
            id: self.next_id(),
            tracking_number: tracking_number.into(),
            contact_email: contact_email.into(),
            status,
            consecutive_failures: 0,
        };
        self.orders.write().await.push(order.clone());
        order
    }

    /// Remove every watch whose identifier matches `key` (product URL
    /// or order tracking number). Returns how many entries were dropped.
    pub async fn remove(&self, key: &str) -> usize {
        let mut removed = 0;
        {
            let mut products = self.products.write().await;
            let before = products.len();
            products.retain(|p| p.url != key);
            removed += before - products.len();
        }
        {
            let mut orders = self.orders.write().await;
            let before = orders.len();
            orders.retain(|o| o.tracking_number != key);
            removed += before - orders.len();
        }
        removed
    }

    /// Cloned snapshot of the product watches.
    pub async fn products(&self) -> Vec<WatchedProduct> {
        self.products.read().await.clone()
    }

    /// Cloned snapshot of the order watches.
    pub async fn orders(&self) -> Vec<WatchedOrder> {
        self.orders.read().await.clone()
    }

    /// Product and order counts.
    pub async fn counts(&self) -> (usize, usize) {
        (
            self.products.read().await.len(),
            self.orders.read().await.len(),
        )
    }

    /// Record a successful product check: set the stock state, clear the
    /// failure streak, and fill in the display name if a reload left it
    /// empty. Returns false when the entry is gone, in which case the
    /// result is dropped.
    pub async fn commit_product_check(&self, id: WatchId, snapshot: &ProductSnapshot) -> bool {
        let mut products = self.products.write().await;
        let Some(product) = products.iter_mut().find(|p| p.id == id) else {
            return false;
        };
        product.stock = Some(snapshot.stock);
        product.consecutive_failures = 0;
        if product.name.is_empty() {
            product.name = snapshot.name.clone();
        }
        true
    }

    /// Record a successful order check. Returns false when the entry is
    /// gone.
    pub async fn commit_order_check(&self, id: WatchId, status: &str) -> bool {
        let mut orders = self.orders.write().await;
        let Some(order) = orders.iter_mut().find(|o| o.id == id) else {
            return false;
        };
        order.status = Some(status.to_string());
        order.consecutive_failures = 0;
        true
    }

    /// Record a failed product check; returns the new streak length, or
    /// 0 when the entry is gone.
    pub async fn record_product_failure(&self, id: WatchId) -> u32 {
        let mut products = self.products.write().await;
        match products.iter_mut().find(|p| p.id == id) {
            Some(product) => {
                product.consecutive_failures += 1;
                product.consecutive_failures
            }
            None => 0,
        }
    }

    /// Record a failed order check; returns the new streak length, or 0
    /// when the entry is gone.
    pub async fn record_order_failure(&self, id: WatchId) -> u32 {
        let mut orders = self.orders.write().await;
        match orders.iter_mut().find(|o| o.id == id) {
            Some(order) => {
                order.consecutive_failures += 1;
                order.consecutive_failures
            }
            None => 0,
        }
    }
}
