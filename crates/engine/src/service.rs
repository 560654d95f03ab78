//! Registration, removal, and persistence of the watch set.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{error, info};

use resolver::EntityResolver;

use crate::entities::{WatchedOrder, WatchedProduct};
use crate::errors::EngineResult;
use crate::registry::WatchRegistry;
use crate::store::{OrderKey, WatchFile, WatchStore};

/// Front door for mutating the watch set.
///
/// Registration resolves the entity first, so a watch that cannot be
/// resolved right now is rejected and the caller sees why. Successful
/// mutations are written through to the durable file.
pub struct WatchService {
    registry: Arc<WatchRegistry>,
    store: WatchStore,
    resolver: Arc<dyn EntityResolver>,
    save_lock: Mutex<()>,
}

impl WatchService {
    #[must_use]
    pub fn new(
        registry: Arc<WatchRegistry>,
        store: WatchStore,
        resolver: Arc<dyn EntityResolver>,
    ) -> Self {
        Self {
            registry,
            store,
            resolver,
            save_lock: Mutex::new(()),
        }
    }

    /// Add a product watch, fetching its display name up front.
    ///
    /// The stock state stays unresolved until the first check pass, so
    /// registration alone never triggers a notification.
    ///
    /// # Errors
    ///
    /// Returns the resolution error when the listing cannot be fetched
    /// or parsed; nothing is added in that case.
    pub async fn register_product(&self, url: &str) -> EngineResult<WatchedProduct> {
        let snapshot = self.resolver.resolve_product(url).await?;
        let product = self.registry.insert_product(url, snapshot.name).await;
        info!(url = %product.url, name = %product.name, "Product watch added");
        self.save_watches().await;
        Ok(product)
    }

    /// Add an order watch, recording the current status as baseline.
    ///
    /// # Errors
    ///
    /// Returns the resolution error when the tracking lookup fails;
    /// nothing is added in that case.
    pub async fn register_order(
        &self,
        tracking_number: &str,
        contact_email: &str,
    ) -> EngineResult<WatchedOrder> {
        let status = self
            .resolver
            .resolve_order(tracking_number, contact_email)
            .await?;
        let order = self
            .registry
            .insert_order(tracking_number, contact_email, Some(status))
            .await;
        info!(
            tracking_number = %order.tracking_number,
            status = %order.status_label(),
            "Order watch added"
        );
        self.save_watches().await;
        Ok(order)
    }

    /// Remove every watch matching `key` (a product URL or an order
    /// tracking number) and persist when anything was dropped.
    pub async fn unwatch(&self, key: &str) -> usize {
        let removed = self.registry.remove(key).await;
        if removed > 0 {
            info!(key = %key, removed, "Watch removed");
            self.save_watches().await;
        }
        removed
    }

    /// Rebuild the in-memory watch set from the durable file.
    ///
    /// Reloaded entries carry identifiers only; names and states stay
    /// unresolved until the first check pass fills them in.
    ///
    /// # Errors
    ///
    /// Returns a store error when the file exists but cannot be read
    /// or parsed. A missing file is an empty watch set, not an error.
    pub async fn load(&self) -> EngineResult<(usize, usize)> {
        let watches = self.store.load().await?;
        let counts = (watches.products.len(), watches.orders.len());

        for url in watches.products {
            self.registry.insert_product(url, "").await;
        }
        for OrderKey {
            tracking_number,
            contact_email,
        } in watches.orders
        {
            self.registry
                .insert_order(tracking_number, contact_email, None)
                .await;
        }

        info!(products = counts.0, orders = counts.1, "Watch list loaded");
        Ok(counts)
    }

    /// Persist the current watch identifiers.
    ///
    /// Failures are logged and swallowed; a broken disk must not take
    /// down the in-memory watch set.
    async fn save_watches(&self) {
        let _guard = self.save_lock.lock().await;

        let products = self.registry.products().await;
        let orders = self.registry.orders().await;
        let watches = WatchFile {
            products: products.into_iter().map(|p| p.url).collect(),
            orders: orders
                .into_iter()
                .map(|o| OrderKey {
                    tracking_number: o.tracking_number,
                    contact_email: o.contact_email,
                })
                .collect(),
        };

        if let Err(e) = self.store.save(&watches).await {
            error!(error = %e, "Failed to persist watch list");
        }
    }
}
