//! Periodic re-check of every watched entity.
//!
//! A pass walks a snapshot of the registry, resolves each entity's
//! current state and commits it back. A notification goes out only
//! when an already-established state changed, so the first check of a
//! lifetime (and the first check after a restart) records a baseline
//! silently. Passes never overlap; a cancelled pass stops at the next
//! entity boundary.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use notify::{Notifier, NotifyEvent};
use resolver::{EntityResolver, StockStatus};

use crate::config::EngineConfig;
use crate::entities::{WatchedOrder, WatchedProduct};
use crate::registry::WatchRegistry;

/// Counters for a single check pass.
#[derive(Debug, Clone)]
pub struct PassSummary {
    pub started_at: DateTime<Utc>,
    pub products_checked: usize,
    pub orders_checked: usize,
    pub notifications: usize,
    pub failures: usize,
    pub skipped: usize,
}

impl PassSummary {
    fn new() -> Self {
        Self {
            started_at: Utc::now(),
            products_checked: 0,
            orders_checked: 0,
            notifications: 0,
            failures: 0,
            skipped: 0,
        }
    }
}

impl fmt::Display for PassSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} products and {} orders checked, {} notifications, {} failures",
            self.products_checked, self.orders_checked, self.notifications, self.failures
        )?;
        if self.skipped > 0 {
            write!(f, ", {} cooling down", self.skipped)?;
        }
        Ok(())
    }
}

/// Runs check passes over the watch registry.
pub struct WatchMonitor {
    registry: Arc<WatchRegistry>,
    resolver: Arc<dyn EntityResolver>,
    notifier: Arc<Notifier>,
    failure_threshold: u32,
    failure_cooldown_passes: u64,
    pass_seq: AtomicU64,
    pass_lock: Mutex<()>,
}

impl WatchMonitor {
    #[must_use]
    pub fn new(
        registry: Arc<WatchRegistry>,
        resolver: Arc<dyn EntityResolver>,
        notifier: Arc<Notifier>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            registry,
            resolver,
            notifier,
            // Zero would cool everything down from the start or divide
            // by zero in the pass-skip check.
            failure_threshold: config.failure_threshold.max(1),
            failure_cooldown_passes: config.failure_cooldown_passes.max(1),
            pass_seq: AtomicU64::new(0),
            pass_lock: Mutex::new(()),
        }
    }

    /// Checks every watched entity once and returns the counters.
    ///
    /// Holds the pass lock for the duration, so a scheduled pass and an
    /// on-demand one can never interleave. Cancellation is observed
    /// between entities: the entity being checked always completes.
    pub async fn run_pass(&self, cancel: &CancellationToken) -> PassSummary {
        let _guard = self.pass_lock.lock().await;
        let pass_seq = self.pass_seq.fetch_add(1, Ordering::Relaxed);
        let mut summary = PassSummary::new();

        debug!(pass = pass_seq, "Status check started");

        for product in self.registry.products().await {
            if cancel.is_cancelled() {
                info!(pass = pass_seq, "Check pass cancelled");
                return summary;
            }
            self.check_product(&product, pass_seq, &mut summary).await;
        }

        for order in self.registry.orders().await {
            if cancel.is_cancelled() {
                info!(pass = pass_seq, "Check pass cancelled");
                return summary;
            }
            self.check_order(&order, pass_seq, &mut summary).await;
        }

        info!(
            pass = pass_seq,
            products = summary.products_checked,
            orders = summary.orders_checked,
            notifications = summary.notifications,
            failures = summary.failures,
            "Status check complete"
        );
        summary
    }

    async fn check_product(
        &self,
        product: &WatchedProduct,
        pass_seq: u64,
        summary: &mut PassSummary,
    ) {
        if self.in_cooldown(product.consecutive_failures, pass_seq) {
            debug!(
                url = %product.url,
                failures = product.consecutive_failures,
                "Product cooling down, skipped"
            );
            summary.skipped += 1;
            return;
        }

        let snapshot = match self.resolver.resolve_product(&product.url).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                summary.failures += 1;
                let streak = self.registry.record_product_failure(product.id).await;
                warn!(url = %product.url, error = %e, failures = streak, "Product check failed");
                if streak == self.failure_threshold {
                    warn!(url = %product.url, "Cooling down after repeated failures");
                }
                return;
            }
        };

        if !self.registry.commit_product_check(product.id, &snapshot).await {
            debug!(url = %product.url, "Watch removed mid-pass, result dropped");
            return;
        }
        summary.products_checked += 1;

        let name = if product.name.is_empty() {
            &snapshot.name
        } else {
            &product.name
        };
        info!(name = %name, stock = %snapshot.stock, "Product checked");

        // Only an established state flipping to in stock fires; the
        // first resolution of a lifetime records a baseline silently.
        let Some(previous) = product.stock else { return };
        if previous != snapshot.stock && snapshot.stock == StockStatus::InStock {
            info!(name = %name, "Product back in stock, notifying");
            self.notifier.notify(NotifyEvent::ProductRestocked {
                name: name.clone(),
                url: product.url.clone(),
            });
            summary.notifications += 1;
        }
    }

    async fn check_order(&self, order: &WatchedOrder, pass_seq: u64, summary: &mut PassSummary) {
        if self.in_cooldown(order.consecutive_failures, pass_seq) {
            debug!(
                tracking_number = %order.tracking_number,
                failures = order.consecutive_failures,
                "Order cooling down, skipped"
            );
            summary.skipped += 1;
            return;
        }

        let status = match self
            .resolver
            .resolve_order(&order.tracking_number, &order.contact_email)
            .await
        {
            Ok(status) => status,
            Err(e) => {
                summary.failures += 1;
                let streak = self.registry.record_order_failure(order.id).await;
                warn!(
                    tracking_number = %order.tracking_number,
                    error = %e,
                    failures = streak,
                    "Order check failed"
                );
                if streak == self.failure_threshold {
                    warn!(
                        tracking_number = %order.tracking_number,
                        "Cooling down after repeated failures"
                    );
                }
                return;
            }
        };

        if !self.registry.commit_order_check(order.id, &status).await {
            debug!(
                tracking_number = %order.tracking_number,
                "Watch removed mid-pass, result dropped"
            );
            return;
        }
        summary.orders_checked += 1;
        info!(tracking_number = %order.tracking_number, status = %status, "Order checked");

        // Any change of an established status fires.
        let Some(previous) = &order.status else { return };
        if *previous != status {
            info!(tracking_number = %order.tracking_number, "Order status changed, notifying");
            self.notifier.notify(NotifyEvent::OrderStatusChanged {
                tracking_number: order.tracking_number.clone(),
                status: status.clone(),
            });
            summary.notifications += 1;
        }
    }

    fn in_cooldown(&self, failures: u32, pass_seq: u64) -> bool {
        failures >= self.failure_threshold && pass_seq % self.failure_cooldown_passes != 0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;

    use async_trait::async_trait;

    use notify::NotifyChannel;
    use resolver::{ProductSnapshot, ResolveResult};

    use super::*;
    use crate::testutil::{
        recording_notifier, settle, snapshot, FailingChannel, RecordingChannel, ScriptedResolver,
    };

    struct Harness {
        registry: Arc<WatchRegistry>,
        resolver: Arc<ScriptedResolver>,
        channel: Arc<RecordingChannel>,
        monitor: WatchMonitor,
        cancel: CancellationToken,
    }

    fn harness() -> Harness {
        harness_with(EngineConfig::default())
    }

    fn harness_with(config: EngineConfig) -> Harness {
        let registry = Arc::new(WatchRegistry::new());
        let resolver = Arc::new(ScriptedResolver::default());
        let (channel, notifier) = recording_notifier();
        let monitor = WatchMonitor::new(
            Arc::clone(&registry),
            Arc::clone(&resolver) as Arc<dyn EntityResolver>,
            notifier,
            &config,
        );
        Harness {
            registry,
            resolver,
            channel,
            monitor,
            cancel: CancellationToken::new(),
        }
    }

    async fn pass(h: &Harness) -> PassSummary {
        let summary = h.monitor.run_pass(&h.cancel).await;
        settle().await;
        summary
    }

    #[tokio::test]
    async fn test_first_check_is_silent_baseline() {
        let h = harness();
        h.registry.insert_product("http://shop/a", "Widget").await;
        h.resolver
            .script_product("http://shop/a", vec![Ok(snapshot("Widget", StockStatus::InStock))]);

        let summary = pass(&h).await;

        assert_eq!(summary.products_checked, 1);
        assert_eq!(summary.notifications, 0);
        assert!(h.channel.messages().is_empty());
        let products = h.registry.products().await;
        assert_eq!(products[0].stock, Some(StockStatus::InStock));
    }

    #[tokio::test]
    async fn test_restock_notifies_exactly_once() {
        let h = harness();
        h.registry.insert_product("http://shop/a", "Widget").await;
        h.resolver.script_product(
            "http://shop/a",
            vec![
                Ok(snapshot("Widget", StockStatus::OutOfStock)),
                Ok(snapshot("Widget", StockStatus::InStock)),
                Ok(snapshot("Widget", StockStatus::InStock)),
            ],
        );

        let first = pass(&h).await;
        let second = pass(&h).await;
        let third = pass(&h).await;

        assert_eq!(first.notifications, 0);
        assert_eq!(second.notifications, 1);
        assert_eq!(third.notifications, 0);
        let messages = h.channel.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("Product now in stock: Widget"));
        assert!(messages[0].contains("http://shop/a"));
    }

    #[tokio::test]
    async fn test_going_out_of_stock_is_silent() {
        let h = harness();
        h.registry.insert_product("http://shop/a", "Widget").await;
        h.resolver.script_product(
            "http://shop/a",
            vec![
                Ok(snapshot("Widget", StockStatus::InStock)),
                Ok(snapshot("Widget", StockStatus::OutOfStock)),
                Ok(snapshot("Widget", StockStatus::Unknown)),
            ],
        );

        for _ in 0..3 {
            pass(&h).await;
        }

        assert!(h.channel.messages().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_to_in_stock_notifies() {
        let h = harness();
        h.registry.insert_product("http://shop/a", "Widget").await;
        h.resolver.script_product(
            "http://shop/a",
            vec![
                Ok(snapshot("Widget", StockStatus::Unknown)),
                Ok(snapshot("Widget", StockStatus::InStock)),
            ],
        );

        pass(&h).await;
        let second = pass(&h).await;

        assert_eq!(second.notifications, 1);
        assert_eq!(h.channel.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_order_status_change_notifies() {
        let h = harness();
        h.registry
            .insert_order("SIP123", "a@b.com", Some("Processing".to_string()))
            .await;
        h.resolver
            .script_order("SIP123", vec![Ok("Shipped".to_string())]);

        let summary = pass(&h).await;

        assert_eq!(summary.orders_checked, 1);
        assert_eq!(summary.notifications, 1);
        let messages = h.channel.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("SIP123"));
        assert!(messages[0].contains("Shipped"));
    }

    #[tokio::test]
    async fn test_order_same_status_is_silent() {
        let h = harness();
        h.registry
            .insert_order("SIP123", "a@b.com", Some("Processing".to_string()))
            .await;
        h.resolver
            .script_order("SIP123", vec![Ok("Processing".to_string())]);

        pass(&h).await;
        pass(&h).await;

        assert!(h.channel.messages().is_empty());
    }

    #[tokio::test]
    async fn test_reloaded_order_baseline_is_silent() {
        let h = harness();
        // A reloaded order starts with no established status.
        h.registry.insert_order("SIP123", "a@b.com", None).await;
        h.resolver.script_order(
            "SIP123",
            vec![Ok("Shipped".to_string()), Ok("Delivered".to_string())],
        );

        let first = pass(&h).await;
        let second = pass(&h).await;

        assert_eq!(first.notifications, 0);
        assert_eq!(second.notifications, 1);
        let messages = h.channel.messages();
        assert!(messages[0].contains("Delivered"));
    }

    #[tokio::test]
    async fn test_failure_leaves_state_unchanged() {
        let h = harness();
        h.registry.insert_product("http://shop/a", "Widget").await;
        h.resolver.script_product(
            "http://shop/a",
            vec![
                Ok(snapshot("Widget", StockStatus::OutOfStock)),
                Err("connection reset".to_string()),
                Ok(snapshot("Widget", StockStatus::InStock)),
            ],
        );

        pass(&h).await;
        let failing = pass(&h).await;
        assert_eq!(failing.failures, 1);
        assert_eq!(failing.products_checked, 0);
        let products = h.registry.products().await;
        assert_eq!(products[0].stock, Some(StockStatus::OutOfStock));

        // The transition still fires once resolution recovers.
        let recovered = pass(&h).await;
        assert_eq!(recovered.notifications, 1);
    }

    #[tokio::test]
    async fn test_failure_is_isolated_per_entity() {
        let h = harness();
        h.registry.insert_product("http://shop/bad", "Bad").await;
        h.registry.insert_product("http://shop/good", "Good").await;
        h.resolver
            .script_product("http://shop/bad", vec![Err("timeout".to_string())]);
        h.resolver.script_product(
            "http://shop/good",
            vec![Ok(snapshot("Good", StockStatus::InStock))],
        );

        let summary = pass(&h).await;

        assert_eq!(summary.failures, 1);
        assert_eq!(summary.products_checked, 1);
        let products = h.registry.products().await;
        assert_eq!(products[1].stock, Some(StockStatus::InStock));
    }

    #[tokio::test]
    async fn test_channel_failure_does_not_refire() {
        let registry = Arc::new(WatchRegistry::new());
        let resolver = Arc::new(ScriptedResolver::default());
        let notifier = Arc::new(Notifier::with_channel(
            Arc::new(FailingChannel) as Arc<dyn NotifyChannel>
        ));
        let monitor = WatchMonitor::new(
            Arc::clone(&registry),
            Arc::clone(&resolver) as Arc<dyn EntityResolver>,
            notifier,
            &EngineConfig::default(),
        );
        let cancel = CancellationToken::new();

        registry.insert_product("http://shop/a", "Widget").await;
        resolver.script_product(
            "http://shop/a",
            vec![
                Ok(snapshot("Widget", StockStatus::OutOfStock)),
                Ok(snapshot("Widget", StockStatus::InStock)),
                Ok(snapshot("Widget", StockStatus::InStock)),
            ],
        );

        monitor.run_pass(&cancel).await;
        let second = monitor.run_pass(&cancel).await;
        settle().await;
        let third = monitor.run_pass(&cancel).await;
        settle().await;

        // Delivery failed but the transition was still consumed.
        assert_eq!(second.notifications, 1);
        assert_eq!(third.notifications, 0);
        assert_eq!(registry.products().await[0].stock, Some(StockStatus::InStock));
    }

    #[tokio::test]
    async fn test_repeated_failures_cool_down_and_recover() {
        let config = EngineConfig {
            failure_threshold: 2,
            failure_cooldown_passes: 3,
            ..EngineConfig::default()
        };
        let h = harness_with(config);
        h.registry.insert_product("http://shop/a", "Widget").await;
        h.resolver.script_product(
            "http://shop/a",
            vec![
                Err("down".to_string()),
                Err("down".to_string()),
                Err("down".to_string()),
                Ok(snapshot("Widget", StockStatus::OutOfStock)),
            ],
        );

        let mut summaries = Vec::new();
        for _ in 0..7 {
            summaries.push(pass(&h).await);
        }

        // Passes 0 and 1 attempt and fail; 2 is skipped; 3 retries and
        // fails again; 4 and 5 are skipped; 6 retries and succeeds.
        assert_eq!(summaries[0].failures, 1);
        assert_eq!(summaries[1].failures, 1);
        assert_eq!(summaries[2].skipped, 1);
        assert_eq!(summaries[2].failures, 0);
        assert_eq!(summaries[3].failures, 1);
        assert_eq!(summaries[4].skipped, 1);
        assert_eq!(summaries[5].skipped, 1);
        assert_eq!(summaries[6].products_checked, 1);
        assert_eq!(h.resolver.product_calls.load(Ordering::SeqCst), 4);

        // Success clears the streak, so the next pass attempts again.
        let products = h.registry.products().await;
        assert_eq!(products[0].consecutive_failures, 0);
        let after = pass(&h).await;
        assert_eq!(after.products_checked, 1);
    }

    struct CancelOnFirstResolve {
        token: CancellationToken,
        calls: AtomicU32,
    }

    #[async_trait]
    impl EntityResolver for CancelOnFirstResolve {
        async fn resolve_product(&self, _url: &str) -> ResolveResult<ProductSnapshot> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.token.cancel();
            Ok(snapshot("Widget", StockStatus::OutOfStock))
        }

        async fn resolve_order(&self, _t: &str, _e: &str) -> ResolveResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok("Processing".to_string())
        }
    }

    #[tokio::test]
    async fn test_cancel_finishes_current_entity_then_stops() {
        let registry = Arc::new(WatchRegistry::new());
        let cancel = CancellationToken::new();
        let resolver = Arc::new(CancelOnFirstResolve {
            token: cancel.clone(),
            calls: AtomicU32::new(0),
        });
        let (_, notifier) = recording_notifier();
        let monitor = WatchMonitor::new(
            Arc::clone(&registry),
            Arc::clone(&resolver) as Arc<dyn EntityResolver>,
            notifier,
            &EngineConfig::default(),
        );

        registry.insert_product("http://shop/a", "A").await;
        registry.insert_product("http://shop/b", "B").await;
        registry.insert_order("SIP1", "a@b.com", None).await;

        let summary = monitor.run_pass(&cancel).await;

        // The in-flight entity completed and committed; nothing after it ran.
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
        assert_eq!(summary.products_checked, 1);
        assert_eq!(summary.orders_checked, 0);
        let products = registry.products().await;
        assert_eq!(products[0].stock, Some(StockStatus::OutOfStock));
        assert_eq!(products[1].stock, None);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_checks_nothing() {
        let h = harness();
        h.registry.insert_product("http://shop/a", "Widget").await;
        h.resolver
            .script_product("http://shop/a", vec![Ok(snapshot("Widget", StockStatus::InStock))]);
        h.cancel.cancel();

        let summary = pass(&h).await;

        assert_eq!(summary.products_checked, 0);
        assert_eq!(h.resolver.product_calls.load(Ordering::SeqCst), 0);
    }

    struct SlowResolver {
        in_flight: AtomicU32,
        max_seen: AtomicU32,
    }

    #[async_trait]
    impl EntityResolver for SlowResolver {
        async fn resolve_product(&self, _url: &str) -> ResolveResult<ProductSnapshot> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_seen.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(snapshot("Widget", StockStatus::OutOfStock))
        }

        async fn resolve_order(&self, _t: &str, _e: &str) -> ResolveResult<String> {
            Ok("Processing".to_string())
        }
    }

    #[tokio::test]
    async fn test_passes_never_overlap() {
        let registry = Arc::new(WatchRegistry::new());
        let resolver = Arc::new(SlowResolver {
            in_flight: AtomicU32::new(0),
            max_seen: AtomicU32::new(0),
        });
        let (_, notifier) = recording_notifier();
        let monitor = WatchMonitor::new(
            Arc::clone(&registry),
            Arc::clone(&resolver) as Arc<dyn EntityResolver>,
            notifier,
            &EngineConfig::default(),
        );
        let cancel = CancellationToken::new();

        registry.insert_product("http://shop/a", "A").await;
        registry.insert_product("http://shop/b", "B").await;

        let (first, second) =
            tokio::join!(monitor.run_pass(&cancel), monitor.run_pass(&cancel));

        assert_eq!(resolver.max_seen.load(Ordering::SeqCst), 1);
        assert_eq!(first.products_checked, 2);
        assert_eq!(second.products_checked, 2);
    }

    struct RemoveDuringResolve {
        registry: Arc<WatchRegistry>,
        url: String,
        calls: AtomicU32,
    }

    #[async_trait]
    impl EntityResolver for RemoveDuringResolve {
        async fn resolve_product(&self, _url: &str) -> ResolveResult<ProductSnapshot> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call == 0 {
                Ok(snapshot("Widget", StockStatus::OutOfStock))
            } else {
                self.registry.remove(&self.url).await;
                Ok(snapshot("Widget", StockStatus::InStock))
            }
        }

        async fn resolve_order(&self, _t: &str, _e: &str) -> ResolveResult<String> {
            Ok("Processing".to_string())
        }
    }

    #[tokio::test]
    async fn test_removal_mid_pass_drops_result_and_alert() {
        let registry = Arc::new(WatchRegistry::new());
        let resolver = Arc::new(RemoveDuringResolve {
            registry: Arc::clone(&registry),
            url: "http://shop/a".to_string(),
            calls: AtomicU32::new(0),
        });
        let (channel, notifier) = recording_notifier();
        let monitor = WatchMonitor::new(
            Arc::clone(&registry),
            Arc::clone(&resolver) as Arc<dyn EntityResolver>,
            notifier,
            &EngineConfig::default(),
        );
        let cancel = CancellationToken::new();

        registry.insert_product("http://shop/a", "Widget").await;

        monitor.run_pass(&cancel).await;
        let second = monitor.run_pass(&cancel).await;
        settle().await;

        assert_eq!(second.products_checked, 0);
        assert_eq!(second.notifications, 0);
        assert!(channel.messages().is_empty());
        assert_eq!(registry.counts().await, (0, 0));
    }

    #[tokio::test]
    async fn test_discovered_name_used_in_notification() {
        let h = harness();
        // A reloaded product has no name until a check discovers one.
        h.registry.insert_product("http://shop/a", "").await;
        h.resolver.script_product(
            "http://shop/a",
            vec![
                Ok(snapshot("Discovered Widget", StockStatus::OutOfStock)),
                Ok(snapshot("Discovered Widget", StockStatus::InStock)),
            ],
        );

        pass(&h).await;
        pass(&h).await;

        let messages = h.channel.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("Discovered Widget"));
    }

    #[test]
    fn test_summary_display_mentions_cooldowns_only_when_present() {
        let mut summary = PassSummary::new();
        summary.products_checked = 2;
        summary.notifications = 1;
        let line = summary.to_string();
        assert!(line.contains("2 products"));
        assert!(!line.contains("cooling down"));

        summary.skipped = 3;
        assert!(summary.to_string().contains("3 cooling down"));
    }
}
