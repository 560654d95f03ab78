//! Shared fakes for engine unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use notify::{ChannelError, Notifier, NotifyChannel, NotifyEvent};
use resolver::{EntityResolver, ProductSnapshot, ResolveError, ResolveResult, StockStatus};

type Script<T> = VecDeque<Result<T, String>>;

/// Resolver that replays scripted results per identifier.
///
/// The last step of a script repeats forever; an identifier without a
/// script resolves to an error.
#[derive(Default)]
pub struct ScriptedResolver {
    products: Mutex<HashMap<String, Script<ProductSnapshot>>>,
    orders: Mutex<HashMap<String, Script<String>>>,
    pub product_calls: AtomicU32,
    pub order_calls: AtomicU32,
}

impl ScriptedResolver {
    pub fn script_product(&self, url: &str, steps: Vec<Result<ProductSnapshot, String>>) {
        self.products
            .lock()
            .unwrap()
            .insert(url.to_string(), steps.into());
    }

    pub fn script_order(&self, tracking_number: &str, steps: Vec<Result<String, String>>) {
        self.orders
            .lock()
            .unwrap()
            .insert(tracking_number.to_string(), steps.into());
    }
}

fn next_step<T: Clone>(queue: &mut Script<T>) -> Result<T, String> {
    if queue.len() > 1 {
        queue.pop_front().unwrap()
    } else {
        queue
            .front()
            .cloned()
            .unwrap_or_else(|| Err("no script".to_string()))
    }
}

#[async_trait]
impl EntityResolver for ScriptedResolver {
    async fn resolve_product(&self, url: &str) -> ResolveResult<ProductSnapshot> {
        self.product_calls.fetch_add(1, Ordering::SeqCst);
        let mut scripts = self.products.lock().unwrap();
        let queue = scripts.entry(url.to_string()).or_default();
        next_step(queue).map_err(ResolveError::Other)
    }

    async fn resolve_order(
        &self,
        tracking_number: &str,
        _contact_email: &str,
    ) -> ResolveResult<String> {
        self.order_calls.fetch_add(1, Ordering::SeqCst);
        let mut scripts = self.orders.lock().unwrap();
        let queue = scripts.entry(tracking_number.to_string()).or_default();
        next_step(queue).map_err(ResolveError::Other)
    }
}

pub fn snapshot(name: &str, stock: StockStatus) -> ProductSnapshot {
    ProductSnapshot {
        name: name.to_string(),
        stock,
    }
}

/// Channel that records delivered messages.
#[derive(Default)]
pub struct RecordingChannel {
    sent: Mutex<Vec<String>>,
}

impl RecordingChannel {
    pub fn messages(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotifyChannel for RecordingChannel {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn enabled(&self) -> bool {
        true
    }

    async fn send(&self, event: &NotifyEvent) -> Result<(), ChannelError> {
        self.sent.lock().unwrap().push(event.message());
        Ok(())
    }
}

/// Channel that refuses every delivery.
pub struct FailingChannel;

#[async_trait]
impl NotifyChannel for FailingChannel {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn enabled(&self) -> bool {
        true
    }

    async fn send(&self, _event: &NotifyEvent) -> Result<(), ChannelError> {
        Err(ChannelError::Other("delivery refused".to_string()))
    }
}

/// Let fire-and-forget notification tasks run to completion.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

pub fn recording_notifier() -> (Arc<RecordingChannel>, Arc<Notifier>) {
    let channel = Arc::new(RecordingChannel::default());
    let notifier = Arc::new(Notifier::with_channel(
        Arc::clone(&channel) as Arc<dyn NotifyChannel>
    ));
    (channel, notifier)
}
