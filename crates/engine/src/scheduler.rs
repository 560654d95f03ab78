//! Drives check passes on a fixed interval until cancelled.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::monitor::WatchMonitor;

/// Owns the periodic check loop.
pub struct Scheduler {
    monitor: Arc<WatchMonitor>,
    period: Duration,
    cancel: CancellationToken,
}

impl Scheduler {
    #[must_use]
    pub fn new(monitor: Arc<WatchMonitor>, period: Duration, cancel: CancellationToken) -> Self {
        Self {
            monitor,
            // A zero period would panic the interval timer.
            period: period.max(Duration::from_millis(1)),
            cancel,
        }
    }

    /// Runs passes forever, one per period, starting immediately.
    ///
    /// Returns once the cancellation token fires. A pass already in
    /// flight is not interrupted mid-entity; the monitor winds it down
    /// at the next entity boundary.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.period);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let summary = self.monitor.run_pass(&self.cancel).await;
                    if self.cancel.is_cancelled() {
                        info!("Scheduler stopped");
                        return;
                    }
                    info!(summary = %summary, "Scheduled check finished");
                }
                () = self.cancel.cancelled() => {
                    info!("Scheduler stopped");
                    return;
                }
            }
        }
    }
}
