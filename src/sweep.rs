//! Periodic reconciliation sweep.
//!
//! Keeps cached connection state fresh for tenants whose instances never got
//! a working push webhook. Interruptible at process shutdown via a watch
//! channel; an in-flight pass finishes its current tenant and stops.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info};

use crate::services::reconciler::StateReconciler;

pub struct SweepWorker {
    reconciler: Arc<StateReconciler>,
    interval: Duration,
}

impl SweepWorker {
    pub fn new(reconciler: Arc<StateReconciler>, interval: Duration) -> Self {
        Self {
            reconciler,
            interval,
        }
    }

    /// Run until shutdown is signaled.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(interval_secs = self.interval.as_secs(), "starting reconciliation sweep");

        let mut interval = tokio::time::interval(self.interval);
        // Skip the immediate first tick; allocation paths already reconcile
        // on demand at startup.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let stats = self.reconciler.sweep_once().await;
                    if stats.refreshed > 0 || stats.failed > 0 {
                        debug!(
                            refreshed = stats.refreshed,
                            failed = stats.failed,
                            "sweep pass complete"
                        );
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("reconciliation sweep shutting down");
                        break;
                    }
                }
            }
        }
    }
}
