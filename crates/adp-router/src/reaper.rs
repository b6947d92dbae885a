//! Background reclamation of leaked load.
//!
//! A caller that routes a request and never reports completion would leave
//! the worker's load raised forever. When a lease timeout is configured, the
//! reaper periodically releases increments older than that timeout.

use crate::router::Router;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

/// Handle to a running reaper task.
#[derive(Debug)]
pub struct LoadReaper {
    shutdown_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl LoadReaper {
    /// Spawns a task calling [`Router::reclaim_expired`] every `period`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(router: Arc<Router>, period: Duration) -> Self {
        let period = period.max(Duration::from_millis(1));
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(?period, "load reaper started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let reclaimed = router.reclaim_expired(Instant::now());
                        if reclaimed > 0 {
                            debug!(reclaimed, "reaper released expired leases");
                        }
                    }
                    _ = &mut shutdown_rx => break,
                }
            }

            info!("load reaper stopped");
        });

        Self {
            shutdown_tx,
            handle,
        }
    }

    /// Stops the reaper and waits for its task to finish.
    pub async fn shutdown(self) {
        if self.shutdown_tx.send(()).is_err() {
            debug!("load reaper already stopped");
        }
        if let Err(error) = self.handle.await {
            warn!(%error, "load reaper task failed");
        }
    }
}
