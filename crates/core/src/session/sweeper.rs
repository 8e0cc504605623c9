use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::session::SessionStore;

/// Handle to the background eviction task. Dropping it without calling
/// [`SweeperHandle::stop`] leaves the task running until the runtime shuts
/// down.
pub struct SweeperHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(error) = self.task.await {
            debug!(event_name = "session.sweeper.join_failed", error = %error, "sweeper task ended abnormally");
        }
    }
}

pub fn spawn_sweeper(store: SessionStore, interval: Duration) -> SweeperHandle {
    let (shutdown, mut shutdown_rx) = watch::channel(false);

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        info!(
            event_name = "session.sweeper.started",
            interval_ms = interval.as_millis() as u64,
            idle_timeout_secs = store.idle_timeout().as_secs(),
            "session sweeper started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    store.sweep();
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }

        info!(event_name = "session.sweeper.stopped", "session sweeper stopped");
    });

    SweeperHandle { shutdown, task }
}
