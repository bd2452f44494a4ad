//! Periodic liveness signal while a backfill is active.

use rollcall_database::LedgerRepository;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Spawns and owns the heartbeat task.
///
/// The guard is the explicit "a backfill is running" state: hold it for the
/// duration of the scan and the heartbeat ticks; drop it and the task stops
/// at the next tick boundary.
pub struct Heartbeat;

impl Heartbeat {
    /// Spawn a heartbeat reporting the distinct-user count every `interval`.
    pub fn spawn(ledger: LedgerRepository, interval: Duration) -> HeartbeatGuard {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            loop {
                match ledger.count_users().await {
                    Ok(total) => info!(users = total, "heartbeat"),
                    // Purely observational; a failed count never stops the loop.
                    Err(err) => debug!(%err, "heartbeat count failed"),
                }
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }
        });
        HeartbeatGuard {
            stop: stop_tx,
            handle: Some(handle),
        }
    }
}

/// Latch owned by the backfill supervisor; dropping it stops the heartbeat.
pub struct HeartbeatGuard {
    stop: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl HeartbeatGuard {
    /// Stop the heartbeat and wait for the task to finish.
    pub async fn shutdown(mut self) {
        let _ = self.stop.send(true);
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for HeartbeatGuard {
    fn drop(&mut self) {
        let _ = self.stop.send(true);
    }
}
