//! Background expiry sweeps on a fixed interval.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::core::DispatchEngine;
use crate::runtime::tokio_spawner::Spawn;

/// Stops the background sweeper when dropped or on [`SweeperHandle::shutdown`].
pub struct SweeperHandle {
    shutdown: watch::Sender<bool>,
}

impl SweeperHandle {
    /// Ask the sweeper loop to exit after its current run.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Run `engine.sweep_expired_offers()` every `every` on `spawner`.
///
/// The first sweep runs immediately. Ticks missed while a sweep is running are
/// skipped rather than bunched up.
pub fn spawn_expiry_sweeper<S: Spawn>(
    engine: Arc<DispatchEngine>,
    every: Duration,
    spawner: &S,
) -> SweeperHandle {
    let (tx, mut rx) = watch::channel(false);
    spawner.spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!("expiry sweeper started (every {:?})", every);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = engine.sweep_expired_offers().await {
                        error!("expiry sweep failed: {}", e);
                    }
                }
                changed = rx.changed() => {
                    if changed.is_err() || *rx.borrow() {
                        break;
                    }
                }
            }
        }
        info!("expiry sweeper stopped");
    });
    SweeperHandle { shutdown: tx }
}

/// Interval from configuration.
pub fn sweep_interval(engine: &DispatchEngine) -> Duration {
    Duration::from_secs(engine.context().config().sweep_interval_secs)
}
