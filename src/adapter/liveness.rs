//! Store connectivity monitoring.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::store::NodeStore;

/// Last-known store reachability, shared process-wide.
///
/// Only the [`LivenessMonitor`] writes the flag; every other component reads
/// it to short-circuit store operations while disconnected. The flag is
/// advisory and racy by design: a caller may still attempt an operation that
/// fails, and handles that failure with its own retry/backoff.
#[derive(Debug)]
pub struct Liveness {
    connected: AtomicBool,
}

impl Liveness {
    /// Start connected: the store was just opened successfully when the
    /// adapter is built.
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
        }
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Relaxed);
    }
}

impl Default for Liveness {
    fn default() -> Self {
        Self::new()
    }
}

/// Periodically probes the store and flips the connectivity flag.
///
/// A failed probe marks the store disconnected and triggers a reconnect
/// attempt; reconnects are retried on the same period rather than a tight
/// loop.
pub struct LivenessMonitor<S: NodeStore> {
    store: Arc<S>,
    liveness: Arc<Liveness>,
    period: Duration,
}

impl<S: NodeStore> LivenessMonitor<S> {
    pub fn new(store: Arc<S>, liveness: Arc<Liveness>, period: Duration) -> Self {
        Self {
            store,
            liveness,
            period,
        }
    }

    /// Run the probe loop until the task is dropped.
    pub async fn run(self) {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.probe_once().await;
        }
    }

    /// One probe round-trip; on failure, one reconnect attempt.
    pub async fn probe_once(&self) {
        let was_connected = self.liveness.is_connected();

        match self.store.probe().await {
            Ok(()) => {
                if !was_connected {
                    info!("store connectivity restored");
                }
                self.liveness.set_connected(true);
            }
            Err(e) => {
                if was_connected {
                    warn!(error = %e, "store probe failed, marking disconnected");
                } else {
                    debug!(error = %e, "store still unreachable");
                }
                self.liveness.set_connected(false);

                match self.store.reconnect().await {
                    Ok(()) => {
                        info!("store reconnected");
                        self.liveness.set_connected(true);
                    }
                    Err(e) => {
                        debug!(error = %e, "store reconnect failed, will retry next period");
                    }
                }
            }
        }
    }
}
