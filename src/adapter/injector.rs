//! Servicing read misses from durable storage.

use std::sync::Arc;

use tracing::{debug, trace, warn};

use super::liveness::Liveness;
use crate::bus::{GraphBus, Injection};
use crate::domain::ReadRequest;
use crate::error::StoreError;
use crate::store::NodeStore;

/// Answers read requests the live peers could not, from the durable store.
///
/// Only misses surfaced by the bus reach this component. Absence is never
/// communicated: when nothing can be injected (no row, store down, corrupt
/// row) the request simply times out upstream.
pub struct ReadInjector<S: NodeStore> {
    store: Arc<S>,
    liveness: Arc<Liveness>,
    bus: Arc<dyn GraphBus>,
}

impl<S: NodeStore> ReadInjector<S> {
    pub fn new(store: Arc<S>, liveness: Arc<Liveness>, bus: Arc<dyn GraphBus>) -> Self {
        Self {
            store,
            liveness,
            bus,
        }
    }

    /// Look up the soul and re-inject the snapshot, tagged with the request's
    /// correlation token.
    ///
    /// The store round-trip runs in its own task; this method never blocks
    /// the bus dispatch loop.
    pub fn on_read_request(&self, request: ReadRequest) {
        if request.soul.is_empty() {
            trace!("discarding read request with empty soul");
            return;
        }

        if !self.liveness.is_connected() {
            debug!(soul = %request.soul, "store disconnected, leaving read to upstream timeout");
            return;
        }

        let store = Arc::clone(&self.store);
        let bus = Arc::clone(&self.bus);

        tokio::spawn(async move {
            match store.get(&request.soul).await {
                Ok(Some(snapshot)) => {
                    debug!(
                        soul = %request.soul,
                        correlation = %request.correlation,
                        fields = snapshot.len(),
                        "injecting stored snapshot"
                    );
                    bus.emit(Injection {
                        correlation: request.correlation,
                        soul: request.soul,
                        snapshot,
                    });
                }
                Ok(None) => {
                    trace!(soul = %request.soul, "no durable snapshot, not answering");
                }
                Err(e @ StoreError::CorruptRow { .. }) => {
                    // Treated as absent; must not crash or fabricate a reply
                    warn!(soul = %request.soul, error = %e, "corrupt stored row, treating as absent");
                }
                Err(e) => {
                    warn!(soul = %request.soul, error = %e, "durable read failed, not answering");
                }
            }
        });
    }
}
