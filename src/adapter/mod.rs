//! The persistence adapter: coalesced durable writes and read re-injection
//! for an external graph-synchronization bus.

mod coalescer;
mod flush;
mod health;
mod injector;
mod liveness;

pub use coalescer::{PendingBuffer, WriteCoalescer};
pub use flush::{FlushScheduler, RetryPolicy};
pub use health::HealthSnapshot;
pub use injector::ReadInjector;
pub use liveness::{Liveness, LivenessMonitor};

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::bus::GraphBus;
use crate::config::Config;
use crate::domain::{FieldMutation, FieldValue, ReadRequest, Soul};
use crate::store::NodeStore;

/// Wires the write and read paths over one store and one bus.
///
/// `put` events feed [`WriteCoalescer`] -> [`FlushScheduler`] -> store;
/// `get` events feed [`ReadInjector`] -> store -> bus. The
/// [`LivenessMonitor`] supervises store health and gates both paths.
pub struct PersistenceAdapter<S: NodeStore> {
    store: Arc<S>,
    liveness: Arc<Liveness>,
    coalescer: WriteCoalescer<S>,
    flusher: Arc<FlushScheduler<S>>,
    injector: ReadInjector<S>,
    probe_interval: Duration,
    drain_grace: Duration,
}

impl<S: NodeStore> PersistenceAdapter<S> {
    pub fn new(store: S, bus: Arc<dyn GraphBus>, config: &Config) -> Self {
        let store = Arc::new(store);
        let liveness = Arc::new(Liveness::new());
        let buffer = Arc::new(PendingBuffer::new());

        let flusher = Arc::new(FlushScheduler::new(
            Arc::clone(&store),
            Arc::clone(&buffer),
            Arc::clone(&liveness),
            RetryPolicy::from(&config.flush),
        ));
        let coalescer = WriteCoalescer::new(buffer, Arc::clone(&flusher), config.debounce());
        let injector = ReadInjector::new(Arc::clone(&store), Arc::clone(&liveness), bus);

        Self {
            store,
            liveness,
            coalescer,
            flusher,
            injector,
            probe_interval: config.probe_interval(),
            drain_grace: config.drain_grace(),
        }
    }

    /// Inbound `put` event: one field mutation.
    pub fn on_mutation(&self, mutation: FieldMutation) {
        self.coalescer.on_mutation(mutation);
    }

    /// Inbound `put` event: a whole-node write sharing one soul.
    pub fn on_batch(&self, soul: Soul, fields: Vec<(String, FieldValue)>) {
        self.coalescer.on_batch(soul, fields);
    }

    /// Inbound `get` event the live peers could not resolve.
    pub fn on_read_request(&self, request: ReadRequest) {
        self.injector.on_read_request(request);
    }

    /// Spawn the periodic store probe. The returned handle aborts the loop
    /// when dropped by the embedder's shutdown path.
    pub fn spawn_liveness(&self) -> JoinHandle<()> {
        let monitor = LivenessMonitor::new(
            Arc::clone(&self.store),
            Arc::clone(&self.liveness),
            self.probe_interval,
        );
        tokio::spawn(monitor.run())
    }

    /// Shutdown drain: best-effort flush of every pending entity within the
    /// configured grace period.
    pub async fn drain(&self) {
        self.flusher.drain_all(self.drain_grace).await;
    }

    /// Read-only connectivity handle for embedders.
    #[must_use]
    pub fn liveness(&self) -> Arc<Liveness> {
        Arc::clone(&self.liveness)
    }

    /// Diagnostics for the external health surface.
    pub async fn health(&self) -> HealthSnapshot {
        let stored_nodes = self.store.row_count().await.ok();
        HealthSnapshot {
            connected: self.liveness.is_connected(),
            pending_entities: self.coalescer.pending_len(),
            stored_nodes,
        }
    }
}
