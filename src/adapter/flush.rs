//! Per-entity flush execution: serialization, retry, and shutdown drain.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, error, info, warn};

use super::coalescer::PendingBuffer;
use super::liveness::Liveness;
use crate::config::FlushConfig;
use crate::domain::Soul;
use crate::store::NodeStore;

/// Bounded exponential backoff for flush retries.
///
/// The delay is capped but the retry count is not: a store outage must never
/// drop buffered mutations short of process termination.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub initial: Duration,
    pub max: Duration,
    pub multiplier: f64,
}

impl RetryPolicy {
    fn delay_for(&self, attempt: u32) -> Duration {
        let ms = self.initial.as_millis() as f64 * self.multiplier.powi(attempt as i32);
        Duration::from_millis(ms as u64).min(self.max)
    }
}

impl From<&FlushConfig> for RetryPolicy {
    fn from(config: &FlushConfig) -> Self {
        Self {
            initial: Duration::from_millis(config.retry_initial_ms),
            max: Duration::from_millis(config.retry_max_ms),
            multiplier: config.backoff_multiplier,
        }
    }
}

/// Per-soul flush gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Gate {
    /// A flush task is executing for this soul.
    Running,
    /// A flush was requested while one was executing; run once more.
    Rerun,
}

/// Executes flushes with at most one in flight per soul.
///
/// When a debounce window elapses while a flush for the same soul is already
/// executing, the newly accumulated fields stay buffered and are picked up by
/// a rerun pass instead of a second concurrent flush, so the second pass
/// always observes the buffer state the first left behind.
pub struct FlushScheduler<S: NodeStore> {
    store: Arc<S>,
    buffer: Arc<PendingBuffer>,
    liveness: Arc<Liveness>,
    gates: Mutex<HashMap<Soul, Gate>>,
    retry: RetryPolicy,
}

impl<S: NodeStore> FlushScheduler<S> {
    pub fn new(
        store: Arc<S>,
        buffer: Arc<PendingBuffer>,
        liveness: Arc<Liveness>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            buffer,
            liveness,
            gates: Mutex::new(HashMap::new()),
            retry,
        }
    }

    /// Request a flush for a soul, typically from an elapsed debounce timer.
    pub fn schedule_flush(self: &Arc<Self>, soul: Soul) {
        {
            let mut gates = self.gates.lock();
            if let Some(gate) = gates.get_mut(&soul) {
                *gate = Gate::Rerun;
                return;
            }
            gates.insert(soul.clone(), Gate::Running);
        }

        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.run(soul).await;
        });
    }

    async fn run(self: Arc<Self>, soul: Soul) {
        loop {
            self.flush_until_durable(&soul).await;

            let mut gates = self.gates.lock();
            match gates.get(&soul) {
                Some(Gate::Rerun) => {
                    gates.insert(soul.clone(), Gate::Running);
                }
                _ => {
                    gates.remove(&soul);
                    return;
                }
            }
        }
    }

    /// Take the pending snapshot for a soul and upsert it, retrying with
    /// backoff until it lands. Failed attempts merge the snapshot back so
    /// nothing is lost and newer pending fields ride along on the retry.
    async fn flush_until_durable(&self, soul: &Soul) {
        let mut attempt: u32 = 0;

        loop {
            let Some(snapshot) = self.buffer.take(soul) else {
                return;
            };

            if !self.liveness.is_connected() {
                self.buffer.restore_missing(soul, snapshot);
                let delay = self.retry.delay_for(attempt);
                debug!(soul = %soul, ?delay, "store disconnected, delaying flush");
                attempt = attempt.saturating_add(1);
                sleep(delay).await;
                continue;
            }

            match self.store.upsert(soul, &snapshot).await {
                Ok(()) => {
                    debug!(soul = %soul, fields = snapshot.len(), "flushed");
                    return;
                }
                Err(e) => {
                    self.buffer.restore_missing(soul, snapshot);
                    let delay = self.retry.delay_for(attempt);
                    if e.is_unavailable() {
                        warn!(soul = %soul, attempt, ?delay, error = %e, "store unavailable, retrying flush");
                    } else {
                        error!(soul = %soul, attempt, ?delay, error = %e, "flush failed, retrying");
                    }
                    attempt = attempt.saturating_add(1);
                    sleep(delay).await;
                }
            }
        }
    }

    /// Shutdown drain: one flush attempt per soul with a non-empty buffer,
    /// bounded by the grace period. Souls still unflushed afterwards are
    /// logged as lost rather than silently hidden.
    pub async fn drain_all(&self, grace: Duration) {
        let souls = self.buffer.souls();
        if souls.is_empty() {
            return;
        }

        info!(entities = souls.len(), "draining pending writes");
        let deadline = Instant::now() + grace;
        let mut flushed = 0usize;

        for soul in souls {
            let Some(snapshot) = self.buffer.take(&soul) else {
                continue;
            };

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                error!(soul = %soul, fields = snapshot.len(), "lost on shutdown: drain grace period expired");
                continue;
            }

            match timeout(remaining, self.store.upsert(&soul, &snapshot)).await {
                Ok(Ok(())) => flushed += 1,
                Ok(Err(e)) => {
                    error!(soul = %soul, fields = snapshot.len(), error = %e, "lost on shutdown: final flush failed");
                }
                Err(_) => {
                    error!(soul = %soul, fields = snapshot.len(), "lost on shutdown: drain grace period expired");
                }
            }
        }

        info!(flushed, "drain complete");
    }
}
