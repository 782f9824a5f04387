//! In-memory write coalescing with per-entity debounce.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::trace;

use super::flush::FlushScheduler;
use crate::domain::{FieldMutation, FieldValue, NodeSnapshot, Soul};
use crate::store::NodeStore;

/// Accumulating snapshot-in-progress for one soul, plus its debounce timer.
#[derive(Debug, Default)]
struct PendingEntry {
    snapshot: NodeSnapshot,
    timer: Option<JoinHandle<()>>,
}

/// Process-local buffer of not-yet-flushed field mutations, keyed by soul.
///
/// Exclusively owned by the coalescer/flush-scheduler pair; other components
/// never touch it directly. Entries are created on the first mutation for a
/// soul since its last flush and removed when a flush takes them.
#[derive(Debug, Default)]
pub struct PendingBuffer {
    entries: DashMap<Soul, PendingEntry>,
}

impl PendingBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of souls with buffered mutations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn contains(&self, soul: &Soul) -> bool {
        self.entries.contains_key(soul)
    }

    fn record(&self, soul: Soul, field: String, value: FieldValue) {
        self.entries
            .entry(soul)
            .or_default()
            .snapshot
            .insert(field, value);
    }

    /// Replace the debounce timer for a soul, aborting the superseded one.
    fn arm_timer(&self, soul: Soul, handle: JoinHandle<()>) {
        if let Some(mut entry) = self.entries.get_mut(&soul) {
            if let Some(old) = entry.timer.replace(handle) {
                old.abort();
            }
        } else {
            // Entry vanished between record and arm (a flush took it);
            // the timer will find nothing to flush, which is harmless.
            handle.abort();
        }
    }

    /// Atomically take ownership of the pending snapshot for a soul, so new
    /// mutations start a fresh accumulation.
    pub(crate) fn take(&self, soul: &Soul) -> Option<NodeSnapshot> {
        let (_, entry) = self.entries.remove(soul)?;
        if let Some(timer) = entry.timer {
            timer.abort();
        }
        if entry.snapshot.is_empty() {
            None
        } else {
            Some(entry.snapshot)
        }
    }

    /// Merge a taken snapshot back after a failed flush. Fields the buffer
    /// has re-accumulated in the meantime are newer and win.
    pub(crate) fn restore_missing(&self, soul: &Soul, snapshot: NodeSnapshot) {
        self.entries
            .entry(soul.clone())
            .or_default()
            .snapshot
            .merge_missing(snapshot);
    }

    /// Souls currently holding buffered mutations.
    pub(crate) fn souls(&self) -> Vec<Soul> {
        self.entries.iter().map(|e| e.key().clone()).collect()
    }
}

/// Accumulates per-entity field mutations and schedules a debounced flush.
///
/// Each new mutation for a soul resets that soul's quiet-period window, so a
/// burst of field updates for one entity becomes a single durable write. The
/// coalescer never touches the store itself; it hands the soul to the
/// [`FlushScheduler`] when the window elapses.
pub struct WriteCoalescer<S: NodeStore> {
    buffer: Arc<PendingBuffer>,
    flusher: Arc<FlushScheduler<S>>,
    debounce: Duration,
}

impl<S: NodeStore> WriteCoalescer<S> {
    pub fn new(
        buffer: Arc<PendingBuffer>,
        flusher: Arc<FlushScheduler<S>>,
        debounce: Duration,
    ) -> Self {
        Self {
            buffer,
            flusher,
            debounce,
        }
    }

    /// Record one field mutation and (re)arm the soul's debounce timer.
    ///
    /// Malformed or bus-internal events are discarded without creating a
    /// buffer entry: they must not become spurious rows.
    pub fn on_mutation(&self, mutation: FieldMutation) {
        if is_noise(&mutation.soul, &mutation.field) {
            trace!(soul = %mutation.soul, field = %mutation.field, "discarding protocol noise");
            return;
        }

        trace!(
            soul = %mutation.soul,
            field = %mutation.field,
            source_state = ?mutation.source_state,
            "buffering mutation"
        );
        self.buffer
            .record(mutation.soul.clone(), mutation.field, mutation.value);
        self.arm(mutation.soul);
    }

    /// Record a whole-node put: a batch of field mutations sharing one soul
    /// and one debounce reschedule.
    pub fn on_batch(&self, soul: Soul, fields: Vec<(String, FieldValue)>) {
        if soul.is_empty() {
            trace!("discarding batch with empty soul");
            return;
        }

        let mut recorded = false;
        for (field, value) in fields {
            if is_noise(&soul, &field) {
                trace!(soul = %soul, field = %field, "discarding protocol noise in batch");
                continue;
            }
            self.buffer.record(soul.clone(), field, value);
            recorded = true;
        }

        if recorded {
            self.arm(soul);
        }
    }

    /// Number of souls with buffered mutations, for the health surface.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    fn arm(&self, soul: Soul) {
        let flusher = Arc::clone(&self.flusher);
        let debounce = self.debounce;
        let timer_soul = soul.clone();

        let handle = tokio::spawn(async move {
            sleep(debounce).await;
            flusher.schedule_flush(timer_soul);
        });
        self.buffer.arm_timer(soul, handle);
    }
}

/// Bus-internal bookkeeping field carried on every wire node.
const META_FIELD: &str = "_";

fn is_noise(soul: &Soul, field: &str) -> bool {
    soul.is_empty() || field.is_empty() || field == META_FIELD
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noise_detection() {
        assert!(is_noise(&Soul::new(""), "name"));
        assert!(is_noise(&Soul::new("users/alice"), ""));
        assert!(is_noise(&Soul::new("users/alice"), "_"));
        assert!(!is_noise(&Soul::new("users/alice"), "name"));
    }

    #[test]
    fn take_returns_accumulated_fields_once() {
        let buffer = PendingBuffer::new();
        let soul = Soul::new("users/alice");
        buffer.record(soul.clone(), "a".into(), 1.0.into());
        buffer.record(soul.clone(), "b".into(), 2.0.into());

        let taken = buffer.take(&soul).expect("snapshot");
        assert_eq!(taken.len(), 2);
        assert!(buffer.take(&soul).is_none());
    }

    #[test]
    fn restore_missing_never_clobbers_newer_fields() {
        let buffer = PendingBuffer::new();
        let soul = Soul::new("users/alice");
        buffer.record(soul.clone(), "age".into(), 30.0.into());
        let taken = buffer.take(&soul).unwrap();

        // A newer mutation arrives while the flush is failing
        buffer.record(soul.clone(), "age".into(), 31.0.into());
        buffer.restore_missing(&soul, taken);

        let merged = buffer.take(&soul).unwrap();
        assert_eq!(merged.get("age"), Some(&crate::domain::FieldValue::Number(31.0)));
    }
}
