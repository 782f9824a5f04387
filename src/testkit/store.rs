//! In-memory store implementation for testing.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use parking_lot::RwLock;
use tokio::time::sleep;

use crate::domain::{NodeSnapshot, Soul};
use crate::error::StoreError;
use crate::store::NodeStore;

/// In-memory node store with failure injection.
///
/// `set_available(false)` makes every operation fail with
/// [`StoreError::Unavailable`], simulating an outage. Counters track upsert
/// calls and the maximum number of concurrently executing upserts, which the
/// per-soul serialization tests assert on.
#[derive(Debug, Default)]
pub struct MemoryNodeStore {
    nodes: RwLock<HashMap<Soul, NodeSnapshot>>,
    poisoned: RwLock<HashSet<Soul>>,
    available: AtomicBool,
    upsert_delay: Option<Duration>,
    upsert_count: AtomicU32,
    failed_upsert_count: AtomicU32,
    in_flight: AtomicU32,
    max_in_flight: AtomicU32,
    reconnect_count: AtomicU32,
}

impl MemoryNodeStore {
    pub fn new() -> Self {
        Self {
            available: AtomicBool::new(true),
            ..Self::default()
        }
    }

    /// Make every upsert hold its "transaction" open for `delay`.
    pub fn with_upsert_delay(mut self, delay: Duration) -> Self {
        self.upsert_delay = Some(delay);
        self
    }

    /// Flip the simulated outage switch.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Make reads of this soul fail as a corrupt stored payload.
    pub fn poison(&self, soul: &Soul) {
        self.poisoned.write().insert(soul.clone());
    }

    /// Successful upsert calls so far.
    pub fn upsert_count(&self) -> u32 {
        self.upsert_count.load(Ordering::SeqCst)
    }

    /// Upsert calls rejected while unavailable.
    pub fn failed_upsert_count(&self) -> u32 {
        self.failed_upsert_count.load(Ordering::SeqCst)
    }

    /// Highest number of upserts observed executing at once.
    pub fn max_in_flight(&self) -> u32 {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn reconnect_count(&self) -> u32 {
        self.reconnect_count.load(Ordering::SeqCst)
    }

    /// Direct read of the stored snapshot, bypassing the trait.
    pub fn snapshot(&self, soul: &Soul) -> Option<NodeSnapshot> {
        self.nodes.read().get(soul).cloned()
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("simulated outage".into()))
        }
    }
}

impl NodeStore for MemoryNodeStore {
    async fn get(&self, soul: &Soul) -> Result<Option<NodeSnapshot>, StoreError> {
        self.check_available()?;
        if self.poisoned.read().contains(soul) {
            return Err(StoreError::CorruptRow {
                soul: soul.to_string(),
                reason: "simulated unparseable payload".into(),
            });
        }
        Ok(self.nodes.read().get(soul).cloned())
    }

    async fn upsert(&self, soul: &Soul, patch: &NodeSnapshot) -> Result<(), StoreError> {
        if let Err(e) = self.check_available() {
            self.failed_upsert_count.fetch_add(1, Ordering::SeqCst);
            return Err(e);
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.upsert_delay {
            sleep(delay).await;
        }

        self.nodes
            .write()
            .entry(soul.clone())
            .or_default()
            .merge_from(patch.clone());

        self.upsert_count.fetch_add(1, Ordering::SeqCst);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<(Soul, NodeSnapshot)>, StoreError> {
        self.check_available()?;
        let mut hits: Vec<(Soul, NodeSnapshot)> = self
            .nodes
            .read()
            .iter()
            .filter(|(soul, _)| soul.as_str().starts_with(prefix))
            .map(|(soul, snapshot)| (soul.clone(), snapshot.clone()))
            .collect();
        hits.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(hits)
    }

    async fn row_count(&self) -> Result<i64, StoreError> {
        self.check_available()?;
        Ok(self.nodes.read().len() as i64)
    }

    async fn probe(&self) -> Result<(), StoreError> {
        self.check_available()
    }

    async fn reconnect(&self) -> Result<(), StoreError> {
        self.reconnect_count.fetch_add(1, Ordering::SeqCst);
        self.check_available()
    }
}
