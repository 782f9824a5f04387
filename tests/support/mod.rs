//! Shared wiring helpers for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use graphstash::adapter::{
    FlushScheduler, Liveness, PendingBuffer, RetryPolicy, WriteCoalescer,
};
use graphstash::testkit::MemoryNodeStore;

/// The write path wired over a memory store, with every component exposed.
pub struct Rig {
    pub store: Arc<MemoryNodeStore>,
    pub buffer: Arc<PendingBuffer>,
    pub liveness: Arc<Liveness>,
    pub flusher: Arc<FlushScheduler<MemoryNodeStore>>,
    pub coalescer: WriteCoalescer<MemoryNodeStore>,
}

pub fn rig(store: MemoryNodeStore, debounce: Duration, retry: RetryPolicy) -> Rig {
    let store = Arc::new(store);
    let buffer = Arc::new(PendingBuffer::new());
    let liveness = Arc::new(Liveness::new());
    let flusher = Arc::new(FlushScheduler::new(
        Arc::clone(&store),
        Arc::clone(&buffer),
        Arc::clone(&liveness),
        retry,
    ));
    let coalescer = WriteCoalescer::new(Arc::clone(&buffer), Arc::clone(&flusher), debounce);

    Rig {
        store,
        buffer,
        liveness,
        flusher,
        coalescer,
    }
}

/// A retry policy short enough for paused-clock tests.
pub fn quick_retry() -> RetryPolicy {
    RetryPolicy {
        initial: Duration::from_millis(100),
        max: Duration::from_millis(1_000),
        multiplier: 2.0,
    }
}

/// Let already-spawned, non-sleeping tasks run to completion.
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}
