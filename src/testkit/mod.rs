//! Shared test utilities available to both unit and integration tests.
//!
//! Enabled via `#[cfg(test)]` (unit tests) or the `testkit` feature
//! (integration tests).
//!
//! - [`MemoryNodeStore`] - in-memory [`NodeStore`](crate::store::NodeStore)
//!   with an availability switch, call counters, and an optional per-upsert
//!   delay for concurrency assertions.
//! - [`RecordingBus`] - [`GraphBus`](crate::bus::GraphBus) capturing every
//!   injection for inspection.

mod bus;
mod store;

pub use bus::RecordingBus;
pub use store::MemoryNodeStore;
