//! Graphstash - durable persistence adapter for a peer-replicated graph.
//!
//! The adapter sits beside an external graph-synchronization bus: it buffers
//! the bus's field-level `put` events, coalesces rapid writes to the same
//! entity into one debounced durable upsert, and answers `get` misses by
//! re-injecting stored snapshots into the live stream. Storage is one SQLite
//! row per entity with a field-wise merge on every write, so concurrently
//! arriving partial updates never erase each other.
//!
//! # Modules
//!
//! - [`adapter`] - Write coalescing, flush scheduling, read injection, and
//!   store liveness monitoring, wired together by
//!   [`adapter::PersistenceAdapter`]
//! - [`bus`] - The outbound seam to the synchronization bus
//! - [`config`] - Configuration loading from TOML files
//! - [`domain`] - Souls, field values, node snapshots, wire events
//! - [`error`] - Error types for the crate
//! - [`store`] - The `NodeStore` trait and its Diesel/SQLite implementation
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use graphstash::adapter::PersistenceAdapter;
//! use graphstash::bus::{GraphBus, Injection};
//! use graphstash::config::Config;
//! use graphstash::domain::FieldMutation;
//! use graphstash::store::SqliteNodeStore;
//!
//! struct NullBus;
//! impl GraphBus for NullBus {
//!     fn emit(&self, _injection: Injection) {}
//! }
//!
//! # async fn run() -> graphstash::error::Result<()> {
//! let config = Config::default();
//! let store = SqliteNodeStore::connect(&config.store.database_url, config.store.pool_size)?;
//! let adapter = PersistenceAdapter::new(store, Arc::new(NullBus), &config);
//!
//! let _liveness = adapter.spawn_liveness();
//! adapter.on_mutation(FieldMutation::new("users/alice", "name", "alice".into()));
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod bus;
pub mod config;
pub mod domain;
pub mod error;
pub mod store;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
