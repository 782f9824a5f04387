//! Durable persistence layer: one relational row per graph node.

pub mod db;
pub mod model;
pub mod schema;
mod sqlite;

pub use db::{create_pool, ensure_schema, DbPool};
pub use sqlite::SqliteNodeStore;

use std::future::Future;

use crate::domain::{NodeSnapshot, Soul};
use crate::error::StoreError;

/// Storage operations for graph nodes.
///
/// Storage is one row per soul rather than one row per field: this bounds
/// row count and keeps prefix lookups by id namespace cheap. `upsert` is a
/// true field-wise patch - replacing the whole value on every write would let
/// a late-arriving partial update for one field silently erase previously
/// flushed fields.
pub trait NodeStore: Send + Sync + 'static {
    /// Read the current durable snapshot for a soul, if any.
    ///
    /// Fails with [`StoreError::Unavailable`] when the connection is down and
    /// [`StoreError::CorruptRow`] when the stored payload does not parse;
    /// callers log the latter and treat the row as absent.
    fn get(
        &self,
        soul: &Soul,
    ) -> impl Future<Output = Result<Option<NodeSnapshot>, StoreError>> + Send;

    /// Merge `patch` into the stored snapshot for `soul`, creating the row if
    /// absent. Atomic per row: two sequential upserts for the same soul never
    /// interleave field updates destructively.
    fn upsert(
        &self,
        soul: &Soul,
        patch: &NodeSnapshot,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// All nodes whose soul starts with `prefix`, for namespace search.
    /// Corrupt rows are skipped with a warning.
    fn scan_prefix(
        &self,
        prefix: &str,
    ) -> impl Future<Output = Result<Vec<(Soul, NodeSnapshot)>, StoreError>> + Send;

    /// Diagnostic count of stored nodes.
    fn row_count(&self) -> impl Future<Output = Result<i64, StoreError>> + Send;

    /// Trivial round-trip used by the liveness monitor.
    fn probe(&self) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Rebuild the connection and re-apply the schema-ensure step.
    fn reconnect(&self) -> impl Future<Output = Result<(), StoreError>> + Send;
}
