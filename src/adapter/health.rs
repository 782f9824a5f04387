//! Read-only diagnostics for the external health surface.

use serde::Serialize;

/// Point-in-time diagnostics sourced from the core.
///
/// Exposed to the embedding HTTP layer; no core behavior depends on this
/// being read. `stored_nodes` is `None` when the count itself failed.
#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub connected: bool,
    pub pending_entities: usize,
    pub stored_nodes: Option<i64>,
}
