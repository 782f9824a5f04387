//! Synchronization-bus abstraction.
//!
//! The bus itself (peer discovery, transport, replication algorithm) is an
//! external collaborator. The core only needs one outbound seam: re-injecting
//! a stored snapshot into the live stream so downstream peers treat it
//! identically to a peer-sourced answer.

use serde::{Deserialize, Serialize};

use crate::domain::{NodeSnapshot, Soul};

/// A stored snapshot re-injected into the live stream, correlated to the
/// read request that triggered it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Injection {
    pub correlation: String,
    pub soul: Soul,
    pub snapshot: NodeSnapshot,
}

/// Outbound seam to the synchronization bus.
///
/// Implementations deliver the injection through the bus's own
/// inbound-injection entry point. `emit` must not block; transports that
/// need async delivery should hand the message to their own task.
pub trait GraphBus: Send + Sync {
    fn emit(&self, injection: Injection);
}
