//! Graph data model: entity identifiers, field values, and node snapshots.

mod node;
mod soul;

pub use node::{FieldMutation, FieldValue, Link, NodeSnapshot, ReadRequest};
pub use soul::Soul;
