//! Node snapshots and field-level mutations.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::Soul;

/// A reference to another node, encoded on the wire as `{"#": "<soul>"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    #[serde(rename = "#")]
    pub soul: Soul,
}

/// One field's value: a scalar, null, or a reference to another node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    Link(Link),
}

impl FieldValue {
    /// Create a reference to another node.
    pub fn link(soul: impl Into<Soul>) -> Self {
        FieldValue::Link(Link { soul: soul.into() })
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        FieldValue::Number(n)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

/// The last known durable state of one entity: a mapping from field name
/// to value. Always a partial view - the live graph may hold fields not yet
/// flushed, and the store may hold fields not yet re-synced into live peers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeSnapshot(BTreeMap<String, FieldValue>);

impl NodeSnapshot {
    /// Create an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a value under a field, replacing any previous value.
    pub fn insert(&mut self, field: impl Into<String>, value: FieldValue) {
        self.0.insert(field.into(), value);
    }

    /// Get the value stored under a field.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.0.get(field)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Field-wise overwrite: every field present in `other` replaces the
    /// corresponding field here; fields absent from `other` are untouched.
    pub fn merge_from(&mut self, other: NodeSnapshot) {
        for (field, value) in other.0 {
            self.0.insert(field, value);
        }
    }

    /// Insert only the fields of `other` that are not already present.
    ///
    /// Used when a failed flush is merged back into a pending buffer that may
    /// have accumulated newer values in the meantime; the newer values win.
    pub fn merge_missing(&mut self, other: NodeSnapshot) {
        for (field, value) in other.0 {
            self.0.entry(field).or_insert(value);
        }
    }

    /// Iterate over fields in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.0.iter()
    }
}

impl FromIterator<(String, FieldValue)> for NodeSnapshot {
    fn from_iter<I: IntoIterator<Item = (String, FieldValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A single field-level mutation delivered by the synchronization bus.
///
/// `source_state` is the origin peer's logical clock for this field. It is
/// carried and logged but not used for conflict resolution; the store applies
/// field-wise last-write-wins by arrival order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMutation {
    pub soul: Soul,
    pub field: String,
    pub value: FieldValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_state: Option<f64>,
}

impl FieldMutation {
    pub fn new(soul: impl Into<Soul>, field: impl Into<String>, value: FieldValue) -> Self {
        Self {
            soul: soul.into(),
            field: field.into(),
            value,
            source_state: None,
        }
    }
}

/// A read request for an entity the live peers could not resolve.
///
/// The correlation token must be echoed on the response so the requesting
/// peer can match reply to request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadRequest {
    pub soul: Soul,
    pub correlation: String,
}

impl ReadRequest {
    pub fn new(soul: impl Into<Soul>, correlation: impl Into<String>) -> Self {
        Self {
            soul: soul.into(),
            correlation: correlation.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_from_overwrites_only_present_fields() {
        let mut base = NodeSnapshot::new();
        base.insert("name", "alice".into());
        base.insert("age", 30.0.into());

        let mut patch = NodeSnapshot::new();
        patch.insert("age", 31.0.into());

        base.merge_from(patch);
        assert_eq!(base.get("name"), Some(&FieldValue::Text("alice".into())));
        assert_eq!(base.get("age"), Some(&FieldValue::Number(31.0)));
    }

    #[test]
    fn merge_missing_keeps_newer_values() {
        let mut pending = NodeSnapshot::new();
        pending.insert("age", 32.0.into());

        let mut taken = NodeSnapshot::new();
        taken.insert("age", 31.0.into());
        taken.insert("name", "alice".into());

        pending.merge_missing(taken);
        assert_eq!(pending.get("age"), Some(&FieldValue::Number(32.0)));
        assert_eq!(pending.get("name"), Some(&FieldValue::Text("alice".into())));
    }

    #[test]
    fn link_serializes_as_reference_object() {
        let value = FieldValue::link("users/bob");
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, r##"{"#":"users/bob"}"##);

        let back: FieldValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn snapshot_roundtrips_through_json() {
        let mut snapshot = NodeSnapshot::new();
        snapshot.insert("online", true.into());
        snapshot.insert("bio", FieldValue::Null);
        snapshot.insert("friend", FieldValue::link("users/bob"));

        let json = serde_json::to_string(&snapshot).unwrap();
        let back: NodeSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snapshot);
    }
}
