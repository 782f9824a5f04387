use std::fmt;

use serde::{Deserialize, Serialize};

/// Entity identifier ("soul") - newtype for type safety.
///
/// An opaque string uniquely naming one node in the replicated graph,
/// stable for the node's lifetime. The inner String is private to ensure
/// all construction goes through the defined constructors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Soul(String);

impl Soul {
    /// Create a new `Soul` from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the soul as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the identifier is empty (protocol noise, never a valid node).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Soul {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Soul {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for Soul {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
