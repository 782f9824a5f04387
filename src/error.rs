use thiserror::Error;

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),
}

/// Durable-store errors.
///
/// `Unavailable` is transient (connection down, probe failed) and drives the
/// flush scheduler's buffered retry. `CorruptRow` means the stored payload for
/// one entity does not parse; callers log it and treat the row as absent.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("corrupt payload for node '{soul}': {reason}")]
    CorruptRow { soul: String, reason: String },

    #[error("database error: {0}")]
    Database(String),
}

impl StoreError {
    /// Whether this error is a transient connectivity failure.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

impl From<diesel::result::Error> for StoreError {
    fn from(err: diesel::result::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_pass_through_transparently() {
        let err: Error = StoreError::Unavailable("pool exhausted".into()).into();
        assert_eq!(err.to_string(), "store unavailable: pool exhausted");
    }

    #[test]
    fn config_errors_pass_through_transparently() {
        let err: Error = ConfigError::InvalidValue {
            field: "store.pool_size",
            reason: "must be at least 1".into(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "invalid value for store.pool_size: must be at least 1"
        );
    }

    #[test]
    fn only_unavailable_is_transient() {
        assert!(StoreError::Unavailable("down".into()).is_unavailable());
        assert!(!StoreError::Database("locked".into()).is_unavailable());
        assert!(!StoreError::CorruptRow {
            soul: "users/alice".into(),
            reason: "bad json".into(),
        }
        .is_unavailable());
    }
}
