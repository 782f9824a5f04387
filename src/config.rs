//! Configuration loading from TOML files.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{ConfigError, Result};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub coalescer: CoalescerConfig,
    pub flush: FlushConfig,
    pub liveness: LivenessConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Path or URL of the SQLite database file.
    pub database_url: String,
    pub pool_size: u32,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CoalescerConfig {
    /// Quiet-period window measured from the last mutation for an entity.
    pub debounce_ms: u64,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct FlushConfig {
    pub retry_initial_ms: u64,
    pub retry_max_ms: u64,
    pub backoff_multiplier: f64,
    /// Upper bound on the shutdown drain; entities still unflushed after
    /// this are logged as lost.
    pub drain_grace_ms: u64,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LivenessConfig {
    pub probe_interval_secs: u64,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: "graphstash.db".into(),
            pool_size: 5,
        }
    }
}

impl Default for CoalescerConfig {
    fn default() -> Self {
        Self { debounce_ms: 200 }
    }
}

impl Default for FlushConfig {
    fn default() -> Self {
        Self {
            retry_initial_ms: 250,
            retry_max_ms: 15_000,
            backoff_multiplier: 2.0,
            drain_grace_ms: 5_000,
        }
    }
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            probe_interval_secs: 30,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.store.database_url.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "store.database_url",
                reason: "cannot be empty".into(),
            }
            .into());
        }
        if self.store.pool_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "store.pool_size",
                reason: "must be at least 1".into(),
            }
            .into());
        }
        if self.coalescer.debounce_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "coalescer.debounce_ms",
                reason: "must be non-zero".into(),
            }
            .into());
        }
        if self.flush.backoff_multiplier < 1.0 {
            return Err(ConfigError::InvalidValue {
                field: "flush.backoff_multiplier",
                reason: "must be >= 1.0".into(),
            }
            .into());
        }
        if self.flush.retry_initial_ms > self.flush.retry_max_ms {
            return Err(ConfigError::InvalidValue {
                field: "flush.retry_initial_ms",
                reason: format!(
                    "must not exceed retry_max_ms ({})",
                    self.flush.retry_max_ms
                ),
            }
            .into());
        }
        Ok(())
    }

    /// Initialize the tracing subscriber with this logging configuration.
    pub fn init_logging(&self) {
        self.logging.init();
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.coalescer.debounce_ms)
    }

    pub fn drain_grace(&self) -> Duration {
        Duration::from_millis(self.flush.drain_grace_ms)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.liveness.probe_interval_secs)
    }
}

impl LoggingConfig {
    /// Initialize the tracing subscriber with this logging configuration.
    pub fn init(&self) {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));

        match self.format.as_str() {
            "json" => {
                fmt().json().with_env_filter(filter).init();
            }
            _ => {
                fmt().with_env_filter(filter).init();
            }
        }
    }
}
