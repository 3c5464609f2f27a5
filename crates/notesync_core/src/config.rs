//! Engine configuration.
//!
//! # Responsibility
//! - Hold the tunables for polling, edit debouncing and the simulated remote.
//! - Parse and validate JSON configuration with defaults for absent fields.
//!
//! # Invariants
//! - Intervals are strictly positive.
//! - `remote.failure_rate` lies within `[0, 1]`.

use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5_000;
pub const DEFAULT_EDIT_DEBOUNCE_MS: u64 = 500;
pub const DEFAULT_REMOTE_LATENCY_MS: u64 = 800;
pub const DEFAULT_REMOTE_WRITE_LATENCY_MS: u64 = 1_000;
pub const DEFAULT_REMOTE_FAILURE_RATE: f64 = 0.1;

/// Configuration load/validation failure.
#[derive(Debug)]
pub enum ConfigError {
    Parse(serde_json::Error),
    Invalid { field: &'static str, reason: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "invalid engine config json: {err}"),
            Self::Invalid { field, reason } => write!(f, "invalid `{field}`: {reason}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            Self::Invalid { .. } => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

/// Top-level engine tunables.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Connectivity poll period. Also the effective retry cadence.
    pub poll_interval_ms: u64,
    /// Delay before a debounced edit is committed.
    pub edit_debounce_ms: u64,
    pub remote: RemoteConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            edit_debounce_ms: DEFAULT_EDIT_DEBOUNCE_MS,
            remote: RemoteConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parses JSON, filling absent fields with defaults, then validates.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "poll_interval_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.edit_debounce_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "edit_debounce_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        self.remote.validate()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn edit_debounce(&self) -> Duration {
        Duration::from_millis(self.edit_debounce_ms)
    }
}

/// Simulated remote mirror behavior.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Latency applied to `fetch_all` and `delete`.
    pub latency_ms: u64,
    /// Latency applied to `create` and `update`.
    pub write_latency_ms: u64,
    /// Probability of an injected transient failure on `create`/`update`.
    pub failure_rate: f64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            latency_ms: DEFAULT_REMOTE_LATENCY_MS,
            write_latency_ms: DEFAULT_REMOTE_WRITE_LATENCY_MS,
            failure_rate: DEFAULT_REMOTE_FAILURE_RATE,
        }
    }
}

impl RemoteConfig {
    /// No latency and no random faults. Used by tests.
    pub fn instant() -> Self {
        Self {
            latency_ms: 0,
            write_latency_ms: 0,
            failure_rate: 0.0,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.failure_rate) {
            return Err(ConfigError::Invalid {
                field: "remote.failure_rate",
                reason: format!("expected a value within [0, 1], got {}", self.failure_rate),
            });
        }
        Ok(())
    }

    pub fn latency(&self) -> Duration {
        Duration::from_millis(self.latency_ms)
    }

    pub fn write_latency(&self) -> Duration {
        Duration::from_millis(self.write_latency_ms)
    }
}
