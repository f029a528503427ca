//! Engine settings loaded from YAML

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default state directory, relative to the working directory
pub const DEFAULT_STATE_DIR: &str = ".clusterflow";

/// Smallest starting unit count for which squaring still grows the delay
pub const MIN_BACKOFF_UNITS: u64 = 2;

/// Top-level settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Where the file state store keeps cluster documents
    pub state_dir: Option<PathBuf>,

    /// Backoff used when a delete hits a retryable error
    pub backoff: BackoffSettings,

    /// Bounded retries for generic idempotent operations
    pub retry: RetrySettings,

    /// Concurrent apply batches
    pub concurrent: ConcurrentSettings,
}

impl Settings {
    /// Read settings from a YAML file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let settings: Settings =
            serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        settings.validate()?;
        tracing::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        self.backoff.validate()
    }

    /// State directory, falling back to [`DEFAULT_STATE_DIR`]
    pub fn state_dir(&self) -> PathBuf {
        self.state_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_DIR))
    }
}

/// Squaring backoff for retryable delete failures
///
/// The delay is counted in `unit_ms` steps: it starts at `initial_units` and
/// is squared after every wait.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffSettings {
    pub unit_ms: u64,
    pub initial_units: u64,
    /// Upper bound for a single wait. Unbounded when unset.
    pub cap_secs: Option<u64>,
    /// Give up after this many retries of one resource. Unbounded when unset.
    pub max_attempts: Option<u32>,
}

impl BackoffSettings {
    pub fn validate(&self) -> Result<()> {
        if self.unit_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "backoff.unit_ms",
                reason: "must be greater than 0".to_string(),
            });
        }
        if self.initial_units < MIN_BACKOFF_UNITS {
            return Err(ConfigError::Invalid {
                field: "backoff.initial_units",
                reason: format!(
                    "must be at least {}, got {}",
                    MIN_BACKOFF_UNITS, self.initial_units
                ),
            });
        }
        Ok(())
    }
}

impl Default for BackoffSettings {
    fn default() -> Self {
        Self {
            unit_ms: 1000,
            initial_units: 2,
            cap_secs: None,
            max_attempts: None,
        }
    }
}

/// Fixed-attempt retries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub attempts: u32,
    pub interval_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            attempts: 5,
            interval_ms: 3000,
        }
    }
}

/// Concurrent apply engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcurrentSettings {
    /// Wall-clock limit for a whole batch
    pub timeout_secs: u64,
}

impl Default for ConcurrentSettings {
    fn default() -> Self {
        Self { timeout_secs: 600 }
    }
}
