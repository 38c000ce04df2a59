//! Configuration for the engine, queue and SLA sweeps

use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Job queue configuration
    #[serde(default)]
    pub queue: QueueConfig,

    /// SLA sweep configuration
    #[serde(default)]
    pub sweep: SweepConfig,
}

/// Job queue configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Maximum delivery attempts per job
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Exponential backoff base unit in milliseconds
    #[serde(default = "default_backoff_unit_ms")]
    pub backoff_unit_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_unit_ms: default_backoff_unit_ms(),
        }
    }
}

impl From<&QueueConfig> for greenlight_queue::QueueConfig {
    fn from(config: &QueueConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            backoff_unit: Duration::from_millis(config.backoff_unit_ms),
        }
    }
}

/// SLA sweep configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Breach sweep interval in seconds
    #[serde(default = "default_breach_interval")]
    pub breach_interval_secs: u64,

    /// Warning sweep interval in seconds
    #[serde(default = "default_warning_interval")]
    pub warning_interval_secs: u64,

    /// How far ahead of the due time a warning fires, in seconds
    #[serde(default = "default_warning_lookahead")]
    pub warning_lookahead_secs: u64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            breach_interval_secs: default_breach_interval(),
            warning_interval_secs: default_warning_interval(),
            warning_lookahead_secs: default_warning_lookahead(),
        }
    }
}

impl SweepConfig {
    pub fn warning_lookahead(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.warning_lookahead_secs as i64)
    }
}

// Default value helpers
fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_unit_ms() -> u64 {
    1000
}

fn default_breach_interval() -> u64 {
    300
}

fn default_warning_interval() -> u64 {
    900
}

fn default_warning_lookahead() -> u64 {
    3600
}

impl EngineConfig {
    /// Load configuration from an optional file plus `GREENLIGHT_`
    /// environment variables
    pub fn load(path: Option<&str>) -> Result<Self, EngineError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(
            config::Config::try_from(&EngineConfig::default())
                .map_err(|e| EngineError::Config(e.to_string()))?,
        );

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("GREENLIGHT")
                .separator("_")
                .try_parsing(true),
        );

        builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| EngineError::Config(e.to_string()))
    }
}
