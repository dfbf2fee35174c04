//! Reconciler configuration

use serde::Deserialize;
use std::time::Duration;

use crate::application::handlers::payment::ReconcilerConfig;

use super::error::ValidationError;

/// Background reconciliation settings
#[derive(Debug, Clone, Deserialize)]
pub struct ReconcilerSettings {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Minimum age of a pending purchase before it is polled
    #[serde(default = "default_grace")]
    pub grace_secs: u64,

    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    #[serde(default = "default_call_timeout")]
    pub call_timeout_ms: u64,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl ReconcilerSettings {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn to_reconciler_config(&self) -> ReconcilerConfig {
        ReconcilerConfig {
            interval: Duration::from_secs(self.interval_secs),
            grace_period: Duration::from_secs(self.grace_secs),
            batch_size: self.batch_size,
            call_timeout: self.call_timeout(),
            max_attempts: self.max_attempts,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            concurrency: self.concurrency,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.interval_secs == 0 {
            return Err(ValidationError::InvalidReconcilerSetting("interval_secs"));
        }
        if self.batch_size == 0 || self.batch_size > 1000 {
            return Err(ValidationError::InvalidReconcilerSetting("batch_size"));
        }
        if self.call_timeout_ms == 0 {
            return Err(ValidationError::InvalidReconcilerSetting("call_timeout_ms"));
        }
        if self.max_attempts == 0 {
            return Err(ValidationError::InvalidReconcilerSetting("max_attempts"));
        }
        if self.concurrency == 0 {
            return Err(ValidationError::InvalidReconcilerSetting("concurrency"));
        }
        Ok(())
    }
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            interval_secs: default_interval(),
            grace_secs: default_grace(),
            batch_size: default_batch_size(),
            call_timeout_ms: default_call_timeout(),
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff(),
            concurrency: default_concurrency(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_interval() -> u64 {
    60
}

fn default_grace() -> u64 {
    120
}

fn default_batch_size() -> u32 {
    50
}

fn default_call_timeout() -> u64 {
    5_000
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff() -> u64 {
    500
}

fn default_concurrency() -> usize {
    4
}
