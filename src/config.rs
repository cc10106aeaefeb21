//! # Configuration Management
//!
//! Nested configuration structs with serde defaults, loaded from an optional
//! file plus `VNODE_APPROVER_*` environment overrides, validated after load.
//! The bootstrap layer builds one of these and hands the pieces to the
//! controller constructor.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::reconcile::{ItemExponentialBackoff, MaxOfRateLimiter, TokenBucketLimiter};

#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Worker-pool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Number of concurrent workers pulling from the queue.
    pub workers: usize,
    /// Poll interval for the cache-synchronization gate.
    pub cache_sync_poll_ms: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            cache_sync_poll_ms: 100,
        }
    }
}

impl ControllerConfig {
    pub fn cache_sync_poll_interval(&self) -> Duration {
        Duration::from_millis(self.cache_sync_poll_ms)
    }
}

/// Retry and backoff settings: per-key exponential backoff combined with a
/// global token bucket bounding total retry throughput.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    pub base_delay_ms: u64,
    pub max_delay_secs: u64,
    pub retry_qps: f64,
    pub retry_burst: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 200,
            max_delay_secs: 1000,
            retry_qps: 10.0,
            retry_burst: 100,
        }
    }
}

impl BackoffConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_secs(self.max_delay_secs)
    }

    /// Build the combined limiter the work queue retries through.
    pub fn rate_limiter(&self) -> MaxOfRateLimiter {
        MaxOfRateLimiter::new(vec![
            Box::new(ItemExponentialBackoff::new(
                self.base_delay(),
                self.max_delay(),
            )),
            Box::new(TokenBucketLimiter::new(self.retry_qps, self.retry_burst)),
        ])
    }
}

/// Top-level configuration for the approval controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApproverConfig {
    /// Signer name the inbound subscription is filtered to.
    pub signer_name: String,
    pub controller: ControllerConfig,
    pub backoff: BackoffConfig,
}

impl Default for ApproverConfig {
    fn default() -> Self {
        Self {
            signer_name: constants::VNODE_CLIENT_SIGNER_NAME.to_string(),
            controller: ControllerConfig::default(),
            backoff: BackoffConfig::default(),
        }
    }
}

impl ApproverConfig {
    /// Load from the default file location (if present) plus environment
    /// overrides.
    pub fn load() -> Result<Self, ConfigurationError> {
        Self::load_with_file(config::File::with_name("config/vnode-csr-approver").required(false))
    }

    /// Load from an explicit file plus environment overrides.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigurationError> {
        Self::load_with_file(config::File::from(path))
    }

    fn load_with_file(
        file: config::File<config::FileSourceFile, config::FileFormat>,
    ) -> Result<Self, ConfigurationError> {
        let loaded = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix("VNODE_APPROVER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = loaded.try_deserialize()?;
        config.validate()?;

        tracing::debug!(
            "Configuration loaded successfully: {}",
            serde_json::to_string_pretty(&config)
                .unwrap_or_else(|_| "[serialization error]".to_string())
        );

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.signer_name.is_empty() {
            return Err(ConfigurationError::Invalid(
                "signer_name must not be empty".to_string(),
            ));
        }
        if self.controller.workers == 0 {
            return Err(ConfigurationError::Invalid(
                "controller.workers must be at least 1".to_string(),
            ));
        }
        if self.backoff.base_delay() > self.backoff.max_delay() {
            return Err(ConfigurationError::Invalid(
                "backoff.base_delay_ms must not exceed backoff.max_delay_secs".to_string(),
            ));
        }
        if self.backoff.retry_qps <= 0.0 {
            return Err(ConfigurationError::Invalid(
                "backoff.retry_qps must be positive".to_string(),
            ));
        }
        if self.backoff.retry_burst == 0 {
            return Err(ConfigurationError::Invalid(
                "backoff.retry_burst must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
