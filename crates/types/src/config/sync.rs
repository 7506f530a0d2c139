//! Synchronization engine configuration.

use std::{fmt, time::Duration};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Remote directory and pipeline settings for a sync run.
///
/// # Validation Rules
///
/// - `remote_address` must not be empty
/// - `channel_capacity` must be > 0
/// - `filter_floor` must be > 0
/// - `filter_fp_rate` must be strictly between 0 and 1
/// - `connect_timeout` must be non-zero
#[derive(Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SyncConfig {
    /// Remote exporter endpoint, e.g. `http://localhost:9292`.
    #[serde(default = "default_remote_address")]
    pub remote_address: String,
    /// API key sent as `authorization: basic <key>`.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Tenant id sent as `tenant-id` request metadata.
    #[serde(default)]
    pub tenant_id: Option<String>,
    /// Comma-separated modes: `manifest`, `full`, `diff`, `watermark`.
    #[serde(default = "default_mode")]
    pub mode: String,
    /// Capacity of the producer/subscriber channel.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// Minimum number of entries the diff filter is sized for.
    #[serde(default = "default_filter_floor")]
    pub filter_floor: u64,
    /// Target false-positive rate of the diff filter.
    #[serde(default = "default_filter_fp_rate")]
    pub filter_fp_rate: f64,
    /// Timeout for establishing the remote connection.
    #[serde(default = "default_connect_timeout")]
    #[serde(with = "super::humantime_serde")]
    #[schemars(with = "String")]
    pub connect_timeout: Duration,
}

#[bon::bon]
impl SyncConfig {
    /// Creates a sync configuration with validation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if any rule above is violated.
    #[builder]
    pub fn new(
        #[builder(default = default_remote_address())] remote_address: String,
        api_key: Option<String>,
        tenant_id: Option<String>,
        #[builder(default = default_mode())] mode: String,
        #[builder(default = default_channel_capacity())] channel_capacity: usize,
        #[builder(default = default_filter_floor())] filter_floor: u64,
        #[builder(default = default_filter_fp_rate())] filter_fp_rate: f64,
        #[builder(default = default_connect_timeout())] connect_timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            remote_address,
            api_key,
            tenant_id,
            mode,
            channel_capacity,
            filter_floor,
            filter_fp_rate,
            connect_timeout,
        };
        config.validate()?;
        Ok(config)
    }
}

impl SyncConfig {
    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if any value is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.remote_address.trim().is_empty() {
            return Err(ConfigError::Validation {
                message: "remote_address must not be empty".into(),
            });
        }
        if self.channel_capacity == 0 {
            return Err(ConfigError::Validation {
                message: "channel_capacity must be > 0".into(),
            });
        }
        if self.filter_floor == 0 {
            return Err(ConfigError::Validation { message: "filter_floor must be > 0".into() });
        }
        if !(self.filter_fp_rate > 0.0 && self.filter_fp_rate < 1.0) {
            return Err(ConfigError::Validation {
                message: format!(
                    "filter_fp_rate must be between 0 and 1 exclusive, got {}",
                    self.filter_fp_rate
                ),
            });
        }
        if self.connect_timeout.is_zero() {
            return Err(ConfigError::Validation {
                message: "connect_timeout must be non-zero".into(),
            });
        }
        Ok(())
    }
}

impl fmt::Debug for SyncConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncConfig")
            .field("remote_address", &self.remote_address)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("tenant_id", &self.tenant_id)
            .field("mode", &self.mode)
            .field("channel_capacity", &self.channel_capacity)
            .field("filter_floor", &self.filter_floor)
            .field("filter_fp_rate", &self.filter_fp_rate)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            remote_address: default_remote_address(),
            api_key: None,
            tenant_id: None,
            mode: default_mode(),
            channel_capacity: default_channel_capacity(),
            filter_floor: default_filter_floor(),
            filter_fp_rate: default_filter_fp_rate(),
            connect_timeout: default_connect_timeout(),
        }
    }
}

fn default_remote_address() -> String {
    "http://localhost:9292".to_string()
}

fn default_mode() -> String {
    "full".to_string()
}

const fn default_channel_capacity() -> usize {
    1_000
}

const fn default_filter_floor() -> u64 {
    10_000
}

const fn default_filter_fp_rate() -> f64 {
    0.01
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(5)
}
