//! Embedded store configuration.

use std::{path::PathBuf, time::Duration};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Upper bound for `max_page_size`.
const MAX_PAGE_SIZE_LIMIT: u32 = 1_000;

/// Embedded store configuration.
///
/// # Validation Rules
///
/// - `db_path` must not be empty
/// - `request_timeout` must be non-zero
/// - `max_page_size` must be 1-1000
///
/// # Example
///
/// ```no_run
/// # use reldir_types::config::StoreConfig;
/// let config = StoreConfig::builder()
///     .db_path("/var/lib/reldir/directory.db".into())
///     .build()
///     .expect("valid store config");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct StoreConfig {
    /// Path of the database file. The parent directory is created on open.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    /// How long to wait for the file lock held by another process.
    #[serde(default = "default_request_timeout")]
    #[serde(with = "super::humantime_serde")]
    #[schemars(with = "String")]
    pub request_timeout: Duration,
    /// Migrate older stores on open instead of failing.
    #[serde(default = "default_auto_migrate")]
    pub auto_migrate: bool,
    /// Largest page a scan returns; larger requests are clamped.
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,
}

#[bon::bon]
impl StoreConfig {
    /// Creates a new store configuration with validation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if any rule above is violated.
    #[builder]
    pub fn new(
        #[builder(default = default_db_path())] db_path: PathBuf,
        #[builder(default = default_request_timeout())] request_timeout: Duration,
        #[builder(default = default_auto_migrate())] auto_migrate: bool,
        #[builder(default = default_max_page_size())] max_page_size: u32,
    ) -> Result<Self, ConfigError> {
        let config = Self { db_path, request_timeout, auto_migrate, max_page_size };
        config.validate()?;
        Ok(config)
    }
}

impl StoreConfig {
    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if any value is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.db_path.as_os_str().is_empty() {
            return Err(ConfigError::Validation { message: "db_path must not be empty".into() });
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::Validation {
                message: "request_timeout must be non-zero".into(),
            });
        }
        if self.max_page_size == 0 || self.max_page_size > MAX_PAGE_SIZE_LIMIT {
            return Err(ConfigError::Validation {
                message: format!(
                    "max_page_size must be 1-{}, got {}",
                    MAX_PAGE_SIZE_LIMIT, self.max_page_size
                ),
            });
        }
        Ok(())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            request_timeout: default_request_timeout(),
            auto_migrate: default_auto_migrate(),
            max_page_size: default_max_page_size(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("reldir.db")
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_auto_migrate() -> bool {
    true
}

fn default_max_page_size() -> u32 {
    100
}
