//! Directory service and identifier validation configuration.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{ConfigError, StoreConfig};

// =========================================================================
// ValidationConfig
// =========================================================================

/// Identifier limits applied before any key is encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ValidationConfig {
    /// Maximum UTF-8 byte length of a type, id or relation name.
    #[serde(default = "default_max_identifier_bytes")]
    pub max_identifier_bytes: usize,
    /// Maximum UTF-8 byte length of an object display name.
    #[serde(default = "default_max_display_name_bytes")]
    pub max_display_name_bytes: usize,
}

#[bon::bon]
impl ValidationConfig {
    /// Creates a validation configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if a limit is zero.
    #[builder]
    pub fn new(
        #[builder(default = default_max_identifier_bytes())] max_identifier_bytes: usize,
        #[builder(default = default_max_display_name_bytes())] max_display_name_bytes: usize,
    ) -> Result<Self, ConfigError> {
        let config = Self { max_identifier_bytes, max_display_name_bytes };
        config.validate()?;
        Ok(config)
    }
}

impl ValidationConfig {
    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if a limit is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_identifier_bytes == 0 {
            return Err(ConfigError::Validation {
                message: "max_identifier_bytes must be > 0".into(),
            });
        }
        if self.max_display_name_bytes == 0 {
            return Err(ConfigError::Validation {
                message: "max_display_name_bytes must be > 0".into(),
            });
        }
        Ok(())
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_identifier_bytes: default_max_identifier_bytes(),
            max_display_name_bytes: default_max_display_name_bytes(),
        }
    }
}

const fn default_max_identifier_bytes() -> usize {
    256
}

const fn default_max_display_name_bytes() -> usize {
    1024
}

// =========================================================================
// DirectoryConfig
// =========================================================================

/// Directory service configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DirectoryConfig {
    /// Embedded store settings.
    #[serde(default)]
    pub store: StoreConfig,
    /// Identifier limits.
    #[serde(default)]
    pub validation: ValidationConfig,
    /// Worker threads for batched checks; 0 uses available parallelism.
    #[serde(default)]
    pub check_workers: usize,
    /// Capacity of the bounded channel behind `export`.
    #[serde(default = "default_export_channel_capacity")]
    pub export_channel_capacity: usize,
}

impl DirectoryConfig {
    /// Directory config for a store at `db_path`, everything else default.
    pub fn with_db_path(db_path: impl Into<std::path::PathBuf>) -> Self {
        Self {
            store: StoreConfig { db_path: db_path.into(), ..StoreConfig::default() },
            ..Self::default()
        }
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if a nested config is invalid or
    /// the export channel capacity is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.store.validate()?;
        self.validation.validate()?;
        if self.export_channel_capacity == 0 {
            return Err(ConfigError::Validation {
                message: "export_channel_capacity must be > 0".into(),
            });
        }
        Ok(())
    }
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            validation: ValidationConfig::default(),
            check_workers: 0,
            export_channel_capacity: default_export_channel_capacity(),
        }
    }
}

const fn default_export_channel_capacity() -> usize {
    1_000
}
