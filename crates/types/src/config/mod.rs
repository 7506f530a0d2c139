//! Configuration types for reldir.
//!
//! Configuration is loaded from TOML files and environment variables by the
//! CLI. All config structs validate their values at construction time via
//! fallible builders. Post-deserialization validation is available via the
//! `validate()` method on each struct.

// The schemars `JsonSchema` derive macro internally uses `.unwrap()` in its
// expansions.
#![allow(clippy::disallowed_methods)]

mod directory;
mod observability;
mod store;
mod sync;

pub use directory::*;
pub use observability::*;
use snafu::Snafu;
pub use store::*;
pub use sync::*;

/// Configuration validation error.
///
/// Returned when a configuration value is outside its valid range or
/// violates a cross-field constraint.
#[derive(Debug, Snafu)]
pub enum ConfigError {
    /// A configuration value is invalid.
    #[snafu(display("invalid config: {message}"))]
    Validation {
        /// Description of the validation failure.
        message: String,
    },
}

/// Duration serialization using humantime format.
pub(crate) mod humantime_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::disallowed_methods)]
mod tests {
    use std::{path::PathBuf, time::Duration};

    use super::*;

    // =========================================================================
    // StoreConfig
    // =========================================================================

    #[test]
    fn test_store_config_defaults_are_valid() {
        let config = StoreConfig::builder().build().expect("defaults should be valid");
        assert_eq!(config.db_path, PathBuf::from("reldir.db"));
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert!(config.auto_migrate);
        assert_eq!(config.max_page_size, 100);
    }

    #[test]
    fn test_store_config_rejects_zero_timeout() {
        let result = StoreConfig::builder().request_timeout(Duration::ZERO).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_store_config_rejects_zero_page_size() {
        let err = StoreConfig::builder().max_page_size(0).build().unwrap_err();
        assert!(err.to_string().contains("max_page_size"));
    }

    #[test]
    fn test_store_config_humantime_serde() {
        let json = r#"{"db_path": "/tmp/x.db", "request_timeout": "250ms"}"#;
        let config: StoreConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.request_timeout, Duration::from_millis(250));
        assert!(config.auto_migrate);
        let back = serde_json::to_string(&config).unwrap();
        assert!(back.contains("250ms"));
    }

    // =========================================================================
    // DirectoryConfig / ValidationConfig
    // =========================================================================

    #[test]
    fn test_validation_config_defaults() {
        let config = ValidationConfig::builder().build().unwrap();
        assert_eq!(config, ValidationConfig::default());
        assert_eq!(config.max_identifier_bytes, 256);
    }

    #[test]
    fn test_validation_config_zero_identifier_bytes() {
        assert!(ValidationConfig::builder().max_identifier_bytes(0).build().is_err());
    }

    #[test]
    fn test_directory_config_serde_defaults() {
        let config: DirectoryConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, DirectoryConfig::default());
        config.validate().unwrap();
    }

    #[test]
    fn test_directory_config_rejects_zero_export_capacity() {
        let config = DirectoryConfig { export_channel_capacity: 0, ..DirectoryConfig::default() };
        assert!(config.validate().is_err());
    }

    // =========================================================================
    // SyncConfig
    // =========================================================================

    #[test]
    fn test_sync_config_defaults_are_valid() {
        let config = SyncConfig::builder().build().unwrap();
        assert_eq!(config.mode, "full");
        assert_eq!(config.channel_capacity, 1_000);
        assert!((config.filter_fp_rate - 0.01).abs() < f64::EPSILON);
    }

    #[test]
    fn test_sync_config_fp_rate_bounds() {
        assert!(SyncConfig::builder().filter_fp_rate(0.0).build().is_err());
        assert!(SyncConfig::builder().filter_fp_rate(1.0).build().is_err());
        assert!(SyncConfig::builder().filter_fp_rate(0.5).build().is_ok());
    }

    #[test]
    fn test_sync_config_requires_address() {
        let err = SyncConfig::builder().remote_address(String::new()).build().unwrap_err();
        assert!(err.to_string().contains("remote_address"));
    }

    #[test]
    fn test_sync_config_secret_is_not_debug_printed() {
        let config = SyncConfig::builder().api_key("s3cret".to_string()).build().unwrap();
        assert!(!format!("{config:?}").contains("s3cret"));
    }

    // =========================================================================
    // LoggingConfig
    // =========================================================================

    #[test]
    fn test_logging_config_format_parse() {
        let config: LoggingConfig = serde_json::from_str(r#"{"format": "json"}"#).unwrap();
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.level, "info");
    }

    #[test]
    fn test_logging_config_rejects_empty_level() {
        let config = LoggingConfig { level: String::new(), ..LoggingConfig::default() };
        assert!(config.validate().is_err());
    }
}
