//! Layered configuration for the `reldir` binary.
//!
//! Sources, lowest precedence first:
//!
//! 1. built-in defaults
//! 2. a TOML file (`--config`, or `reldir.toml` in the working directory when present)
//! 3. `RELDIR__` environment variables, `__` separating nested keys
//!    (e.g. `RELDIR__DIRECTORY__STORE__DB_PATH=/var/lib/reldir.db`)
//! 4. command line flags

use std::{net::SocketAddr, path::Path};

use reldir_types::config::{ConfigError, DirectoryConfig, LoggingConfig, SyncConfig};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Prefix of configuration environment variables.
pub const ENV_PREFIX: &str = "RELDIR";

/// Default config file name, resolved without an extension.
const DEFAULT_FILE: &str = "reldir";

/// Complete configuration of one `reldir` invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CliConfig {
    /// Local store and directory settings.
    #[serde(default)]
    pub directory: DirectoryConfig,
    /// Remote directory and sync pipeline settings.
    #[serde(default)]
    pub sync: SyncConfig,
    /// Log filter and format.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Address of the Prometheus scrape endpoint. Disabled when unset.
    #[serde(default)]
    #[schemars(with = "Option<String>")]
    pub metrics_addr: Option<SocketAddr>,
}

impl CliConfig {
    /// Loads the file at `path` (or the default file) and the process
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicit file is missing or any source fails
    /// to parse into [`CliConfig`].
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        Self::load_with(path, environment())
    }

    pub(crate) fn load_with(
        path: Option<&Path>,
        env: config::Environment,
    ) -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder();
        let builder = match path {
            Some(path) => builder.add_source(config::File::from(path)),
            None => builder.add_source(config::File::with_name(DEFAULT_FILE).required(false)),
        };
        builder.add_source(env).build()?.try_deserialize()
    }

    /// Validates the settings every command uses. Sync settings are
    /// checked by the sync engine when it is built.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] for the first invalid section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.directory.validate()?;
        self.logging.validate()
    }
}

fn environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX).separator("__").try_parsing(true)
}

/// JSON schema of the configuration file.
pub fn schema() -> String {
    let schema = schemars::schema_for!(CliConfig);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::{io::Write, path::PathBuf, time::Duration};

    use reldir_types::config::LogFormat;

    use super::*;

    fn env(vars: &[(&str, &str)]) -> config::Environment {
        let map = vars.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect();
        environment().source(Some(map))
    }

    fn toml_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().expect("temp file");
        file.write_all(contents.as_bytes()).expect("write config");
        file
    }

    #[test]
    fn test_defaults_without_sources() {
        let config = CliConfig::load_with(None, env(&[])).expect("load");
        assert_eq!(config, CliConfig::default());
        config.validate().expect("defaults are valid");
    }

    #[test]
    fn test_file_values() {
        let file = toml_file(
            r#"
            metrics_addr = "127.0.0.1:9000"

            [directory.store]
            db_path = "/tmp/reldir-test.db"
            request_timeout = "2s"

            [sync]
            remote_address = "http://remote:9292"
            mode = "manifest,diff"

            [logging]
            format = "json"
            "#,
        );
        let config = CliConfig::load_with(Some(file.path()), env(&[])).expect("load");
        assert_eq!(config.directory.store.db_path, PathBuf::from("/tmp/reldir-test.db"));
        assert_eq!(config.directory.store.request_timeout, Duration::from_secs(2));
        assert_eq!(config.sync.remote_address, "http://remote:9292");
        assert_eq!(config.sync.mode, "manifest,diff");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.metrics_addr, Some("127.0.0.1:9000".parse().expect("addr")));
    }

    #[test]
    fn test_environment_overrides_file() {
        let file = toml_file("[sync]\nremote_address = \"http://file:9292\"\n");
        let config = CliConfig::load_with(
            Some(file.path()),
            env(&[
                ("RELDIR__SYNC__REMOTE_ADDRESS", "http://env:9292"),
                ("RELDIR__SYNC__CHANNEL_CAPACITY", "16"),
            ]),
        )
        .expect("load");
        assert_eq!(config.sync.remote_address, "http://env:9292");
        assert_eq!(config.sync.channel_capacity, 16);
    }

    #[test]
    fn test_missing_explicit_file_fails() {
        let result = CliConfig::load_with(Some(Path::new("/nonexistent/reldir.toml")), env(&[]));
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_empty_log_level() {
        let mut config = CliConfig::default();
        config.logging.level = " ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_schema_names_sections() {
        let schema = schema();
        assert!(schema.contains("directory"));
        assert!(schema.contains("remote_address"));
    }
}
