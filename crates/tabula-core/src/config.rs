//! Engine configuration loaded from `tabula.toml`.
//!
//! Every field is optional; an empty document yields `Config::default()`.

use crate::error::ErrorClass;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error as ThisError;

/// Conventional config file name.
pub const CONFIG_FILE_NAME: &str = "tabula.toml";

/// Default name of the migration tracking table.
pub const DEFAULT_MIGRATION_TABLE: &str = "_migrations";

///
/// ConfigError
///

#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("cannot read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid migration table name '{0}'")]
    InvalidTableName(String),
}

impl ConfigError {
    pub(crate) const fn class(&self) -> ErrorClass {
        match self {
            Self::Read { .. } => ErrorClass::NotFound,
            Self::Parse(_) | Self::InvalidTableName(_) => ErrorClass::Unsupported,
        }
    }
}

///
/// Config
///
/// ```toml
/// [log]
/// print_errors = true
/// trace_sql = false
///
/// [migration]
/// multiple_providers = false
/// table = "_migrations"
/// ```
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub log: LogConfig,
    pub migration: MigrationConfig,
}

impl Config {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;

        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_toml_str(&source)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let table = &self.migration.table;
        let valid = !table.is_empty()
            && table
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');

        if valid {
            Ok(())
        } else {
            Err(ConfigError::InvalidTableName(table.clone()))
        }
    }
}

///
/// LogConfig
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    /// Emit the errors of every bare-form call at `error` level.
    pub print_errors: bool,

    /// Emit each statement at `debug` level on `tabula::sql`.
    pub trace_sql: bool,
}

///
/// MigrationConfig
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct MigrationConfig {
    /// Allow one migration run to span several storages.
    pub multiple_providers: bool,
    pub table: String,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            multiple_providers: false,
            table: DEFAULT_MIGRATION_TABLE.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_document_is_default() {
        let config = Config::from_toml_str("").expect("empty config parses");

        assert_eq!(config, Config::default());
        assert_eq!(config.migration.table, "_migrations");
    }

    #[test]
    fn sections_override_defaults() {
        let config = Config::from_toml_str(
            r#"
            [log]
            print_errors = true

            [migration]
            multiple_providers = true
            table = "schema_history"
            "#,
        )
        .expect("config parses");

        assert!(config.log.print_errors);
        assert!(!config.log.trace_sql);
        assert!(config.migration.multiple_providers);
        assert_eq!(config.migration.table, "schema_history");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = Config::from_toml_str("[log]\nverbose = true\n").expect_err("unknown key");

        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn table_name_must_be_an_identifier() {
        let err = Config::from_toml_str("[migration]\ntable = \"x; drop\"\n")
            .expect_err("bad table name");

        assert!(matches!(err, ConfigError::InvalidTableName(_)));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "[log]\ntrace_sql = true").expect("write config");

        let config = Config::from_path(file.path()).expect("config loads");
        assert!(config.log.trace_sql);
    }

    #[test]
    fn missing_file_is_not_found() {
        let err = Config::from_path("/nonexistent/tabula.toml").expect_err("missing file");

        assert_eq!(err.class(), ErrorClass::NotFound);
    }
}
