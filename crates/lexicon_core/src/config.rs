//! Engine configuration.
//!
//! # Responsibility
//! - Describe tunables for lookup batching, SQLite contention and write mode.
//! - Load them from TOML with defaults for every omitted key.
//!
//! # Invariants
//! - `lookup_batch_size` never exceeds the store's membership lookup limit.
//! - A loaded config has passed `validate()`.

use crate::logging::default_log_level;
use crate::repo::vote_repo::MAX_LOOKUP_BATCH;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// How a cast persists its ledger and counter writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Ledger write and counter write are independent; a failure between them
    /// leaves the stores diverged.
    Split,
    /// Both writes commit or roll back together.
    #[default]
    Atomic,
}

/// Logging settings consumed by `init_logging`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: String,
    /// Absolute directory for rolling log files; logging stays off when unset.
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level().to_string(),
            dir: None,
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Identifiers per membership lookup, `1..=10`.
    pub lookup_batch_size: usize,
    /// SQLite busy timeout in milliseconds.
    pub busy_timeout_ms: u64,
    pub write_mode: WriteMode,
    pub logging: LoggingConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lookup_batch_size: MAX_LOOKUP_BATCH,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            write_mode: WriteMode::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Loads and validates configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_toml(&content)
    }

    /// Parses and validates configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lookup_batch_size == 0 || self.lookup_batch_size > MAX_LOOKUP_BATCH {
            return Err(ConfigError::Invalid(format!(
                "lookup_batch_size must be within 1..={MAX_LOOKUP_BATCH}, got {}",
                self.lookup_batch_size
            )));
        }
        if let Some(dir) = &self.logging.dir {
            if !dir.is_absolute() {
                return Err(ConfigError::Invalid(format!(
                    "logging.dir must be an absolute path, got `{}`",
                    dir.display()
                )));
            }
        }
        Ok(())
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

/// Errors raised while loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read config file: {err}"),
            Self::Parse(err) => write!(f, "failed to parse config file: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, EngineConfig, WriteMode};

    #[test]
    fn empty_document_yields_defaults() {
        let config = EngineConfig::from_toml("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.lookup_batch_size, 10);
        assert_eq!(config.write_mode, WriteMode::Atomic);
    }

    #[test]
    fn parses_write_mode_and_logging_table() {
        let config = EngineConfig::from_toml(
            r#"
            lookup_batch_size = 4
            write_mode = "split"

            [logging]
            level = "warn"
            dir = "/var/log/lexicon"
            "#,
        )
        .unwrap();
        assert_eq!(config.lookup_batch_size, 4);
        assert_eq!(config.write_mode, WriteMode::Split);
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn rejects_batch_size_over_store_limit() {
        let err = EngineConfig::from_toml("lookup_batch_size = 11").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(message) if message.contains("1..=10")));
    }

    #[test]
    fn rejects_unknown_keys_and_relative_log_dir() {
        assert!(matches!(
            EngineConfig::from_toml("batch = 3"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            EngineConfig::from_toml("[logging]\ndir = \"logs\""),
            Err(ConfigError::Invalid(_))
        ));
    }
}
