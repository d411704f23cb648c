//! Configuration loading and config file resolution
//!
//! Bootstrap configuration is a small TOML file. Every field has a built-in
//! default, so a missing file is never fatal:
//!
//! ```toml
//! [logging]
//! level = "debug"
//! file = "/var/log/scrolluniversity/app.log"
//!
//! [loading]
//! event_capacity = 100
//! heartbeat_secs = 15
//! operation_timeout_ms = 60000
//! warn_on_unknown_keys = true
//! ```
//!
//! Config file resolution order:
//! 1. Explicit path (command-line argument or caller-supplied)
//! 2. `SCROLL_CONFIG` environment variable
//! 3. Platform config directory (`~/.config/scrolluniversity/config.toml` on Linux)
//! 4. Compiled defaults (no file)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "SCROLL_CONFIG";

/// Environment variable overriding `logging.level`
pub const LOG_LEVEL_ENV_VAR: &str = "SCROLL_LOG_LEVEL";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Loading registry configuration (optional)
    #[serde(default)]
    pub loading: LoadingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Loading registry and event stream configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadingConfig {
    /// Broadcast buffer for loading updates before slow receivers lag
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    /// SSE keep-alive interval in seconds
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,

    /// Deadline applied by `with_default_timeout` (None = wait forever)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_timeout_ms: Option<u64>,

    /// Log a warning when `start` sees a key outside the documented key space
    #[serde(default)]
    pub warn_on_unknown_keys: bool,
}

impl Default for LoadingConfig {
    fn default() -> Self {
        Self {
            event_capacity: default_event_capacity(),
            heartbeat_secs: default_heartbeat_secs(),
            operation_timeout_ms: None,
            warn_on_unknown_keys: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_event_capacity() -> usize {
    100
}

fn default_heartbeat_secs() -> u64 {
    15
}

impl TomlConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that parse but cannot be used
    pub fn validate(&self) -> Result<()> {
        if self.loading.event_capacity == 0 {
            return Err(Error::Config(
                "loading.event_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Load configuration from a specific file
    ///
    /// Unlike [`TomlConfig::load`], a missing file is an error here.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        let mut config = Self::from_toml_str(&content)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Resolve and load configuration, falling back to defaults
    ///
    /// A missing file logs a warning and yields defaults. A file that exists
    /// but cannot be read or parsed is an error.
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        match resolve_config_path(cli_path) {
            Some(path) if path.exists() => {
                info!("Loading configuration from {}", path.display());
                Self::from_file(&path)
            }
            Some(path) => {
                warn!(
                    "Config file {} not found, using built-in defaults",
                    path.display()
                );
                Ok(Self::defaults_with_env())
            }
            None => {
                info!("No config file found, using built-in defaults");
                Ok(Self::defaults_with_env())
            }
        }
    }

    fn defaults_with_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Apply `SCROLL_LOG_LEVEL` on top of file values
    pub fn apply_env_overrides(&mut self) {
        if let Ok(level) = std::env::var(LOG_LEVEL_ENV_VAR) {
            if !level.trim().is_empty() {
                self.logging.level = level.trim().to_string();
            }
        }
    }
}

/// Find the config file path to use, if any
///
/// Returns the first candidate in priority order. Explicit and environment
/// paths are returned even if the file does not exist so the caller can
/// report it; the platform default is only returned when it exists.
pub fn resolve_config_path(cli_path: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: explicit path
    if let Some(path) = cli_path {
        return Some(path.to_path_buf());
    }

    // Priority 2: environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: platform config directory
    default_config_path().filter(|path| path.exists())
}

/// Platform config file location (`<config_dir>/scrolluniversity/config.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("scrolluniversity").join("config.toml"))
}

/// Write configuration atomically (temp file + rename)
pub fn write_toml_config(config: &TomlConfig, target: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = target.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let temp_path = target.with_extension("toml.tmp");
    std::fs::write(&temp_path, content)?;
    if let Err(e) = std::fs::rename(&temp_path, target) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(e.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TomlConfig::default();
        assert_eq!(config.logging.level, "info");
        assert!(config.logging.file.is_none());
        assert_eq!(config.loading.event_capacity, 100);
        assert_eq!(config.loading.heartbeat_secs, 15);
        assert_eq!(config.loading.operation_timeout_ms, None);
        assert!(!config.loading.warn_on_unknown_keys);
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = TomlConfig::from_toml_str("").unwrap();
        assert_eq!(config, TomlConfig::default());
    }

    #[test]
    fn test_partial_sections_fill_defaults() {
        let config = TomlConfig::from_toml_str(
            r#"
            [loading]
            operation_timeout_ms = 45000
            "#,
        )
        .unwrap();
        assert_eq!(config.loading.operation_timeout_ms, Some(45_000));
        assert_eq!(config.loading.event_capacity, 100);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = TomlConfig::from_toml_str("[loading\nevent_capacity = ").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_wrong_type_is_config_error() {
        let err = TomlConfig::from_toml_str("[loading]\nevent_capacity = \"lots\"").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_zero_event_capacity_is_config_error() {
        let err = TomlConfig::from_toml_str("[loading]\nevent_capacity = 0\n").unwrap_err();
        match err {
            Error::Config(msg) => assert!(msg.contains("event_capacity"), "got {}", msg),
            other => panic!("expected config error, got {:?}", other),
        }
    }

    #[test]
    fn test_failed_rename_removes_temp_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        // Renaming a file over a non-empty directory fails on every platform
        let target = temp_dir.path().join("config.toml");
        std::fs::create_dir(&target).unwrap();
        std::fs::write(target.join("occupied"), "x").unwrap();

        assert!(write_toml_config(&TomlConfig::default(), &target).is_err());
        assert!(!temp_dir.path().join("config.toml.tmp").exists());
    }

    #[test]
    fn test_explicit_path_has_priority() {
        let explicit = PathBuf::from("/tmp/scroll-explicit.toml");
        assert_eq!(resolve_config_path(Some(&explicit)), Some(explicit));
    }
}
