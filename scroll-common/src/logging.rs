//! Tracing subscriber setup
//!
//! `RUST_LOG` wins when set; otherwise the configured level applies.

use crate::config::LoggingConfig;
use crate::{Error, Result};
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Build the filter for `config`, preferring `RUST_LOG`
pub fn env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.level)
        .map_err(|e| Error::Config(format!("Invalid log level '{}': {}", config.level, e)))
}

/// Install the global tracing subscriber
///
/// Logs to stderr, or appends to `config.file` when set. Fails if a global
/// subscriber is already installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let filter = env_filter(config)?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    match &config.file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
                .map_err(|e| Error::Logging(e.to_string()))?;
            info!("Logging to {}", path.display());
        }
        None => {
            builder
                .with_writer(std::io::stderr)
                .try_init()
                .map_err(|e| Error::Logging(e.to_string()))?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_env_filter_accepts_configured_level() {
        std::env::remove_var("RUST_LOG");
        let config = LoggingConfig {
            level: "debug".to_string(),
            file: None,
        };
        let filter = env_filter(&config).unwrap();
        assert_eq!(filter.to_string(), "debug");
    }

    #[test]
    #[serial]
    fn test_env_filter_accepts_directives() {
        std::env::remove_var("RUST_LOG");
        let config = LoggingConfig {
            level: "warn,scroll_common=trace".to_string(),
            file: None,
        };
        assert!(env_filter(&config).is_ok());
    }

    #[test]
    #[serial]
    fn test_env_filter_rejects_garbage() {
        std::env::remove_var("RUST_LOG");
        let config = LoggingConfig {
            level: "scroll_common=loud".to_string(),
            file: None,
        };
        assert!(matches!(env_filter(&config), Err(Error::Config(_))));
    }

    #[test]
    #[serial]
    fn test_rust_log_takes_priority() {
        std::env::set_var("RUST_LOG", "error");
        let filter = env_filter(&LoggingConfig::default()).unwrap();
        std::env::remove_var("RUST_LOG");
        assert_eq!(filter.to_string(), "error");
    }
}
