//! Tests for file-backed tracing setup
//!
//! The tracing subscriber is process-global, so this lives in its own test
//! binary with a single test that installs it.

use scroll_common::config::LoggingConfig;
use scroll_common::logging::init_tracing;
use scroll_common::Error;
use tempfile::TempDir;

#[test]
fn test_init_tracing_writes_to_log_file() {
    std::env::remove_var("RUST_LOG");
    let temp_dir = TempDir::new().unwrap();
    let log_path = temp_dir.path().join("logs").join("scroll.log");

    let config = LoggingConfig {
        level: "info".to_string(),
        file: Some(log_path.clone()),
    };
    init_tracing(&config).unwrap();

    assert!(log_path.exists(), "log file and parent directory should be created");

    tracing::info!("loading registry online");
    let content = std::fs::read_to_string(&log_path).unwrap();
    assert!(content.contains("loading registry online"), "got: {}", content);
    assert!(!content.contains("\u{1b}["), "file output must not contain ANSI codes");

    // A second global subscriber is rejected
    let err = init_tracing(&LoggingConfig::default()).unwrap_err();
    assert!(matches!(err, Error::Logging(_)));
}
