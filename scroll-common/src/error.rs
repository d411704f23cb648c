//! Common error types for ScrollUniversity
//!
//! The loading registry itself never fails. These errors come from the
//! ambient layers (configuration, logging) and the opt-in timeout helper.

use thiserror::Error;

/// Common result type for ScrollUniversity operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across ScrollUniversity services
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Tracing subscriber could not be installed
    #[error("Logging error: {0}")]
    Logging(String),

    /// Wrapped operation did not settle within its deadline
    ///
    /// The key has already been stopped when this is returned.
    #[error("Operation '{key}' timed out after {after_ms}ms")]
    Timeout {
        /// Operation key that was force-stopped
        key: String,
        /// Deadline that elapsed, in milliseconds
        after_ms: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_display_names_key_and_deadline() {
        let err = Error::Timeout {
            key: "ai:generate_lecture".to_string(),
            after_ms: 30_000,
        };
        assert_eq!(
            err.to_string(),
            "Operation 'ai:generate_lecture' timed out after 30000ms"
        );
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().starts_with("IO error:"));
    }
}
