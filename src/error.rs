//! Custom error types for Ucai.
//!
//! Most of the loop machinery fails open, so these errors are
//! mainly surfaced by setup, configuration loading, and the typed accessors
//! on the loop record.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Ucai operations
#[derive(Error, Debug)]
pub enum UcaiError {
    // =========================================================================
    // Loop Record Errors
    // =========================================================================
    /// A header field could not be parsed into its typed value
    #[error("State file corrupted ({field}: '{raw}')")]
    InvalidField { field: String, raw: String },

    // =========================================================================
    // Setup Errors
    // =========================================================================
    /// Setup was invoked without any task text
    #[error("No task provided. Usage: /iterate <task> [--max-iterations N] [--completion-promise TEXT]")]
    MissingTask,

    /// A setup argument was rejected
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Failed to load configuration
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        path: Option<PathBuf>,
    },

    // =========================================================================
    // Wrapped Errors
    // =========================================================================
    /// IO error wrapper
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON error wrapper
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl UcaiError {
    /// Create an invalid-field error
    pub fn invalid_field(field: impl Into<String>, raw: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            raw: raw.into(),
        }
    }

    /// Create an invalid-argument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a configuration error with path
    pub fn config_with_path(message: impl Into<String>, path: PathBuf) -> Self {
        Self::Config {
            message: message.into(),
            path: Some(path),
        }
    }

    /// Get error code for exit status
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config { .. } => 7,
            _ => 1,
        }
    }
}

/// Type alias for Ucai results
pub type Result<T> = std::result::Result<T, UcaiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_field_display_names_field_and_raw_value() {
        let err = UcaiError::invalid_field("iteration", "abc");
        let msg = err.to_string();
        assert!(msg.contains("iteration"));
        assert!(msg.contains("'abc'"));
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(UcaiError::MissingTask.exit_code(), 1);
        assert_eq!(UcaiError::invalid_argument("x").exit_code(), 1);
        assert_eq!(
            UcaiError::config_with_path("test", PathBuf::from("ucai.json")).exit_code(),
            7
        );
    }

    #[test]
    fn test_config_with_path() {
        let path = PathBuf::from("/test/.claude/ucai.json");
        let err = UcaiError::config_with_path("failed to parse", path.clone());
        if let UcaiError::Config {
            message,
            path: opt_path,
        } = err
        {
            assert_eq!(message, "failed to parse");
            assert_eq!(opt_path, Some(path));
        } else {
            panic!("Wrong error variant");
        }
    }

    #[test]
    fn test_missing_task_mentions_usage() {
        assert!(UcaiError::MissingTask.to_string().contains("Usage: /iterate"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err: UcaiError = io_err.into();
        assert!(matches!(err, UcaiError::Io(_)));
        assert!(err.to_string().contains("access denied"));
    }
}
