//! Error types for tenant-forge.
//!
//! Defines the main error enum used throughout the application.
//!
//! Only `Validation` errors abort a fan-out call before dispatch. Connection
//! and execution errors are scoped to a single target and surface as that
//! target's `ExecutionResult` rather than propagating.

use thiserror::Error;

/// Main error type for tenant-forge operations.
#[derive(Error, Debug)]
pub enum ForgeError {
    /// Boundary validation errors (empty script, malformed descriptor, etc.)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Database connection errors (host unreachable, auth failed, etc.)
    #[error("Connection error: {0}")]
    Connection(String),

    /// Script execution errors (syntax errors, constraint violations, etc.)
    #[error("Execution error: {0}")]
    Execution(String),

    /// Configuration errors (invalid config file, missing required fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// State database errors (project store, migrations, etc.)
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Internal application errors (task panics, unexpected states, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ForgeError {
    /// Creates a validation error with the given message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Creates a connection error with the given message.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates an execution error with the given message.
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a persistence error with the given message.
    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Validation(_) => "Validation Error",
            Self::Connection(_) => "Connection Error",
            Self::Execution(_) => "Execution Error",
            Self::Config(_) => "Configuration Error",
            Self::Persistence(_) => "Persistence Error",
            Self::Internal(_) => "Internal Error",
        }
    }
}

/// Result type alias using ForgeError.
pub type Result<T> = std::result::Result<T, ForgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_validation() {
        let err = ForgeError::validation("SQL script is empty");
        assert_eq!(err.to_string(), "Validation error: SQL script is empty");
        assert_eq!(err.category(), "Validation Error");
    }

    #[test]
    fn test_error_display_connection() {
        let err = ForgeError::connection("Cannot connect to localhost:5432");
        assert_eq!(
            err.to_string(),
            "Connection error: Cannot connect to localhost:5432"
        );
        assert_eq!(err.category(), "Connection Error");
    }

    #[test]
    fn test_error_display_execution() {
        let err = ForgeError::execution("column \"emal\" does not exist");
        assert_eq!(
            err.to_string(),
            "Execution error: column \"emal\" does not exist"
        );
        assert_eq!(err.category(), "Execution Error");
    }

    #[test]
    fn test_error_display_config() {
        let err = ForgeError::config("missing field 'timeout_secs' in [executor]");
        assert_eq!(
            err.to_string(),
            "Configuration error: missing field 'timeout_secs' in [executor]"
        );
        assert_eq!(err.category(), "Configuration Error");
    }

    #[test]
    fn test_error_display_persistence() {
        let err = ForgeError::persistence("projects table is locked");
        assert_eq!(
            err.to_string(),
            "Persistence error: projects table is locked"
        );
        assert_eq!(err.category(), "Persistence Error");
    }

    #[test]
    fn test_error_display_internal() {
        let err = ForgeError::internal("unexpected state");
        assert_eq!(err.to_string(), "Internal error: unexpected state");
        assert_eq!(err.category(), "Internal Error");
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ForgeError>();
    }
}
