//! Error types for frame-guard.
//!
//! All fallible operations in the crate return [`GuardError`] through the
//! [`Result`] alias. Two variants matter to callers of the validator:
//! [`GuardError::InvalidArgument`] for malformed calls and
//! [`GuardError::ValidationFailure`] for data violations detected under the
//! `fail` strategy.

use thiserror::Error;

/// The main error type for frame-guard.
#[derive(Error, Debug)]
pub enum GuardError {
    /// A check was called with arguments it cannot work with: an unknown
    /// strategy, an empty column list, or an unparseable pattern.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A data-quality check found violations and its strategy was `fail`.
    #[error("{message}")]
    ValidationFailure {
        /// Name of the check that failed
        check: String,
        /// Human-readable description of the violation
        message: String,
    },

    /// Error when a required column is not found in the dataset.
    #[error("Column '{column}' not found in dataset")]
    ColumnNotFound { column: String },

    /// Error from DataFusion operations.
    #[error("DataFusion error: {0}")]
    DataFusion(#[from] datafusion::error::DataFusionError),

    /// Error related to session or task configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An error wrapped with context through [`ErrorContext`].
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A type alias for `Result<T, GuardError>`.
pub type Result<T> = std::result::Result<T, GuardError>;

impl GuardError {
    /// Creates a new invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Creates a new validation failure for the named check.
    pub fn validation_failure(check: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationFailure {
            check: check.into(),
            message: message.into(),
        }
    }

    /// Creates a new column-not-found error.
    pub fn column_not_found(column: impl Into<String>) -> Self {
        Self::ColumnNotFound {
            column: column.into(),
        }
    }

    /// Returns true if this error is a detected data violation rather than a
    /// malformed call or an engine error.
    pub fn is_validation_failure(&self) -> bool {
        matches!(self, Self::ValidationFailure { .. })
    }

    /// Returns true if this error reports a malformed call.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }
}

/// Extension trait for adding context to errors.
pub trait ErrorContext<T> {
    /// Adds context to an error.
    fn context(self, msg: &str) -> Result<T>;

    /// Adds context with a lazy message.
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<GuardError>,
{
    fn context(self, msg: &str) -> Result<T> {
        self.with_context(|| msg.to_string())
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| match e.into() {
            // Data violations keep their identity so callers can still match on them.
            err @ GuardError::ValidationFailure { .. } => err,
            GuardError::Internal(inner) => GuardError::Internal(format!("{}: {}", f(), inner)),
            other => GuardError::Internal(format!("{}: {}", f(), other)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_failure_displays_message_only() {
        let err = GuardError::validation_failure("primary_key", "Columns id have duplicate values.");
        assert_eq!(err.to_string(), "Columns id have duplicate values.");
        assert!(err.is_validation_failure());
        assert!(!err.is_invalid_argument());
    }

    #[test]
    fn test_invalid_argument() {
        let err = GuardError::invalid_argument("strategy must be either 'fail' or 'warn'");
        assert_eq!(
            err.to_string(),
            "Invalid argument: strategy must be either 'fail' or 'warn'"
        );
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn test_column_not_found() {
        let err = GuardError::column_not_found("user_id");
        assert_eq!(err.to_string(), "Column 'user_id' not found in dataset");
    }

    #[test]
    fn test_error_context() {
        fn failing_operation() -> Result<()> {
            Err(GuardError::Internal("Something went wrong".to_string()))
        }

        let err = failing_operation()
            .context("While loading input")
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Internal error: While loading input: Something went wrong"
        );
    }

    #[test]
    fn test_error_context_keeps_validation_failures() {
        let result: Result<()> = Err(GuardError::validation_failure("row_count", "bad"));
        let err = result.context("outer").unwrap_err();
        assert!(err.is_validation_failure());
    }
}
