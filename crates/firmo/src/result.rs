//! Result and error types for Firmo.

use thiserror::Error;

/// Result type for Firmo operations
pub type FirmoResult<T> = Result<T, FirmoError>;

/// Errors that can occur in Firmo
#[derive(Debug, Error)]
pub enum FirmoError {
    /// Bad caller input to a public entry point
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Error message
        message: String,
    },

    /// Invalid state error (operation called in wrong state)
    #[error("Invalid state: {message}")]
    InvalidState {
        /// Error message
        message: String,
    },

    /// Configuration could not be loaded or had the wrong shape
    #[error("Configuration error at '{path}': {message}")]
    Config {
        /// Dot-separated configuration path
        path: String,
        /// Error message
        message: String,
    },

    /// Coverage data failed structural validation
    #[error("Coverage data inconsistent: {message}")]
    Consistency {
        /// First violation found
        message: String,
    },

    /// One or more reports could not be produced
    #[error("Report generation failed: {message}")]
    ReportGeneration {
        /// Error message
        message: String,
    },

    /// Requested report formats are not supported
    #[error("Unsupported report format(s): {}", formats.join(", "))]
    UnsupportedFormat {
        /// The unrecognized format names
        formats: Vec<String>,
    },

    /// Error raised by the embedded Lua runtime
    #[cfg(feature = "lua")]
    #[error("Lua error: {0}")]
    Lua(#[from] mlua::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl FirmoError {
    /// Create an invalid argument error
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create an invalid state error
    #[must_use]
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Create a consistency error
    #[must_use]
    pub fn consistency(message: impl Into<String>) -> Self {
        Self::Consistency {
            message: message.into(),
        }
    }

    /// Create a report generation error
    #[must_use]
    pub fn report_generation(message: impl Into<String>) -> Self {
        Self::ReportGeneration {
            message: message.into(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_format_lists_names() {
        let err = FirmoError::UnsupportedFormat {
            formats: vec!["bogus".to_string(), "pdf".to_string()],
        };
        let text = err.to_string();
        assert!(text.contains("bogus"));
        assert!(text.contains("pdf"));
    }

    #[test]
    fn test_consistency_error() {
        let err = FirmoError::consistency("line 3 covered but not executed");
        assert!(err.to_string().contains("inconsistent"));
        assert!(err.to_string().contains("line 3"));
    }

    #[test]
    fn test_config_error_names_path() {
        let err = FirmoError::Config {
            path: "coverage.include".to_string(),
            message: "expected a list".to_string(),
        };
        assert!(err.to_string().contains("coverage.include"));
    }

    #[test]
    fn test_io_error_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: FirmoError = io_err.into();
        assert!(err.to_string().contains("I/O"));
    }
}
