//! Error types for the CLI

use thiserror::Error;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Errors that can occur in the CLI
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// A Lua script raised an error
    #[error("Script failed: {message}")]
    ScriptFailed {
        /// Error message
        message: String,
    },

    /// Coverage fell short of the requested minimum
    #[error("Line coverage {actual:.1}% is below the required {required:.1}%")]
    ThresholdNotMet {
        /// Measured line coverage percentage
        actual: f64,
        /// Requested minimum percentage
        required: f64,
    },

    /// IO error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Firmo library error
    #[error("Firmo error: {0}")]
    Firmo(#[from] firmo::FirmoError),

    /// Invalid argument
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Error message
        message: String,
    },

    /// Report generation error
    #[error("Report generation failed: {message}")]
    ReportGeneration {
        /// Error message
        message: String,
    },
}

impl CliError {
    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a script failure error
    #[must_use]
    pub fn script_failed(message: impl Into<String>) -> Self {
        Self::ScriptFailed {
            message: message.into(),
        }
    }

    /// Create an invalid argument error
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
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
