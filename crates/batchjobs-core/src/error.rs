//! Error types for batchjobs

use thiserror::Error;

/// Main error type for batchjobs
#[derive(Error, Debug)]
pub enum BatchError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A job or request failed local validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// No credentials could be obtained
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Transport-level failure talking to the service
    #[error("HTTP error: {0}")]
    Http(String),

    /// The service answered with a non-success status
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Job not found
    #[error("Job not found: {0}")]
    NotFound(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for batchjobs operations
pub type BatchResult<T> = Result<T, BatchError>;

impl From<serde_json::Error> for BatchError {
    fn from(err: serde_json::Error) -> Self {
        BatchError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for BatchError {
    fn from(err: toml::de::Error) -> Self {
        BatchError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BatchError::Config("invalid config".to_string());
        assert_eq!(err.to_string(), "Configuration error: invalid config");

        let err = BatchError::Api {
            status: 409,
            message: "job already exists".to_string(),
        };
        assert_eq!(err.to_string(), "API error (409): job already exists");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: BatchError = io_err.into();
        assert!(matches!(err, BatchError::Io(_)));
    }

    #[test]
    fn test_error_from_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: BatchError = json_err.into();
        assert!(matches!(err, BatchError::Serialization(_)));
    }
}
