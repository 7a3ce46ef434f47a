//! Error types shared across catalog2latest crates.

use thiserror::Error;

/// Unified error type for configuration and model handling.
#[derive(Debug, Error)]
pub enum LatestError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Version string could not be parsed
    #[error("Invalid version: {0}")]
    InvalidVersion(String),

    /// Invalid input error
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LatestError::Config("consumer_workers must be > 0".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: consumer_workers must be > 0"
        );

        let err = LatestError::InvalidVersion("1.x".to_string());
        assert_eq!(err.to_string(), "Invalid version: 1.x");
    }

    #[test]
    fn test_from_serde_error() {
        let json_err = serde_json::from_str::<i32>("nope").unwrap_err();
        let err: LatestError = json_err.into();
        assert!(matches!(err, LatestError::Serialization(_)));
    }
}
