//! Error types for the protocol clients.

use thiserror::Error;

/// Errors that can occur when talking to the package service.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Transport-level failure (connect, timeout, body read)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status code
    #[error("Unexpected status {status} from {url}")]
    Status {
        /// Request URL
        url: String,
        /// Response status code
        status: u16,
    },

    /// Response body was not the expected JSON
    #[error("Invalid response from {url}: {message}")]
    Deserialize {
        /// Request URL
        url: String,
        /// Parser message
        message: String,
    },

    /// The service index does not advertise a required resource
    #[error("Service index has no resource of type {0}")]
    MissingResource(String),

    /// Client could not be constructed
    #[error("Invalid client configuration: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProtocolError::Status {
            url: "https://example.test/index.json".to_string(),
            status: 503,
        };
        assert_eq!(
            err.to_string(),
            "Unexpected status 503 from https://example.test/index.json"
        );

        let err = ProtocolError::MissingResource("Catalog/3.0.0".to_string());
        assert!(err.to_string().contains("Catalog/3.0.0"));
    }
}
