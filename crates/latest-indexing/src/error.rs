//! Error types for the indexing pipeline.

use latest_protocol::ProtocolError;
use latest_storage::StorageError;
use thiserror::Error;

/// Errors that can occur in the indexing pipeline
#[derive(Error, Debug)]
pub enum IndexingError {
    /// Blob or cursor storage failed
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Catalog or registration request failed
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// JSON or compression failure
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A registration listing could not be assembled
    #[error("Invalid listing: {0}")]
    InvalidListing(String),

    /// A document variant name was not recognised
    #[error("Unknown document variant: {0}")]
    UnknownVariant(String),

    /// The identifier channel was closed while sending
    #[error("Identifier channel closed")]
    ChannelClosed,

    /// A worker task panicked or was aborted
    #[error("Worker failed: {0}")]
    Worker(String),

    /// Shutdown was requested
    #[error("Cancelled")]
    Cancelled,
}

impl IndexingError {
    /// Whether this error is a shutdown request rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, IndexingError::Cancelled)
    }

    /// Whether the upstream resource does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            IndexingError::Protocol(ProtocolError::Status { status: 404, .. })
        )
    }
}

impl From<serde_json::Error> for IndexingError {
    fn from(err: serde_json::Error) -> Self {
        IndexingError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for IndexingError {
    fn from(err: std::io::Error) -> Self {
        IndexingError::Serialization(err.to_string())
    }
}
