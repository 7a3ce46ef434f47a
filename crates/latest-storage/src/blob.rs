//! Blob storage contract.
//!
//! A blob store is a single container of named objects. Names are relative,
//! `/`-separated paths. Every put fully replaces the previous object and must
//! be atomic from a reader's point of view: a concurrent `get` observes either
//! the old object or the new one, never a partial write.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// HTTP-style properties stored alongside a blob.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobProperties {
    /// e.g. `application/json`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    /// e.g. `gzip`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_encoding: Option<String>,

    /// e.g. `no-store`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<String>,
}

impl BlobProperties {
    /// Plain JSON content.
    pub fn json() -> Self {
        Self {
            content_type: Some("application/json".to_string()),
            ..Default::default()
        }
    }

    /// Gzip-compressed JSON that intermediaries must not cache.
    pub fn gzip_json_no_store() -> Self {
        Self {
            content_type: Some("application/json".to_string()),
            content_encoding: Some("gzip".to_string()),
            cache_control: Some("no-store".to_string()),
        }
    }
}

/// A stored blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    /// Raw bytes as written
    pub data: Vec<u8>,
    /// Properties recorded with the bytes
    pub properties: BlobProperties,
}

/// Storage backend trait for a single blob container.
#[async_trait]
pub trait BlobStore: Send + Sync + 'static {
    /// Create the container if it does not exist.
    ///
    /// Returns `true` when the container was created by this call.
    async fn ensure_container(&self) -> Result<bool, StorageError>;

    /// Read a blob.
    ///
    /// Returns `None` if the blob doesn't exist; that is not an error.
    async fn get(&self, name: &str) -> Result<Option<Blob>, StorageError>;

    /// Write a blob, replacing any existing one atomically.
    async fn put(
        &self,
        name: &str,
        data: Vec<u8>,
        properties: BlobProperties,
    ) -> Result<(), StorageError>;

    /// Backend description for logs.
    fn describe(&self) -> String;
}

/// Check that `name` is a relative path with no empty, dot or dot-prefixed
/// segments, and no `%` or backslash.
pub fn validate_blob_name(name: &str) -> Result<(), StorageError> {
    let valid = !name.is_empty()
        && !name.contains(['\\', '%'])
        && name
            .split('/')
            .all(|segment| !segment.is_empty() && !segment.starts_with('.'));

    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidName(name.to_string()))
    }
}
