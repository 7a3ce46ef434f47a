//! Persisted resumption cursor.
//!
//! The cursor is the exclusive lower bound of catalog commits that have
//! already been projected. It is stored as `{"value": "<timestamp>"}` in a
//! well-known blob of the container.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::blob::{BlobProperties, BlobStore};
use crate::error::StorageError;

/// Name of the cursor blob.
pub const CURSOR_BLOB_NAME: &str = "cursor.json";

/// Read/write access to the resumption cursor.
#[async_trait]
pub trait CursorStore: Send + Sync {
    /// Current cursor, or `None` if none has been written yet.
    async fn get(&self) -> Result<Option<DateTime<Utc>>, StorageError>;

    /// Overwrite the cursor unconditionally.
    async fn set(&self, value: DateTime<Utc>) -> Result<(), StorageError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct CursorData {
    value: DateTime<Utc>,
}

/// Cursor stored in a blob container.
#[derive(Clone)]
pub struct BlobCursor {
    store: Arc<dyn BlobStore>,
}

impl BlobCursor {
    /// Create a cursor backed by `store`.
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl CursorStore for BlobCursor {
    async fn get(&self) -> Result<Option<DateTime<Utc>>, StorageError> {
        let Some(blob) = self.store.get(CURSOR_BLOB_NAME).await? else {
            return Ok(None);
        };

        let data: CursorData = serde_json::from_slice(&blob.data)?;
        debug!(cursor = %data.value.to_rfc3339(), "Read cursor value");
        Ok(Some(data.value))
    }

    async fn set(&self, value: DateTime<Utc>) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec(&CursorData { value })?;
        self.store
            .put(CURSOR_BLOB_NAME, bytes, BlobProperties::json())
            .await?;
        debug!(cursor = %value.to_rfc3339(), "Wrote cursor value");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::FsBlobStore;
    use crate::memory::MemoryBlobStore;
    use chrono::TimeZone;

    #[tokio::test]
    async fn test_absent_cursor_is_none() {
        let cursor = BlobCursor::new(Arc::new(MemoryBlobStore::new()));
        assert_eq!(cursor.get().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let store = MemoryBlobStore::new();
        let cursor = BlobCursor::new(Arc::new(store.clone()));
        let value = Utc.with_ymd_and_hms(2021, 6, 7, 8, 9, 10).unwrap();

        cursor.set(value).await.unwrap();
        assert_eq!(cursor.get().await.unwrap(), Some(value));

        let blob = store.get(CURSOR_BLOB_NAME).await.unwrap().unwrap();
        let json: serde_json::Value = serde_json::from_slice(&blob.data).unwrap();
        assert!(json["value"].as_str().unwrap().starts_with("2021-06-07T08:09:10"));
        assert_eq!(blob.properties.content_type.as_deref(), Some("application/json"));
    }

    #[tokio::test]
    async fn test_visible_after_restart() {
        let temp = tempfile::tempdir().unwrap();
        let value = Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap();

        {
            let store = FsBlobStore::new(temp.path(), "latest").unwrap();
            BlobCursor::new(Arc::new(store)).set(value).await.unwrap();
        }

        let reopened = FsBlobStore::new(temp.path(), "latest").unwrap();
        let cursor = BlobCursor::new(Arc::new(reopened));
        assert_eq!(cursor.get().await.unwrap(), Some(value));
    }

    #[tokio::test]
    async fn test_accepts_offset_timestamps() {
        let store = MemoryBlobStore::new();
        store
            .put(
                CURSOR_BLOB_NAME,
                br#"{"value":"2021-06-07T10:09:10.5+02:00"}"#.to_vec(),
                BlobProperties::json(),
            )
            .await
            .unwrap();

        let cursor = BlobCursor::new(Arc::new(store));
        let value = cursor.get().await.unwrap().unwrap();
        assert_eq!(value.to_rfc3339(), "2021-06-07T08:09:10.500+00:00");
    }

    #[tokio::test]
    async fn test_corrupt_cursor_is_error() {
        let store = MemoryBlobStore::new();
        store
            .put(CURSOR_BLOB_NAME, b"not json".to_vec(), BlobProperties::json())
            .await
            .unwrap();

        let cursor = BlobCursor::new(Arc::new(store));
        assert!(matches!(cursor.get().await, Err(StorageError::Serialization(_))));
    }
}
