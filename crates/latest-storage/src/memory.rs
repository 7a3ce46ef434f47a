//! In-memory blob store for testing.
//!
//! Thread-safe via `RwLock`. Not suitable for production. Supports injecting
//! a number of failing puts to exercise retry paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::blob::{validate_blob_name, Blob, BlobProperties, BlobStore};
use crate::error::StorageError;

/// Blob container held in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryBlobStore {
    blobs: Arc<RwLock<HashMap<String, Blob>>>,
    container_exists: Arc<AtomicBool>,
    failing_puts: Arc<AtomicUsize>,
    put_count: Arc<AtomicUsize>,
}

impl MemoryBlobStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` puts fail with a backend error.
    pub fn fail_next_puts(&self, count: usize) {
        self.failing_puts.store(count, Ordering::SeqCst);
    }

    /// Number of successful puts so far.
    pub fn put_count(&self) -> usize {
        self.put_count.load(Ordering::SeqCst)
    }

    /// Sorted names of all stored blobs.
    pub fn names(&self) -> Vec<String> {
        let blobs = self.blobs.read().unwrap_or_else(|e| e.into_inner());
        let mut names: Vec<String> = blobs.keys().cloned().collect();
        names.sort();
        names
    }

    fn take_injected_failure(&self) -> bool {
        self.failing_puts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn ensure_container(&self) -> Result<bool, StorageError> {
        Ok(!self.container_exists.swap(true, Ordering::SeqCst))
    }

    async fn get(&self, name: &str) -> Result<Option<Blob>, StorageError> {
        validate_blob_name(name)?;
        let blobs = self
            .blobs
            .read()
            .map_err(|_| StorageError::Backend("lock poisoned".into()))?;
        Ok(blobs.get(name).cloned())
    }

    async fn put(
        &self,
        name: &str,
        data: Vec<u8>,
        properties: BlobProperties,
    ) -> Result<(), StorageError> {
        validate_blob_name(name)?;
        if self.take_injected_failure() {
            return Err(StorageError::Backend(format!("injected failure writing {}", name)));
        }

        self.blobs
            .write()
            .map_err(|_| StorageError::Backend("lock poisoned".into()))?
            .insert(name.to_string(), Blob { data, properties });
        self.put_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn describe(&self) -> String {
        "memory://".to_string()
    }
}
