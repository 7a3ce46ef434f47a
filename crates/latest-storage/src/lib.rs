//! Blob storage layer for catalog2latest.
//!
//! Provides:
//! - A [`BlobStore`] contract with atomic, overwrite-in-place puts
//! - A filesystem backend that writes through a temp file and renames
//! - An in-memory backend for tests and dry runs
//! - The persisted resumption cursor ([`BlobCursor`])

pub mod blob;
pub mod cursor;
pub mod error;
pub mod fs;
pub mod memory;

pub use blob::{validate_blob_name, Blob, BlobProperties, BlobStore};
pub use cursor::{BlobCursor, CursorStore, CURSOR_BLOB_NAME};
pub use error::StorageError;
pub use fs::FsBlobStore;
pub use memory::MemoryBlobStore;
