//! Filesystem blob store.
//!
//! The container is a flat directory. Blob names are stored with `/`
//! encoded as `%2F`, so `a` and `a/b` are sibling files and a blob can never
//! collide with the directory of another blob's path:
//! - `<encoded name>`: the blob bytes
//! - `.properties/<encoded name>.json`: the blob's [`BlobProperties`]
//!
//! Both files are written to a temp file in the destination directory and
//! renamed into place, so readers never see a partially written blob.
//! Properties are renamed first; the data rename is the commit point.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::blob::{validate_blob_name, Blob, BlobProperties, BlobStore};
use crate::error::StorageError;

const PROPERTIES_DIR: &str = ".properties";
const ENCODED_SEPARATOR: &str = "%2F";

/// Blob container backed by a directory.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Open the container `container` under `base`.
    ///
    /// Nothing is created until [`BlobStore::ensure_container`] is called.
    pub fn new(base: impl AsRef<Path>, container: &str) -> Result<Self, StorageError> {
        validate_blob_name(container)?;
        if container.contains('/') {
            return Err(StorageError::InvalidName(container.to_string()));
        }
        Ok(Self {
            root: base.as_ref().join(container),
        })
    }

    /// Container directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Sorted names of all stored blobs.
    pub fn names(&self) -> Result<Vec<String>, StorageError> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::Io(e)),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            let file_name = entry.file_name().to_string_lossy().to_string();
            // Properties dir and in-flight temp files.
            if file_name.starts_with('.') || !entry.file_type()?.is_file() {
                continue;
            }
            names.push(decode_name(&file_name));
        }
        names.sort();
        Ok(names)
    }

    fn data_path(&self, name: &str) -> PathBuf {
        self.root.join(encode_name(name))
    }

    fn properties_path(&self, name: &str) -> PathBuf {
        self.root
            .join(PROPERTIES_DIR)
            .join(format!("{}.json", encode_name(name)))
    }
}

/// Flatten a validated blob name into a single file name.
fn encode_name(name: &str) -> String {
    name.replace('/', ENCODED_SEPARATOR)
}

fn decode_name(file_name: &str) -> String {
    file_name.replace(ENCODED_SEPARATOR, "/")
}

/// Write `bytes` to `target` through a sibling temp file and an atomic rename.
fn write_atomic(target: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    let parent = target
        .parent()
        .ok_or_else(|| StorageError::InvalidName(target.display().to_string()))?;
    std::fs::create_dir_all(parent)?;

    let mut temp = NamedTempFile::new_in(parent)?;
    temp.write_all(bytes)?;
    temp.as_file().sync_all()?;
    temp.persist(target).map_err(|e| StorageError::Io(e.error))?;
    Ok(())
}

fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, StorageError> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StorageError::Io(e)),
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn ensure_container(&self) -> Result<bool, StorageError> {
        if tokio::fs::try_exists(&self.root).await? {
            return Ok(false);
        }
        tokio::fs::create_dir_all(&self.root).await?;
        info!(container = %self.root.display(), "Created blob container");
        Ok(true)
    }

    async fn get(&self, name: &str) -> Result<Option<Blob>, StorageError> {
        validate_blob_name(name)?;
        let data_path = self.data_path(name);
        let properties_path = self.properties_path(name);

        tokio::task::spawn_blocking(move || {
            let Some(data) = read_optional(&data_path)? else {
                return Ok(None);
            };
            let properties = match read_optional(&properties_path)? {
                Some(bytes) => serde_json::from_slice(&bytes)?,
                None => BlobProperties::default(),
            };
            Ok(Some(Blob { data, properties }))
        })
        .await?
    }

    async fn put(
        &self,
        name: &str,
        data: Vec<u8>,
        properties: BlobProperties,
    ) -> Result<(), StorageError> {
        validate_blob_name(name)?;
        let data_path = self.data_path(name);
        let properties_path = self.properties_path(name);
        let properties = serde_json::to_vec(&properties)?;
        let size = data.len();

        tokio::task::spawn_blocking(move || {
            write_atomic(&properties_path, &properties)?;
            write_atomic(&data_path, &data)
        })
        .await??;

        debug!(blob = %name, bytes = size, "Wrote blob");
        Ok(())
    }

    fn describe(&self) -> String {
        format!("file://{}", self.root.display())
    }
}
